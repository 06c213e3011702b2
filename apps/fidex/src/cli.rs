use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: PathBuf,
    /// True when the path came from `--config` rather than resolution.
    pub config_explicit: bool,
}

enum ParseOutcome {
    Args(CliArgs),
    Help,
}

fn usage() {
    eprintln!(
        "usage:
  fidex [--config <path>]

options:
  --config <path>  TOML config file (default: FIDEX_CONFIG, then
                   ~/.fidex/config.toml, then config/fidex.toml)
  -h, --help       show this help
"
    );
}

fn parse_args_impl(mut args: impl Iterator<Item = String>) -> Result<ParseOutcome, String> {
    let mut config_path: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--config requires a value".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "-h" | "--help" | "help" => return Ok(ParseOutcome::Help),
            _ => {}
        }
    }

    let config_explicit = config_path.is_some();
    Ok(ParseOutcome::Args(CliArgs {
        config_path: fidex_config::resolve_config_path(config_path),
        config_explicit,
    }))
}

pub fn parse_args() -> CliArgs {
    match parse_args_impl(std::env::args().skip(1)) {
        Ok(ParseOutcome::Args(args)) => args,
        Ok(ParseOutcome::Help) => {
            usage();
            std::process::exit(0);
        }
        Err(error) => {
            eprintln!("error: {error}");
            usage();
            std::process::exit(2);
        }
    }
}
