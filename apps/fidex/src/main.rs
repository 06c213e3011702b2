mod cli;
mod terminal;

use anyhow::{bail, Context, Result};
use fidex_client::FiscalizaClient;
use fidex_config::AppConfig;
use fidex_core::normalize::FieldRegistry;
use fidex_extract::pipeline::{self, TrackerTables};
use fidex_extract::workbook;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = cli::parse_args();
    let mut config = if args.config_path.exists() {
        fidex_config::load_config(&args.config_path)
            .with_context(|| format!("failed to load config {}", args.config_path.display()))?
    } else if args.config_explicit {
        bail!("config {} not found", args.config_path.display());
    } else {
        info!(
            "config {} not found; using defaults",
            args.config_path.display()
        );
        fidex_config::default_config()
    };

    terminal::prompt_credentials(&mut config.fiscaliza)?;

    run(config).await
}

async fn run(config: AppConfig) -> Result<()> {
    let client = FiscalizaClient::new(config.fiscaliza.clone())?;

    let discovery = pipeline::discover_projects(&client, &config.extract).await?;

    let register = match discovery.general_register {
        Some(project) => {
            info!("general register project id found: {}", project.id);
            Some(project)
        }
        None => {
            error!(
                "project '{}' not found in the fetched projects",
                config.extract.general_register_project
            );
            let skip = terminal::query_yes_no(&format!(
                "Project '{}' not found. Do you want to skip it?",
                config.extract.general_register_project
            ))?;
            if !skip {
                bail!("general register project not found");
            }
            info!("skipping the general register");
            None
        }
    };

    if discovery.equipment.is_empty() {
        bail!(
            "no projects with keyword '{}' found",
            config.extract.project_keyword
        );
    }
    info!(
        "found {} projects with keyword '{}'",
        discovery.equipment.len(),
        config.extract.project_keyword
    );

    let mut registry = FieldRegistry::default();
    let mut tables = TrackerTables::with_trackers(&config.extract.general_register_trackers);
    if let Some(project) = &register {
        pipeline::general_register_pass(&client, &config.extract, project, &mut tables, &mut registry)
            .await?;
    }

    let equipment =
        pipeline::equipment_pass(&client, &config.extract, &discovery.equipment, &mut registry)
            .await?;

    let path = workbook::save_workbook(&config.output, &tables, &equipment)?;
    info!("data saved to {}", path.display());
    info!("process completed successfully");
    Ok(())
}
