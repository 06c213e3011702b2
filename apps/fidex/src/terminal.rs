use anyhow::{bail, Context, Result};
use console::{style, Term};
use fidex_config::FiscalizaConfig;
use std::io::{IsTerminal, Write};

const APP_TITLE: &str = " FIDEx Tool ";
const LINE_CHAR: char = '~';

fn terminal_width() -> usize {
    let (_rows, cols) = Term::stdout().size();
    cols as usize
}

fn rule(width: usize) -> String {
    LINE_CHAR.to_string().repeat(width)
}

/// Title centered in a full-width rule; one extra tilde pads odd gaps.
fn title_rule(width: usize) -> String {
    let side = width.saturating_sub(APP_TITLE.chars().count()) / 2;
    let bar = LINE_CHAR.to_string().repeat(side);
    let mut line = format!("{bar}{APP_TITLE}{bar}");
    if line.chars().count() < width {
        line.push(LINE_CHAR);
    }
    line
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .context("failed to read input")?;
    Ok(input.trim().to_string())
}

fn parse_answer(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Greets the user and prompts for any credential the config does not
/// carry. Fails rather than hangs when stdin is not a terminal.
pub fn prompt_credentials(cfg: &mut FiscalizaConfig) -> Result<()> {
    if !cfg.username.is_empty() && !cfg.password.is_empty() {
        return Ok(());
    }
    if !std::io::stdin().is_terminal() {
        bail!("credentials are not configured and stdin is not a terminal");
    }

    let width = terminal_width();
    println!("\n{}", style(title_rule(width)).dim());
    println!("\nWelcome to the Fiscaliza Instrument Data Extraction Tool!\n");

    if cfg.username.is_empty() {
        cfg.username = prompt_line("Username: ")?;
    }
    if cfg.password.is_empty() {
        cfg.password = rpassword::prompt_password("Password: ")
            .context("failed to read password")?
            .trim()
            .to_string();
    }

    println!("{}\n", style(rule(width)).dim());
    Ok(())
}

/// Asks a yes/no question, looping until the answer parses.
pub fn query_yes_no(question: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("cannot answer '{question}' without a terminal");
    }

    let width = terminal_width();
    println!("\n{}", style(rule(width)).dim());
    let answer = loop {
        let input = prompt_line(&format!("{question} (y/n): "))?;
        match parse_answer(&input) {
            Some(answer) => break answer,
            None => println!("Please respond with 'y' or 'n'."),
        }
    };
    println!("{}\n", style(rule(width)).dim());
    Ok(answer)
}
