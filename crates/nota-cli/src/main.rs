//! Nota CLI - Receipt spending tracker
//!
//! Usage:
//!   nota init                      Create the data directory and databases
//!   nota register alice            Create an account and log in
//!   nota add <URL>                 Extract and store an NFC-e receipt
//!   nota report --ids 1,2          Spending report
//!   nota advise                    Price comparison from the model

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use nota_core::prompts::PromptLibrary;
use nota_core::Outcome;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    // Prompt commands don't touch storage
    if let Commands::Prompts { action } = &cli.command {
        let mut library = PromptLibrary::new();
        return match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(&mut library),
            Some(PromptsAction::Show { prompt_id }) => {
                commands::cmd_prompts_show(&mut library, prompt_id)
            }
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        };
    }

    let app = commands::open_app(
        cli.data_dir.as_deref(),
        cli.config.as_deref(),
        cli.no_encrypt,
    )?;

    let outcome = match cli.command {
        Commands::Init => {
            commands::cmd_init(&app)?;
            return Ok(());
        }
        Commands::Status => {
            commands::cmd_status(&app).await?;
            return Ok(());
        }
        Commands::Register {
            username,
            password,
            secret,
        } => commands::cmd_register(&app, &username, &password, &secret)?,
        Commands::Login { username, password } => {
            commands::cmd_login(&app, &username, &password)?
        }
        Commands::Logout => commands::cmd_logout(&app)?,
        Commands::Whoami => commands::cmd_whoami(&app)?,
        Commands::DeleteAccount { yes } => commands::cmd_delete_account(&app, yes)?,
        Commands::Add { url } => commands::cmd_add(&app, &url).await?,
        Commands::List => commands::cmd_list(&app)?,
        Commands::Show { id } => commands::cmd_show(&app, id)?,
        Commands::Report { ids, json } => commands::cmd_report(&app, ids.as_deref(), json)?,
        Commands::Advise => commands::cmd_advise(&app).await?,
        Commands::Prompts { .. } => return Ok(()),
    };

    if let Outcome::Failure { label, .. } = outcome {
        tracing::debug!(label, "Operation failed");
        std::process::exit(1);
    }

    Ok(())
}
