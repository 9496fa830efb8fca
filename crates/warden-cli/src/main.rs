//! warden — security policy engine for agent actions.

mod cli;
mod commands;

use clap::Parser;
use cli::{ApprovalAction, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_store = warden_core::ConfigStore::new();
    let config = config_store.load();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("warden=debug")
            .init();
    }

    let level = cli.resolve_level(&config);

    match cli.command {
        Commands::Check { ref command } => {
            let code = commands::check::command(command, level, &config, cli.json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::CheckUrl { ref url } => {
            let code = commands::check::url(url, level, &config, cli.json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::CheckPath { ref path } => {
            let code = commands::check::path(path, level, &config, cli.json)?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Run {
            ref command,
            ref cwd,
            timeout,
        } => {
            let options = commands::run::RunOptions {
                cwd: cwd.clone(),
                timeout,
                json: cli.json,
            };
            let code = commands::run::run(command, level, &config, options).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Approvals { action } => match action {
            ApprovalAction::List => commands::approvals::list(cli.json).await?,
            ApprovalAction::Respond {
                ref text,
                ref channel_type,
                ref channel_id,
            } => {
                commands::approvals::respond(
                    text,
                    channel_type.as_deref(),
                    channel_id.as_deref(),
                )
                .await?;
            }
            ApprovalAction::Expire => commands::approvals::expire().await?,
        },
    }

    Ok(())
}
