mod cli;
mod commands;
mod config;
mod error;
mod logging;
mod ui;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::{CliError, Result};
use crate::ui::UiManager;
use clap::Parser;
use tokio::task;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        eprintln!("\n❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_app() -> Result<()> {
    let (ui_manager, ui_sender, shutdown_sender) = UiManager::new();
    let ui_handle = task::spawn(ui_manager.run());

    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let (panic_hook, eyre_hook) = color_eyre::config::HookBuilder::default().into_hooks();
    eyre_hook.install().map_err(|e| CliError::Other(e.into()))?;
    std::panic::set_hook(Box::new(move |pi| {
        error!("{}", panic_hook.panic_report(pi));
    }));

    let command_result = async {
        info!("gmxflow CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
        debug!("Full CLI arguments parsed: {:?}", &cli);

        let config_args = &cli.config;
        match cli.command {
            Commands::Types => {
                info!("Dispatching to 'types' command.");
                let config = config::build_config(
                    config_args,
                    config::user_config_path().as_deref(),
                    &config::CliOverrides::default(),
                )?;
                commands::types::run(&config)
            }
            Commands::Preview(args) => {
                info!("Dispatching to 'preview' command.");
                commands::preview::run(args, config_args)
            }
            Commands::Compile(args) => {
                info!("Dispatching to 'compile' command.");
                commands::compile::run(args, config_args)
            }
            Commands::Run(args) => {
                info!("Dispatching to 'run' command.");
                commands::run::run(args, config_args, ui_sender).await
            }
            Commands::New(args) => {
                info!("Dispatching to 'new' command.");
                commands::new::run(args, config_args)
            }
            Commands::Set(args) => {
                info!("Dispatching to 'set' command.");
                commands::edit::run_set(args, config_args)
            }
            Commands::Connect(args) => {
                info!("Dispatching to 'connect' command.");
                commands::edit::run_connect(args, config_args)
            }
            Commands::Disconnect(args) => {
                info!("Dispatching to 'disconnect' command.");
                commands::edit::run_disconnect(args, config_args)
            }
        }
    }
    .await;

    match &command_result {
        Ok(_) => info!("Command completed successfully."),
        Err(e) => error!("Command failed: {}", e),
    }

    if shutdown_sender.send(true).is_err() {
        warn!("UI manager may have already exited before shutdown signal.");
    }

    ui_handle
        .await
        .map_err(|e| CliError::Other(anyhow::anyhow!("UI manager task failed: {}", e)))?;

    command_result
}
