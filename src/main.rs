//! vibe-validate CLI entry point
//!
//! Dispatches to subcommands. Results go to stdout, diagnostics to stderr.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vibe_validate::cli::{Cli, Commands};
use vibe_validate::config::{Config, ConfigManager};
use vibe_validate::error::{VibeError, VibeResult, ERROR_EXIT_CODE};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(ERROR_EXIT_CODE)
        }
    }
}

async fn run() -> VibeResult<i32> {
    let cli = Cli::parse();
    let (config, local) = load_config(&cli).await?;
    init_logging(cli.verbose, &config);
    match local {
        Some(path) => debug!("Using local config: {}", path.display()),
        None => debug!("No local config in use"),
    }

    match cli.command {
        Commands::Run(args) => vibe_validate::cli::commands::run(args, &config).await,
        Commands::Validate(args) => vibe_validate::cli::commands::validate(args, &config).await,
        Commands::History(args) => vibe_validate::cli::commands::history(args, &config).await,
        Commands::Cache(args) => vibe_validate::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            vibe_validate::cli::commands::config(args, &config, cli.config.clone()).await
        }
    }
}

async fn load_config(cli: &Cli) -> VibeResult<(Config, Option<PathBuf>)> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Find local config unless --no-local is set
    let local = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| VibeError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = manager.load_merged(local.as_deref()).await?;
    Ok((config, local))
}

/// 0 = warn, 1 = info, 2+ = debug; `RUST_LOG` wins when set
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => "vibe_validate=warn",
        1 => "vibe_validate=info",
        _ => "vibe_validate=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}
