mod cli;
mod commands;
mod config;
mod download;
mod install;
mod platform;
mod resolver;
mod state;
mod types;


use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::{Settings, LOG_LEVEL_ENV};
use install::LocalInstaller;
use resolver::ResolverRegistry;
use state::LocalState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli)?;

    if let Commands::Version = cli.command {
        println!("azabox {}", cli::get_version());
        return Ok(());
    }

    let settings = Settings::from_env()?;
    let registry = ResolverRegistry::with_default_resolvers(&settings);
    let installer = LocalInstaller::from_settings(&settings);
    let mut state = LocalState::new(&settings.state_file);
    tracing::debug!(
        "Install directory: {}, state file: {}",
        installer.install_dir().display(),
        settings.state_file.display()
    );

    match cli.command {
        Commands::Install { binaries, version } => {
            commands::install_binaries(&binaries, &version, &registry, &installer, &mut state)
                .await?;
        }

        Commands::Update { binaries } => {
            commands::update_binaries(&binaries, &registry, &installer, &mut state).await?;
        }

        Commands::List => {
            print!("{}", commands::list_binaries(&mut state)?);
        }

        Commands::Version => {}
    }

    Ok(())
}

/// Log level from `--log-level`, then `AZABOX_LOG_LEVEL`, then `-q`/`-v`.
fn log_level(cli: &Cli, env_level: Option<String>) -> String {
    if let Some(level) = cli.log_level.clone().or(env_level) {
        return level;
    }

    let level = if cli.quiet {
        "error"
    } else if cli.verbose == 0 {
        "warn"
    } else if cli.verbose == 1 {
        "info"
    } else {
        "debug"
    };
    level.to_string()
}

fn setup_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_level = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty());
    let level = log_level(cli, env_level);

    let filter = EnvFilter::try_new(&level)
        .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", level, e))?;

    // stdout carries command output, logs go to stderr
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    Ok(())
}
