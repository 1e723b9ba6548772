//! deskhand - control a Linux or Windows desktop from a Telegram chat.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use deskhand_core::{logging, shutdown_signal, Runtime};
use deskhand_types::config_loader::ConfigLoader;
use tracing::info;

#[derive(Parser)]
#[command(name = "deskhand", about = "Remote control for a desktop over Telegram", version)]
struct Cli {
    /// YAML config file. Environment variables override its values.
    #[arg(short, long, env = "DESKHAND_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter directives (e.g. "debug" or "info,deskhand_channels=debug").
    #[arg(short, long, env = "DESKHAND_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if !cfg!(any(target_os = "linux", target_os = "windows")) {
        bail!("deskhand supports Linux and Windows desktops");
    }

    let config = ConfigLoader::load(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(cli.log_level.as_deref(), &config.logging.level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        storage = %config.storage.path.display(),
        "starting deskhand"
    );

    let runtime = Runtime::from_config(&config)
        .await
        .context("failed to initialise deskhand")?;
    runtime.run(shutdown_signal()).await?;
    Ok(())
}
