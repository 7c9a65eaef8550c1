//! agentup: device agent lifecycle tracker binary.
//! Watches for a connected device, resolves the on-device agent state, and
//! drives install/start/restart operations from the command line.

use clap::Parser;

mod cli;
mod commands;
mod config;
mod ops;
mod tracker;
mod watcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("AGENTUP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    match args.command {
        cli::Command::Track(opts) => commands::cmd_track(args.adb_bin, opts).await?,
        cli::Command::Devices => commands::cmd_devices(args.adb_bin).await?,
        cli::Command::Check(opts) => commands::cmd_check(args.adb_bin, opts).await?,
    }

    Ok(())
}
