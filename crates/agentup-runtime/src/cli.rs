//! CLI definition using clap derive.

use std::path::PathBuf;

use agentup_core::types::DeviceKind;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agentup", about = "device agent lifecycle tracker")]
pub struct Cli {
    /// Path to the adb binary
    #[arg(long, global = true, default_value = "adb")]
    pub adb_bin: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Track a device and drive agent install/start/restart
    Track(TrackOpts),
    /// List attached devices
    Devices,
    /// One-shot lifecycle check of a device
    Check(CheckOpts),
}

#[derive(clap::Args)]
pub struct TrackOpts {
    /// Connectivity class to wait for (usb, local, remote)
    #[arg(long, default_value = "usb")]
    pub device_kind: DeviceKind,

    /// Enumeration poll interval in milliseconds
    #[arg(long, default_value = "2000")]
    pub poll_interval_ms: u64,

    /// Bounded wait for the install push step, in seconds
    #[arg(long, default_value = "60")]
    pub push_timeout_secs: u64,

    /// Release cache directory (defaults to the per-user cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Release endpoint override
    #[arg(long, env = "AGENTUP_RELEASE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Device id to select automatically when several are attached
    #[arg(long)]
    pub device: Option<String>,

    /// Print notices as JSON lines
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct CheckOpts {
    /// Device id (defaults to the single attached matching device)
    #[arg(long)]
    pub device: Option<String>,

    /// Connectivity class (usb, local, remote)
    #[arg(long, default_value = "usb")]
    pub device_kind: DeviceKind,

    /// Release cache directory (defaults to the per-user cache dir)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Release endpoint override
    #[arg(long, env = "AGENTUP_RELEASE_ENDPOINT")]
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_defaults() {
        let cli = Cli::try_parse_from(["agentup", "track"]).expect("parses");
        let Command::Track(opts) = cli.command else {
            panic!("expected track");
        };
        assert_eq!(cli.adb_bin, "adb");
        assert_eq!(opts.device_kind, DeviceKind::Usb);
        assert_eq!(opts.poll_interval_ms, 2000);
        assert!(!opts.json);
    }

    #[test]
    fn parses_device_kind_value() {
        let cli = Cli::try_parse_from(["agentup", "track", "--device-kind", "local"])
            .expect("parses");
        let Command::Track(opts) = cli.command else {
            panic!("expected track");
        };
        assert_eq!(opts.device_kind, DeviceKind::Local);
    }

    #[test]
    fn rejects_unknown_device_kind() {
        assert!(Cli::try_parse_from(["agentup", "track", "--device-kind", "bluetooth"]).is_err());
    }

    #[test]
    fn parses_check_with_device() {
        let cli =
            Cli::try_parse_from(["agentup", "check", "--device", "AAAA"]).expect("parses");
        let Command::Check(opts) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(opts.device.as_deref(), Some("AAAA"));
    }
}
