//! CLI command implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentup_adb::channel::AdbChannel;
use agentup_adb::devices::enumerate_devices;
use agentup_adb::executor::{AdbExecutor, SerialScopedRunner};
use agentup_core::lifecycle::resolve_lifecycle;
use agentup_core::notice::{OperationOutcome, TrackerNotice};
use agentup_core::types::{AgentStatus, ChannelAccess};
use agentup_releases::{CacheConfig, GithubReleaseFetcher, ReleaseCache};
use anyhow::{Context, bail};

use crate::cli::{CheckOpts, TrackOpts};
use crate::config::{
    DEFAULT_ASSET_PREFIX, DEFAULT_PLATFORM_TAG, DEFAULT_RELEASE_ENDPOINT, TrackerConfig,
};
use crate::tracker::{ReleaseResolver, Tracker};

fn cache_config(cache_dir: Option<PathBuf>) -> CacheConfig {
    let mut config = CacheConfig::default();
    if let Some(dir) = cache_dir {
        config.cache_dir = dir;
    }
    config
}

fn build_resolver(
    endpoint: Option<String>,
    cache: CacheConfig,
) -> anyhow::Result<ReleaseCache<GithubReleaseFetcher>> {
    let fetcher = GithubReleaseFetcher::new(
        endpoint.unwrap_or_else(|| DEFAULT_RELEASE_ENDPOINT.to_string()),
        DEFAULT_ASSET_PREFIX,
        DEFAULT_PLATFORM_TAG,
    )
    .context("failed to build release fetcher")?;
    Ok(ReleaseCache::new(fetcher, cache))
}

/// Run the tracker and render its notices until ctrl-c.
pub async fn cmd_track(adb_bin: String, opts: TrackOpts) -> anyhow::Result<()> {
    let cache = cache_config(opts.cache_dir.clone());
    let resolver = Arc::new(build_resolver(opts.endpoint.clone(), cache.clone())?);
    let config = TrackerConfig {
        device_kind: opts.device_kind,
        poll_interval: Duration::from_millis(opts.poll_interval_ms.max(100)),
        push_timeout: Duration::from_secs(opts.push_timeout_secs.max(1)),
        cache,
    };
    let runner = Arc::new(AdbExecutor::new(adb_bin));
    let (handle, mut notices, join) = Tracker::spawn(runner, resolver, config);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                handle.shutdown();
                break;
            }
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                render_notice(&notice, opts.json);
                // Auto-answer the selection request when --device names one
                // of the attached devices.
                if let TrackerNotice::SelectionRequired { devices } = &notice
                    && let Some(id) = opts.device.as_deref()
                    && devices.iter().any(|device| device.id == id)
                {
                    handle.select_device(id);
                }
            }
        }
    }

    let _ = join.await;
    Ok(())
}

fn render_notice(notice: &TrackerNotice, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(notice) {
            println!("{line}");
        }
        return;
    }
    match notice {
        TrackerNotice::StateChanged { state, message } => {
            println!("[{}] {message}", state.label());
        }
        TrackerNotice::SelectionRequired { devices } => {
            println!("[select-device] several devices attached:");
            for device in devices {
                println!("  {}\t{}", device.id, device.name);
            }
            println!("  pass --device <id> to select one");
        }
        TrackerNotice::OperationProgress { kind, message } => println!("[{kind}] {message}"),
        TrackerNotice::OperationFinished { kind, outcome } => match outcome {
            OperationOutcome::Success => println!("[{kind}] done"),
            OperationOutcome::Failure(message) => println!("[{kind}] failed: {message}"),
        },
    }
}

/// One-shot device listing.
pub async fn cmd_devices(adb_bin: String) -> anyhow::Result<()> {
    let devices = tokio::task::spawn_blocking(move || {
        let runner = AdbExecutor::new(adb_bin);
        enumerate_devices(&runner)
    })
    .await
    .context("enumeration task failed")??;

    if devices.is_empty() {
        println!("no devices attached");
        return Ok(());
    }
    for device in devices {
        println!("{}\t{}\t{}", device.id, device.kind, device.name);
    }
    Ok(())
}

/// One-shot lifecycle check of a device.
pub async fn cmd_check(adb_bin: String, opts: CheckOpts) -> anyhow::Result<()> {
    let resolver = build_resolver(opts.endpoint.clone(), cache_config(opts.cache_dir.clone()))?;

    let resolution = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let runner = Arc::new(AdbExecutor::new(adb_bin));
        let matching: Vec<_> = enumerate_devices(&*runner)?
            .into_iter()
            .filter(|device| device.kind == opts.device_kind)
            .collect();

        let device = match opts.device {
            Some(ref id) => matching
                .iter()
                .find(|device| device.id == *id)
                .cloned()
                .with_context(|| format!("device {id} not found"))?,
            None => match matching.len() {
                0 => bail!("no matching device attached"),
                1 => matching[0].clone(),
                n => bail!("{n} devices attached, pass --device <id>"),
            },
        };

        let channel = AdbChannel::new(SerialScopedRunner::new(runner, device.id.clone()));
        let access = channel.channel_access();
        let (arch, status, release) = if access == ChannelAccess::Rooted {
            (
                channel.get_device_arch().unwrap_or_default(),
                channel.agent_status(),
                resolver.latest(),
            )
        } else {
            (String::new(), AgentStatus::default(), None)
        };

        Ok(resolve_lifecycle(
            &device.name,
            access,
            &status,
            release.as_ref(),
            &arch,
        )?)
    })
    .await
    .context("check task failed")??;

    println!("[{}] {}", resolution.state.label(), resolution.message);
    Ok(())
}
