//! Tracker runtime configuration.

use std::time::Duration;

use agentup_core::types::DeviceKind;
use agentup_releases::CacheConfig;

/// Release endpoint queried for the latest agent build.
pub const DEFAULT_RELEASE_ENDPOINT: &str =
    "https://api.github.com/repos/agentup/agent-server/releases/latest";

/// Release asset name prefix considered during asset mapping.
pub const DEFAULT_ASSET_PREFIX: &str = "agent-server-";

/// Platform tag assets must carry; the architecture tag follows it.
pub const DEFAULT_PLATFORM_TAG: &str = "android";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Connectivity class of devices the tracker waits for.
    pub device_kind: DeviceKind,
    /// Enumeration / watcher poll interval.
    pub poll_interval: Duration,
    /// Bounded wait for the install push step.
    pub push_timeout: Duration,
    /// Release cache location and TTL.
    pub cache: CacheConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            device_kind: DeviceKind::Usb,
            poll_interval: Duration::from_secs(2),
            push_timeout: Duration::from_secs(60),
            cache: CacheConfig::default(),
        }
    }
}
