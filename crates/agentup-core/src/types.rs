use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::arch::ArchBucket;

// ─── Device ───────────────────────────────────────────────────────

/// Connectivity class of an enumerated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum DeviceKind {
    Usb,
    Local,
    Remote,
}

impl DeviceKind {
    pub const ALL: [Self; 3] = [Self::Usb, Self::Local, Self::Remote];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usb => "usb",
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    /// Classify a raw transport tag from device enumeration output.
    /// Unknown tags are treated as remote transports.
    pub fn from_transport(tag: &str) -> Self {
        let tag = tag.trim().to_ascii_lowercase();
        if tag.starts_with("usb") {
            Self::Usb
        } else if tag.starts_with("local") || tag.starts_with("emulator") {
            Self::Local
        } else {
            Self::Remote
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceKind {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usb" => Ok(Self::Usb),
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(LifecycleError::NotFound(format!(
                "unknown device kind: {s}"
            ))),
        }
    }
}

/// A discovered device. Ephemeral — re-built on every enumeration pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
}

// ─── Agent status ─────────────────────────────────────────────────

/// On-device agent state, queried fresh before every transition decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    pub installed_version: Option<String>,
    pub running: bool,
}

/// Result of probing the device's management channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelAccess {
    Rooted,
    NonRoot,
    Unavailable,
}

// ─── Agent release ────────────────────────────────────────────────

/// Latest known agent release: version tag plus per-architecture locators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRelease {
    pub version: String,
    pub assets: BTreeMap<ArchBucket, String>,
}

impl AgentRelease {
    /// Locator for the raw (un-normalized) architecture tag, if any.
    pub fn locator_for(&self, raw_arch: &str) -> Option<&str> {
        self.assets
            .get(&ArchBucket::normalize(raw_arch))
            .map(String::as_str)
    }

    pub fn has_asset_for(&self, raw_arch: &str) -> bool {
        self.locator_for(raw_arch).is_some()
    }
}

// ─── Error ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No root-capable channel and no non-root channel.
    DeviceUnavailable,
    /// A referenced device id no longer resolves.
    NotFound(String),
    /// An install/start/restart operation failed; recoverable by re-trigger.
    OperationFailure(String),
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceUnavailable => write!(f, "device unavailable"),
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::OperationFailure(msg) => write!(f, "operation failed: {msg}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_kind_serde_roundtrip() {
        for k in DeviceKind::ALL {
            let json = serde_json::to_string(&k).expect("serialize");
            let back: DeviceKind = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(k, back);
        }
    }

    #[test]
    fn device_kind_display_and_parse() {
        for k in DeviceKind::ALL {
            let s = k.to_string();
            let parsed = s.parse::<DeviceKind>().expect("parse");
            assert_eq!(k, parsed);
        }
    }

    #[test]
    fn device_kind_parse_rejects_unknown() {
        assert!("bluetooth".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn transport_classification() {
        assert_eq!(DeviceKind::from_transport("usb:1-4"), DeviceKind::Usb);
        assert_eq!(DeviceKind::from_transport("USB"), DeviceKind::Usb);
        assert_eq!(DeviceKind::from_transport("local"), DeviceKind::Local);
        assert_eq!(DeviceKind::from_transport("emulator-5554"), DeviceKind::Local);
        assert_eq!(DeviceKind::from_transport("tcp:5555"), DeviceKind::Remote);
        assert_eq!(DeviceKind::from_transport("???"), DeviceKind::Remote);
    }

    #[test]
    fn release_locator_uses_bucket_normalization() {
        let mut assets = BTreeMap::new();
        assets.insert(
            ArchBucket::normalize("arm64"),
            "https://example.invalid/agent-arm64.xz".to_string(),
        );
        let release = AgentRelease {
            version: "16.2.1".to_string(),
            assets,
        };

        assert!(release.has_asset_for("arm64"));
        assert!(release.has_asset_for("arm64-v8a"));
        assert!(!release.has_asset_for("x86_64"));
        assert_eq!(
            release.locator_for("arm64-v8a"),
            Some("https://example.invalid/agent-arm64.xz")
        );
    }

    #[test]
    fn release_serde_roundtrip() {
        let mut assets = BTreeMap::new();
        assets.insert(ArchBucket::normalize("armeabi-v7a"), "/tmp/agent-arm".to_string());
        let release = AgentRelease {
            version: "16.2.1".to_string(),
            assets,
        };
        let json = serde_json::to_string(&release).expect("serialize");
        let back: AgentRelease = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(release, back);
    }

    #[test]
    fn error_display() {
        assert_eq!(
            LifecycleError::DeviceUnavailable.to_string(),
            "device unavailable"
        );
        assert_eq!(
            LifecycleError::NotFound("device x".to_string()).to_string(),
            "not found: device x"
        );
        let msg = LifecycleError::OperationFailure("push timed out".to_string()).to_string();
        assert!(msg.contains("push timed out"));
    }
}
