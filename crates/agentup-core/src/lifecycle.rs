//! Lifecycle state resolution.
//!
//! Pure decision logic: given the channel access level, the freshly fetched
//! agent status, and the latest known release, compute the lifecycle state
//! for the active device. The [`resolve_lifecycle`] function is the single
//! entry point; it never touches the clock or any IO.

use serde::{Deserialize, Serialize};

use crate::types::{AgentRelease, AgentStatus, ChannelAccess, LifecycleError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Tracker lifecycle state.
///
/// `Running` carries two independent flags: `rooted` (false means the device
/// only exposes a non-root channel, so install/update/restart controls are
/// disabled) and `update_available` (an outdated agent is running and a
/// release asset exists for this device's architecture bucket).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    WaitingForDevice,
    DeviceSelectionPending,
    Checking,
    NeedsInstall,
    NeedsUpdate,
    NeedsStart,
    Running {
        rooted: bool,
        update_available: bool,
    },
    Installing,
    Error(String),
}

impl LifecycleState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::WaitingForDevice => "waiting-for-device",
            Self::DeviceSelectionPending => "select-device",
            Self::Checking => "checking",
            Self::NeedsInstall => "needs-install",
            Self::NeedsUpdate => "needs-update",
            Self::NeedsStart => "needs-start",
            Self::Running { .. } => "running",
            Self::Installing => "installing",
            Self::Error(_) => "error",
        }
    }
}

/// Outcome of a lifecycle check: the resolved state plus the human-readable
/// message surfaced alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub state: LifecycleState,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Resolution function
// ---------------------------------------------------------------------------

/// Resolve the lifecycle state for the active device.
///
/// `status` must be freshly queried from the device — callers re-fetch it
/// after every install/start/restart before calling this again.
///
/// Version comparison is plain string inequality; an unknown latest release
/// (`release == None`) treats any installed agent as current.
///
/// Errors with [`LifecycleError::DeviceUnavailable`] when neither a rooted
/// nor a non-root channel exists; the caller stays in `WaitingForDevice`.
pub fn resolve_lifecycle(
    device_name: &str,
    access: ChannelAccess,
    status: &AgentStatus,
    release: Option<&AgentRelease>,
    raw_arch: &str,
) -> Result<Resolution, LifecycleError> {
    match access {
        ChannelAccess::Unavailable => Err(LifecycleError::DeviceUnavailable),
        ChannelAccess::NonRoot => Ok(Resolution {
            state: LifecycleState::Running {
                rooted: false,
                update_available: false,
            },
            message: format!("device {device_name} attached without root, controls disabled"),
        }),
        ChannelAccess::Rooted => {
            let Some(installed) = status.installed_version.as_deref() else {
                return Ok(Resolution {
                    state: LifecycleState::NeedsInstall,
                    message: format!("no agent installed on {device_name}"),
                });
            };

            let outdated = release.is_some_and(|r| r.version != installed);
            let has_asset = release.is_some_and(|r| r.has_asset_for(raw_arch));

            let (state, message) = if outdated {
                if status.running {
                    (
                        LifecycleState::Running {
                            rooted: true,
                            update_available: has_asset,
                        },
                        format!("agent {installed} running on {device_name} (newer release available)"),
                    )
                } else if has_asset {
                    (
                        LifecycleState::NeedsUpdate,
                        format!("agent {installed} installed on {device_name}, newer release available"),
                    )
                } else {
                    (
                        LifecycleState::NeedsStart,
                        format!("agent {installed} installed on {device_name}, not running"),
                    )
                }
            } else if status.running {
                (
                    LifecycleState::Running {
                        rooted: true,
                        update_available: false,
                    },
                    format!("agent {installed} running on {device_name}"),
                )
            } else {
                (
                    LifecycleState::NeedsStart,
                    format!("agent {installed} installed on {device_name}, not running"),
                )
            };

            Ok(Resolution {
                state,
                message,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
