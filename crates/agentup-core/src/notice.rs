//! Typed outbound tracker messages.
//!
//! The tracker never broadcasts through shared callbacks; consumers receive
//! a stream of these notices over a channel and render them however they
//! like (the CLI prints status lines, tests assert on the sequence).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleState;
use crate::types::Device;

// ─── Operations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Install,
    Start,
    Restart,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Start => "start",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly one terminal outcome per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationOutcome {
    Success,
    Failure(String),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

// ─── Notices ──────────────────────────────────────────────────────

/// Messages emitted by the tracker to its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerNotice {
    /// Lifecycle state changed; always carries a human-readable message.
    StateChanged {
        state: LifecycleState,
        message: String,
    },
    /// More than one matching device was found; the consumer must call
    /// `select_device` with one of these ids.
    SelectionRequired { devices: Vec<Device> },
    /// Free-text progress from an in-flight operation.
    OperationProgress {
        kind: OperationKind,
        message: String,
    },
    /// Terminal outcome of an operation.
    OperationFinished {
        kind: OperationKind,
        outcome: OperationOutcome,
    },
}
