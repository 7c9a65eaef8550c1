//! agentup-core: device and agent lifecycle decision logic.
//! Pure types and state resolution — no IO, no async, no clock access.

pub mod arch;
pub mod lifecycle;
pub mod notice;
pub mod types;

pub use arch::ArchBucket;
pub use lifecycle::{LifecycleState, Resolution, resolve_lifecycle};
pub use notice::{OperationKind, OperationOutcome, TrackerNotice};
pub use types::{AgentRelease, AgentStatus, ChannelAccess, Device, DeviceKind, LifecycleError};
