//! agentup-adb: adb IO boundary.
//! Provides subprocess execution behind a mock-injectable trait, device
//! enumeration parsing, and the per-device agent control channel.
//! No lifecycle logic — pure IO boundary.

pub mod channel;
pub mod devices;
pub mod error;
pub mod executor;

pub use channel::{AGENT_PROCESS_NAME, AGENT_REMOTE_PATH, AdbChannel};
pub use devices::{enumerate_devices, get_device, parse_devices_output};
pub use error::AdbError;
pub use executor::{AdbCommandRunner, AdbExecutor, SerialScopedRunner};
