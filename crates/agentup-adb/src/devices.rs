//! Device enumeration: `adb devices -l` invocation and output parsing.

use agentup_core::types::{Device, DeviceKind};
use tracing::debug;

use crate::error::AdbError;
use crate::executor::AdbCommandRunner;

/// Enumerate attached devices. Blocks on subprocess IO — callers dispatch
/// this from a blocking task, never from the tracker task.
pub fn enumerate_devices<R: AdbCommandRunner>(runner: &R) -> Result<Vec<Device>, AdbError> {
    let output = runner.run(&["devices", "-l"])?;
    Ok(parse_devices_output(&output))
}

/// Look up a single device by id via a fresh enumeration.
pub fn get_device<R: AdbCommandRunner>(runner: &R, id: &str) -> Result<Device, AdbError> {
    enumerate_devices(runner)?
        .into_iter()
        .find(|device| device.id == id)
        .ok_or_else(|| AdbError::NotFound(id.to_string()))
}

/// Parse `adb devices -l` output.
///
/// One device per line: `<serial> <state> [key:value ...]`. Only devices in
/// the `device` state are returned; offline/unauthorized entries and
/// malformed lines are skipped.
pub fn parse_devices_output(output: &str) -> Vec<Device> {
    let mut devices = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("List of devices") || line.starts_with('*') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(serial), Some(state)) = (tokens.next(), tokens.next()) else {
            debug!(line, "skipping malformed device line");
            continue;
        };
        if state != "device" {
            debug!(serial, state, "skipping device not in usable state");
            continue;
        }

        let rest: Vec<&str> = tokens.collect();
        let transport = rest
            .iter()
            .find(|tok| tok.starts_with("usb:"))
            .copied()
            .unwrap_or(serial);
        let name = rest
            .iter()
            .find_map(|tok| tok.strip_prefix("model:"))
            .map(|model| model.replace('_', " "))
            .unwrap_or_else(|| serial.to_string());

        devices.push(Device {
            id: serial.to_string(),
            name,
            kind: DeviceKind::from_transport(transport),
        });
    }
    devices
}
