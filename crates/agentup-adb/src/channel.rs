//! Per-device agent control channel.
//!
//! Layers the agent-management operations (probe access, query version and
//! run state, push, privileged exec, start/kill) over an [`AdbCommandRunner`].
//! The channel is stateless — every call re-queries the device.

use std::time::Duration;

use agentup_core::types::{AgentStatus, ChannelAccess};
use tracing::debug;

use crate::error::AdbError;
use crate::executor::AdbCommandRunner;

/// Where the agent binary lives on the device.
pub const AGENT_REMOTE_PATH: &str = "/data/local/tmp/agent-server";

/// Process name the agent runs under.
pub const AGENT_PROCESS_NAME: &str = "agent-server";

pub struct AdbChannel<R> {
    runner: R,
}

impl<R: AdbCommandRunner> AdbChannel<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Root-capable management channel present?
    pub fn available(&self) -> bool {
        match self.runner.run(&["shell", "su", "0", "id"]) {
            Ok(out) => out.contains("uid=0"),
            Err(err) => {
                debug!(%err, "root channel probe failed");
                false
            }
        }
    }

    /// Unprivileged shell reachable?
    pub fn non_root_available(&self) -> bool {
        self.runner.run(&["shell", "id"]).is_ok()
    }

    /// Probe both channels and classify access.
    pub fn channel_access(&self) -> ChannelAccess {
        if self.available() {
            ChannelAccess::Rooted
        } else if self.non_root_available() {
            ChannelAccess::NonRoot
        } else {
            ChannelAccess::Unavailable
        }
    }

    /// Device CPU architecture tag as reported by the device, trimmed.
    pub fn get_device_arch(&self) -> Result<String, AdbError> {
        let out = self.runner.run(&["shell", "getprop", "ro.product.cpu.abi"])?;
        Ok(out.trim().to_string())
    }

    /// Installed agent version, or `None` when the binary is absent or does
    /// not answer `--version`.
    pub fn get_agent_version(&self) -> Option<String> {
        let cmd = format!("{AGENT_REMOTE_PATH} --version");
        match self.run_privileged(&cmd) {
            Ok(out) => {
                let version = out.trim();
                if version.is_empty() {
                    None
                } else {
                    Some(version.to_string())
                }
            }
            Err(err) => {
                debug!(%err, "agent version query failed, treating as not installed");
                None
            }
        }
    }

    /// Is the agent process currently alive?
    pub fn is_agent_running(&self) -> bool {
        match self.runner.run(&["shell", "pidof", AGENT_PROCESS_NAME]) {
            Ok(out) => !out.trim().is_empty(),
            // pidof exits non-zero when no process matches.
            Err(AdbError::CommandFailed(_)) => false,
            Err(err) => {
                debug!(%err, "pidof query failed");
                false
            }
        }
    }

    /// Fresh snapshot of installed version + run state.
    pub fn agent_status(&self) -> AgentStatus {
        AgentStatus {
            installed_version: self.get_agent_version(),
            running: self.is_agent_running(),
        }
    }

    /// Push a local file to the device with a bounded wait.
    pub fn push(&self, local_path: &str, remote_path: &str, timeout: Duration) -> Result<(), AdbError> {
        self.runner
            .run_with_timeout(&["push", local_path, remote_path], timeout)?;
        Ok(())
    }

    /// Run a command through the privileged channel, returning its output.
    pub fn run_privileged(&self, cmd: &str) -> Result<String, AdbError> {
        self.runner.run(&["shell", "su", "0", cmd])
    }

    /// Launch the agent if not running. Idempotent: returns `true`
    /// immediately when already running, unless `restart` — then the running
    /// process is stopped first. The result reflects whether the agent is
    /// alive afterwards.
    pub fn start_agent(&self, restart: bool) -> Result<bool, AdbError> {
        if self.is_agent_running() {
            if !restart {
                return Ok(true);
            }
            self.kill_agent();
        }
        let cmd = format!("{AGENT_REMOTE_PATH} -D");
        self.run_privileged(&cmd)?;
        Ok(self.is_agent_running())
    }

    /// Stop the agent process. Not-running is not an error.
    pub fn kill_agent(&self) {
        let cmd = format!("killall {AGENT_PROCESS_NAME}");
        if let Err(err) = self.run_privileged(&cmd) {
            debug!(%err, "kill_agent: no process to kill");
        }
    }
}
