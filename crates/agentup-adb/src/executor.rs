//! AdbCommandRunner trait and AdbExecutor (sync subprocess wrapper).
//! The trait seam enables mock injection for testing; real calls go through
//! `std::process::Command` and are dispatched from blocking tasks.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::error::AdbError;

/// Trait for executing adb commands. Enables mock injection for testing.
pub trait AdbCommandRunner: Send + Sync {
    fn run(&self, args: &[&str]) -> Result<String, AdbError>;

    /// Bounded-wait variant for commands that can stall on device IO
    /// (push). Mocks may ignore the timeout.
    fn run_with_timeout(&self, args: &[&str], _timeout: Duration) -> Result<String, AdbError> {
        self.run(args)
    }
}

impl<T: AdbCommandRunner + ?Sized> AdbCommandRunner for &T {
    fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        (**self).run(args)
    }

    fn run_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<String, AdbError> {
        (**self).run_with_timeout(args, timeout)
    }
}

/// Real adb executor using `std::process::Command`.
pub struct AdbExecutor {
    adb_bin: String,
    serial: Option<String>,
}

impl AdbExecutor {
    pub fn new(adb_bin: impl Into<String>) -> Self {
        Self {
            adb_bin: adb_bin.into(),
            serial: None,
        }
    }

    /// Target a specific device serial (`adb -s <serial> ...`).
    #[must_use]
    pub fn with_serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_bin);
        if let Some(ref serial) = self.serial {
            cmd.args(["-s", serial]);
        }
        cmd.args(args);
        cmd
    }
}

impl Default for AdbExecutor {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl AdbCommandRunner for AdbExecutor {
    fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        let output = self.command(args).output().map_err(AdbError::Io)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(format!(
                "exit code {}: {}",
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<String, AdbError> {
        let mut child = self
            .command(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(AdbError::Io)?;

        // Drain stdout/stderr in parallel; a chatty child can block once the
        // pipe buffer fills and would otherwise hit the timeout spuriously.
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdbError::CommandFailed("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AdbError::CommandFailed("failed to capture stderr".to_string()))?;

        let stdout_handle = std::thread::spawn(move || drain(stdout));
        let stderr_handle = std::thread::spawn(move || drain(stderr));

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = stdout_handle.join();
                        let _ = stderr_handle.join();
                        return Err(AdbError::Timeout(timeout));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(err) => {
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AdbError::Io(err));
                }
            }
        };

        let stdout_bytes = stdout_handle.join().unwrap_or_default();
        let stderr_bytes = stderr_handle.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(AdbError::CommandFailed(format!(
                "exit code {}: {}",
                status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&stdout_bytes).into_owned())
    }
}

/// Scopes a shared runner to one device by prepending `-s <serial>`.
///
/// Lets a single underlying runner (real or mock) serve enumeration and any
/// number of per-device channels.
pub struct SerialScopedRunner<R> {
    inner: std::sync::Arc<R>,
    serial: String,
}

impl<R> SerialScopedRunner<R> {
    pub fn new(inner: std::sync::Arc<R>, serial: impl Into<String>) -> Self {
        Self {
            inner,
            serial: serial.into(),
        }
    }
}

impl<R: AdbCommandRunner> AdbCommandRunner for SerialScopedRunner<R> {
    fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push("-s");
        full.push(self.serial.as_str());
        full.extend_from_slice(args);
        self.inner.run(&full)
    }

    fn run_with_timeout(&self, args: &[&str], timeout: Duration) -> Result<String, AdbError> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.push("-s");
        full.push(self.serial.as_str());
        full.extend_from_slice(args);
        self.inner.run_with_timeout(&full, timeout)
    }
}

fn drain(mut reader: impl Read) -> Vec<u8> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(count) => buffer.extend_from_slice(&chunk[..count]),
            Err(_) => break,
        }
    }
    buffer
}
