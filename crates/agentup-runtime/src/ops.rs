//! Install / start / restart operations.
//!
//! Each operation is a single blocking unit of work against the device
//! channel: it emits free-text progress messages through the callback and
//! returns exactly one terminal outcome. Dispatch, single-flight guarding,
//! and stale-result discarding live in the tracker.

use std::path::{Path, PathBuf};
use std::time::Duration;

use agentup_adb::channel::{AGENT_REMOTE_PATH, AdbChannel};
use agentup_adb::executor::AdbCommandRunner;
use tracing::debug;

/// What an operation task should do.
#[derive(Debug, Clone)]
pub enum OpSpec {
    Install {
        locator: String,
        download_dir: PathBuf,
        push_timeout: Duration,
    },
    Start {
        restart: bool,
    },
}

/// Run one operation to its terminal outcome.
///
/// Install leaves the agent installed but not running; the tracker's
/// follow-up check discovers the resulting state. Errors are returned as
/// plain messages — the caller converts them into the failure outcome.
pub fn run_operation<R: AdbCommandRunner>(
    channel: &AdbChannel<R>,
    spec: &OpSpec,
    mut progress: impl FnMut(&str),
) -> Result<(), String> {
    match spec {
        OpSpec::Install {
            locator,
            download_dir,
            push_timeout,
        } => {
            progress("fetching agent binary");
            let local = resolve_local_binary(locator, download_dir)?;
            let local = local
                .to_str()
                .ok_or_else(|| format!("unusable local path: {}", local.display()))?
                .to_string();

            progress("stopping existing agent");
            channel.kill_agent();

            progress("pushing agent to device");
            channel
                .push(&local, AGENT_REMOTE_PATH, *push_timeout)
                .map_err(|err| err.to_string())?;

            progress("configuring agent");
            channel
                .run_privileged(&format!("chown root:root {AGENT_REMOTE_PATH}"))
                .map_err(|err| err.to_string())?;
            channel
                .run_privileged(&format!("chmod 06755 {AGENT_REMOTE_PATH}"))
                .map_err(|err| err.to_string())?;
            Ok(())
        }
        OpSpec::Start { restart } => {
            progress(if *restart {
                "restarting agent"
            } else {
                "starting agent"
            });
            match channel.start_agent(*restart) {
                Ok(true) => Ok(()),
                Ok(false) => Err("agent did not come up".to_string()),
                Err(err) => Err(err.to_string()),
            }
        }
    }
}

/// Resolve a release locator into a local file path.
///
/// URLs are downloaded into `download_dir`; filesystem locators are used in
/// place.
pub fn resolve_local_binary(locator: &str, download_dir: &Path) -> Result<PathBuf, String> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        let file_name = locator
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("agent-server.bin");
        let dest = download_dir.join(file_name);

        debug!(locator, dest = %dest.display(), "downloading agent binary");
        let client = reqwest::blocking::Client::builder()
            .user_agent("agentup")
            .build()
            .map_err(|err| err.to_string())?;
        let bytes = client
            .get(locator)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|err| format!("download failed: {err}"))?
            .bytes()
            .map_err(|err| format!("download failed: {err}"))?;

        std::fs::create_dir_all(download_dir).map_err(|err| err.to_string())?;
        std::fs::write(&dest, &bytes).map_err(|err| err.to_string())?;
        Ok(dest)
    } else {
        let path = PathBuf::from(locator);
        if path.is_file() {
            Ok(path)
        } else {
            Err(format!("agent binary not found at {locator}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use agentup_adb::error::AdbError;

    /// Canned-response runner. Responses for one key are consumed in order;
    /// the last one repeats once the script runs out.
    struct MockRunner {
        responses: HashMap<String, Vec<Result<String, String>>>,
        cursors: Mutex<HashMap<String, usize>>,
        calls: Mutex<Vec<String>>,
    }

    impl MockRunner {
        fn new() -> Self {
            Self {
                responses: HashMap::new(),
                cursors: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_ok(self, args: &str, out: &str) -> Self {
            self.with_response(args, Ok(out.to_string()))
        }

        fn with_err(self, args: &str, err: &str) -> Self {
            self.with_response(args, Err(err.to_string()))
        }

        fn with_response(mut self, args: &str, response: Result<String, String>) -> Self {
            self.responses.entry(args.to_string()).or_default().push(response);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl AdbCommandRunner for MockRunner {
        fn run(&self, args: &[&str]) -> Result<String, AdbError> {
            let key = args.join(" ");
            self.calls.lock().expect("calls lock").push(key.clone());
            let Some(script) = self.responses.get(&key) else {
                return Err(AdbError::CommandFailed(format!("unexpected command: {key}")));
            };
            let mut cursors = self.cursors.lock().expect("cursor lock");
            let cursor = cursors.entry(key).or_insert(0);
            let index = (*cursor).min(script.len() - 1);
            *cursor += 1;
            match &script[index] {
                Ok(out) => Ok(out.clone()),
                Err(err) => Err(AdbError::CommandFailed(err.clone())),
            }
        }
    }

    fn local_binary(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("agent-server-16.2.1-android-arm64");
        std::fs::write(&path, b"binary").expect("write binary");
        path.to_str().expect("utf8 path").to_string()
    }

    #[test]
    fn install_sequence_kill_push_configure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator = local_binary(&dir);

        let runner = MockRunner::new()
            .with_ok("shell su 0 killall agent-server", "")
            .with_ok(&format!("push {locator} {AGENT_REMOTE_PATH}"), "1 file pushed")
            .with_ok(&format!("shell su 0 chown root:root {AGENT_REMOTE_PATH}"), "")
            .with_ok(&format!("shell su 0 chmod 06755 {AGENT_REMOTE_PATH}"), "");
        let channel = AdbChannel::new(runner);

        let spec = OpSpec::Install {
            locator,
            download_dir: dir.path().to_path_buf(),
            push_timeout: Duration::from_secs(30),
        };
        let mut seen = Vec::new();
        run_operation(&channel, &spec, |msg| seen.push(msg.to_string())).expect("install succeeds");

        assert_eq!(
            seen,
            vec![
                "fetching agent binary",
                "stopping existing agent",
                "pushing agent to device",
                "configuring agent",
            ]
        );
    }

    #[test]
    fn install_kills_before_pushing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator = local_binary(&dir);

        let runner = MockRunner::new()
            .with_ok("shell su 0 killall agent-server", "")
            .with_ok(&format!("push {locator} {AGENT_REMOTE_PATH}"), "")
            .with_ok(&format!("shell su 0 chown root:root {AGENT_REMOTE_PATH}"), "")
            .with_ok(&format!("shell su 0 chmod 06755 {AGENT_REMOTE_PATH}"), "");
        let channel = AdbChannel::new(runner);

        let spec = OpSpec::Install {
            locator,
            download_dir: dir.path().to_path_buf(),
            push_timeout: Duration::from_secs(30),
        };
        run_operation(&channel, &spec, |_| {}).expect("install succeeds");

        let calls = channel.runner().calls();
        let kill = calls.iter().position(|c| c.contains("killall")).expect("kill");
        let push = calls.iter().position(|c| c.starts_with("push")).expect("push");
        let chmod = calls.iter().position(|c| c.contains("chmod")).expect("chmod");
        assert!(kill < push && push < chmod);
    }

    #[test]
    fn install_push_failure_is_terminal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator = local_binary(&dir);

        let runner = MockRunner::new()
            .with_ok("shell su 0 killall agent-server", "")
            .with_err(&format!("push {locator} {AGENT_REMOTE_PATH}"), "device offline");
        let channel = AdbChannel::new(runner);

        let spec = OpSpec::Install {
            locator,
            download_dir: dir.path().to_path_buf(),
            push_timeout: Duration::from_secs(30),
        };
        let err = run_operation(&channel, &spec, |_| {}).expect_err("push fails");
        assert!(err.contains("device offline"));
    }

    #[test]
    fn install_missing_local_binary_fails_before_touching_device() {
        let dir = tempfile::tempdir().expect("tempdir");
        let channel = AdbChannel::new(MockRunner::new());

        let spec = OpSpec::Install {
            locator: dir.path().join("nope").to_str().expect("utf8").to_string(),
            download_dir: dir.path().to_path_buf(),
            push_timeout: Duration::from_secs(30),
        };
        let err = run_operation(&channel, &spec, |_| {}).expect_err("missing binary");
        assert!(err.contains("not found"));
        assert!(channel.runner().calls().is_empty());
    }

    #[test]
    fn start_success() {
        // First pidof: not running. After launch, second pidof sees the process.
        let runner = MockRunner::new()
            .with_err("shell pidof agent-server", "")
            .with_ok("shell pidof agent-server", "77")
            .with_ok("shell su 0 /data/local/tmp/agent-server -D", "");
        let channel = AdbChannel::new(runner);

        run_operation(&channel, &OpSpec::Start { restart: false }, |_| {}).expect("start");
    }

    #[test]
    fn start_launch_without_process_reports_failure() {
        // Launch command succeeds but the process never shows up.
        let runner = MockRunner::new()
            .with_err("shell pidof agent-server", "")
            .with_err("shell pidof agent-server", "")
            .with_ok("shell su 0 /data/local/tmp/agent-server -D", "");
        let channel = AdbChannel::new(runner);

        let err =
            run_operation(&channel, &OpSpec::Start { restart: false }, |_| {}).expect_err("no process");
        assert!(err.contains("did not come up"));
    }

    #[test]
    fn start_denied_reports_failure_message() {
        let runner = MockRunner::new()
            .with_err("shell pidof agent-server", "")
            .with_err("shell su 0 /data/local/tmp/agent-server -D", "permission denied");
        let channel = AdbChannel::new(runner);

        let err =
            run_operation(&channel, &OpSpec::Start { restart: false }, |_| {}).expect_err("denied");
        assert!(err.contains("permission denied"));
    }

    #[test]
    fn resolve_local_binary_rejects_missing_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(resolve_local_binary("/definitely/not/here", dir.path()).is_err());
    }

    #[test]
    fn resolve_local_binary_accepts_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let locator = local_binary(&dir);
        let resolved = resolve_local_binary(&locator, dir.path()).expect("resolves");
        assert_eq!(resolved, PathBuf::from(locator));
    }
}
