//! Tracker actor: owns all lifecycle state on a single task.
//!
//! Background work (enumeration passes, the device watcher, operation
//! tasks) runs on blocking tasks and reports back over an internal channel;
//! nothing outside the tracker task ever mutates tracker state. A session
//! epoch increments on every active-device change so results produced for a
//! device that is no longer active are discarded on arrival.

use std::sync::Arc;

use agentup_adb::channel::AdbChannel;
use agentup_adb::devices::enumerate_devices;
use agentup_adb::executor::{AdbCommandRunner, SerialScopedRunner};
use agentup_core::lifecycle::{LifecycleState, resolve_lifecycle};
use agentup_core::notice::{OperationKind, OperationOutcome, TrackerNotice};
use agentup_core::types::{AgentRelease, AgentStatus, ChannelAccess, Device};
use agentup_releases::{ReleaseCache, ReleaseFetcher};
use chrono::Utc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::TrackerConfig;
use crate::ops::{OpSpec, run_operation};
use crate::watcher::spawn_watcher;

// ─── Release resolution seam ──────────────────────────────────────

/// Resolves the latest known agent release. The cache-backed implementation
/// is the production path; tests inject fixed data.
pub trait ReleaseResolver: Send + Sync + 'static {
    fn latest(&self) -> Option<AgentRelease>;
}

impl<F: ReleaseFetcher + 'static> ReleaseResolver for ReleaseCache<F> {
    fn latest(&self) -> Option<AgentRelease> {
        self.get_latest(Utc::now())
    }
}

// ─── Protocol ─────────────────────────────────────────────────────

/// External commands accepted by the tracker.
#[derive(Debug, Clone)]
pub enum TrackerCommand {
    RequestInstall,
    RequestStart,
    RequestRestart,
    SelectDevice(String),
    Shutdown,
}

/// Messages from background tasks back to the tracker task.
#[derive(Debug)]
pub(crate) enum TaskMsg {
    /// The watcher saw the matching device set change.
    DeviceSetChanged,
    /// An enumeration pass finished; `devices` is already kind-filtered.
    DevicesEnumerated { devices: Vec<Device> },
    ProbeDone {
        session: u64,
        report: ProbeReport,
    },
    OpProgress {
        session: u64,
        kind: OperationKind,
        message: String,
    },
    OpFinished {
        session: u64,
        kind: OperationKind,
        outcome: OperationOutcome,
    },
}

/// Fresh device probe: channel access, architecture, agent status, and the
/// release resolved at probe time.
#[derive(Debug)]
pub(crate) struct ProbeReport {
    access: ChannelAccess,
    arch: String,
    status: AgentStatus,
    release: Option<AgentRelease>,
}

// ─── Handle ───────────────────────────────────────────────────────

/// Clonable command interface to a running tracker.
#[derive(Clone)]
pub struct TrackerHandle {
    tx: UnboundedSender<TrackerCommand>,
}

impl TrackerHandle {
    pub fn request_install(&self) {
        let _ = self.tx.send(TrackerCommand::RequestInstall);
    }

    pub fn request_start(&self) {
        let _ = self.tx.send(TrackerCommand::RequestStart);
    }

    pub fn request_restart(&self) {
        let _ = self.tx.send(TrackerCommand::RequestRestart);
    }

    pub fn select_device(&self, id: impl Into<String>) {
        let _ = self.tx.send(TrackerCommand::SelectDevice(id.into()));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(TrackerCommand::Shutdown);
    }
}

// ─── Tracker ──────────────────────────────────────────────────────

pub struct Tracker<R, L> {
    runner: Arc<R>,
    resolver: Arc<L>,
    config: TrackerConfig,
    notices: UnboundedSender<TrackerNotice>,
    task_tx: UnboundedSender<TaskMsg>,

    state: LifecycleState,
    /// Last kind-filtered enumeration snapshot.
    devices: Vec<Device>,
    active: Option<Device>,
    /// Active-device epoch; stale task results carry an older value.
    session: u64,
    is_waiting: bool,
    enumerating: bool,
    /// Single-flight operation guard.
    op: Option<OperationKind>,
    rooted: bool,
    arch: String,
    release: Option<AgentRelease>,
}

impl<R, L> Tracker<R, L>
where
    R: AdbCommandRunner + 'static,
    L: ReleaseResolver,
{
    /// Spawn the tracker task. Returns the command handle, the notice
    /// stream, and the task's join handle.
    pub fn spawn(
        runner: Arc<R>,
        resolver: Arc<L>,
        config: TrackerConfig,
    ) -> (
        TrackerHandle,
        UnboundedReceiver<TrackerNotice>,
        JoinHandle<()>,
    ) {
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (notice_tx, notice_rx) = unbounded_channel();
        let (task_tx, task_rx) = unbounded_channel();

        let tracker = Self {
            runner,
            resolver,
            config,
            notices: notice_tx,
            task_tx,
            state: LifecycleState::Idle,
            devices: Vec::new(),
            active: None,
            session: 0,
            is_waiting: false,
            enumerating: false,
            op: None,
            rooted: false,
            arch: String::new(),
            release: None,
        };

        let join = tokio::spawn(tracker.run(cmd_rx, task_rx));
        (TrackerHandle { tx: cmd_tx }, notice_rx, join)
    }

    async fn run(
        mut self,
        mut cmd_rx: UnboundedReceiver<TrackerCommand>,
        mut task_rx: UnboundedReceiver<TaskMsg>,
    ) {
        let watcher = spawn_watcher(
            Arc::clone(&self.runner),
            self.config.device_kind,
            self.config.poll_interval,
            self.task_tx.clone(),
        );

        self.enter_waiting("waiting for device");

        let mut tick = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = tick.tick() => self.on_tick(),
                cmd = cmd_rx.recv() => match cmd {
                    None | Some(TrackerCommand::Shutdown) => break,
                    Some(cmd) => self.on_command(cmd),
                },
                Some(msg) = task_rx.recv() => self.on_task_msg(msg),
            }
        }

        watcher.abort();
        info!("tracker stopped");
    }

    // ── Outbound ────────────────────────────────────────────────

    fn emit(&self, notice: TrackerNotice) {
        let _ = self.notices.send(notice);
    }

    fn set_state(&mut self, state: LifecycleState, message: impl Into<String>) {
        let message = message.into();
        debug!(state = state.label(), %message, "state change");
        self.state = state.clone();
        self.emit(TrackerNotice::StateChanged { state, message });
    }

    // ── Waiting / enumeration ───────────────────────────────────

    /// Drop the active device (if any) and go back to waiting. Any probe or
    /// operation spawned under the previous session is now stale.
    fn enter_waiting(&mut self, message: &str) {
        self.reset_device(message);
        self.is_waiting = true;
        self.spawn_enumeration();
    }

    /// Like [`enter_waiting`] but without re-arming enumeration: an attached
    /// device with no usable channel would be re-activated immediately, so
    /// the tracker parks until the watcher reports a device set change.
    fn park_unavailable(&mut self, message: &str) {
        self.reset_device(message);
        self.is_waiting = false;
    }

    fn reset_device(&mut self, message: &str) {
        self.session += 1;
        self.active = None;
        self.op = None;
        self.rooted = false;
        self.set_state(LifecycleState::WaitingForDevice, message);
    }

    fn on_tick(&mut self) {
        // Re-arm enumeration only while waiting; once a device is active
        // (or selection is pending) the waiting poll stops.
        if self.is_waiting {
            self.spawn_enumeration();
        }
    }

    fn spawn_enumeration(&mut self) {
        if self.enumerating {
            return;
        }
        self.enumerating = true;
        let runner = Arc::clone(&self.runner);
        let kind = self.config.device_kind;
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let devices = match enumerate_devices(&*runner) {
                Ok(devices) => devices
                    .into_iter()
                    .filter(|device| device.kind == kind)
                    .collect(),
                Err(err) => {
                    debug!(%err, "device enumeration failed");
                    Vec::new()
                }
            };
            let _ = tx.send(TaskMsg::DevicesEnumerated { devices });
        });
    }

    fn on_devices(&mut self, devices: Vec<Device>) {
        self.enumerating = false;
        if self.active.is_some() {
            return;
        }
        match devices.len() {
            0 => {
                self.devices = devices;
            }
            1 => {
                let device = devices[0].clone();
                self.devices = devices;
                self.activate(device);
            }
            _ => {
                if self.state == LifecycleState::DeviceSelectionPending
                    && self.devices == devices
                {
                    return;
                }
                self.devices = devices.clone();
                self.is_waiting = false;
                self.set_state(
                    LifecycleState::DeviceSelectionPending,
                    format!("{} devices found, selection required", devices.len()),
                );
                self.emit(TrackerNotice::SelectionRequired { devices });
            }
        }
    }

    // ── Activation / probing ────────────────────────────────────

    fn activate(&mut self, device: Device) {
        self.session += 1;
        self.is_waiting = false;
        self.set_state(
            LifecycleState::Checking,
            format!("checking device {}", device.name),
        );
        self.active = Some(device);
        self.spawn_probe();
    }

    fn spawn_probe(&mut self) {
        let Some(device) = self.active.clone() else {
            return;
        };
        let session = self.session;
        let runner = SerialScopedRunner::new(Arc::clone(&self.runner), device.id);
        let resolver = Arc::clone(&self.resolver);
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let channel = AdbChannel::new(runner);
            let access = channel.channel_access();
            let report = if access == ChannelAccess::Rooted {
                let arch = channel.get_device_arch().unwrap_or_else(|err| {
                    debug!(%err, "device arch query failed");
                    String::new()
                });
                ProbeReport {
                    access,
                    arch,
                    status: channel.agent_status(),
                    release: resolver.latest(),
                }
            } else {
                ProbeReport {
                    access,
                    arch: String::new(),
                    status: AgentStatus::default(),
                    release: None,
                }
            };
            let _ = tx.send(TaskMsg::ProbeDone { session, report });
        });
    }

    fn on_probe(&mut self, session: u64, report: ProbeReport) {
        if session != self.session {
            debug!("discarding stale device probe");
            return;
        }
        let Some(device) = self.active.clone() else {
            return;
        };
        self.rooted = report.access == ChannelAccess::Rooted;
        self.arch = report.arch;
        self.release = report.release;

        match resolve_lifecycle(
            &device.name,
            report.access,
            &report.status,
            self.release.as_ref(),
            &self.arch,
        ) {
            Ok(resolution) => self.set_state(resolution.state, resolution.message),
            Err(err) => {
                // No usable channel on this device: park until the device
                // set changes again.
                self.park_unavailable(&format!("{err}, waiting for device"));
            }
        }
    }

    /// Re-fetch agent status before any further transition decision.
    fn recheck(&mut self, message: &str) {
        if self.active.is_some() {
            self.set_state(LifecycleState::Checking, message);
            self.spawn_probe();
        }
    }

    // ── Commands ────────────────────────────────────────────────

    fn on_command(&mut self, cmd: TrackerCommand) {
        match cmd {
            TrackerCommand::RequestInstall => self.on_request_install(),
            TrackerCommand::RequestStart => self.on_request_start(false),
            TrackerCommand::RequestRestart => self.on_request_start(true),
            TrackerCommand::SelectDevice(id) => self.on_select_device(id),
            // Handled in the select loop.
            TrackerCommand::Shutdown => {}
        }
    }

    fn on_select_device(&mut self, id: String) {
        if self.active.as_ref().is_some_and(|device| device.id == id) {
            return;
        }
        match self.devices.iter().find(|device| device.id == id).cloned() {
            Some(device) => self.activate(device),
            None => self.enter_waiting(&format!("device {id} not found, waiting for device")),
        }
    }

    fn on_request_install(&mut self) {
        if self.op.is_some() {
            debug!("install requested while an operation is in flight, ignoring");
            return;
        }
        if self.active.is_none() || !self.rooted {
            debug!("install requested without a rooted active device, ignoring");
            return;
        }
        let installable = matches!(
            self.state,
            LifecycleState::NeedsInstall
                | LifecycleState::NeedsUpdate
                | LifecycleState::Error(_)
                | LifecycleState::Running {
                    rooted: true,
                    update_available: true,
                }
        );
        if !installable {
            debug!(state = self.state.label(), "install not applicable, ignoring");
            return;
        }
        let Some(locator) = self
            .release
            .as_ref()
            .and_then(|release| release.locator_for(&self.arch))
            .map(str::to_string)
        else {
            debug!(arch = %self.arch, "no release asset for this architecture, install not offered");
            return;
        };

        self.op = Some(OperationKind::Install);
        self.set_state(LifecycleState::Installing, "installing agent");
        self.spawn_operation(
            OperationKind::Install,
            OpSpec::Install {
                locator,
                download_dir: self.config.cache.cache_dir.join("downloads"),
                push_timeout: self.config.push_timeout,
            },
        );
    }

    fn on_request_start(&mut self, restart: bool) {
        let kind = if restart {
            OperationKind::Restart
        } else {
            OperationKind::Start
        };
        if self.op.is_some() {
            debug!(%kind, "operation already in flight, ignoring");
            return;
        }
        if self.active.is_none() || !self.rooted {
            debug!(%kind, "no rooted active device, ignoring");
            return;
        }
        let applicable = if restart {
            matches!(self.state, LifecycleState::Running { rooted: true, .. })
        } else {
            // An outdated agent is still startable.
            matches!(
                self.state,
                LifecycleState::NeedsStart | LifecycleState::NeedsUpdate
            )
        };
        if !applicable {
            debug!(%kind, state = self.state.label(), "not applicable, ignoring");
            return;
        }

        self.op = Some(kind);
        self.spawn_operation(kind, OpSpec::Start { restart });
    }

    fn spawn_operation(&mut self, kind: OperationKind, spec: OpSpec) {
        let Some(device) = self.active.clone() else {
            return;
        };
        let session = self.session;
        let runner = SerialScopedRunner::new(Arc::clone(&self.runner), device.id);
        let tx = self.task_tx.clone();
        tokio::task::spawn_blocking(move || {
            let channel = AdbChannel::new(runner);
            let progress_tx = tx.clone();
            let result = run_operation(&channel, &spec, |message| {
                let _ = progress_tx.send(TaskMsg::OpProgress {
                    session,
                    kind,
                    message: message.to_string(),
                });
            });
            let outcome = match result {
                Ok(()) => OperationOutcome::Success,
                Err(message) => OperationOutcome::Failure(message),
            };
            let _ = tx.send(TaskMsg::OpFinished {
                session,
                kind,
                outcome,
            });
        });
    }

    fn on_op_finished(&mut self, session: u64, kind: OperationKind, outcome: OperationOutcome) {
        if session != self.session {
            debug!(%kind, "discarding operation outcome for inactive device");
            return;
        }
        self.op = None;
        self.emit(TrackerNotice::OperationFinished {
            kind,
            outcome: outcome.clone(),
        });
        match (kind, outcome) {
            (OperationKind::Install, OperationOutcome::Success) => {
                self.recheck("agent installed, re-checking device");
            }
            (OperationKind::Install, OperationOutcome::Failure(message)) => {
                // Install affordance is re-enabled: no operation in flight.
                self.set_state(LifecycleState::Error(message.clone()), message);
            }
            (OperationKind::Start, OperationOutcome::Success) => {
                self.recheck("agent started, re-checking device");
            }
            (OperationKind::Start, OperationOutcome::Failure(_)) => {
                // Recoverable denial: state stays as-is, caller may re-trigger.
            }
            (OperationKind::Restart, _) => {
                self.recheck("restart finished, re-checking device");
            }
        }
    }

    // ── Dispatch ────────────────────────────────────────────────

    fn on_task_msg(&mut self, msg: TaskMsg) {
        match msg {
            TaskMsg::DeviceSetChanged => {
                self.enter_waiting("device list changed, waiting for device");
            }
            TaskMsg::DevicesEnumerated { devices } => self.on_devices(devices),
            TaskMsg::ProbeDone { session, report } => self.on_probe(session, report),
            TaskMsg::OpProgress {
                session,
                kind,
                message,
            } => {
                if session == self.session {
                    self.emit(TrackerNotice::OperationProgress { kind, message });
                } else {
                    debug!(%kind, "discarding progress for inactive device");
                }
            }
            TaskMsg::OpFinished {
                session,
                kind,
                outcome,
            } => self.on_op_finished(session, kind, outcome),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────
