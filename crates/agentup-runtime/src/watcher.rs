//! Device watcher task.
//!
//! Polls device enumeration on an interval and notifies the tracker when
//! the set of matching devices changes (attach or detach). The first
//! snapshot only seeds the baseline — startup discovery is the tracker's
//! own enumeration pass.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use agentup_adb::devices::enumerate_devices;
use agentup_adb::executor::AdbCommandRunner;
use agentup_core::types::DeviceKind;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::tracker::TaskMsg;

pub(crate) fn spawn_watcher<R: AdbCommandRunner + 'static>(
    runner: Arc<R>,
    kind: DeviceKind,
    interval: Duration,
    tx: UnboundedSender<TaskMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut known: Option<BTreeSet<String>> = None;

        loop {
            ticker.tick().await;

            let enum_runner = Arc::clone(&runner);
            let devices =
                match tokio::task::spawn_blocking(move || enumerate_devices(&*enum_runner)).await {
                    Ok(Ok(devices)) => devices,
                    Ok(Err(err)) => {
                        debug!(%err, "watcher enumeration failed");
                        continue;
                    }
                    Err(err) => {
                        debug!(%err, "watcher enumeration task failed");
                        continue;
                    }
                };

            let ids: BTreeSet<String> = devices
                .into_iter()
                .filter(|device| device.kind == kind)
                .map(|device| device.id)
                .collect();

            match known {
                None => known = Some(ids),
                Some(ref previous) if *previous != ids => {
                    debug!(count = ids.len(), "matching device set changed");
                    known = Some(ids);
                    if tx.send(TaskMsg::DeviceSetChanged).is_err() {
                        return;
                    }
                }
                Some(_) => {}
            }
        }
    })
}
