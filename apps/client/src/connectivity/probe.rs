//! Periodic health probe standing in for the platform's online/offline signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::MonitorHandle;
use crate::remote::RemoteApi;

/// Poll the remote every `every` and report the result to the monitor.
///
/// The monitor only reacts to edges, so reporting the same state repeatedly
/// is harmless. The task ends once the monitor has stopped.
pub fn spawn_probe(
    remote: Arc<dyn RemoteApi>,
    monitor: MonitorHandle,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if monitor.is_closed() {
                break;
            }
            let online = remote.check_connectivity().await;
            debug!(online, "connectivity probe");
            monitor.set_online(online);
        }
    })
}
