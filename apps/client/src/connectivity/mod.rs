//! Connectivity monitor.
//!
//! Decides when the sync engine runs. The decision logic lives in
//! [`MonitorMachine`], a pure state machine over {Idle, Draining,
//! BackoffWaiting}; the spawned driver only feeds it events (connectivity
//! edges, queue size changes, drain completion, timer fire) and executes the
//! commands it returns.

pub mod probe;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::db::{with_store, SharedStore};
use crate::outbox::OutboxQueue;
use crate::sync::SyncEngine;

/// Delay before retrying a drain that left actions behind.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorPhase {
    Idle,
    Draining,
    BackoffWaiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorEvent {
    Connectivity(bool),
    PendingChanged(usize),
    DrainFinished { remaining: usize },
    RetryTimerFired,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorCommand {
    StartDrain,
    ScheduleRetry(Duration),
    CancelRetry,
}

/// Pure transition logic of the monitor.
#[derive(Debug, Clone)]
pub struct MonitorMachine {
    phase: MonitorPhase,
    online: bool,
    pending: usize,
    retry_delay: Duration,
    stopped: bool,
    /// Queue grew while a drain was running; the drain may not have seen it.
    grew_while_draining: bool,
}

impl MonitorMachine {
    pub fn new(online: bool, pending: usize, retry_delay: Duration) -> Self {
        Self {
            phase: MonitorPhase::Idle,
            online,
            pending,
            retry_delay,
            stopped: false,
            grew_while_draining: false,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Command to run at startup: already online with a backlog means drain now.
    pub fn start(&mut self) -> Option<MonitorCommand> {
        self.try_start_drain()
    }

    pub fn handle(&mut self, event: MonitorEvent) -> Option<MonitorCommand> {
        if self.stopped {
            return None;
        }

        match event {
            MonitorEvent::Connectivity(online) => {
                let was_online = std::mem::replace(&mut self.online, online);
                match (was_online, online) {
                    (false, true) => self.try_start_drain(),
                    (true, false) if self.phase == MonitorPhase::BackoffWaiting => {
                        self.phase = MonitorPhase::Idle;
                        Some(MonitorCommand::CancelRetry)
                    }
                    // An in-flight drain runs to completion; no retry follows while offline.
                    _ => None,
                }
            }
            MonitorEvent::PendingChanged(count) => {
                if self.phase == MonitorPhase::Draining && count > 0 {
                    self.grew_while_draining = true;
                }
                self.pending = count;
                if count == 0 && self.phase == MonitorPhase::BackoffWaiting {
                    self.phase = MonitorPhase::Idle;
                    return Some(MonitorCommand::CancelRetry);
                }
                self.try_start_drain()
            }
            MonitorEvent::DrainFinished { remaining } => {
                // The drain counted its leftovers before later enqueues landed.
                self.pending = if std::mem::take(&mut self.grew_while_draining) {
                    self.pending.max(remaining)
                } else {
                    remaining
                };
                if self.phase != MonitorPhase::Draining {
                    return None;
                }
                if self.online && remaining > 0 {
                    self.phase = MonitorPhase::BackoffWaiting;
                    Some(MonitorCommand::ScheduleRetry(self.retry_delay))
                } else {
                    // Nothing failed; pick up anything queued meanwhile right away.
                    self.phase = MonitorPhase::Idle;
                    self.try_start_drain()
                }
            }
            MonitorEvent::RetryTimerFired => {
                if self.phase != MonitorPhase::BackoffWaiting {
                    return None;
                }
                self.phase = MonitorPhase::Idle;
                self.try_start_drain()
            }
            MonitorEvent::Shutdown => {
                self.stopped = true;
                self.grew_while_draining = false;
                let was = std::mem::replace(&mut self.phase, MonitorPhase::Idle);
                (was == MonitorPhase::BackoffWaiting).then_some(MonitorCommand::CancelRetry)
            }
        }
    }

    fn try_start_drain(&mut self) -> Option<MonitorCommand> {
        if self.stopped || !self.online || self.pending == 0 || self.phase != MonitorPhase::Idle {
            return None;
        }
        self.phase = MonitorPhase::Draining;
        Some(MonitorCommand::StartDrain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
}

/// Snapshot of the offline state, published to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineStatus {
    pub is_online: bool,
    pub is_offline_ready: bool,
    pub pending_count: usize,
    pub is_syncing: bool,
    pub sync_progress: Option<SyncProgress>,
    pub phase: MonitorPhase,
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// What a status banner should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBanner {
    Syncing { current: usize, total: usize },
    Pending { count: usize },
    Offline,
    Hidden,
}

impl OfflineStatus {
    pub fn banner(&self) -> StatusBanner {
        match (self.is_online, self.is_syncing, self.sync_progress) {
            (true, true, Some(p)) => StatusBanner::Syncing {
                current: p.current,
                total: p.total,
            },
            (true, _, _) if self.pending_count > 0 => StatusBanner::Pending {
                count: self.pending_count,
            },
            (false, _, _) => StatusBanner::Offline,
            _ => StatusBanner::Hidden,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub retry_delay: Duration,
    pub initially_online: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            initially_online: true,
        }
    }
}

/// Cheap, cloneable access to a running monitor.
#[derive(Clone)]
pub struct MonitorHandle {
    events: mpsc::UnboundedSender<MonitorEvent>,
    status: watch::Receiver<OfflineStatus>,
    outbox: OutboxQueue,
}

impl MonitorHandle {
    /// Report the platform's online/offline signal. Repeated values are ignored.
    pub fn set_online(&self, online: bool) {
        self.send(MonitorEvent::Connectivity(online));
    }

    /// Re-read the queue length, e.g. after an enqueue.
    pub fn refresh_pending(&self) {
        match self.outbox.len() {
            Ok(count) => self.send(MonitorEvent::PendingChanged(count)),
            Err(e) => warn!(error = %e, "failed to read pending count"),
        }
    }

    pub fn status(&self) -> OfflineStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OfflineStatus> {
        self.status.clone()
    }

    /// Ask the monitor to stop. Pending retries are cancelled.
    pub fn shutdown(&self) {
        self.send(MonitorEvent::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn send(&self, event: MonitorEvent) {
        if self.events.send(event).is_err() {
            debug!(?event, "monitor stopped, event dropped");
        }
    }
}

/// A spawned monitor and its driver task.
pub struct ConnectivityMonitor {
    handle: MonitorHandle,
    task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    pub fn spawn(engine: SyncEngine, config: MonitorConfig) -> Self {
        let pending = engine.outbox().len().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read pending count");
            0
        });
        let (is_offline_ready, last_sync_at) = read_store_flags(engine.store());

        let machine = MonitorMachine::new(config.initially_online, pending, config.retry_delay);
        let (status_tx, status_rx) = watch::channel(OfflineStatus {
            is_online: machine.is_online(),
            is_offline_ready,
            pending_count: pending,
            is_syncing: false,
            sync_progress: None,
            phase: machine.phase(),
            last_sync_at,
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let handle = MonitorHandle {
            events: events_tx,
            status: status_rx,
            outbox: engine.outbox().clone(),
        };
        let driver = Driver {
            machine,
            engine,
            status: Arc::new(status_tx),
            retry: None,
            drain_task: None,
        };
        let task = tokio::spawn(driver.run(events_rx));
        info!(
            online = config.initially_online,
            pending, "connectivity monitor started"
        );

        Self { handle, task }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    /// Stop the driver and wait for it to exit.
    pub async fn shutdown(self) {
        self.handle.shutdown();
        if let Err(e) = self.task.await {
            warn!(error = %e, "monitor task ended abnormally");
        }
    }
}

fn read_store_flags(store: &SharedStore) -> (bool, Option<DateTime<Utc>>) {
    match with_store(store, |repo| repo.last_sync_at()) {
        Ok(last) => (last.is_some(), last),
        Err(e) => {
            warn!(error = %e, "failed to read offline readiness");
            (false, None)
        }
    }
}

enum Wake {
    Event(MonitorEvent),
    RetryElapsed,
    DrainJoined(Result<usize, JoinError>),
}

async fn retry_elapsed(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn drain_joined(task: &mut Option<JoinHandle<usize>>) -> Result<usize, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => pending().await,
    }
}

struct Driver {
    machine: MonitorMachine,
    engine: SyncEngine,
    status: Arc<watch::Sender<OfflineStatus>>,
    retry: Option<Pin<Box<Sleep>>>,
    drain_task: Option<JoinHandle<usize>>,
}

impl Driver {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<MonitorEvent>) {
        if let Some(command) = self.machine.start() {
            self.execute(command);
        }
        self.publish();

        loop {
            let wake = tokio::select! {
                received = events.recv() => Wake::Event(received.unwrap_or(MonitorEvent::Shutdown)),
                _ = retry_elapsed(&mut self.retry) => Wake::RetryElapsed,
                joined = drain_joined(&mut self.drain_task) => Wake::DrainJoined(joined),
            };

            let event = match wake {
                Wake::Event(event) => event,
                Wake::RetryElapsed => {
                    self.retry = None;
                    MonitorEvent::RetryTimerFired
                }
                Wake::DrainJoined(joined) => {
                    self.drain_task = None;
                    let remaining = match joined {
                        Ok(remaining) => remaining,
                        Err(e) => {
                            warn!(error = %e, "drain task failed");
                            self.pending_from_store()
                        }
                    };
                    self.refresh_store_flags();
                    MonitorEvent::DrainFinished { remaining }
                }
            };

            debug!(?event, phase = ?self.machine.phase(), "monitor event");
            let stop = event == MonitorEvent::Shutdown;
            if let Some(command) = self.machine.handle(event) {
                self.execute(command);
            }
            self.publish();

            if stop {
                break;
            }
        }

        self.retry = None;
        if let Some(task) = self.drain_task.take() {
            task.abort();
        }
        info!("connectivity monitor stopped");
    }

    fn execute(&mut self, command: MonitorCommand) {
        match command {
            MonitorCommand::StartDrain => self.start_drain(),
            MonitorCommand::ScheduleRetry(delay) => {
                info!(delay_secs = delay.as_secs(), "actions remain, retry scheduled");
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
            }
            MonitorCommand::CancelRetry => {
                info!("retry cancelled");
                self.retry = None;
            }
        }
    }

    fn start_drain(&mut self) {
        let engine = self.engine.clone();
        let status = self.status.clone();
        status.send_modify(|s| {
            s.is_syncing = true;
            s.sync_progress = None;
        });

        self.drain_task = Some(tokio::spawn(async move {
            let result = engine
                .drain(|current, total| {
                    status.send_modify(|s| s.sync_progress = Some(SyncProgress { current, total }));
                })
                .await;

            match result {
                Ok(report) => report.remaining,
                Err(e) => {
                    warn!(error = %e, "drain did not complete");
                    engine.outbox().len().unwrap_or_else(|e| {
                        warn!(error = %e, "failed to read pending count");
                        0
                    })
                }
            }
        }));
    }

    fn pending_from_store(&self) -> usize {
        self.engine.outbox().len().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read pending count");
            0
        })
    }

    fn refresh_store_flags(&self) {
        let (is_offline_ready, last_sync_at) = read_store_flags(self.engine.store());
        self.status.send_modify(|s| {
            s.is_offline_ready = is_offline_ready;
            s.last_sync_at = last_sync_at;
        });
    }

    fn publish(&self) {
        let machine = &self.machine;
        self.status.send_modify(|s| {
            s.is_online = machine.is_online();
            s.pending_count = machine.pending();
            s.phase = machine.phase();
            if machine.phase() != MonitorPhase::Draining {
                s.is_syncing = false;
                s.sync_progress = None;
            }
        });
    }
}
