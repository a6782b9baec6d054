//! Offline services, constructed once at startup and handed to consumers.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::connectivity::probe::spawn_probe;
use crate::connectivity::{
    ConnectivityMonitor, MonitorConfig, MonitorHandle, MonitorPhase, OfflineStatus,
    DEFAULT_RETRY_DELAY,
};
use crate::db::{shared, with_store, DbError, SharedStore, SqliteRepository};
use crate::quiz::QuizRecorder;
use crate::remote::{HttpRemote, RemoteApi, RemoteError};
use crate::session::SessionStore;
use crate::sync::{SyncEngine, DEFAULT_FAILURE_THRESHOLD};

#[derive(Debug, thiserror::Error)]
pub enum ServicesError {
    #[error(transparent)]
    Storage(#[from] DbError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Tunables of the background machinery.
#[derive(Debug, Clone, Copy)]
pub struct ServiceSettings {
    pub failure_threshold: usize,
    pub retry_delay: Duration,
    pub probe_interval: Option<Duration>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            retry_delay: DEFAULT_RETRY_DELAY,
            probe_interval: None,
        }
    }
}

impl From<&ClientConfig> for ServiceSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            retry_delay: config.retry_delay,
            probe_interval: config.probe_interval,
        }
    }
}

pub struct OfflineServices {
    pub store: SharedStore,
    pub engine: SyncEngine,
    pub sessions: SessionStore,
    pub quiz: QuizRecorder,
    remote: Arc<dyn RemoteApi>,
    settings: ServiceSettings,
    persistent: bool,
    monitor: Option<ConnectivityMonitor>,
    probe: Option<JoinHandle<()>>,
}

impl OfflineServices {
    /// Open the local store and the HTTP remote described by `config`.
    ///
    /// If the store file cannot be opened, falls back to an in-memory store:
    /// the app keeps working online, nothing is kept across restarts.
    pub fn open(config: &ClientConfig) -> Result<Self, ServicesError> {
        let remote = HttpRemote::new(&config.backend_url, config.auth_token.clone())?;

        if let Some(parent) = config.db_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create data directory");
            }
        }

        let (repo, persistent) = match SqliteRepository::open(&config.db_path) {
            Ok(repo) => (repo, true),
            Err(e @ DbError::StorageUnavailable { .. }) => {
                warn!(error = %e, "offline store unavailable, running online-only");
                (SqliteRepository::open_in_memory()?, false)
            }
            Err(e) => return Err(e.into()),
        };

        let mut services = Self::new(Arc::new(remote), repo, &config.user_id, config.into());
        services.persistent = persistent;
        Ok(services)
    }

    pub fn new(
        remote: Arc<dyn RemoteApi>,
        repo: SqliteRepository,
        user_id: &str,
        settings: ServiceSettings,
    ) -> Self {
        let store = shared(repo);
        let engine =
            SyncEngine::with_failure_threshold(remote.clone(), store.clone(), settings.failure_threshold);
        let sessions = SessionStore::new(store.clone(), user_id);
        let quiz = QuizRecorder::new(remote.clone(), store.clone(), sessions.clone());

        Self {
            store,
            engine,
            sessions,
            quiz,
            remote,
            settings,
            persistent: true,
            monitor: None,
            probe: None,
        }
    }

    /// Whether queued actions survive a restart.
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Start the connectivity monitor (and the probe, if configured).
    ///
    /// Calling it again returns the running monitor's handle.
    pub fn start(&mut self, initially_online: bool) -> MonitorHandle {
        if let Some(monitor) = &self.monitor {
            return monitor.handle();
        }

        let monitor = ConnectivityMonitor::spawn(
            self.engine.clone(),
            MonitorConfig {
                retry_delay: self.settings.retry_delay,
                initially_online,
            },
        );
        let handle = monitor.handle();

        self.quiz = self.quiz.clone().with_monitor(handle.clone());
        if let Some(every) = self.settings.probe_interval.filter(|d| !d.is_zero()) {
            self.probe = Some(spawn_probe(self.remote.clone(), handle.clone(), every));
        }
        self.monitor = Some(monitor);
        info!("offline services started");
        handle
    }

    /// Stop the background tasks. Safe to call when not started.
    pub async fn shutdown(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown().await;
        }
    }

    pub fn monitor(&self) -> Option<MonitorHandle> {
        self.monitor.as_ref().map(ConnectivityMonitor::handle)
    }

    /// Point-in-time status without a running monitor.
    pub fn snapshot_status(&self, is_online: bool) -> Result<OfflineStatus, DbError> {
        let pending_count = self.engine.outbox().len()?;
        let last_sync_at = with_store(&self.store, |repo| repo.last_sync_at())?;
        Ok(OfflineStatus {
            is_online,
            is_offline_ready: last_sync_at.is_some(),
            pending_count,
            is_syncing: self.engine.is_syncing(),
            sync_progress: None,
            phase: MonitorPhase::Idle,
            last_sync_at,
        })
    }
}
