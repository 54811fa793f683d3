//! Remote repository sync
//!
//! Replicates the database and roster file to an external repository as a
//! best-effort backup. Requests never talk to the backend: they enqueue a
//! job on a bounded channel and return. One worker task owns the backend,
//! coalesces bursts of jobs into a single publish, retries with backoff and
//! records every outcome in [`SyncStatus`] so failures stay visible.
//!
//! A failed publish never rolls back the local write.

mod git;

pub use git::{authenticated_url, redact, GitBackend};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{Error, Result};

/// Sync settings from the `[sync]` TOML section
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Remote URL; `{token}` is replaced by the bearer token
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Bearer token (prefer the TUITION_SYNC_TOKEN environment variable)
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Pending jobs beyond this are coalesced into the queued one
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            remote_url: None,
            token: None,
            branch: default_branch(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// One file handed to a backend, identified by its name in the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    pub name: String,
    pub path: PathBuf,
}

/// Where replicated files come from (publish) or go to (restore)
#[async_trait]
pub trait SyncBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Push the given files to the remote
    async fn publish(&self, files: &[SnapshotFile], message: &str) -> Result<()>;

    /// Copy files from the remote to each `path` that does not exist yet.
    /// Returns how many files were restored.
    async fn restore(&self, files: &[SnapshotFile]) -> Result<usize>;
}

/// Produces a consistent copy of the database and roster for publishing
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    db: SqlitePool,
    roster_path: PathBuf,
    staging_dir: PathBuf,
    db_file_name: String,
    roster_file_name: String,
}

impl SnapshotSource {
    pub fn new(
        db: SqlitePool,
        db_path: &Path,
        roster_path: &Path,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            db,
            roster_path: roster_path.to_path_buf(),
            staging_dir: staging_dir.into(),
            db_file_name: file_name(db_path),
            roster_file_name: file_name(roster_path),
        }
    }

    /// Stage a snapshot: `VACUUM INTO` for the database, plain copy for the roster
    pub async fn prepare(&self) -> Result<Vec<SnapshotFile>> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;

        let db_copy = self.staging_dir.join(&self.db_file_name);
        if tokio::fs::try_exists(&db_copy).await? {
            tokio::fs::remove_file(&db_copy).await?;
        }
        sqlx::query("VACUUM INTO ?")
            .bind(db_copy.to_string_lossy().into_owned())
            .execute(&self.db)
            .await?;

        let mut files = vec![SnapshotFile {
            name: self.db_file_name.clone(),
            path: db_copy,
        }];

        if tokio::fs::try_exists(&self.roster_path).await? {
            let roster_copy = self.staging_dir.join(&self.roster_file_name);
            tokio::fs::copy(&self.roster_path, &roster_copy).await?;
            files.push(SnapshotFile {
                name: self.roster_file_name.clone(),
                path: roster_copy,
            });
        }

        Ok(files)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Retry behaviour of the worker
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Observable sync state
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub backend: Option<String>,
    pub pending: u64,
    pub published: u64,
    pub failures: u64,
    pub consecutive_failures: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct SharedState {
    pending: AtomicU64,
    record: RwLock<SyncStatus>,
}

#[derive(Debug)]
enum SyncMessage {
    Publish { id: Uuid, reason: String },
    Shutdown,
}

/// Request-side handle, held in application state
#[derive(Debug, Clone)]
pub struct SyncHandle {
    tx: Option<mpsc::Sender<SyncMessage>>,
    state: Arc<SharedState>,
}

impl SyncHandle {
    /// Handle for a deployment without sync; requests are no-ops
    pub fn disabled() -> Self {
        Self {
            tx: None,
            state: Arc::new(SharedState::default()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Ask for a publish after a local write. Never blocks.
    pub fn request(&self, reason: &str) {
        let Some(tx) = &self.tx else {
            return;
        };

        let id = Uuid::new_v4();
        // Count before sending so the worker never decrements first
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        match tx.try_send(SyncMessage::Publish {
            id,
            reason: reason.to_string(),
        }) {
            Ok(()) => {
                debug!(job = %id, reason, "Sync job queued");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.state.pending.fetch_sub(1, Ordering::SeqCst);
                // A queued job will publish the latest state anyway
                debug!(reason, "Sync queue full, coalescing with pending job");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.state.pending.fetch_sub(1, Ordering::SeqCst);
                warn!(reason, "Sync worker has stopped; change not replicated");
            }
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let mut status = self.state.record.read().await.clone();
        status.enabled = self.is_enabled();
        status.pending = self.state.pending.load(Ordering::SeqCst);
        status
    }
}

/// The worker task; call [`SyncWorker::shutdown`] for an orderly stop
#[derive(Debug)]
pub struct SyncWorker {
    tx: mpsc::Sender<SyncMessage>,
    task: JoinHandle<()>,
}

impl SyncWorker {
    /// Flush any pending job, then stop the worker
    pub async fn shutdown(self) {
        if self.tx.send(SyncMessage::Shutdown).await.is_err() {
            debug!("Sync worker already stopped");
        }
        if let Err(e) = self.task.await {
            error!("Sync worker task failed: {}", e);
        }
        info!("Sync worker stopped");
    }
}

/// Start the worker
pub fn spawn(
    backend: Arc<dyn SyncBackend>,
    source: SnapshotSource,
    retry: RetryPolicy,
    queue_capacity: usize,
) -> (SyncHandle, SyncWorker) {
    let (tx, rx) = mpsc::channel(queue_capacity.max(1));
    let state = Arc::new(SharedState::default());

    let worker_state = state.clone();
    let task = tokio::spawn(async move {
        {
            let mut record = worker_state.record.write().await;
            record.backend = Some(backend.name().to_string());
        }
        run_worker(rx, backend, source, retry, worker_state).await;
    });

    info!("Sync worker started");
    (
        SyncHandle {
            tx: Some(tx.clone()),
            state,
        },
        SyncWorker { tx, task },
    )
}

async fn run_worker(
    mut rx: mpsc::Receiver<SyncMessage>,
    backend: Arc<dyn SyncBackend>,
    source: SnapshotSource,
    retry: RetryPolicy,
    state: Arc<SharedState>,
) {
    while let Some(message) = rx.recv().await {
        let (first_id, first_reason) = match message {
            SyncMessage::Shutdown => break,
            SyncMessage::Publish { id, reason } => (id, reason),
        };

        // Coalesce whatever else is already queued into this publish
        let mut reasons = vec![first_reason];
        let mut shutdown = false;
        while let Ok(next) = rx.try_recv() {
            match next {
                SyncMessage::Publish { reason, .. } => reasons.push(reason),
                SyncMessage::Shutdown => shutdown = true,
            }
        }
        let batch = reasons.len() as u64;
        reasons.dedup();
        let message = format!("ledger update: {}", reasons.join(", "));

        let outcome = publish_with_retry(backend.as_ref(), &source, &message, retry).await;
        state.pending.fetch_sub(batch, Ordering::SeqCst);

        let mut record = state.record.write().await;
        match outcome {
            Ok(()) => {
                info!(job = %first_id, coalesced = batch, "Sync publish succeeded");
                record.published += 1;
                record.consecutive_failures = 0;
                record.last_success_at = Some(Utc::now());
            }
            Err(e) => {
                error!(job = %first_id, "Sync publish failed, local and remote state differ: {}", e);
                record.failures += 1;
                record.consecutive_failures += 1;
                record.last_failure_at = Some(Utc::now());
                record.last_error = Some(e.to_string());
            }
        }
        drop(record);

        if shutdown {
            break;
        }
    }
}

async fn publish_with_retry(
    backend: &dyn SyncBackend,
    source: &SnapshotSource,
    message: &str,
    retry: RetryPolicy,
) -> Result<()> {
    let mut last_error = None;

    for attempt in 1..=retry.max_attempts {
        if attempt > 1 {
            let delay = retry.delay(attempt - 1);
            debug!(attempt, ?delay, "Retrying sync publish");
            tokio::time::sleep(delay).await;
        }

        let result = match source.prepare().await {
            Ok(files) => backend.publish(&files, message).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(attempt, max = retry.max_attempts, "Sync attempt failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Sync("no attempts made".to_string())))
}

/// Restore missing local files from the remote before the database opens
pub async fn restore_missing(backend: &dyn SyncBackend, targets: &[SnapshotFile]) -> Result<usize> {
    let missing: Vec<SnapshotFile> = targets
        .iter()
        .filter(|t| !t.path.exists())
        .cloned()
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    let restored = backend.restore(&missing).await?;
    if restored > 0 {
        info!(restored, backend = backend.name(), "Restored local files from remote");
    }
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::ledger::Settings;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Backend that fails the first `fail_first` publishes
    #[derive(Default)]
    struct FakeBackend {
        fail_first: u32,
        calls: AtomicU32,
        messages: Mutex<Vec<String>>,
        published_names: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SyncBackend for FakeBackend {
        fn name(&self) -> &str {
            "fake"
        }

        async fn publish(&self, files: &[SnapshotFile], message: &str) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err(Error::Sync(format!("simulated failure {}", n)));
            }
            self.messages.lock().unwrap().push(message.to_string());
            *self.published_names.lock().unwrap() =
                files.iter().map(|f| f.name.clone()).collect();
            Ok(())
        }

        async fn restore(&self, files: &[SnapshotFile]) -> Result<usize> {
            for f in files {
                std::fs::write(&f.path, b"restored")?;
            }
            Ok(files.len())
        }
    }

    async fn source(dir: &TempDir) -> SnapshotSource {
        let db_path = dir.path().join("tuition.db");
        let roster_path = dir.path().join("roster.txt");
        std::fs::write(&roster_path, "Avi\n").unwrap();
        let defaults = Settings {
            monthly_fee: 350,
            report_email: None,
        };
        let pool = init_database(&db_path, &defaults).await.unwrap();
        SnapshotSource::new(pool, &db_path, &roster_path, dir.path().join("staging"))
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_disabled_handle_is_noop() {
        let handle = SyncHandle::disabled();
        handle.request("anything");
        let status = handle.status().await;
        assert!(!status.enabled);
        assert_eq!(status.pending, 0);
    }

    #[tokio::test]
    async fn test_publish_snapshot_of_db_and_roster() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (handle, worker) = spawn(backend.clone(), source(&dir).await, fast_retry(1), 4);

        handle.request("settings updated");
        worker.shutdown().await;

        let status = handle.status().await;
        assert_eq!(status.published, 1);
        assert_eq!(status.failures, 0);
        assert_eq!(status.pending, 0);
        assert_eq!(status.backend.as_deref(), Some("fake"));
        assert_eq!(
            *backend.published_names.lock().unwrap(),
            vec!["tuition.db".to_string(), "roster.txt".to_string()]
        );
        assert!(dir.path().join("staging/tuition.db").exists());
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend {
            fail_first: 2,
            ..Default::default()
        });
        let (handle, worker) = spawn(backend.clone(), source(&dir).await, fast_retry(3), 4);

        handle.request("payments updated");
        worker.shutdown().await;

        let status = handle.status().await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(status.published, 1);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_recorded() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend {
            fail_first: u32::MAX,
            ..Default::default()
        });
        let (handle, worker) = spawn(backend.clone(), source(&dir).await, fast_retry(2), 4);

        handle.request("month deleted");
        worker.shutdown().await;

        let status = handle.status().await;
        assert_eq!(status.published, 0);
        assert_eq!(status.failures, 1);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.unwrap().contains("simulated failure"));
        assert!(status.last_failure_at.is_some());
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_dropped() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend::default());
        let (handle, worker) = spawn(backend.clone(), source(&dir).await, fast_retry(1), 4);

        worker.shutdown().await;
        handle.request("too late");

        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_restore_missing_only_touches_absent_files() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("roster.txt");
        std::fs::write(&present, "Avi\n").unwrap();
        let targets = vec![
            SnapshotFile {
                name: "tuition.db".into(),
                path: dir.path().join("tuition.db"),
            },
            SnapshotFile {
                name: "roster.txt".into(),
                path: present.clone(),
            },
        ];

        let restored = restore_missing(&FakeBackend::default(), &targets).await.unwrap();
        assert_eq!(restored, 1);
        assert_eq!(std::fs::read_to_string(&present).unwrap(), "Avi\n");
        assert!(dir.path().join("tuition.db").exists());
    }

    #[test]
    fn test_retry_delay_doubles() {
        let retry = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(200));
        assert_eq!(retry.delay(3), Duration::from_millis(400));
    }
}
