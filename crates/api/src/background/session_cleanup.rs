//! Periodic sweep of expired and stale session records.
//!
//! [`SessionCleanup`] owns at most one recurring task. `start` runs one sweep
//! immediately, then repeats it every interval until `stop` cancels the
//! task's [`CancellationToken`]. A failed sweep is logged and the schedule
//! keeps running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use userhub_core::session::{SessionState, SessionStats, STALE_SESSION_DAYS};
use userhub_core::types::SessionId;
use userhub_db::{SessionStore, StoreError};

use crate::config::CLEANUP_INTERVAL_HOURS_RANGE;

const SECS_PER_HOUR: u64 = 3600;

struct Running {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

/// Scheduler state reported by the admin endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupStatus {
    pub is_running: bool,
    /// A recurring timer task is spawned and alive.
    pub interval_active: bool,
    pub interval_secs: Option<u64>,
}

pub struct SessionCleanup {
    sessions: Arc<dyn SessionStore>,
    running: Mutex<Option<Running>>,
}

impl SessionCleanup {
    pub fn new(sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            sessions,
            running: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start sweeping every `interval_hours` hours, clamped to 1..=168.
    pub async fn start(self: &Arc<Self>, interval_hours: u64) {
        let hours = interval_hours.clamp(
            *CLEANUP_INTERVAL_HOURS_RANGE.start(),
            *CLEANUP_INTERVAL_HOURS_RANGE.end(),
        );
        self.start_with_period(Duration::from_secs(hours * SECS_PER_HOUR))
            .await;
    }

    /// Start with an arbitrary period. Does nothing if already running.
    pub async fn start_with_period(self: &Arc<Self>, period: Duration) {
        let cancel = {
            let mut slot = self.slot();
            if slot.is_some() {
                tracing::info!("Session cleanup already running, start ignored");
                return;
            }
            let cancel = CancellationToken::new();
            *slot = Some(Running {
                cancel: cancel.clone(),
                handle: None,
                period,
            });
            cancel
        };

        tracing::info!(interval_secs = period.as_secs(), "Session cleanup started");
        self.cleanup().await;

        if cancel.is_cancelled() {
            return;
        }
        let this = Arc::clone(self);
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { this.run(task_cancel, period).await });

        if let Some(running) = self.slot().as_mut() {
            running.handle = Some(handle);
        }
    }

    async fn run(&self, cancel: CancellationToken, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Session cleanup loop exiting");
                    break;
                }
                _ = ticker.tick() => {
                    self.cleanup().await;
                }
            }
        }
    }

    /// Cancel the schedule. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(running) => {
                running.cancel.cancel();
                tracing::info!("Session cleanup stopped");
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> CleanupStatus {
        let slot = self.slot();
        match slot.as_ref() {
            Some(running) => CleanupStatus {
                is_running: true,
                interval_active: running.handle.as_ref().is_some_and(|h| !h.is_finished()),
                interval_secs: Some(running.period.as_secs()),
            },
            None => CleanupStatus {
                is_running: false,
                interval_active: false,
                interval_secs: None,
            },
        }
    }

    /// One sweep pass. Errors are logged, never returned.
    pub async fn cleanup(&self) -> u64 {
        match self.sweep().await {
            Ok(0) => {
                tracing::debug!("Session cleanup: nothing to delete");
                0
            }
            Ok(deleted) => {
                tracing::info!(deleted, "Session cleanup: deleted expired sessions");
                deleted
            }
            Err(e) => {
                tracing::error!(error = %e, "Session cleanup failed");
                0
            }
        }
    }

    /// Delete every expired record, and every record without cookie expiry
    /// that has not been accessed for the stale threshold, in one bulk call.
    pub async fn sweep(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let stale_after = chrono::Duration::days(STALE_SESSION_DAYS);

        let records = self.sessions.all().await?;
        let doomed: Vec<SessionId> = records
            .iter()
            .filter(|(_, record)| record.classify(now, stale_after) != SessionState::Live)
            .map(|(id, _)| *id)
            .collect();

        if doomed.is_empty() {
            return Ok(0);
        }
        self.sessions.destroy_many(&doomed).await
    }

    pub async fn session_stats(&self) -> Result<SessionStats, StoreError> {
        let records = self.sessions.all().await?;
        Ok(SessionStats::tally(records.values(), Utc::now()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use userhub_core::session::{CookieMeta, SessionPatch, SessionRecord};
    use userhub_core::types::UserId;
    use userhub_db::memory::MemorySessionStore;
    use uuid::Uuid;

    use super::*;

    fn live_record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord::new(Uuid::new_v4(), "a@x.com", Uuid::new_v4(), now, ChronoDuration::days(365))
            .with_cookie(now, ChronoDuration::days(365))
    }

    fn cookie_expired_record() -> SessionRecord {
        let mut record = live_record();
        record.cookie = Some(CookieMeta::expired(Utc::now() - ChronoDuration::hours(1)));
        record
    }

    /// Counts `all()` calls and fails them while `fail` is set.
    #[derive(Default)]
    struct CountingStore {
        inner: MemorySessionStore,
        fail: AtomicBool,
        enumerations: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for CountingStore {
        async fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, StoreError> {
            self.inner.get(id).await
        }
        async fn get_for_user(
            &self,
            user_id: UserId,
            id: SessionId,
        ) -> Result<Option<SessionRecord>, StoreError> {
            self.inner.get_for_user(user_id, id).await
        }
        async fn set(&self, record: &SessionRecord) -> Result<(), StoreError> {
            self.inner.set(record).await
        }
        async fn patch(&self, id: SessionId, patch: &SessionPatch) -> Result<bool, StoreError> {
            self.inner.patch(id, patch).await
        }
        async fn touch(&self, id: SessionId, cookie: &CookieMeta) -> Result<bool, StoreError> {
            self.inner.touch(id, cookie).await
        }
        async fn destroy(&self, id: SessionId) -> Result<(), StoreError> {
            self.inner.destroy(id).await
        }
        async fn destroy_many(&self, ids: &[SessionId]) -> Result<u64, StoreError> {
            self.inner.destroy_many(ids).await
        }
        async fn destroy_for_user(&self, user_id: UserId) -> Result<u64, StoreError> {
            self.inner.destroy_for_user(user_id).await
        }
        async fn rotate_refresh(
            &self,
            id: SessionId,
            expected: Uuid,
            next: Uuid,
        ) -> Result<bool, StoreError> {
            self.inner.rotate_refresh(id, expected, next).await
        }
        async fn all(&self) -> Result<HashMap<SessionId, SessionRecord>, StoreError> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StoreError::Timeout(std::time::Duration::from_secs(5)));
            }
            self.inner.all().await
        }
        async fn clear(&self) -> Result<u64, StoreError> {
            self.inner.clear().await
        }
        async fn length(&self) -> Result<u64, StoreError> {
            self.inner.length().await
        }
    }

    #[tokio::test]
    async fn sweep_deletes_expired_and_stats_classify_before() {
        let store = Arc::new(MemorySessionStore::new());
        for _ in 0..7 {
            store.set(&live_record()).await.unwrap();
        }
        for _ in 0..3 {
            store.set(&cookie_expired_record()).await.unwrap();
        }
        let cleanup = SessionCleanup::new(store.clone());

        let stats = cleanup.session_stats().await.unwrap();
        assert_eq!(stats.total_sessions, 10);
        assert_eq!(stats.expired_sessions, 3);
        assert_eq!(stats.active_sessions, 7);

        assert_eq!(cleanup.cleanup().await, 3);
        assert_eq!(store.length().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn sweep_deletes_stale_records_without_cookie() {
        let store = Arc::new(MemorySessionStore::new());
        let mut stale = live_record();
        stale.cookie = None;
        store.set(&stale).await.unwrap();
        // `set` stamps last_access, so age it afterwards.
        store
            .patch(
                stale.session_id,
                &SessionPatch {
                    last_access: Some(Utc::now() - ChronoDuration::days(31)),
                    ..SessionPatch::default()
                },
            )
            .await
            .unwrap();
        store.set(&live_record()).await.unwrap();

        let cleanup = SessionCleanup::new(store.clone());
        assert_eq!(cleanup.sweep().await.unwrap(), 1);
        assert_eq!(store.length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn start_runs_immediately_and_second_start_is_ignored() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(&cookie_expired_record()).await.unwrap();
        let cleanup = Arc::new(SessionCleanup::new(store.clone()));

        cleanup.start(6).await;
        assert_eq!(store.length().await.unwrap(), 0, "start must sweep immediately");

        let status = cleanup.status();
        assert!(status.is_running);
        assert!(status.interval_active);
        assert_eq!(status.interval_secs, Some(6 * 3600));

        cleanup.start(1).await;
        assert_eq!(cleanup.status().interval_secs, Some(6 * 3600));

        assert!(cleanup.stop());
        assert!(!cleanup.stop(), "stop is idempotent");
        assert!(!cleanup.status().is_running);
    }

    #[tokio::test]
    async fn start_clamps_the_interval() {
        let cleanup = Arc::new(SessionCleanup::new(Arc::new(MemorySessionStore::new())));
        cleanup.start(u64::MAX).await;
        assert_eq!(cleanup.status().interval_secs, Some(168 * 3600));
        cleanup.stop();

        cleanup.start(0).await;
        assert_eq!(cleanup.status().interval_secs, Some(3600));
        cleanup.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_sweep_does_not_stop_the_schedule() {
        let store = Arc::new(CountingStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let cleanup = Arc::new(SessionCleanup::new(store.clone()));

        let period = Duration::from_secs(60);
        cleanup.start_with_period(period).await;
        assert_eq!(store.enumerations.load(Ordering::SeqCst), 1);

        tokio::time::sleep(period * 2 + Duration::from_secs(1)).await;
        assert_eq!(store.enumerations.load(Ordering::SeqCst), 3);
        assert!(cleanup.status().interval_active);

        cleanup.stop();
    }
}
