use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what the sync engine has done so far.
#[derive(Debug, Default)]
pub struct SyncStats {
    reconciles: AtomicU64,
    reconcile_save_failures: AtomicU64,
    remote_load_failures: AtomicU64,
    pushes_issued: AtomicU64,
    pushes_succeeded: AtomicU64,
    pushes_failed: AtomicU64,
    pushes_skipped_unchanged: AtomicU64,
    pushes_skipped_empty: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

/// Point-in-time copy of [`SyncStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatsSnapshot {
    pub reconciles: u64,
    pub reconcile_save_failures: u64,
    pub remote_load_failures: u64,
    pub pushes_issued: u64,
    pub pushes_succeeded: u64,
    pub pushes_failed: u64,
    pub pushes_skipped_unchanged: u64,
    pub pushes_skipped_empty: u64,
    pub last_failure: Option<String>,
}

impl SyncStats {
    pub fn snapshot(&self) -> SyncStatsSnapshot {
        SyncStatsSnapshot {
            reconciles: self.reconciles.load(Ordering::Relaxed),
            reconcile_save_failures: self.reconcile_save_failures.load(Ordering::Relaxed),
            remote_load_failures: self.remote_load_failures.load(Ordering::Relaxed),
            pushes_issued: self.pushes_issued.load(Ordering::Relaxed),
            pushes_succeeded: self.pushes_succeeded.load(Ordering::Relaxed),
            pushes_failed: self.pushes_failed.load(Ordering::Relaxed),
            pushes_skipped_unchanged: self.pushes_skipped_unchanged.load(Ordering::Relaxed),
            pushes_skipped_empty: self.pushes_skipped_empty.load(Ordering::Relaxed),
            last_failure: self
                .last_failure
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
        }
    }

    pub(crate) fn record_reconcile(&self) {
        self.reconciles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconcile_save_failure(&self, message: &str) {
        self.reconcile_save_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_failure(message);
    }

    pub(crate) fn record_remote_load_failure(&self, message: &str) {
        self.remote_load_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_failure(message);
    }

    pub(crate) fn record_push_issued(&self) {
        self.pushes_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_push_succeeded(&self) {
        self.pushes_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_push_failed(&self, message: &str) {
        self.pushes_failed.fetch_add(1, Ordering::Relaxed);
        self.set_last_failure(message);
    }

    pub(crate) fn record_skip_unchanged(&self) {
        self.pushes_skipped_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skip_empty(&self) {
        self.pushes_skipped_empty.fetch_add(1, Ordering::Relaxed);
    }

    fn set_last_failure(&self, message: &str) {
        *self.last_failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_owned());
    }
}
