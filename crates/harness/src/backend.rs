use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use cartsync_core::{CartItem, UserId};
use cartsync_engine::SyncConfig;
use cartsync_storage::{RemoteCartRepository, SqliteCartRepository, StorageError};

use crate::TestShopper;

/// Remote repository with switchable failures and per-save latency, backed
/// by a real [`SqliteCartRepository`].
pub struct FlakyRemote {
    inner: SqliteCartRepository,
    offline: AtomicBool,
    failing_loads: AtomicBool,
    failing_saves: AtomicU32,
    save_latencies: Mutex<VecDeque<Duration>>,
    load_calls: AtomicU64,
    save_calls: AtomicU64,
}

impl FlakyRemote {
    pub fn new(inner: SqliteCartRepository) -> Self {
        Self {
            inner,
            offline: AtomicBool::new(false),
            failing_loads: AtomicBool::new(false),
            failing_saves: AtomicU32::new(0),
            save_latencies: Mutex::new(VecDeque::new()),
            load_calls: AtomicU64::new(0),
            save_calls: AtomicU64::new(0),
        }
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(SqliteCartRepository::open_in_memory()?))
    }

    /// Fail every load and save until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn fail_loads(&self, failing: bool) {
        self.failing_loads.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `count` saves.
    pub fn fail_next_saves(&self, count: u32) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    /// Delay the next save by `latency`. Queued delays are consumed in save
    /// order.
    pub fn delay_next_save(&self, latency: Duration) {
        self.save_latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(latency);
    }

    pub fn load_calls(&self) -> u64 {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn save_calls(&self) -> u64 {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// What the server holds for `user`, bypassing injected failures.
    pub async fn stored(&self, user: &UserId) -> Result<Vec<CartItem>, StorageError> {
        self.inner.load(user).await
    }

    /// Write a record directly, bypassing injected failures and counters.
    pub async fn seed(&self, user: &UserId, items: &[CartItem]) -> Result<(), StorageError> {
        self.inner.save(user, items).await
    }

    pub fn inner(&self) -> &SqliteCartRepository {
        &self.inner
    }

    fn take_save_failure(&self) -> bool {
        self.failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteCartRepository for FlakyRemote {
    async fn load(&self, user_id: &UserId) -> Result<Vec<CartItem>, StorageError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) || self.failing_loads.load(Ordering::SeqCst) {
            return Err(StorageError::RemoteUnavailable("injected load failure".into()));
        }
        self.inner.load(user_id).await
    }

    async fn save(&self, user_id: &UserId, items: &[CartItem]) -> Result<(), StorageError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self
            .save_latencies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(Ordering::SeqCst) || self.take_save_failure() {
            return Err(StorageError::RemoteUnavailable("injected save failure".into()));
        }
        self.inner.save(user_id, items).await
    }
}

/// One remote cart store shared by any number of shoppers (devices).
pub struct TestBackend {
    remote: Arc<FlakyRemote>,
    shoppers: Vec<TestShopper>,
}

impl TestBackend {
    pub fn new() -> Result<Self, StorageError> {
        Ok(Self {
            remote: Arc::new(FlakyRemote::open_in_memory()?),
            shoppers: Vec::new(),
        })
    }

    pub fn remote(&self) -> &Arc<FlakyRemote> {
        &self.remote
    }

    /// A new device with an empty guest cart, talking to this backend.
    pub fn add_shopper(&mut self, config: SyncConfig) -> Result<usize, StorageError> {
        let shopper = TestShopper::new(Arc::clone(&self.remote), config)?;
        let index = self.shoppers.len();
        self.shoppers.push(shopper);
        Ok(index)
    }

    pub fn shopper(&self, index: usize) -> &TestShopper {
        &self.shoppers[index]
    }

    pub fn shopper_mut(&mut self, index: usize) -> &mut TestShopper {
        &mut self.shoppers[index]
    }
}
