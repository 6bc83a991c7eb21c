//! Write-behind propagation of local cart changes to the remote record.

use std::sync::{Arc, Mutex, PoisonError};

use cartsync_core::UserId;
use cartsync_storage::RemoteCartRepository;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::retry::save_with_retry;
use crate::stats::SyncStats;
use crate::store::{CartSnapshot, CartStore, SubscriptionId};

/// Saves that have been issued but not necessarily finished.
#[derive(Default)]
pub(crate) struct InFlight {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl InFlight {
    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    pub(crate) fn pending(&self) -> usize {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Wait for every tracked save, including ones issued while waiting.
    pub(crate) async fn drain(&self) {
        loop {
            let batch = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *tasks)
            };
            if batch.is_empty() {
                return;
            }
            for task in batch {
                if let Err(e) = task.await {
                    warn!(error = %e, "push-sync task ended abnormally");
                }
            }
        }
    }
}

pub(crate) struct PushSyncContext {
    pub remote: Arc<dyn RemoteCartRepository>,
    pub policy: RetryPolicy,
    pub stats: Arc<SyncStats>,
    pub in_flight: Arc<InFlight>,
    pub runtime: Handle,
}

/// An active push-sync subscription for one signed-in user.
pub(crate) struct PushSync {
    subscription: SubscriptionId,
    user: UserId,
}

impl PushSync {
    /// Subscribe to `store`. `seed` is the snapshot the remote record is
    /// already known to hold, so it is never pushed again.
    pub(crate) fn attach(
        store: &CartStore,
        user: UserId,
        seed: CartSnapshot,
        ctx: PushSyncContext,
    ) -> Self {
        let last_pushed = Mutex::new(seed);
        let listener_user = user.clone();

        let subscription = store.subscribe(move |change| {
            let next = &change.next;
            {
                let mut last = last_pushed.lock().unwrap_or_else(PoisonError::into_inner);
                if Arc::ptr_eq(&*last, next) || **last == **next {
                    ctx.stats.record_skip_unchanged();
                    debug!(user = %listener_user, "cart unchanged since last push, skipping");
                    return;
                }
                *last = Arc::clone(next);
            }

            // A transient empty cart must not wipe a saved non-empty one.
            if next.is_empty() {
                ctx.stats.record_skip_empty();
                debug!(user = %listener_user, "cart is empty, skipping push");
                return;
            }

            ctx.stats.record_push_issued();
            let remote = Arc::clone(&ctx.remote);
            let stats = Arc::clone(&ctx.stats);
            let user = listener_user.clone();
            let snapshot = Arc::clone(next);
            let policy = ctx.policy;

            let task = ctx.runtime.spawn(async move {
                match save_with_retry(remote.as_ref(), &user, snapshot.items(), policy).await {
                    Ok(()) => {
                        stats.record_push_succeeded();
                        debug!(%user, items = snapshot.len(), "pushed cart");
                    }
                    Err(e) => {
                        stats.record_push_failed(&e.to_string());
                        warn!(%user, error = %e, "push-sync save dropped");
                    }
                }
            });
            ctx.in_flight.track(task);
        });

        debug!(%user, "push-sync attached");
        Self { subscription, user }
    }

    /// Stop reacting to store changes. Saves already issued keep running.
    pub(crate) fn detach(self, store: &CartStore) {
        store.unsubscribe(self.subscription);
        debug!(user = %self.user, "push-sync detached");
    }
}
