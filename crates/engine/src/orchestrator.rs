use std::sync::Arc;

use cartsync_core::{Cart, UserId, merge};
use cartsync_storage::{LocalCartCache, RemoteCartRepository};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{error, info, instrument, warn};

use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::identity::{IdentityEvent, IdentityState, ReadinessGate, Transition};
use crate::push::{InFlight, PushSync, PushSyncContext};
use crate::retry::save_with_retry;
use crate::stats::{SyncStats, SyncStatsSnapshot};
use crate::store::CartStore;

/// Drives login reconciliation and push-sync from identity transitions.
///
/// Owns no cart state itself: the [`CartStore`], local cache and remote
/// repository are handed in at construction and shared with the rest of the
/// application.
pub struct SyncOrchestrator {
    store: Arc<CartStore>,
    cache: Arc<dyn LocalCartCache>,
    remote: Arc<dyn RemoteCartRepository>,
    config: SyncConfig,
    state: IdentityState,
    gate: ReadinessGate,
    push: Option<PushSync>,
    in_flight: Arc<InFlight>,
    stats: Arc<SyncStats>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<CartStore>,
        cache: Arc<dyn LocalCartCache>,
        remote: Arc<dyn RemoteCartRepository>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            cache,
            remote,
            config,
            state: IdentityState::Unauthenticated,
            gate: ReadinessGate::new(),
            push: None,
            in_flight: Arc::default(),
            stats: Arc::default(),
        }
    }

    /// Like [`Self::new`], with settings read from the `CARTSYNC_*`
    /// environment variables.
    pub fn from_env(
        store: Arc<CartStore>,
        cache: Arc<dyn LocalCartCache>,
        remote: Arc<dyn RemoteCartRepository>,
    ) -> Result<Self, EngineError> {
        Ok(Self::new(store, cache, remote, SyncConfig::from_env()?))
    }

    pub fn state(&self) -> &IdentityState {
        &self.state
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CartStore> {
        &self.store
    }

    pub fn stats(&self) -> SyncStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_push_sync_active(&self) -> bool {
        self.push.is_some()
    }

    /// Push-sync saves issued but not yet finished.
    pub fn pending_pushes(&self) -> usize {
        self.in_flight.pending()
    }

    /// Wait for every push-sync save issued so far.
    pub async fn drain_pending(&self) {
        self.in_flight.drain().await;
    }

    /// React to one emission from the identity collaborator. Emissions before
    /// the first `ready` one, and repeats of the current identity, are
    /// ignored.
    ///
    /// A login whose merged cart could not be saved remotely still completes
    /// locally; the save failure is returned as the error.
    pub async fn handle(&mut self, event: &IdentityEvent) -> Result<Transition, EngineError> {
        match self.gate.admit(event) {
            Some(identity) => self.set_identity(identity.as_ref()).await,
            None => Ok(Transition::None),
        }
    }

    /// Move to `identity` directly, bypassing readiness gating.
    pub async fn set_identity(
        &mut self,
        identity: Option<&UserId>,
    ) -> Result<Transition, EngineError> {
        let transition = self.state.transition_to(identity);
        match &transition {
            Transition::None => {}
            Transition::Login(user) => self.login(user.clone()).await?,
            Transition::Logout(_) => self.logout(),
            Transition::Switch { from, to } => {
                info!(%from, %to, "identity switched without sign-out");
                self.logout();
                self.login(to.clone()).await?;
            }
        }
        Ok(transition)
    }

    /// Consume identity events until the sender is dropped. Failed
    /// reconciles are logged and the loop keeps going.
    pub async fn run(mut self, mut events: mpsc::Receiver<IdentityEvent>) -> Self {
        while let Some(event) = events.recv().await {
            match self.handle(&event).await {
                Ok(_) => {}
                Err(e) if e.is_remote_unavailable() => {
                    warn!(error = %e, "signed in, but the merged cart is not saved remotely");
                }
                Err(e) => error!(error = %e, "identity transition did not complete cleanly"),
            }
        }
        self
    }

    /// Detach push-sync without touching the cart or caches.
    pub fn shutdown(mut self) {
        if let Some(push) = self.push.take() {
            push.detach(&self.store);
        }
    }

    #[instrument(skip_all, fields(user = %user))]
    async fn login(&mut self, user: UserId) -> Result<(), EngineError> {
        let runtime = Handle::try_current().map_err(|e| EngineError::Runtime(e.to_string()))?;

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        let guest = self.cache.read();
        let saved = match self.remote.load(&user).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "remote cart load failed, reconciling against an empty cart");
                self.stats.record_remote_load_failure(&e.to_string());
                Vec::new()
            }
        };
        let merged = merge(&guest, &saved);

        // Persist remotely before the merged cart becomes the active one.
        let durable =
            save_with_retry(self.remote.as_ref(), &user, merged.items(), self.config.save_retry)
                .await;

        let installed = self.store.install(merged);
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "failed to clear local cart cache after reconcile");
        }

        self.state = IdentityState::Authenticated(user.clone());
        self.push = Some(PushSync::attach(
            &self.store,
            user,
            installed.next.clone(),
            PushSyncContext {
                remote: Arc::clone(&self.remote),
                policy: self.config.save_retry,
                stats: Arc::clone(&self.stats),
                in_flight: Arc::clone(&self.in_flight),
                runtime,
            },
        ));
        self.stats.record_reconcile();

        match durable {
            Ok(()) => {
                info!(
                    guest_items = guest.len(),
                    remote_items = saved.len(),
                    merged_items = installed.next.len(),
                    "reconciled cart"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.record_reconcile_save_failure(&e.to_string());
                warn!(error = %e, "merged cart is active locally but not saved remotely");
                Err(e)
            }
        }
    }

    fn logout(&mut self) {
        if let Some(push) = self.push.take() {
            push.detach(&self.store);
        }
        self.store.install(Cart::new());
        if let Err(e) = self.cache.clear() {
            warn!(error = %e, "failed to clear local cart cache on logout");
        }
        if let IdentityState::Authenticated(user) =
            std::mem::replace(&mut self.state, IdentityState::Unauthenticated)
        {
            info!(%user, "signed out, cart reset");
        }
    }
}
