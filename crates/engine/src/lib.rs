pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
mod push;
pub mod retry;
pub mod stats;
pub mod store;

pub use config::{ConfigError, RetryPolicy, SyncConfig};
pub use error::EngineError;
pub use identity::{IdentityEvent, IdentityState, ReadinessGate, Transition};
pub use orchestrator::SyncOrchestrator;
pub use stats::{SyncStats, SyncStatsSnapshot};
pub use store::{CartChange, CartSnapshot, CartStore, SubscriptionId};
