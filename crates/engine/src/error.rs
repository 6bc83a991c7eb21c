use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("no async runtime available: {0}")]
    Runtime(String),

    #[error("remote cart store unavailable after {attempts} attempt(s): {message}")]
    RemoteUnavailable { attempts: u32, message: String },
}

impl EngineError {
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }
}
