use cartsync_core::{CartItem, UserId};
use cartsync_storage::RemoteCartRepository;
use tracing::debug;

use crate::config::RetryPolicy;
use crate::error::EngineError;

/// Save `items` for `user`, retrying with exponential backoff until
/// `policy.max_attempts` is reached.
pub async fn save_with_retry(
    remote: &dyn RemoteCartRepository,
    user: &UserId,
    items: &[CartItem],
    policy: RetryPolicy,
) -> Result<(), EngineError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match remote.save(user, items).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < max_attempts => {
                let delay = policy.backoff_after(attempt);
                debug!(%user, attempt, ?delay, error = %e, "remote save failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(EngineError::RemoteUnavailable {
                    attempts: attempt,
                    message: e.to_string(),
                });
            }
        }
    }
}
