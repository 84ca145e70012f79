// DANS : src/rpc/retry.rs

use crate::error::PipelineError;
use crate::monitoring::metrics::RATE_LIMIT_RETRIES;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Nombre total de tentatives, la première incluse.
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
        }
    }
}

/// Ré-exécute `operation` tant qu'elle échoue pour cause de rate-limit,
/// avec un délai qui double à chaque essai. Toute autre erreur est renvoyée
/// immédiatement.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() => {
                if attempt == max_attempts {
                    break;
                }
                warn!(attempt, delay_ms = delay.as_millis() as u64, "Rate limit atteint. Nouvel essai après le délai...");
                RATE_LIMIT_RETRIES.inc();
                sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }

    Err(PipelineError::RetryExhausted { attempts: max_attempts })
}
