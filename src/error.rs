// DANS : src/error.rs

use thiserror::Error;

/// Erreurs du pipeline de traitement. Aucune ne remonte jusqu'au flux entrant :
/// elles finissent toutes en incrément du compteur `failure`.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Le fournisseur a répondu 429 (ou équivalent). Seule erreur ré-essayée.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Retry budget exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    #[error("RPC Error: {0}")]
    Rpc(String),

    #[error("Pool discovery Error: {0}")]
    Discovery(String),

    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),
}

impl PipelineError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PipelineError::RateLimited(_))
    }
}

/// Marqueur de rate-limit dans un message d'erreur de transport.
pub fn message_signals_rate_limit(message: &str) -> bool {
    message.contains("429") || message.contains("Too Many Requests")
}
