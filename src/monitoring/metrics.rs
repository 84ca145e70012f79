// DANS : src/monitoring/metrics.rs

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // --- Flux entrant ---
    pub static ref EVENTS_RECEIVED: IntCounter = register_int_counter!(
        "trade_monitor_events_received_total", "Nombre total d'évènements tx reçus du flux"
    ).unwrap();
    pub static ref EVENTS_ADMITTED: IntCounter = register_int_counter!(
        "trade_monitor_events_admitted_total", "Nombre d'évènements ayant passé le filtre d'admission"
    ).unwrap();

    // --- Résultats (miroir des compteurs de la fenêtre, sans remise à zéro) ---
    pub static ref TRADE_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "trade_monitor_trade_outcomes_total",
        "Compteurs admitted / success / failure depuis le démarrage",
        &["outcome"]
    ).unwrap();
    pub static ref PROCESS_TRADE_LATENCY: Histogram = register_histogram!(
        "trade_monitor_process_trade_latency_seconds", "Durée du traitement complet d'un trade (pauses incluses)"
    ).unwrap();

    // --- Dépendances externes ---
    pub static ref POOL_QUERIES: IntCounterVec = register_int_counter_vec!(
        "trade_monitor_pool_queries_total",
        "Lectures de soldes de pools, par issue",
        &["status"] // "resolved" / "insufficient" / "error"
    ).unwrap();
    pub static ref RPC_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trade_monitor_rpc_requests_total",
        "Compteur total des requêtes RPC, segmenté par méthode et statut",
        &["method", "status"]
    ).unwrap();
    pub static ref RPC_REQUEST_LATENCY: HistogramVec = register_histogram_vec!(
        "trade_monitor_rpc_request_latency_seconds",
        "Latence des appels RPC vers le nœud Solana",
        &["method"]
    ).unwrap();
    pub static ref INVALID_TOKEN_ACCOUNTS: IntCounter = register_int_counter!(
        "trade_monitor_invalid_token_accounts_total", "Comptes de tokens de pools impossibles à décoder"
    ).unwrap();
    pub static ref RATE_LIMIT_RETRIES: IntCounter = register_int_counter!(
        "trade_monitor_rate_limit_retries_total", "Nouvelles tentatives déclenchées par un rate-limit"
    ).unwrap();
}

/// Export au format texte Prometheus.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "[Monitoring] Encodage des métriques impossible");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
