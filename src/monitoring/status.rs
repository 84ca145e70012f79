// DANS : src/monitoring/status.rs

use super::metrics;
use crate::state::StatsAggregator;
use std::sync::Arc;
use tracing::info;
use warp::Filter;

/// `/statistics` : projection en lecture seule des compteurs.
/// `/metrics` : export Prometheus.
pub fn routes(
    stats: Arc<StatsAggregator>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let statistics = warp::path!("statistics")
        .and(warp::get())
        .map(move || warp::reply::json(&stats.report()));

    let metrics_route = warp::path!("metrics").and(warp::get()).map(|| {
        warp::reply::with_header(metrics::render(), "content-type", "text/plain; version=0.0.4")
    });

    statistics.or(metrics_route)
}

pub async fn start_status_server(stats: Arc<StatsAggregator>, port: u16) {
    info!(port, "[Monitoring] Statistiques exposées sur /statistics et /metrics");
    warp::serve(routes(stats)).run(([0, 0, 0, 0], port)).await;
}
