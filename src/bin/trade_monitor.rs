#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use trade_monitor::{
    config::Config,
    data_pipeline::{
        discovery::RaydiumDiscovery,
        pool_resolver::PoolResolver,
        processor::TradeProcessor,
    },
    feeds::{relay, SocketClient},
    filtering::{AdmissionFilter, TradeDispatcher},
    monitoring::{logging, status},
    notifications::{LogNotifier, NotificationSink, TelegramNotifier},
    rpc::ResilientRpcClient,
    state::StatsAggregator,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    logging::setup_logging("info")?;
    info!("--- Démarrage du moniteur de trades ---");

    let notifier: Arc<dyn NotificationSink> = if config.telegram_enabled() {
        Arc::new(TelegramNotifier::new(&config.tg_bot, &config.tg_channel))
    } else {
        warn!("[Main] TG_BOT / TG_CHANNEL absents, les notifications partent dans les logs");
        Arc::new(LogNotifier)
    };

    let stats = Arc::new(StatsAggregator::new(
        config.rotation_window(),
        tokio::time::Instant::now().into_std(),
    ));

    info!(window_secs = stats.window().as_secs(), "[Main] Fenêtre des statistiques");

    // Clients partagés par tous les trades.
    let chain = Arc::new(ResilientRpcClient::new(config.solana_rpc_url.clone()));
    let discovery = Arc::new(RaydiumDiscovery::new(config.discovery_url.clone()));
    let resolver = PoolResolver::new(chain, discovery, config.retry_policy(), config.discovery_limit);

    let (relay_sender, _) = broadcast::channel::<String>(1024);
    let (queue_sender, queue_receiver) = mpsc::channel(config.queue_capacity.max(1));

    let processor = Arc::new(TradeProcessor::new(
        resolver,
        stats.clone(),
        notifier.clone(),
        relay_sender.clone(),
        config.processor_settings(),
    ));
    let workers = tokio::spawn(processor.run(queue_receiver, config.max_concurrent_trades.max(1)));

    tokio::spawn(relay::start_relay_server(relay_sender, config.ws_port));
    tokio::spawn(status::start_status_server(stats.clone(), config.port));

    let dispatcher = Arc::new(TradeDispatcher::new(
        AdmissionFilter::new(config.allowed_token_set(), config.admission_spacing()),
        stats,
        notifier,
        queue_sender,
    ));

    let feed = if config.server_url.trim().is_empty() {
        warn!("[Main] SERVER_URL vide, aucun flux de transactions ne sera consommé");
        None
    } else {
        let client = SocketClient::new(config.server_url.clone(), config.key.clone(), dispatcher.clone());
        Some(tokio::spawn(client.run()))
    };

    tokio::signal::ctrl_c().await?;
    info!("[Main] Arrêt demandé");

    // Ferme la file : les workers terminent les trades en cours puis s'arrêtent.
    if let Some(feed) = feed {
        feed.abort();
        let _ = feed.await;
    }
    drop(dispatcher);
    if let Err(e) = workers.await {
        error!(error = %e, "[Main] Les workers se sont arrêtés anormalement");
    }
    Ok(())
}
