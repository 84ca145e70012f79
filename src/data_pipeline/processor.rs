// DANS : src/data_pipeline/processor.rs

use crate::communication::{PoolResult, TradeEvent, TradeResults, ValuedLeg};
use crate::data_pipeline::pool_resolver::{PoolBalancePair, PoolResolver};
use crate::math::valuate_usd;
use crate::monitoring::metrics::PROCESS_TRADE_LATENCY;
use crate::notifications::{format_trade_message, NotificationSink};
use crate::state::{Outcome, StatsAggregator};
use futures_util::FutureExt;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{
    sync::{broadcast, mpsc, Semaphore},
    task::JoinSet,
    time::sleep,
};
use tracing::{debug, error, info, warn};

/// Quand compter un succès pour un trade résolu.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    /// Un succès par trade ayant produit au moins un pool.
    #[default]
    PerTrade,
    /// Un succès par pool résolu.
    PerPool,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    /// Pause imposée entre deux requêtes de pools d'un même trade.
    pub inter_pool_delay: Duration,
    pub success_policy: SuccessPolicy,
    /// `true` : chaque pool ignoré compte un échec, même si un autre pool du
    /// trade a réussi. `false` : un seul échec, et seulement si rien n'a abouti.
    pub count_pool_misses: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            inter_pool_delay: Duration::from_secs(10),
            success_policy: SuccessPolicy::PerTrade,
            count_pool_misses: true,
        }
    }
}

pub struct TradeProcessor {
    resolver: PoolResolver,
    stats: Arc<StatsAggregator>,
    notifier: Arc<dyn NotificationSink>,
    relay: broadcast::Sender<String>,
    settings: ProcessorSettings,
}

impl TradeProcessor {
    pub fn new(
        resolver: PoolResolver,
        stats: Arc<StatsAggregator>,
        notifier: Arc<dyn NotificationSink>,
        relay: broadcast::Sender<String>,
        settings: ProcessorSettings,
    ) -> Self {
        Self { resolver, stats, notifier, relay, settings }
    }

    /// Boucle des workers : un task par trade admis, au plus `max_concurrent`
    /// en vol. Se termine quand le dispatcher ferme la file, après avoir
    /// attendu les trades en cours.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<TradeEvent>, max_concurrent: usize) {
        info!(max_concurrent, "[Processor] Moteur de traitement démarré.");
        let permits = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let mut in_flight = JoinSet::new();

        while let Some(event) = receiver.recv().await {
            while in_flight.try_join_next().is_some() {}

            let permit = match permits.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            let processor = self.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                processor.process_guarded(event).await;
            });
        }

        while in_flight.join_next().await.is_some() {}
        info!("[Processor] File fermée, moteur arrêté.");
    }

    /// Exécute `process` dans son propre task : un panic y est capturé,
    /// journalisé et compté comme un échec.
    pub async fn process_guarded(self: Arc<Self>, event: TradeEvent) {
        let pair = event.pair_label();
        let processor = self.clone();
        let handle = tokio::spawn(async move { processor.process(&event).await });

        if let Err(e) = handle.await {
            error!(pair = %pair, error = %e, "[Processor] Erreur inattendue pendant le traitement du trade");
            self.stats.record(Outcome::Failure);
        }
    }

    /// Résout les pools du trade, valorise chaque côté et publie le résultat.
    pub async fn process(&self, event: &TradeEvent) -> TradeResults {
        let started = Instant::now();
        let mut results = TradeResults::new();

        let pools = self
            .resolver
            .resolve_pools(&event.buy_mint, &event.sell_mint, event.market_address.as_ref())
            .await;

        if pools.is_empty() {
            info!(pair = %event.pair_label(), "[Processor] ❌ Aucun pool trouvé pour le trade.");
            self.stats.record(Outcome::Failure);
            return results;
        }

        let mut misses = 0u64;
        for (index, pool) in pools.iter().enumerate() {
            if index > 0 {
                sleep(self.settings.inter_pool_delay).await;
            }

            match self.resolver.fetch_pool_balances(pool, &event.buy_mint, &event.sell_mint).await {
                Ok(Some(balances)) => {
                    results.insert(pool.to_string(), build_pool_result(event, pool, &balances));
                }
                Ok(None) => {
                    debug!(pool = %pool, "[Processor] Le pool ne détient pas les deux mints, ignoré.");
                    self.record_miss(&mut misses);
                }
                Err(e) => {
                    warn!(pool = %pool, error = %e, "[Processor] Lecture des soldes impossible, pool ignoré.");
                    self.record_miss(&mut misses);
                }
            }
        }

        if results.is_empty() {
            if !self.settings.count_pool_misses {
                self.stats.record(Outcome::Failure);
            }
            info!(pair = %event.pair_label(), pools = pools.len(), "[Processor] ❌ Aucun pool exploitable.");
            PROCESS_TRADE_LATENCY.observe(started.elapsed().as_secs_f64());
            return results;
        }

        // Un panic côté relais ou notification ne change pas l'issue du trade :
        // il est résolu, un seul résultat est compté.
        if let Err(panic) = AssertUnwindSafe(self.publish(&results)).catch_unwind().await {
            error!(pair = %event.pair_label(), panic = %panic_message(panic.as_ref()), "[Processor] Panic pendant la publication des résultats");
        }

        let successes = match self.settings.success_policy {
            SuccessPolicy::PerTrade => 1,
            SuccessPolicy::PerPool => results.len() as u64,
        };
        self.stats.record_n(Outcome::Success, successes);
        info!(
            pair = %event.pair_label(),
            resolved = results.len(),
            missed = misses,
            "[Processor] ✅ Trade résolu."
        );

        PROCESS_TRADE_LATENCY.observe(started.elapsed().as_secs_f64());
        results
    }

    fn record_miss(&self, misses: &mut u64) {
        *misses += 1;
        if self.settings.count_pool_misses {
            self.stats.record(Outcome::Failure);
        }
    }

    async fn publish(&self, results: &TradeResults) {
        match serde_json::to_string(results) {
            Ok(payload) => {
                // Err = aucun client connecté au relais.
                let _ = self.relay.send(payload);
            }
            Err(e) => warn!(error = %e, "[Processor] Sérialisation des résultats impossible"),
        }

        let message = format_trade_message(results);
        if let Err(e) = self.notifier.send(&message).await {
            warn!(error = %e, "[Processor] Échec de l'envoi de la notification");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}

pub fn build_pool_result(event: &TradeEvent, pool: &Pubkey, balances: &PoolBalancePair) -> PoolResult {
    let leg = |symbol: &str, mint: Pubkey, amount: f64| ValuedLeg {
        mint,
        amount,
        usd_value: valuate_usd(symbol, amount, event.price_usd, event.sol_price_usd),
    };

    PoolResult {
        pool_address: *pool,
        pair: event.pair_label(),
        protocol: event.dex_protocol_name.clone(),
        token_a: leg(&event.buy_symbol, event.buy_mint, balances.token_a.ui_amount),
        token_b: leg(&event.sell_symbol, event.sell_mint, balances.token_b.ui_amount),
        block_timestamp: event.block_time(),
    }
}
