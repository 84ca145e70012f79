// DANS : src/filtering/dispatcher.rs

use super::admission::AdmissionFilter;
use crate::communication::TradeEvent;
use crate::monitoring::metrics::{EVENTS_ADMITTED, EVENTS_RECEIVED};
use crate::notifications::NotificationSink;
use crate::state::{stats::format_report, Outcome, StatsAggregator};
use serde_json::Value;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected,
    /// Admis puis perdu : payload indécodable, ou file des workers pleine ou fermée.
    Dropped,
}

/// Point d'entrée de chaque évènement `tx`. Tout ce qui est fait ici est
/// synchrone ; le traitement lent part dans la file des workers.
pub struct TradeDispatcher {
    filter: AdmissionFilter,
    stats: Arc<StatsAggregator>,
    notifier: Arc<dyn NotificationSink>,
    queue: mpsc::Sender<TradeEvent>,
}

impl TradeDispatcher {
    pub fn new(
        filter: AdmissionFilter,
        stats: Arc<StatsAggregator>,
        notifier: Arc<dyn NotificationSink>,
        queue: mpsc::Sender<TradeEvent>,
    ) -> Self {
        Self { filter, stats, notifier, queue }
    }

    fn now() -> Instant {
        // Horloge tokio : suit le temps "en pause" dans les tests.
        tokio::time::Instant::now().into_std()
    }

    /// Payload brut du flux. La rotation des statistiques est vérifiée avant
    /// tout le reste : un évènement illisible fait aussi tourner la fenêtre.
    /// L'admission ne regarde que les symboles ; un trade admis mais
    /// indécodable compte dans `total` puis comme échec.
    pub fn handle_payload(&self, payload: Value) -> Admission {
        let now = Self::now();
        EVENTS_RECEIVED.inc();
        self.rotate_stats(now);

        let (buy_symbol, sell_symbol) = (raw_symbol(&payload, "buy_symbol"), raw_symbol(&payload, "sell_symbol"));
        if !self.filter.admit(buy_symbol, sell_symbol, now) {
            debug!(pair = %format!("{}/{}", buy_symbol, sell_symbol), "[Dispatcher] Trade non admis");
            return Admission::Rejected;
        }

        // Le total compte les tentatives admises, avant tout traitement.
        self.stats.record(Outcome::Admitted);
        EVENTS_ADMITTED.inc();

        match serde_json::from_value::<TradeEvent>(payload) {
            Ok(event) => self.enqueue(event),
            Err(e) => {
                warn!(error = %e, "[Dispatcher] Trade admis mais illisible, compté en échec");
                self.stats.record(Outcome::Failure);
                Admission::Dropped
            }
        }
    }

    fn rotate_stats(&self, now: Instant) {
        if let Some(report) = self.stats.rotate_if_due(now) {
            let notifier = self.notifier.clone();
            let message = format_report(&report);
            tokio::spawn(async move {
                if let Err(e) = notifier.send(&message).await {
                    warn!(error = %e, "[Dispatcher] Échec de l'envoi du rapport de fenêtre");
                }
            });
        }
    }

    fn enqueue(&self, event: TradeEvent) -> Admission {
        match self.queue.try_send(event) {
            Ok(()) => Admission::Admitted,
            Err(TrySendError::Full(event)) | Err(TrySendError::Closed(event)) => {
                warn!(pair = %event.pair_label(), "[Dispatcher] File des workers indisponible, trade abandonné");
                self.stats.record(Outcome::Failure);
                Admission::Dropped
            }
        }
    }
}

fn raw_symbol<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TransactionCounters;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, message: &str) -> Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    const SOL: &str = "So11111111111111111111111111111111111111112";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn payload(buy_symbol: &str) -> Value {
        json!({
            "buy_symbol": buy_symbol,
            "sell_symbol": "USDC",
            "buy_mint_address": SOL,
            "sell_mint_address": USDC,
            "market_address": "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2",
            "dex_protocol_name": "Raydium",
            "price_usd": 150.0,
            "solana_price": 150.0,
            "block_timestamp": 1_700_000_000
        })
    }

    fn dispatcher(capacity: usize) -> (TradeDispatcher, Arc<StatsAggregator>, Arc<RecordingSink>, mpsc::Receiver<TradeEvent>) {
        let allowed = ["SOL", "USDC"].iter().map(|s| s.to_string()).collect();
        let filter = AdmissionFilter::new(allowed, Duration::from_secs(10));
        let stats = Arc::new(StatsAggregator::new(Duration::from_secs(3600), TradeDispatcher::now()));
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(capacity);
        (TradeDispatcher::new(filter, stats.clone(), sink.clone(), tx), stats, sink, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn admitted_event_counts_total_and_is_queued() {
        let (dispatcher, stats, _, mut rx) = dispatcher(8);

        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Admitted);
        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Rejected);
        assert_eq!(dispatcher.handle_payload(payload("BONK")), Admission::Rejected);

        assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 0, failure: 0 });
        assert_eq!(rx.try_recv().unwrap().buy_symbol, "SOL");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn full_queue_counts_a_failure() {
        let (dispatcher, stats, _, _rx) = dispatcher(1);

        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Admitted);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Dropped);

        assert_eq!(stats.snapshot().0, TransactionCounters { total: 2, success: 0, failure: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_event_still_rotates_the_window() {
        let (dispatcher, stats, sink, _rx) = dispatcher(8);
        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Admitted);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(dispatcher.handle_payload(payload("BONK")), Admission::Rejected);

        let (current, previous) = stats.snapshot();
        assert_eq!(current, TransactionCounters::default());
        assert_eq!(previous.total, 1);

        // Laisse le task d'envoi du rapport s'exécuter.
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("<b>Transaction Status📊:</b>"));
    }

    #[tokio::test(start_paused = true)]
    async fn payload_without_symbols_is_rejected_without_counting() {
        let (dispatcher, stats, _, _rx) = dispatcher(8);
        assert_eq!(dispatcher.handle_payload(json!({ "buy_symbol": "SOL" })), Admission::Rejected);
        assert_eq!(stats.snapshot().0, TransactionCounters::default());
    }

    #[tokio::test(start_paused = true)]
    async fn admitted_but_undecodable_trade_counts_a_failure_and_spends_the_window() {
        let (dispatcher, stats, _, mut rx) = dispatcher(8);
        let mut bad_mint = payload("SOL");
        bad_mint["buy_mint_address"] = json!("not-a-mint");

        assert_eq!(dispatcher.handle_payload(bad_mint), Admission::Dropped);
        assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 0, failure: 1 });
        assert!(rx.try_recv().is_err());

        // L'espacement court depuis le trade illisible.
        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Rejected);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(dispatcher.handle_payload(payload("SOL")), Admission::Admitted);
    }

    #[tokio::test(start_paused = true)]
    async fn loose_timestamp_formats_are_accepted() {
        let (dispatcher, stats, _, mut rx) = dispatcher(8);
        let mut fractional = payload("SOL");
        fractional["block_timestamp"] = json!(1_700_000_000.5);

        assert_eq!(dispatcher.handle_payload(fractional), Admission::Admitted);
        assert_eq!(rx.try_recv().unwrap().block_timestamp, 1_700_000_000);
        assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 0, failure: 0 });
    }
}
