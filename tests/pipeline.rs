// DANS : tests/pipeline.rs
//
// Chaîne complète avec des dépendances simulées :
// dispatcher -> file -> processeur -> agrégateur / relais / notification.

use anyhow::Result;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use trade_monitor::{
    communication::PoolBalance,
    data_pipeline::{
        pool_resolver::{ChainQuery, PoolDiscovery, PoolResolver},
        processor::{ProcessorSettings, TradeProcessor},
    },
    error::PipelineError,
    filtering::{Admission, AdmissionFilter, TradeDispatcher},
    notifications::NotificationSink,
    rpc::retry::RetryPolicy,
    state::{StatsAggregator, TransactionCounters},
};

const SOL: &str = "So11111111111111111111111111111111111111112";
const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

struct StaticChain {
    accounts: HashMap<Pubkey, Vec<PoolBalance>>,
}

#[async_trait]
impl ChainQuery for StaticChain {
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<PoolBalance>, PipelineError> {
        Ok(self.accounts.get(owner).cloned().unwrap_or_default())
    }
}

struct StaticDiscovery {
    pools: Vec<Pubkey>,
}

#[async_trait]
impl PoolDiscovery for StaticDiscovery {
    async fn find_pools(&self, _: &Pubkey, _: &Pubkey, limit: u32) -> Result<Vec<Pubkey>, PipelineError> {
        Ok(self.pools.iter().take(limit as usize).copied().collect())
    }
}

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

fn tx_payload(buy_symbol: &str, market: Option<&Pubkey>) -> Value {
    json!({
        "buy_symbol": buy_symbol,
        "sell_symbol": "USDC",
        "buy_mint_address": SOL,
        "sell_mint_address": USDC,
        "market_address": market.map(|m| m.to_string()),
        "dex_protocol_name": "Raydium",
        "price_usd": 150.0,
        "solana_price": 150.0,
        "block_timestamp": 1_700_000_000
    })
}

struct Harness {
    dispatcher: TradeDispatcher,
    stats: Arc<StatsAggregator>,
    sink: Arc<RecordingSink>,
    relay: broadcast::Receiver<String>,
    workers: tokio::task::JoinHandle<()>,
}

fn harness(chain: StaticChain, discovery: StaticDiscovery) -> Harness {
    let stats = Arc::new(StatsAggregator::new(
        Duration::from_secs(3600),
        tokio::time::Instant::now().into_std(),
    ));
    let sink = Arc::new(RecordingSink::default());
    let (relay_tx, relay_rx) = broadcast::channel(16);
    let (queue_tx, queue_rx) = mpsc::channel(16);

    let resolver = PoolResolver::new(Arc::new(chain), Arc::new(discovery), RetryPolicy::default(), 5);
    let processor = Arc::new(TradeProcessor::new(
        resolver,
        stats.clone(),
        sink.clone(),
        relay_tx,
        ProcessorSettings::default(),
    ));
    let workers = tokio::spawn(processor.run(queue_rx, 4));

    let allowed = ["SOL", "WSOL", "USDC", "USDT"].iter().map(|s| s.to_string()).collect();
    let dispatcher = TradeDispatcher::new(
        AdmissionFilter::new(allowed, Duration::from_secs(10)),
        stats.clone(),
        sink.clone(),
        queue_tx,
    );

    Harness { dispatcher, stats, sink, relay: relay_rx, workers }
}

#[tokio::test(start_paused = true)]
async fn admitted_trade_flows_to_counters_relay_and_notification() {
    let sol = Pubkey::from_str(SOL).unwrap();
    let usdc = Pubkey::from_str(USDC).unwrap();
    let empty_pool = Pubkey::new_unique();
    let good_pool = Pubkey::new_unique();

    let mut accounts = HashMap::new();
    accounts.insert(
        good_pool,
        vec![
            PoolBalance { mint: sol, ui_amount: 10.0 },
            PoolBalance { mint: usdc, ui_amount: 1500.0 },
        ],
    );
    let Harness { dispatcher, stats, sink, mut relay, workers } = harness(
        StaticChain { accounts },
        StaticDiscovery { pools: vec![empty_pool, good_pool] },
    );

    assert_eq!(dispatcher.handle_payload(tx_payload("SOL", None)), Admission::Admitted);
    // Même paire trop tôt : rejetée, rien n'est compté.
    assert_eq!(dispatcher.handle_payload(tx_payload("SOL", None)), Admission::Rejected);
    assert_eq!(dispatcher.handle_payload(tx_payload("BONK", None)), Admission::Rejected);

    // Fermer la file laisse les workers finir le trade en cours.
    drop(dispatcher);
    workers.await.unwrap();

    assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 1, failure: 1 });

    let published: Value = serde_json::from_str(&relay.try_recv().unwrap()).unwrap();
    let entry = &published[good_pool.to_string()];
    assert_eq!(entry["address"], good_pool.to_string());
    assert_eq!(entry["pair"], "SOL/USDC");
    assert_eq!(entry["tokenA"]["usdValue"], 1500.0);
    assert_eq!(entry["tokenB"]["usdValue"], 1500.0);
    assert!(published.get(empty_pool.to_string()).is_none());
    assert!(relay.try_recv().is_err());

    let messages = sink.messages.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains(&good_pool.to_string()));
    assert!(!messages[0].contains(&empty_pool.to_string()));
}

#[tokio::test(start_paused = true)]
async fn unresolvable_trade_counts_one_failure_and_publishes_nothing() {
    let Harness { dispatcher, stats, sink, mut relay, workers } = harness(
        StaticChain { accounts: HashMap::new() },
        StaticDiscovery { pools: Vec::new() },
    );

    assert_eq!(dispatcher.handle_payload(tx_payload("WSOL", None)), Admission::Admitted);
    drop(dispatcher);
    workers.await.unwrap();

    assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 0, failure: 1 });
    assert!(relay.try_recv().is_err());
    assert!(sink.messages.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn origin_market_is_queried_when_discovery_misses_it() {
    let sol = Pubkey::from_str(SOL).unwrap();
    let usdc = Pubkey::from_str(USDC).unwrap();
    let market = Pubkey::new_unique();

    let mut accounts = HashMap::new();
    accounts.insert(
        market,
        vec![
            PoolBalance { mint: sol, ui_amount: 2.0 },
            PoolBalance { mint: usdc, ui_amount: 300.0 },
        ],
    );
    let Harness { dispatcher, stats, mut relay, workers, .. } = harness(
        StaticChain { accounts },
        StaticDiscovery { pools: vec![Pubkey::new_unique()] },
    );

    assert_eq!(dispatcher.handle_payload(tx_payload("SOL", Some(&market))), Admission::Admitted);
    drop(dispatcher);
    workers.await.unwrap();

    let published: Value = serde_json::from_str(&relay.try_recv().unwrap()).unwrap();
    assert_eq!(published[market.to_string()]["tokenA"]["amount"], 2.0);
    assert_eq!(stats.snapshot().0, TransactionCounters { total: 1, success: 1, failure: 1 });
}
