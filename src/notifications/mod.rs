// DANS : src/notifications/mod.rs

use crate::communication::{PoolResult, TradeResults};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

pub mod telegram;

pub use telegram::TelegramNotifier;

/// Destination des messages lisibles par un humain (HTML).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

/// Utilisé quand Telegram n'est pas configuré : le message part dans les logs.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        info!(notification = message, "[Notification]");
        Ok(())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn format_pool_result(result: &PoolResult) -> String {
    format!(
        "\n<b>Pair:</b> {}⚖️\n<b>Protocol:</b> {}\n<b>Market Address:</b> <code>{}</code>\n\n\
<b>Token A:</b>\n  - Mint: <code>{}</code>\n  - Amount: {}\n  - USD Value: ${}\n\n\
<b>Token B:</b>\n  - Mint: <code>{}</code>\n  - Amount: {}\n  - USD Value: ${}\n\n\
<b>Block Timestamp:</b> {}\n",
        result.pair,
        result.protocol,
        result.pool_address,
        result.token_a.mint,
        round2(result.token_a.amount),
        round2(result.token_a.usd_value),
        result.token_b.mint,
        round2(result.token_b.amount),
        round2(result.token_b.usd_value),
        result.block_timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    )
}

/// Un seul message par trade, une section par pool.
pub fn format_trade_message(results: &TradeResults) -> String {
    results
        .values()
        .map(format_pool_result)
        .collect::<Vec<_>>()
        .join("\n")
}
