// DANS : src/config.rs

use crate::data_pipeline::processor::{ProcessorSettings, SuccessPolicy};
use crate::rpc::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_rpc_url")]
    pub solana_rpc_url: String,

    /// Adresse du flux Socket.IO des transactions. Vide = client désactivé.
    #[serde(default)]
    pub server_url: String,
    /// Secret HS256 du jeton présenté à la connexion.
    #[serde(default = "default_key")]
    pub key: String,

    #[serde(default)]
    pub tg_bot: String,
    #[serde(default)]
    pub tg_channel: String,

    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    #[serde(default = "default_allowed_tokens")]
    pub allowed_tokens: Vec<String>,
    /// 10s / 40s / 100s selon le profil de déploiement.
    #[serde(default = "default_admission_spacing_ms")]
    pub admission_spacing_ms: u64,
    #[serde(default = "default_rotation_window_secs")]
    pub rotation_window_secs: u64,
    #[serde(default = "default_inter_pool_delay_ms")]
    pub inter_pool_delay_ms: u64,

    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,
    #[serde(default = "default_discovery_limit")]
    pub discovery_limit: u32,

    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,

    #[serde(default)]
    pub success_policy: SuccessPolicy,
    #[serde(default = "default_true")]
    pub count_pool_misses: bool,
    #[serde(default = "default_max_concurrent_trades")]
    pub max_concurrent_trades: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}
fn default_key() -> String {
    "test".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_ws_port() -> u16 {
    3001
}
fn default_allowed_tokens() -> Vec<String> {
    ["WSOL", "SOL", "USDT", "USDC", "jailstool"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_admission_spacing_ms() -> u64 {
    10_000
}
fn default_rotation_window_secs() -> u64 {
    60 * 60
}
fn default_inter_pool_delay_ms() -> u64 {
    10_000
}
fn default_discovery_url() -> String {
    "https://api-v3.raydium.io".to_string()
}
fn default_discovery_limit() -> u32 {
    5
}
fn default_retry_max_attempts() -> u32 {
    5
}
fn default_retry_initial_delay_ms() -> u64 {
    1_000
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent_trades() -> usize {
    8
}
fn default_queue_capacity() -> usize {
    256
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = envy::from_env::<Config>()
            .context("Configuration invalide dans l'environnement")?;
        Ok(config)
    }

    pub fn allowed_token_set(&self) -> HashSet<String> {
        self.allowed_tokens
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn admission_spacing(&self) -> Duration {
        Duration::from_millis(self.admission_spacing_ms)
    }

    pub fn rotation_window(&self) -> Duration {
        Duration::from_secs(self.rotation_window_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts.max(1),
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
        }
    }

    pub fn processor_settings(&self) -> ProcessorSettings {
        ProcessorSettings {
            inter_pool_delay: Duration::from_millis(self.inter_pool_delay_ms),
            success_policy: self.success_policy,
            count_pool_misses: self.count_pool_misses,
        }
    }

    pub fn telegram_enabled(&self) -> bool {
        !self.tg_bot.is_empty() && !self.tg_channel.is_empty()
    }
}
