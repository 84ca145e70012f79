// DANS : src/data_pipeline/discovery/raydium.rs

use crate::data_pipeline::pool_resolver::PoolDiscovery;
use crate::error::{message_signals_rate_limit, PipelineError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RaydiumApiV3Response<T> {
    success: bool,
    data: Option<T>,
    msg: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ApiPoolsData {
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub data: Vec<PoolInfo>,
}

/// Seul l'identifiant sert : l'ordre de l'API fait déjà le classement.
#[derive(Deserialize, Debug, Clone)]
pub struct PoolInfo {
    pub id: String,
}

/// Découverte des pools d'une paire de mints via l'API V3 de Raydium.
/// L'ordre renvoyé est le classement par défaut de l'API.
pub struct RaydiumDiscovery {
    client: reqwest::Client,
    base_url: String,
}

impl RaydiumDiscovery {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn pools_by_mint_url(&self, mint_a: &Pubkey, mint_b: &Pubkey, limit: u32) -> String {
        format!(
            "{}/pools/info/mint?mint1={}&mint2={}&poolType=all&poolSortField=default&sortType=desc&pageSize={}&page=1",
            self.base_url, mint_a, mint_b, limit
        )
    }
}

/// Garde les identifiants valides, dans l'ordre, sans doublon, au plus `limit`.
fn pool_ids(pools: &[PoolInfo], limit: usize) -> Vec<Pubkey> {
    let mut ids: Vec<Pubkey> = Vec::with_capacity(limit);
    for pool in pools {
        match Pubkey::from_str(&pool.id) {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => warn!(pool_id = %pool.id, "[Discovery] Identifiant de pool invalide ignoré"),
        }
        if ids.len() >= limit {
            break;
        }
    }
    ids
}

fn parse_response(raw_text: &str, limit: usize) -> Result<Vec<Pubkey>, PipelineError> {
    let response_body: RaydiumApiV3Response<ApiPoolsData> = serde_json::from_str(raw_text).map_err(|e| {
        // On garde le début de la réponse pour aider au debug.
        let preview: String = raw_text.chars().take(500).collect();
        PipelineError::Discovery(format!("Erreur de décodage JSON: {}. Réponse reçue: {}", e, preview))
    })?;

    if !response_body.success {
        let error_msg = response_body.msg.unwrap_or_else(|| "Erreur API inconnue".to_string());
        return Err(PipelineError::Discovery(format!("L'API Raydium a retourné une erreur: {}", error_msg)));
    }

    Ok(response_body
        .data
        .map(|api_data| {
            debug!(count = api_data.count, "[Discovery] Pools disponibles selon l'API");
            pool_ids(&api_data.data, limit)
        })
        .unwrap_or_default())
}

#[async_trait]
impl PoolDiscovery for RaydiumDiscovery {
    async fn find_pools(&self, mint_a: &Pubkey, mint_b: &Pubkey, limit: u32) -> Result<Vec<Pubkey>, PipelineError> {
        let url = self.pools_by_mint_url(mint_a, mint_b, limit);
        let response = self.client.get(&url).send().await.map_err(|e| {
            let message = e.to_string();
            if message_signals_rate_limit(&message) {
                PipelineError::RateLimited(message)
            } else {
                PipelineError::Discovery(message)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PipelineError::RateLimited(format!("Erreur API Raydium: {}", status)));
        }
        if !status.is_success() {
            return Err(PipelineError::Discovery(format!("Erreur API Raydium: {}", status)));
        }

        let raw_text = response
            .text()
            .await
            .map_err(|e| PipelineError::Discovery(e.to_string()))?;
        parse_response(&raw_text, limit as usize)
    }
}
