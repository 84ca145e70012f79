// DANS : src/rpc/resilient_client.rs

use crate::communication::PoolBalance;
use crate::data_pipeline::pool_resolver::ChainQuery;
use crate::error::{message_signals_rate_limit, PipelineError};
use crate::monitoring::metrics::{INVALID_TOKEN_ACCOUNTS, RPC_REQUESTS_TOTAL, RPC_REQUEST_LATENCY};
use async_trait::async_trait;
use serde_json::Value;
use solana_account_decoder::UiAccountData;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter,
};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::{str::FromStr, sync::Arc, time::Instant};
use tracing::{debug, warn};

/// Un "wrapper" autour du RpcClient de Solana qui classe les erreurs
/// (rate-limit ré-essayable ou non) et mesure chaque appel. Les ré-essais
/// eux-mêmes sont faits par l'appelant via `rpc::retry::with_retry`.
#[derive(Clone)]
pub struct ResilientRpcClient {
    client: Arc<RpcClient>,
}

impl ResilientRpcClient {
    /// Construit un nouveau client RPC résilient (commitment "confirmed").
    pub fn new(rpc_url: String) -> Self {
        Self {
            client: Arc::new(RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed())),
        }
    }

    /// Traduit une erreur du client : un 429 devient `RateLimited` (ré-essayable),
    /// le reste est une erreur RPC définitive.
    fn classify(error: ClientError) -> PipelineError {
        let message = error.to_string();
        if message_signals_rate_limit(&message) {
            PipelineError::RateLimited(message)
        } else {
            PipelineError::Rpc(message)
        }
    }
}

#[async_trait]
impl ChainQuery for ResilientRpcClient {
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<PoolBalance>, PipelineError> {
        let started = Instant::now();
        let result = self
            .client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(spl_token::id()))
            .await;
        RPC_REQUEST_LATENCY
            .with_label_values(&["get_token_accounts_by_owner"])
            .observe(started.elapsed().as_secs_f64());

        match result {
            Ok(accounts) => {
                RPC_REQUESTS_TOTAL.with_label_values(&["get_token_accounts_by_owner", "success"]).inc();
                let mut balances = Vec::with_capacity(accounts.len());
                for keyed in &accounts {
                    match decode_balance(&keyed.account.data) {
                        Ok(balance) => balances.push(balance),
                        Err(e) => {
                            // Compte ignoré : le pool risque de paraître insuffisant.
                            INVALID_TOKEN_ACCOUNTS.inc();
                            warn!(owner = %owner, account = %keyed.pubkey, error = %e, "[RPC] Compte de token illisible");
                        }
                    }
                }
                debug!(owner = %owner, accounts = accounts.len(), decoded = balances.len(), "Comptes de tokens récupérés");
                Ok(balances)
            }
            Err(e) => {
                RPC_REQUESTS_TOTAL.with_label_values(&["get_token_accounts_by_owner", "failure"]).inc();
                Err(Self::classify(e))
            }
        }
    }
}

/// Solde d'un compte SPL renvoyé en "jsonParsed". Tout autre encodage est une erreur.
pub fn decode_balance(data: &UiAccountData) -> Result<PoolBalance, PipelineError> {
    match data {
        UiAccountData::Json(parsed) => balance_from_parsed(&parsed.parsed),
        _ => Err(PipelineError::InvalidAccountData("encodage autre que jsonParsed".to_string())),
    }
}

/// Extrait (mint, uiAmount) d'un compte SPL au format "jsonParsed".
/// Un `uiAmount` nul est lu comme 0, comme le fait l'explorateur.
pub fn balance_from_parsed(parsed: &Value) -> Result<PoolBalance, PipelineError> {
    let raw_mint = parsed
        .get("info")
        .and_then(|info| info.get("mint"))
        .and_then(Value::as_str)
        .ok_or_else(|| PipelineError::InvalidAccountData("champ info.mint absent".to_string()))?;
    let mint = Pubkey::from_str(raw_mint)
        .map_err(|e| PipelineError::InvalidAccountData(format!("mint {}: {}", raw_mint, e)))?;
    let ui_amount = parsed["info"]
        .get("tokenAmount")
        .and_then(|amount| amount.get("uiAmount"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    Ok(PoolBalance { mint, ui_amount })
}
