// DANS : src/data_pipeline/pool_resolver.rs

use crate::communication::PoolBalance;
use crate::error::PipelineError;
use crate::monitoring::metrics::POOL_QUERIES;
use crate::rpc::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Lecture des comptes de tokens détenus par un compte (un pool).
#[async_trait]
pub trait ChainQuery: Send + Sync {
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey) -> Result<Vec<PoolBalance>, PipelineError>;
}

/// Service externe qui classe les pools d'une paire de mints.
#[async_trait]
pub trait PoolDiscovery: Send + Sync {
    async fn find_pools(&self, mint_a: &Pubkey, mint_b: &Pubkey, limit: u32) -> Result<Vec<Pubkey>, PipelineError>;
}

/// Les deux côtés d'un pool : A = mint acheté, B = mint vendu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolBalancePair {
    pub token_a: PoolBalance,
    pub token_b: PoolBalance,
}

pub struct PoolResolver {
    chain: Arc<dyn ChainQuery>,
    discovery: Arc<dyn PoolDiscovery>,
    retry_policy: RetryPolicy,
    discovery_limit: u32,
}

impl PoolResolver {
    pub fn new(
        chain: Arc<dyn ChainQuery>,
        discovery: Arc<dyn PoolDiscovery>,
        retry_policy: RetryPolicy,
        discovery_limit: u32,
    ) -> Self {
        Self { chain, discovery, retry_policy, discovery_limit }
    }

    /// Pools candidats pour la paire. Le marché d'origine est toujours ajouté
    /// s'il n'est pas dans le classement. Un échec de la découverte donne une
    /// liste vide, jamais une erreur.
    pub async fn resolve_pools(&self, buy_mint: &Pubkey, sell_mint: &Pubkey, market_address: Option<&Pubkey>) -> Vec<Pubkey> {
        let discovery = self.discovery.as_ref();
        let limit = self.discovery_limit;
        let found = with_retry(&self.retry_policy, move || discovery.find_pools(buy_mint, sell_mint, limit)).await;

        let mut pools = match found {
            Ok(pools) => pools,
            Err(e) => {
                warn!(buy_mint = %buy_mint, sell_mint = %sell_mint, error = %e, "[Resolver] Échec de la découverte des pools");
                return Vec::new();
            }
        };

        if let Some(market) = market_address {
            if !pools.contains(market) {
                pools.push(*market);
            }
        }
        debug!(count = pools.len(), "[Resolver] Pools candidats");
        pools
    }

    /// Soldes du pool pour les deux mints du trade. `Ok(None)` : le pool ne
    /// détient pas les deux côtés, il est simplement ignoré.
    pub async fn fetch_pool_balances(
        &self,
        pool: &Pubkey,
        buy_mint: &Pubkey,
        sell_mint: &Pubkey,
    ) -> Result<Option<PoolBalancePair>, PipelineError> {
        let chain = self.chain.as_ref();
        let accounts = match with_retry(&self.retry_policy, move || chain.get_token_accounts_by_owner(pool)).await {
            Ok(accounts) => accounts,
            Err(e) => {
                POOL_QUERIES.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };

        let relevant: Vec<PoolBalance> = accounts
            .into_iter()
            .filter(|balance| balance.mint == *buy_mint || balance.mint == *sell_mint)
            .collect();

        if relevant.len() < 2 {
            POOL_QUERIES.with_label_values(&["insufficient"]).inc();
            return Ok(None);
        }

        let token_a = relevant.iter().find(|b| b.mint == *buy_mint);
        let token_b = relevant.iter().find(|b| b.mint == *sell_mint);
        match (token_a, token_b) {
            (Some(a), Some(b)) => {
                POOL_QUERIES.with_label_values(&["resolved"]).inc();
                Ok(Some(PoolBalancePair { token_a: *a, token_b: *b }))
            }
            // Deux comptes du même mint : un côté manque toujours.
            _ => {
                POOL_QUERIES.with_label_values(&["insufficient"]).inc();
                Ok(None)
            }
        }
    }
}
