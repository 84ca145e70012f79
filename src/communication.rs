// DANS : src/communication.rs

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use std::collections::BTreeMap;
use std::str::FromStr;

// --- PROTOCOLE ENTRANT : évènement `tx` du flux de trades ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub buy_symbol: String,
    pub sell_symbol: String,
    #[serde(rename = "buy_mint_address", deserialize_with = "pubkey_from_string")]
    pub buy_mint: Pubkey,
    #[serde(rename = "sell_mint_address", deserialize_with = "pubkey_from_string")]
    pub sell_mint: Pubkey,
    #[serde(default, deserialize_with = "optional_pubkey_from_string")]
    pub market_address: Option<Pubkey>,
    #[serde(default)]
    pub dex_protocol_name: String,
    // Prix absents => 0, la valorisation ne doit jamais échouer.
    #[serde(default, deserialize_with = "price_or_zero")]
    pub price_usd: f64,
    #[serde(rename = "solana_price", default, deserialize_with = "price_or_zero")]
    pub sol_price_usd: f64,
    /// Timestamp Unix en secondes (la partie fractionnaire est ignorée).
    #[serde(default, deserialize_with = "timestamp_or_zero")]
    pub block_timestamp: i64,
}

impl TradeEvent {
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.buy_symbol, self.sell_symbol)
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.block_timestamp, 0)
            .single()
            .unwrap_or_default()
    }
}

fn pubkey_from_string<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Pubkey::from_str(&s).map_err(serde::de::Error::custom)
}

fn optional_pubkey_from_string<'de, D>(deserializer: D) -> Result<Option<Pubkey>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Deserialize::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Pubkey::from_str(s).map(Some).map_err(serde::de::Error::custom),
    }
}

// Certains flux envoient les prix en texte ("142.3") ou à null.
fn price_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

// Même tolérance pour l'horodatage : entier, flottant, texte ou null.
fn timestamp_or_zero<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Deserialize::deserialize(deserializer)?;
    let seconds = match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    };
    Ok(seconds.unwrap_or(0))
}

fn pubkey_to_string<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(pubkey)
}

// --- DONNÉES DÉRIVÉES DE LA CHAÎNE ---

/// Solde d'un compte de token détenu par un pool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolBalance {
    pub mint: Pubkey,
    pub ui_amount: f64,
}

// --- PROTOCOLE SORTANT : relais temps réel ---

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValuedLeg {
    #[serde(serialize_with = "pubkey_to_string")]
    pub mint: Pubkey,
    pub amount: f64,
    pub usd_value: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolResult {
    #[serde(rename = "address", serialize_with = "pubkey_to_string")]
    pub pool_address: Pubkey,
    pub pair: String,
    pub protocol: String,
    pub token_a: ValuedLeg,
    pub token_b: ValuedLeg,
    pub block_timestamp: DateTime<Utc>,
}

/// Résultats d'un trade, indexés par adresse de pool (base58).
pub type TradeResults = BTreeMap<String, PoolResult>;
