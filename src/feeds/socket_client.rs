// DANS : src/feeds/socket_client.rs

use crate::filtering::TradeDispatcher;
use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const TOKEN_TTL_SECS: i64 = 60 * 60;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct AuthClaims {
    iat: i64,
    exp: i64,
}

/// Jeton HS256 sans revendication métier, valable une heure.
pub fn generate_token(key: &str) -> Result<String> {
    let iat = chrono::Utc::now().timestamp();
    let claims = AuthClaims { iat, exp: iat + TOKEN_TTL_SECS };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(key.as_bytes()))
        .context("Signature du jeton d'authentification impossible")
}

/// `https://host` -> `wss://host/socket.io/?EIO=4&transport=websocket`
pub fn socket_io_url(server_url: &str) -> Result<String> {
    let trimmed = server_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed
        .split_once("://")
        .ok_or_else(|| anyhow!("SERVER_URL sans schéma: {}", server_url))?;
    let ws_scheme = match scheme {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(anyhow!("Schéma non supporté pour SERVER_URL: {}", other)),
    };
    Ok(format!("{}://{}/socket.io/?EIO=4&transport=websocket", ws_scheme, rest))
}

fn connect_packet(token: &str) -> String {
    format!("40{}", serde_json::json!({ "token": token }))
}

/// Paquets Engine.IO v4 / Socket.IO v5 utiles au client.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open,
    Close,
    Ping,
    Connected,
    ConnectError(String),
    Disconnected,
    Event { name: String, args: Vec<Value> },
    Other,
}

pub fn parse_packet(text: &str) -> Packet {
    let mut chars = text.chars();
    match chars.next() {
        Some('0') => Packet::Open,
        Some('1') => Packet::Close,
        Some('2') => Packet::Ping,
        Some('4') => parse_socket_packet(chars.as_str()),
        _ => Packet::Other,
    }
}

fn parse_socket_packet(body: &str) -> Packet {
    let mut chars = body.chars();
    let kind = chars.next();
    let mut rest = chars.as_str();

    // Namespace éventuel : "/admin,"
    if rest.starts_with('/') {
        rest = rest.split_once(',').map(|(_, tail)| tail).unwrap_or("");
    }

    match kind {
        Some('0') => Packet::Connected,
        Some('1') => Packet::Disconnected,
        Some('4') => Packet::ConnectError(rest.to_string()),
        Some('2') => {
            // Identifiant d'ack éventuel avant le tableau.
            let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            match serde_json::from_str::<Vec<Value>>(payload) {
                Ok(mut items) if !items.is_empty() => match items.remove(0) {
                    Value::String(name) => Packet::Event { name, args: items },
                    _ => Packet::Other,
                },
                _ => Packet::Other,
            }
        }
        _ => Packet::Other,
    }
}

pub struct SocketClient {
    server_url: String,
    key: String,
    dispatcher: Arc<TradeDispatcher>,
}

impl SocketClient {
    pub fn new(server_url: String, key: String, dispatcher: Arc<TradeDispatcher>) -> Self {
        Self { server_url, key, dispatcher }
    }

    /// Boucle de connexion permanente, délai fixe entre deux tentatives.
    pub async fn run(self) {
        loop {
            match self.session().await {
                Ok(()) => warn!("[SocketClient] Flux fermé par le serveur"),
                Err(e) => error!(error = %e, "[SocketClient] Session interrompue"),
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
            info!("[SocketClient] Reconnexion...");
        }
    }

    /// Une connexion complète, jusqu'à la déconnexion.
    pub async fn session(&self) -> Result<()> {
        let url = socket_io_url(&self.server_url)?;
        let token = generate_token(&self.key)?;

        let (stream, _) = connect_async(url.as_str())
            .await
            .with_context(|| format!("Connexion WebSocket impossible vers {}", url))?;
        info!(url = %url, "[SocketClient] ✅ Transport ouvert");
        let (mut write, mut read) = stream.split();

        while let Some(frame) = read.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            match parse_packet(&text) {
                Packet::Open => write.send(Message::Text(connect_packet(&token))).await?,
                Packet::Ping => write.send(Message::Text("3".to_string())).await?,
                Packet::Connected => info!("[SocketClient] Connecté au flux des transactions"),
                Packet::ConnectError(reason) => {
                    return Err(anyhow!("Connexion refusée par le serveur: {}", reason));
                }
                Packet::Event { name, args } if name == "tx" => {
                    for payload in args {
                        let admission = self.dispatcher.handle_payload(payload);
                        debug!(?admission, "[SocketClient] Évènement tx traité");
                    }
                }
                Packet::Event { name, .. } => debug!(event = %name, "[SocketClient] Évènement ignoré"),
                Packet::Disconnected | Packet::Close => return Ok(()),
                Packet::Other => {}
            }
        }
        Ok(())
    }
}
