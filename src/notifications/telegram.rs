// DANS : src/notifications/telegram.rs

use super::NotificationSink;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Publie les messages HTML dans un canal public (`@canal`).
pub struct TelegramNotifier {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, channel: &str) -> Self {
        let chat_id = if channel.starts_with('@') || channel.starts_with('-') {
            channel.to_string()
        } else {
            format!("@{}", channel)
        };
        Self {
            client: reqwest::Client::new(),
            bot_token: bot_token.to_string(),
            chat_id,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest { chat_id: &self.chat_id, text: message, parse_mode: "HTML" })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Erreur API Telegram: {} - {}", status, body));
        }

        debug!(length = message.len(), chat_id = %self.chat_id, "Message Telegram envoyé");
        Ok(())
    }
}
