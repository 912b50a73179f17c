use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ports::notify::{Notifier, NotifyError};

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Alert delivery over the Telegram Bot API `sendMessage` endpoint.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    bot_token: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(api_url: String, bot_token: String, timeout: Duration) -> Result<Self, NotifyError> {
        if bot_token.is_empty() {
            return Err(NotifyError::Config("empty bot token".to_string()));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(Self {
            http,
            api_url,
            bot_token,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.to_string()))?;

        let status = response.status();
        let body: SendMessageResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Http(format!("status {}: {}", status, e)))?;

        if !body.ok {
            return Err(NotifyError::Rejected(
                body.description
                    .unwrap_or_else(|| format!("status {}", status)),
            ));
        }
        Ok(())
    }
}
