//! WhatsApp delivery through the Twilio Messages API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::channels::Notifier;
use crate::error::NotifyError;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio rejects WhatsApp bodies longer than this many characters.
const WHATSAPP_MAX_MESSAGE_CHARS: usize = 1600;

/// Twilio account and addressing.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender number, without the `whatsapp:` prefix.
    pub from_number: String,
    /// Recipient number, without the `whatsapp:` prefix.
    pub to_number: String,
}

/// Sends alerts as WhatsApp messages.
pub struct WhatsAppNotifier {
    config: WhatsAppConfig,
    api_base: String,
    client: reqwest::Client,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            api_base: TWILIO_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different API root (e.g. a local stub server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        )
    }

    async fn send_chunk(&self, text: &str) -> Result<(), NotifyError> {
        let form = [
            ("From", whatsapp_address(&self.config.from_number)),
            ("To", whatsapp_address(&self.config.to_number)),
            ("Body", text.to_string()),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                channel: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                channel: "whatsapp".into(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &str {
        "whatsapp"
    }

    /// Fails only if the first chunk is rejected. Later chunk failures are logged.
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let chunks = split_message(text, WHATSAPP_MAX_MESSAGE_CHARS);
        let total = chunks.len();
        let mut chunks = chunks.into_iter();

        if let Some(first) = chunks.next() {
            self.send_chunk(&first).await?;
        }
        for (i, chunk) in chunks.enumerate() {
            if let Err(e) = self.send_chunk(&chunk).await {
                tracing::warn!(part = i + 2, total, error = %e, "WhatsApp alert continuation lost");
            }
        }
        tracing::info!(to = %self.config.to_number, parts = total, "WhatsApp alert sent");
        Ok(())
    }
}

/// Prefix a phone number with `whatsapp:` unless already present.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

/// Split text into chunks of at most `max_chars` characters, preferring
/// newline then space boundaries.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.chars().count() <= max_chars {
            chunks.push(remaining.to_string());
            break;
        }

        let limit = remaining
            .char_indices()
            .nth(max_chars)
            .map_or(remaining.len(), |(i, _)| i);
        let chunk = &remaining[..limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
