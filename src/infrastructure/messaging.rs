//! Outbound WhatsApp messages through the messaging provider's REST API.

use crate::infrastructure::config::{AppConfig, MessagingConfig};
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::{debug, error};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

const WHATSAPP_PREFIX: &str = "whatsapp:";

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("messaging provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid template variables: {0}")]
    Variables(#[from] serde_json::Error),
}

/// Strips the channel prefix from a provider address (`whatsapp:+34600…` → `+34600…`).
pub fn user_id_from_address(address: &str) -> &str {
    address
        .trim()
        .strip_prefix(WHATSAPP_PREFIX)
        .unwrap_or(address.trim())
}

pub fn whatsapp_address(phone: &str) -> String {
    let phone = phone.trim();
    if phone.starts_with(WHATSAPP_PREFIX) {
        phone.to_owned()
    } else {
        format!("{WHATSAPP_PREFIX}{phone}")
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends a free-form text. Returns the provider's message id.
    async fn send_text(&self, to: &str, body: &str) -> Result<String, MessagingError>;

    /// Sends a pre-approved template with its numbered variables.
    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, MessagingError>;
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    sid: String,
}

pub struct TwilioMessenger {
    client: reqwest::Client,
    config: MessagingConfig,
}

#[injectable(Messenger)]
impl TwilioMessenger {
    #[inject]
    pub fn create(config: Ref<AppConfig>) -> TwilioMessenger {
        TwilioMessenger::new(config.messaging.clone())
    }
}

impl TwilioMessenger {
    pub fn new(config: MessagingConfig) -> TwilioMessenger {
        TwilioMessenger {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    async fn post(&self, form: &[(&str, &str)]) -> Result<String, MessagingError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("messaging provider answered {status}: {body}");
            return Err(MessagingError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SentMessage = response.json().await?;
        debug!("message {} accepted by provider", sent.sid);
        Ok(sent.sid)
    }
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send_text(&self, to: &str, body: &str) -> Result<String, MessagingError> {
        let from = whatsapp_address(&self.config.whatsapp_from);
        let to = whatsapp_address(to);

        self.post(&[("From", from.as_str()), ("To", to.as_str()), ("Body", body)])
            .await
    }

    async fn send_template(
        &self,
        to: &str,
        content_sid: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<String, MessagingError> {
        let from = whatsapp_address(&self.config.whatsapp_from);
        let to = whatsapp_address(to);
        let variables = serde_json::to_string(variables)?;

        self.post(&[
            ("From", from.as_str()),
            ("To", to.as_str()),
            ("ContentSid", content_sid),
            ("ContentVariables", variables.as_str()),
        ])
        .await
    }
}
