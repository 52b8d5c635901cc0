//! Brevo transactional email API provider.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use log::debug;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Message, PrimaryProvider, SenderIdentity};
use crate::config::{ApiConfig, mask_secret};
use crate::http::{HttpClient, RetryPolicy};

const API_KEY_HEADER: &str = "api-key";

/// Sends mail through `POST /v3/smtp/email`.
#[derive(Debug, Clone)]
pub struct BrevoProvider {
    http: HttpClient,
    url: String,
    api_key: Option<String>,
    timeout: Duration,
    policy: RetryPolicy,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    sender: Contact<'a>,
    to: Vec<Recipient<'a>>,
    subject: &'a str,
    text_content: &'a str,
    html_content: String,
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    email: &'a str,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SendEmailResponse {
    #[serde(default)]
    message_id: Option<String>,
}

impl BrevoProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            url: config.url.clone(),
            api_key: config.api_key().map(str::to_string),
            timeout: config.timeout(),
            policy: config.retry_policy(),
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("otpmail/", env!("OTPMAIL_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(HttpClient::new(client), config))
    }

    fn headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).context("Invalid API key")?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// Extracts `messageId` from a success body. An empty or unexpected body
/// still counts as a delivered message, just without an identifier.
fn parse_message_id(body: &str) -> Option<String> {
    serde_json::from_str::<SendEmailResponse>(body)
        .unwrap_or_default()
        .message_id
}

#[async_trait]
impl PrimaryProvider for BrevoProvider {
    fn name(&self) -> &'static str {
        "brevo"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[tracing::instrument(skip(self, message, sender))]
    async fn send(&self, message: &Message, sender: &SenderIdentity) -> Result<Option<String>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("Brevo API key not configured");
        };
        debug!("Sending via Brevo with API key {}", mask_secret(api_key));

        let payload = SendEmailRequest {
            sender: Contact {
                email: &sender.email,
                name: &sender.name,
            },
            to: vec![Recipient {
                email: message.to(),
            }],
            subject: message.subject(),
            text_content: message.text(),
            html_content: message.html(),
        };

        let body = self
            .http
            .post_json(
                &self.url,
                &payload,
                &Self::headers(api_key)?,
                self.timeout,
                self.policy,
            )
            .await?;

        Ok(parse_message_id(&body))
    }
}
