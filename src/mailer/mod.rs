//! Email delivery through a primary HTTP provider with an SMTP fallback.
//!
//! # Structure
//!
//! - `message` - Message, sender identity and the caller-facing result
//! - `outcome` - The two-stage outcome and its reduction to a result
//! - `brevo` - Primary provider (Brevo HTTP API)
//! - `smtp` - Fallback transport (lettre)

mod brevo;
mod message;
mod outcome;
mod smtp;

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info, warn};

pub use brevo::BrevoProvider;
pub use message::{
    DEFAULT_SENDER_EMAIL, DEFAULT_SENDER_NAME, DeliveryResult, Message, SenderIdentity,
};
pub use outcome::{
    DeliveryOutcome, FallbackError, PrimaryStage, SMTP_NOT_CONFIGURED, failure_message,
};
pub use smtp::{SmtpEndpoint, SmtpFallback, named_service};

use crate::config::MailerConfig;

/// First delivery attempt, retried internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimaryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// When false the provider is skipped without any network call.
    fn is_configured(&self) -> bool;

    /// Returns the provider's message identifier, if it reported one.
    async fn send(&self, message: &Message, sender: &SenderIdentity) -> Result<Option<String>>;
}

/// Delivery path used when the primary provider is unavailable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FallbackTransport: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    async fn send(&self, message: &Message, sender: &SenderIdentity) -> Result<Option<String>>;
}

pub struct Mailer<P: PrimaryProvider, F: FallbackTransport> {
    primary: P,
    fallback: F,
    sender: SenderIdentity,
}

impl Mailer<BrevoProvider, SmtpFallback> {
    pub fn from_config(config: &MailerConfig) -> Result<Self> {
        Ok(Self::new(
            BrevoProvider::from_config(&config.api)?,
            SmtpFallback::new(config.smtp.clone()),
            config.sender.identity(),
        ))
    }
}

impl<P: PrimaryProvider, F: FallbackTransport> Mailer<P, F> {
    pub fn new(primary: P, fallback: F, sender: SenderIdentity) -> Self {
        Self {
            primary,
            fallback,
            sender,
        }
    }

    pub fn sender(&self) -> &SenderIdentity {
        &self.sender
    }

    /// Sends a message. Never fails: every error ends up in the result.
    ///
    /// Without `html` the text body is wrapped in `<p>...</p>`.
    #[tracing::instrument(skip(self, text, html))]
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> DeliveryResult {
        let message = Message::new(to, subject, text, html.map(str::to_string));
        self.deliver(&message).await.into_result()
    }

    /// Runs both stages and reports where the message went.
    pub async fn deliver(&self, message: &Message) -> DeliveryOutcome {
        let primary_error = match self.try_primary(message).await {
            PrimaryStage::Delivered(message_id) => {
                return DeliveryOutcome::Primary { message_id };
            }
            PrimaryStage::Skipped => None,
            PrimaryStage::Failed(e) => Some(e),
        };

        match self.try_fallback(message).await {
            Ok(message_id) => DeliveryOutcome::Fallback {
                message_id,
                primary_error,
            },
            Err(fallback_error) => {
                error!(
                    "Email to {} could not be delivered: {}",
                    message.to(),
                    failure_message(primary_error.as_deref(), &fallback_error)
                );
                DeliveryOutcome::BothFailed {
                    primary_error,
                    fallback_error,
                }
            }
        }
    }

    async fn try_primary(&self, message: &Message) -> PrimaryStage {
        if !self.primary.is_configured() {
            info!(
                "{} not configured, using {} directly",
                self.primary.name(),
                self.fallback.name()
            );
            return PrimaryStage::Skipped;
        }

        match self.primary.send(message, &self.sender).await {
            Ok(message_id) => {
                info!("Email to {} sent via {}", message.to(), self.primary.name());
                PrimaryStage::Delivered(message_id)
            }
            Err(e) => {
                warn!(
                    "{} failed for {}, falling back to {}: {:#}",
                    self.primary.name(),
                    message.to(),
                    self.fallback.name(),
                    e
                );
                PrimaryStage::Failed(format!("{:#}", e))
            }
        }
    }

    async fn try_fallback(&self, message: &Message) -> Result<Option<String>, FallbackError> {
        if !self.fallback.is_configured() {
            return Err(FallbackError::NotConfigured);
        }

        match self.fallback.send(message, &self.sender).await {
            Ok(message_id) => {
                info!("Email to {} sent via {}", message.to(), self.fallback.name());
                Ok(message_id)
            }
            Err(e) => Err(FallbackError::Transport(format!("{:#}", e))),
        }
    }
}
