//! SMTP fallback transport using lettre.
//!
//! A transport is built for every send; nothing is pooled between calls.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use log::debug;
use std::time::Duration;

use super::{FallbackTransport, Message, SMTP_NOT_CONFIGURED, SenderIdentity};
use crate::config::SmtpConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Where to connect and how to secure the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
    /// Implicit TLS from the first byte; otherwise STARTTLS if the server offers it.
    pub implicit_tls: bool,
}

impl SmtpEndpoint {
    fn new(host: &str, port: u16, implicit_tls: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            implicit_tls,
        }
    }
}

/// Resolves a well-known service name (case and whitespace insensitive).
pub fn named_service(name: &str) -> Option<SmtpEndpoint> {
    let key: String = name
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let endpoint = match key.as_str() {
        "gmail" | "googlemail" => SmtpEndpoint::new("smtp.gmail.com", 465, true),
        "outlook" | "hotmail" | "outlook.com" => {
            SmtpEndpoint::new("smtp-mail.outlook.com", 587, false)
        }
        "office365" => SmtpEndpoint::new("smtp.office365.com", 587, false),
        "yahoo" => SmtpEndpoint::new("smtp.mail.yahoo.com", 465, true),
        "icloud" => SmtpEndpoint::new("smtp.mail.me.com", 587, false),
        "zoho" => SmtpEndpoint::new("smtp.zoho.com", 465, true),
        "brevo" | "sendinblue" => SmtpEndpoint::new("smtp-relay.brevo.com", 587, false),
        _ => return None,
    };
    Some(endpoint)
}

/// Sends directly over SMTP with user/password authentication.
#[derive(Debug, Clone)]
pub struct SmtpFallback {
    config: SmtpConfig,
    timeout: Duration,
}

impl SmtpFallback {
    pub fn new(config: SmtpConfig) -> Self {
        Self {
            config,
            timeout: SMTP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The explicit host when one is configured, the named service otherwise.
    pub fn endpoint(&self) -> Result<SmtpEndpoint> {
        if let Some(host) = self.config.host() {
            return Ok(SmtpEndpoint::new(host, self.config.port, self.config.secure));
        }
        named_service(&self.config.service)
            .ok_or_else(|| anyhow!("Unknown SMTP service '{}'", self.config.service))
    }

    fn transport(&self, user: &str, password: &str) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let endpoint = self.endpoint()?;
        debug!(
            "SMTP endpoint {}:{} (implicit TLS: {})",
            endpoint.host, endpoint.port, endpoint.implicit_tls
        );

        let builder = if endpoint.implicit_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)
                .with_context(|| format!("Invalid SMTP host '{}'", endpoint.host))?
        } else {
            // Upgrade with STARTTLS when offered, stay plain for local relays.
            let tls = TlsParameters::new(endpoint.host.clone())
                .with_context(|| format!("Invalid SMTP host '{}'", endpoint.host))?;
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&endpoint.host)
                .tls(Tls::Opportunistic(tls))
        };

        Ok(builder
            .port(endpoint.port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(self.timeout))
            .build())
    }
}

fn build_email(message: &Message, sender: &SenderIdentity) -> Result<lettre::Message> {
    let from_address: Address = sender
        .email
        .parse()
        .with_context(|| format!("Invalid sender address '{}'", sender.email))?;
    let from_name = Some(sender.name.clone()).filter(|n| !n.is_empty());
    let to: Mailbox = message
        .to()
        .parse()
        .with_context(|| format!("Invalid recipient address '{}'", message.to()))?;

    lettre::Message::builder()
        .from(Mailbox::new(from_name, from_address))
        .to(to)
        .subject(message.subject())
        .message_id(None)
        .multipart(MultiPart::alternative_plain_html(
            message.text().to_string(),
            message.html(),
        ))
        .context("Failed to build email")
}

#[async_trait]
impl FallbackTransport for SmtpFallback {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    #[tracing::instrument(skip(self, message, sender))]
    async fn send(&self, message: &Message, sender: &SenderIdentity) -> Result<Option<String>> {
        let (user, password) = self
            .config
            .credentials()
            .ok_or_else(|| anyhow!(SMTP_NOT_CONFIGURED))?;

        let email = build_email(message, sender)?;
        let message_id = email.headers().get_raw("Message-ID").map(str::to_string);

        let response = self
            .transport(user, password)?
            .send(email)
            .await
            .context("SMTP delivery failed")?;

        Ok(message_id.or_else(|| response.message().next().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> SmtpConfig {
        SmtpConfig {
            user: Some("me@gmail.com".to_string()),
            password: Some("app-password".to_string()),
            ..SmtpConfig::default()
        }
    }

    fn message() -> Message {
        Message::new("user@example.com", "Your code", "123456", None)
    }

    #[test]
    fn test_default_service_is_gmail() {
        let endpoint = SmtpFallback::new(configured()).endpoint().unwrap();
        assert_eq!(endpoint, SmtpEndpoint::new("smtp.gmail.com", 465, true));
    }

    #[test]
    fn test_explicit_host_wins_over_service() {
        let fallback = SmtpFallback::new(SmtpConfig {
            host: Some("mail.example.com".to_string()),
            port: 2525,
            secure: false,
            service: "yahoo".to_string(),
            ..configured()
        });
        assert_eq!(
            fallback.endpoint().unwrap(),
            SmtpEndpoint::new("mail.example.com", 2525, false)
        );
    }

    #[test]
    fn test_named_service_lookup() {
        assert_eq!(named_service("Outlook").unwrap().port, 587);
        assert_eq!(
            named_service(" SendinBlue ").unwrap().host,
            "smtp-relay.brevo.com"
        );
        assert!(named_service("carrier-pigeon").is_none());
    }

    #[test]
    fn test_unknown_service_is_an_error() {
        let fallback = SmtpFallback::new(SmtpConfig {
            service: "carrier-pigeon".to_string(),
            ..configured()
        });
        let err = fallback.endpoint().unwrap_err();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    fn test_is_configured_requires_both_credentials() {
        assert!(SmtpFallback::new(configured()).is_configured());
        assert!(
            !SmtpFallback::new(SmtpConfig {
                password: None,
                ..configured()
            })
            .is_configured()
        );
    }

    #[test]
    fn test_build_email_sets_headers() {
        let sender = SenderIdentity {
            name: "Acme".to_string(),
            email: "hello@acme.test".to_string(),
        };
        let email = build_email(&message(), &sender).unwrap();
        let headers = email.headers();

        assert_eq!(headers.get_raw("Subject"), Some("Your code"));
        assert!(headers.get_raw("From").unwrap().contains("hello@acme.test"));
        assert!(headers.get_raw("To").unwrap().contains("user@example.com"));
        assert!(headers.get_raw("Message-ID").is_some());

        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("<p>123456</p>"));
    }

    #[test]
    fn test_build_email_rejects_bad_recipient() {
        let bad = Message::new("not-an-address", "Hi", "text", None);
        let err = build_email(&bad, &SenderIdentity::default()).unwrap_err();
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn test_send_without_credentials() {
        let fallback = SmtpFallback::new(SmtpConfig::default());
        let err = fallback
            .send(&message(), &SenderIdentity::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), SMTP_NOT_CONFIGURED);
    }

    #[tokio::test]
    async fn test_send_reports_connection_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let fallback = SmtpFallback::new(SmtpConfig {
            host: Some("localhost".to_string()),
            port,
            ..configured()
        })
        .with_timeout(Duration::from_secs(2));

        let err = fallback
            .send(&message(), &SenderIdentity::default())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("SMTP delivery failed"));
    }

    #[tokio::test]
    async fn test_send_over_plain_relay_without_starttls() {
        let (port, server) = crate::test_utils::spawn_smtp_server().await;

        let fallback = SmtpFallback::new(SmtpConfig {
            host: Some("127.0.0.1".to_string()),
            port,
            secure: false,
            ..configured()
        })
        .with_timeout(Duration::from_secs(5));

        let id = fallback
            .send(&message(), &SenderIdentity::default())
            .await
            .unwrap()
            .unwrap();
        assert!(id.starts_with('<'), "unexpected message id {}", id);

        let data = server.await.unwrap();
        assert!(data.contains("Subject: Your code"));
        assert!(data.contains(&id));
    }
}
