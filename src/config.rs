//! Mailer configuration.
//!
//! Every field can be given on the command line or through the environment.
//! Absent values are not errors:
//!
//! - no API key: the HTTP provider is skipped and SMTP is tried directly
//! - no SMTP user/password: the fallback reports a failure instead of sending
//! - no SMTP host: the named service shorthand (default `gmail`) is used

use anyhow::Result;
use clap::{ArgAction, Args, Parser, builder::FalseyValueParser};
use std::time::Duration;

use crate::http::{DEFAULT_BASE_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS, RetryPolicy};
use crate::mailer::{DEFAULT_SENDER_EMAIL, DEFAULT_SENDER_NAME, SenderIdentity};

/// Brevo transactional email endpoint.
pub const DEFAULT_API_URL: &str = "https://api.brevo.com/v3/smtp/email";

/// Per-request timeout for the HTTP provider.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

pub const DEFAULT_SMTP_PORT: u16 = 587;

pub const DEFAULT_SMTP_SERVICE: &str = "gmail";

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct MailerConfig {
    #[command(flatten)]
    pub api: ApiConfig,

    #[command(flatten)]
    pub smtp: SmtpConfig,

    #[command(flatten)]
    pub sender: SenderConfig,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct EnvOnly {
    #[command(flatten)]
    config: MailerConfig,
}

impl MailerConfig {
    /// Reads the configuration from environment variables only.
    pub fn from_env() -> Result<Self> {
        Ok(EnvOnly::try_parse_from(std::iter::empty::<String>())?.config)
    }
}

/// Primary HTTP provider settings.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Primary provider endpoint
    #[arg(
        long = "api-url",
        env = "BREVO_API_URL",
        value_name = "URL",
        default_value = DEFAULT_API_URL,
        global = true
    )]
    pub url: String,

    /// Primary provider API key (the provider is skipped when unset)
    #[arg(
        long = "api-key",
        env = "BREVO_API_KEY",
        value_name = "KEY",
        hide_env_values = true,
        global = true
    )]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds
    #[arg(
        long = "timeout-ms",
        env = "MAILER_TIMEOUT_MS",
        default_value_t = DEFAULT_TIMEOUT_MS,
        global = true
    )]
    pub timeout_ms: u64,

    /// Maximum number of attempts against the provider
    #[arg(
        long = "max-attempts",
        env = "MAILER_MAX_ATTEMPTS",
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        global = true
    )]
    pub max_attempts: usize,

    /// Base backoff in milliseconds, doubled after each failed attempt
    #[arg(
        long = "backoff-ms",
        env = "MAILER_BACKOFF_MS",
        default_value_t = DEFAULT_BASE_BACKOFF_MS,
        global = true
    )]
    pub backoff_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            api_key: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_ms: DEFAULT_BASE_BACKOFF_MS,
        }
    }
}

impl ApiConfig {
    /// The API key, treating an empty value as unset.
    pub fn api_key(&self) -> Option<&str> {
        non_empty(&self.api_key)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_ms)
    }
}

/// SMTP fallback settings.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// SMTP username
    #[arg(long = "smtp-user", env = "SMTP_USER", global = true)]
    pub user: Option<String>,

    /// SMTP password
    #[arg(
        long = "smtp-pass",
        env = "SMTP_PASS",
        hide_env_values = true,
        global = true
    )]
    pub password: Option<String>,

    /// SMTP host (the named service is used when unset)
    #[arg(long = "smtp-host", env = "SMTP_HOST", global = true)]
    pub host: Option<String>,

    /// SMTP port, used with an explicit host
    #[arg(
        long = "smtp-port",
        env = "SMTP_PORT",
        default_value_t = DEFAULT_SMTP_PORT,
        global = true
    )]
    pub port: u16,

    /// Use implicit TLS instead of STARTTLS, used with an explicit host
    #[arg(
        long = "smtp-secure",
        env = "SMTP_SECURE",
        action = ArgAction::Set,
        value_parser = FalseyValueParser::new(),
        default_value_t = false,
        value_name = "BOOL",
        global = true
    )]
    pub secure: bool,

    /// Well-known mail service used when no host is given
    #[arg(
        long = "smtp-service",
        env = "SMTP_SERVICE",
        default_value = DEFAULT_SMTP_SERVICE,
        global = true
    )]
    pub service: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
            host: None,
            port: DEFAULT_SMTP_PORT,
            secure: false,
            service: DEFAULT_SMTP_SERVICE.to_string(),
        }
    }
}

impl SmtpConfig {
    /// User and password, if both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((non_empty(&self.user)?, non_empty(&self.password)?))
    }

    pub fn host(&self) -> Option<&str> {
        non_empty(&self.host)
    }
}

/// The "from" identity.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderConfig {
    /// Sender display name
    #[arg(long = "from-name", env = "EMAIL_FROM_NAME", global = true)]
    pub name: Option<String>,

    /// Sender email address
    #[arg(long = "from-email", env = "EMAIL_FROM", global = true)]
    pub email: Option<String>,
}

impl SenderConfig {
    pub fn identity(&self) -> SenderIdentity {
        SenderIdentity {
            name: non_empty(&self.name)
                .unwrap_or(DEFAULT_SENDER_NAME)
                .to_string(),
            email: non_empty(&self.email)
                .unwrap_or(DEFAULT_SENDER_EMAIL)
                .to_string(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Masks a secret for logging, keeping at most the first and last four characters.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> MailerConfig {
        EnvOnly::try_parse_from(args).unwrap().config
    }

    #[test]
    fn test_defaults() {
        let config = MailerConfig::default();
        assert_eq!(config.api.url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout(), Duration::from_secs(15));
        assert_eq!(config.api.retry_policy(), RetryPolicy::new(3, 500));
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.service, "gmail");
        assert_eq!(config.sender.identity(), SenderIdentity::default());
    }

    #[test]
    fn test_empty_api_key_counts_as_unset() {
        let api = ApiConfig {
            api_key: Some("  ".to_string()),
            ..ApiConfig::default()
        };
        assert_eq!(api.api_key(), None);
    }

    #[test]
    fn test_smtp_credentials_need_user_and_password() {
        let smtp = SmtpConfig {
            user: Some("me@gmail.com".to_string()),
            ..SmtpConfig::default()
        };
        assert_eq!(smtp.credentials(), None);

        let smtp = SmtpConfig {
            password: Some("app-password".to_string()),
            ..smtp
        };
        assert_eq!(smtp.credentials(), Some(("me@gmail.com", "app-password")));
    }

    #[test]
    fn test_parse_flags() {
        let config = parse(&[
            "--api-key",
            "xkeysib-123",
            "--smtp-host",
            "mail.example.com",
            "--smtp-port",
            "465",
            "--smtp-secure",
            "true",
            "--from-name",
            "Acme",
            "--from-email",
            "hello@acme.test",
        ]);
        assert_eq!(config.api.api_key(), Some("xkeysib-123"));
        assert_eq!(config.smtp.host(), Some("mail.example.com"));
        assert_eq!(config.smtp.port, 465);
        assert!(config.smtp.secure);
        assert_eq!(config.sender.identity().name, "Acme");
        assert_eq!(config.sender.identity().email, "hello@acme.test");
    }

    #[test]
    fn test_smtp_secure_accepts_common_spellings() {
        for value in ["true", "TRUE", "1", "yes", "on"] {
            let config = parse(&["--smtp-secure", value]);
            assert!(config.smtp.secure, "{} should enable implicit TLS", value);
        }
        for value in ["false", "FALSE", "0", "no", "off"] {
            let config = parse(&["--smtp-secure", value]);
            assert!(!config.smtp.secure, "{} should disable implicit TLS", value);
        }
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(
            mask_secret("xkeysib-0123456789abcdef"),
            "xkey*********cdef"
        );
    }
}
