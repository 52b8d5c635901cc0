//! Two-stage delivery outcome and its reduction to a [`DeliveryResult`].

use std::fmt;

use super::DeliveryResult;

/// Reported when the fallback has no user/password.
pub const SMTP_NOT_CONFIGURED: &str = "SMTP credentials not configured";

/// Last-resort message; a failed result never carries an empty error.
const DELIVERY_FAILED: &str = "Email delivery failed";

/// Result of the primary provider stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryStage {
    Delivered(Option<String>),
    /// No API key; the HTTP provider was never called.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    NotConfigured,
    Transport(String),
}

impl fmt::Display for FallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackError::NotConfigured => write!(f, "{}", SMTP_NOT_CONFIGURED),
            FallbackError::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

/// Where a message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Primary {
        message_id: Option<String>,
    },
    Fallback {
        message_id: Option<String>,
        /// `None` when the primary provider was skipped.
        primary_error: Option<String>,
    },
    BothFailed {
        primary_error: Option<String>,
        fallback_error: FallbackError,
    },
}

impl DeliveryOutcome {
    pub fn into_result(self) -> DeliveryResult {
        match self {
            DeliveryOutcome::Primary { message_id }
            | DeliveryOutcome::Fallback { message_id, .. } => DeliveryResult::sent(message_id),
            DeliveryOutcome::BothFailed {
                primary_error,
                fallback_error,
            } => DeliveryResult::failed(failure_message(
                primary_error.as_deref(),
                &fallback_error,
            )),
        }
    }
}

/// The SMTP error wins when it has text. The primary error is only used
/// when the SMTP error is blank, or appended when SMTP was never configured.
pub fn failure_message(primary_error: Option<&str>, fallback_error: &FallbackError) -> String {
    let primary_error = primary_error.map(str::trim).filter(|e| !e.is_empty());

    match fallback_error {
        FallbackError::NotConfigured => match primary_error {
            Some(primary) => format!(
                "{} (primary provider failed: {})",
                SMTP_NOT_CONFIGURED, primary
            ),
            None => SMTP_NOT_CONFIGURED.to_string(),
        },
        FallbackError::Transport(smtp) if !smtp.trim().is_empty() => smtp.clone(),
        FallbackError::Transport(_) => primary_error.unwrap_or(DELIVERY_FAILED).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_success() {
        let result = DeliveryOutcome::Primary {
            message_id: Some("<id@brevo>".to_string()),
        }
        .into_result();
        assert_eq!(result, DeliveryResult::sent(Some("<id@brevo>".to_string())));
    }

    #[test]
    fn test_fallback_success_drops_primary_error() {
        let result = DeliveryOutcome::Fallback {
            message_id: None,
            primary_error: Some("HTTP 401".to_string()),
        }
        .into_result();
        assert_eq!(result, DeliveryResult::sent(None));
    }

    #[test]
    fn test_not_configured_without_primary_attempt() {
        assert_eq!(
            failure_message(None, &FallbackError::NotConfigured),
            "SMTP credentials not configured"
        );
    }

    #[test]
    fn test_not_configured_after_primary_failure() {
        let msg = failure_message(Some("HTTP 503"), &FallbackError::NotConfigured);
        assert!(msg.starts_with(SMTP_NOT_CONFIGURED));
        assert!(msg.contains("HTTP 503"));
    }

    #[test]
    fn test_smtp_error_preferred() {
        let msg = failure_message(
            Some("HTTP 500"),
            &FallbackError::Transport("535 authentication failed".to_string()),
        );
        assert_eq!(msg, "535 authentication failed");
    }

    #[test]
    fn test_primary_error_used_when_smtp_error_blank() {
        let msg = failure_message(Some("HTTP 500"), &FallbackError::Transport(" ".to_string()));
        assert_eq!(msg, "HTTP 500");
    }

    #[test]
    fn test_never_empty() {
        let msg = failure_message(Some(""), &FallbackError::Transport(String::new()));
        assert!(!msg.is_empty());
    }
}
