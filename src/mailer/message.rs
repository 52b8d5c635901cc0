//! Message, sender identity and delivery result types.

use serde_json::{Value, json};
use std::fmt;

/// Display name used when `EMAIL_FROM_NAME` is not set.
pub const DEFAULT_SENDER_NAME: &str = "Support";

/// Address used when `EMAIL_FROM` is not set.
pub const DEFAULT_SENDER_EMAIL: &str = "no-reply@example.com";

/// An outgoing email. Built once per send and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    to: String,
    subject: String,
    text: String,
    html: Option<String>,
}

impl Message {
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        text: impl Into<String>,
        html: Option<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            text: text.into(),
            html,
        }
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The HTML body, or the text body wrapped in a single paragraph.
    pub fn html(&self) -> String {
        match self.html.as_deref().filter(|html| !html.trim().is_empty()) {
            Some(html) => html.to_string(),
            None => format!("<p>{}</p>", self.text),
        }
    }
}

/// The "from" of every message sent by a [`Mailer`](super::Mailer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub name: String,
    pub email: String,
}

impl Default for SenderIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_SENDER_NAME.to_string(),
            email: DEFAULT_SENDER_EMAIL.to_string(),
        }
    }
}

impl fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Final outcome of a send. There is no partial success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Sent { message_id: Option<String> },
    Failed { error: String },
}

impl DeliveryResult {
    pub fn sent(message_id: Option<String>) -> Self {
        DeliveryResult::Sent { message_id }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        DeliveryResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryResult::Sent { .. })
    }

    pub fn message_id(&self) -> Option<&str> {
        match self {
            DeliveryResult::Sent { message_id } => message_id.as_deref(),
            DeliveryResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DeliveryResult::Sent { .. } => None,
            DeliveryResult::Failed { error } => Some(error),
        }
    }

    /// `{"success": true, "messageId": ...}` or `{"success": false, "error": ...}`.
    pub fn to_json(&self) -> Value {
        match self {
            DeliveryResult::Sent { message_id } => {
                json!({ "success": true, "messageId": message_id })
            }
            DeliveryResult::Failed { error } => json!({ "success": false, "error": error }),
        }
    }
}
