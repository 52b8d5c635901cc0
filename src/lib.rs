pub mod config;
pub mod http;
pub mod mailer;
pub mod otp;

pub use config::MailerConfig;
pub use mailer::{DeliveryResult, Mailer};
pub use otp::{OtpPurpose, generate_otp};
