//! One-time passcode generation and delivery.
//!
//! Codes are not stored here; callers track expiry themselves.

use rand::Rng;

use crate::mailer::{DeliveryResult, FallbackTransport, Mailer, PrimaryProvider};

/// Validity window stated in every OTP email.
pub const OTP_VALIDITY_MINUTES: u32 = 5;

/// Uniformly random code in `100000..=999999`, so always exactly six digits.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}

/// What the code is for; selects the email template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OtpPurpose {
    #[default]
    Verification,
    PasswordReset,
}

impl From<bool> for OtpPurpose {
    fn from(is_password_reset: bool) -> Self {
        if is_password_reset {
            OtpPurpose::PasswordReset
        } else {
            OtpPurpose::Verification
        }
    }
}

impl OtpPurpose {
    pub fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::Verification => "Verify your email address",
            OtpPurpose::PasswordReset => "Reset your password",
        }
    }

    pub fn body(&self, otp: &str) -> String {
        match self {
            OtpPurpose::Verification => format!(
                "Your verification code is {}. It expires in {} minutes.",
                otp, OTP_VALIDITY_MINUTES
            ),
            OtpPurpose::PasswordReset => format!(
                "Your password reset code is {}. It expires in {} minutes. \
                 If you did not request a password reset, you can ignore this email.",
                otp, OTP_VALIDITY_MINUTES
            ),
        }
    }
}

impl<P: PrimaryProvider, F: FallbackTransport> Mailer<P, F> {
    /// Sends `otp` using the verification or password reset template.
    #[tracing::instrument(skip(self, otp))]
    pub async fn send_otp_email(
        &self,
        email: &str,
        otp: &str,
        purpose: impl Into<OtpPurpose> + std::fmt::Debug,
    ) -> DeliveryResult {
        let purpose = purpose.into();
        self.send_email(email, purpose.subject(), &purpose.body(otp), None)
            .await
    }
}
