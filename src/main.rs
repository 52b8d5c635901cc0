use anyhow::{Result, bail};
use clap::Parser;
use otpmail::{DeliveryResult, Mailer, MailerConfig, OtpPurpose, generate_otp};

/// otpmail - transactional email with SMTP fallback
///
/// Sends through the Brevo API when BREVO_API_KEY is set and falls back to
/// SMTP (SMTP_USER / SMTP_PASS) when it is not, or when the API fails.
///
/// Examples:
///   otpmail otp --to user@example.com           # Send a fresh verification code
///   otpmail otp --to user@example.com --reset   # Send a password reset code
#[derive(Parser, Debug)]
#[command(author, version = env!("OTPMAIL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    config: MailerConfig,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Send an arbitrary email
    Send(SendArgs),

    /// Send a one-time passcode
    Otp(OtpArgs),

    /// Print a new one-time passcode
    Generate,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Recipient address
    #[arg(long, value_name = "EMAIL")]
    pub to: String,

    #[arg(long)]
    pub subject: String,

    /// Plain-text body
    #[arg(long)]
    pub text: String,

    /// HTML body (defaults to the text wrapped in <p>)
    #[arg(long)]
    pub html: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct OtpArgs {
    /// Recipient address
    #[arg(long, value_name = "EMAIL")]
    pub to: String,

    /// Use the password reset template
    #[arg(long)]
    pub reset: bool,

    /// Code to send (a new one is generated when omitted)
    #[arg(long)]
    pub code: Option<String>,
}

fn report(result: DeliveryResult) -> Result<()> {
    println!("{}", result.to_json());
    match result {
        DeliveryResult::Sent { .. } => Ok(()),
        DeliveryResult::Failed { error } => bail!("delivery failed: {}", error),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate => {
            println!("{}", generate_otp());
            Ok(())
        }
        Commands::Send(args) => {
            let mailer = Mailer::from_config(&cli.config)?;
            let result = mailer
                .send_email(&args.to, &args.subject, &args.text, args.html.as_deref())
                .await;
            report(result)
        }
        Commands::Otp(args) => {
            let mailer = Mailer::from_config(&cli.config)?;
            let code = args.code.unwrap_or_else(generate_otp);
            eprintln!("OTP: {}", code);
            let result = mailer
                .send_otp_email(&args.to, &code, OtpPurpose::from(args.reset))
                .await;
            report(result)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_send_parsing() {
        let cli = Cli::try_parse_from([
            "otpmail",
            "send",
            "--to",
            "user@example.com",
            "--subject",
            "Hi",
            "--text",
            "Hello",
        ])
        .unwrap();
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.to, "user@example.com");
                assert_eq!(args.html, None);
            }
            _ => panic!("Expected Send command"),
        }
    }

    #[test]
    fn test_cli_otp_parsing() {
        let cli = Cli::try_parse_from([
            "otpmail",
            "otp",
            "--to",
            "user@example.com",
            "--reset",
            "--code",
            "123456",
        ])
        .unwrap();
        match cli.command {
            Commands::Otp(args) => {
                assert!(args.reset);
                assert_eq!(args.code.as_deref(), Some("123456"));
            }
            _ => panic!("Expected Otp command"),
        }
    }

    #[test]
    fn test_cli_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "otpmail",
            "generate",
            "--api-url",
            "http://localhost:1234",
            "--max-attempts",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.config.api.url, "http://localhost:1234");
        assert_eq!(cli.config.api.max_attempts, 5);
    }

    #[test]
    fn test_cli_send_requires_recipient() {
        let result = Cli::try_parse_from(["otpmail", "send", "--subject", "Hi", "--text", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        assert!(Cli::try_parse_from(["otpmail"]).is_err());
    }
}
