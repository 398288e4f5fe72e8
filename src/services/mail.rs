//! Outbound SMTP mail. Settings always arrive as an explicit [`SmtpConfig`].

use chrono::{DateTime, Utc};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: "no-reply@trentfarmdata.org".to_string(),
        }
    }
}

impl SmtpConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP host is not configured")]
    NotConfigured,
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Subject plus plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct Mailer {
    config: SmtpConfig,
}

impl Mailer {
    #[must_use]
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// # Errors
    ///
    /// See [`send_with`].
    pub async fn send(&self, to: &str, content: &EmailContent) -> Result<(), MailError> {
        send_with(&self.config, to, content).await
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.trim().parse().map_err(|e: lettre::address::AddressError| MailError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// Builds the message and delivers it through `config`.
///
/// Port 587 negotiates STARTTLS, port 465 uses implicit TLS and any other
/// port talks plain SMTP.
///
/// # Errors
///
/// Returns [`MailError`] when SMTP is unconfigured, an address is malformed
/// or the relay rejects the message.
pub async fn send_with(
    config: &SmtpConfig,
    to: &str,
    content: &EmailContent,
) -> Result<(), MailError> {
    if !config.is_configured() {
        return Err(MailError::NotConfigured);
    }

    let message = Message::builder()
        .from(mailbox(&config.from)?)
        .to(mailbox(to)?)
        .subject(content.subject.clone())
        .multipart(MultiPart::alternative_plain_html(
            content.text.clone(),
            content.html.clone(),
        ))
        .map_err(|e| MailError::Build(e.to_string()))?;

    let host = config.host.trim();
    let builder = match config.port {
        587 => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?,
        465 => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?,
        _ => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
    }
    .port(config.port);

    let transport = if config.username.is_empty() {
        builder.build()
    } else {
        builder
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build()
    };

    transport
        .send(message)
        .await
        .map_err(|e| MailError::Transport(e.to_string()))?;

    tracing::info!(to = %to, user = %config.username, "email_sent");
    Ok(())
}

/// Verification mail. The resend variant tells the user earlier codes are void.
#[must_use]
pub fn verification_email(
    code: &str,
    expires_at: DateTime<Utc>,
    ttl_minutes: i64,
    is_resend: bool,
) -> EmailContent {
    let (subject, title, subtitle, note) = if is_resend {
        (
            "New Verification Code - Trent Farm Data",
            "New Verification Code",
            "A new verification code has been generated for your account:",
            "<div class=\"info\"><strong>Note:</strong> This is a new verification code. \
             Any previous codes are no longer valid.</div>",
        )
    } else {
        (
            "Your Verification Code - Trent Farm Data",
            "Email Verification",
            "Please use the following verification code to complete your registration:",
            "",
        )
    };

    let expires_time = expires_at.format("%H:%M:%S");
    let expires_date = expires_at.format("%B %d, %Y");

    let mut text = format!(
        "Email Verification Code\n\nYour verification code is: {code}\n\n\
         This code will expire in {ttl_minutes} minutes at {expires_time} UTC.\n"
    );
    if is_resend {
        text.push_str("\nAny previous codes are no longer valid.\n");
    }
    text.push_str("\nBest regards,\nTrent Farm Data Team");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background: #4a5bd6; color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
    .content {{ background: #f9f9f9; padding: 30px; border-radius: 0 0 10px 10px; }}
    .code {{ font-size: 32px; font-weight: bold; color: #007bff; letter-spacing: 4px; font-family: 'Courier New', monospace; text-align: center; }}
    .expiry {{ background: #fff3cd; padding: 15px; border-radius: 5px; margin: 20px 0; }}
    .info {{ background: #d1ecf1; padding: 15px; border-radius: 5px; margin: 20px 0; color: #0c5460; }}
    .footer {{ text-align: center; margin-top: 30px; color: #666; font-size: 14px; }}
  </style>
</head>
<body>
  <div class="header"><h2>{title}</h2><div>Trent Farm Data System</div></div>
  <div class="content">
    <p>{subtitle}</p>
    <div class="code">{code}</div>
    <div class="expiry"><strong>Expires at:</strong> {expires_time} UTC ({expires_date})</div>
    {note}
    <p><strong>Security notice:</strong> never share this code with anyone.</p>
    <div class="footer">Best regards,<br>Trent Farm Data Team</div>
  </div>
</body>
</html>"#
    );

    EmailContent {
        subject: subject.to_string(),
        text,
        html,
    }
}

/// Body for the SMTP self-test endpoints.
#[must_use]
pub fn test_email(used_account: Option<&str>) -> EmailContent {
    let (subject, text) = match used_account {
        Some(account) => (
            "Test Email from Trent Farm Data (Multiple Accounts)".to_string(),
            format!("This is a test email sent using {account}"),
        ),
        None => (
            "Test Email from Trent Farm Data".to_string(),
            "This is a test email to verify your email configuration is working.".to_string(),
        ),
    };
    let html = format!("<p>{text}</p>");
    EmailContent { subject, text, html }
}
