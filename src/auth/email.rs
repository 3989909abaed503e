//! Email delivery of one-time codes

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::{PassgateError, Result};

/// Why a code is being sent; only affects wording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Registration,
    PasswordReset,
}

impl OtpPurpose {
    fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::Registration => "Verify your email",
            OtpPurpose::PasswordReset => "Password Reset OTP",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_otp(&self, to_email: &str, otp: &str, purpose: OtpPurpose) -> Result<()>;
}

/// SMTP settings
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("from_email", &self.from_email)
            .finish_non_exhaustive()
    }
}

/// Email service
pub struct SmtpNotifier {
    from: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| PassgateError::Notification(e.to_string()))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| PassgateError::Notification(format!("invalid sender address: {e}")))?;

        Ok(Self { from, mailer })
    }
}

fn otp_html(otp: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Your OTP Code</title>
</head>
<body style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h3 style="color: #333;">Your OTP Code</h3>
    <p style="font-size: 20px; font-weight: bold;">{otp}</p>
    <p style="color: #999; font-size: 12px;">
        This OTP will expire in 10 minutes. If you didn't request it, you can safely ignore this email.
    </p>
</body>
</html>"#
    )
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_otp(&self, to_email: &str, otp: &str, purpose: OtpPurpose) -> Result<()> {
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| PassgateError::Notification(format!("invalid recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(purpose.subject())
            .header(ContentType::TEXT_HTML)
            .body(otp_html(otp))
            .map_err(|e| PassgateError::Notification(e.to_string()))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| PassgateError::Notification(e.to_string()))?;
        Ok(())
    }
}

/// Writes codes to the log instead of sending mail (development)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_otp(&self, to_email: &str, otp: &str, purpose: OtpPurpose) -> Result<()> {
        log::info!("[MOCK EMAIL] {:?} code for {}: {}", purpose, to_email, otp);
        Ok(())
    }
}

/// SMTP when configured, otherwise the log notifier
pub fn build_notifier(config: Option<EmailConfig>) -> Arc<dyn Notifier> {
    match config {
        Some(config) => match SmtpNotifier::new(config) {
            Ok(service) => Arc::new(service),
            Err(e) => {
                log::warn!("Failed to initialize email service: {}. Using mock.", e);
                Arc::new(LogNotifier)
            }
        },
        None => {
            log::info!("Email not configured. Using mock email service.");
            Arc::new(LogNotifier)
        }
    }
}
