//! Outbound mail behind a trait, with a lettre SMTP implementation.
//!
//! The batch orchestrator only sees [`Mailer::send`]; any non-success is a
//! per-trainee failure, never fatal for the batch.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as LettreAttachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// One file attached to an outgoing email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        attachments: Vec<EmailAttachment>,
    ) -> Result<(), MailError>;
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl MailerConfig {
    pub fn from_env() -> Result<Self, MailError> {
        let host =
            env::var("SMTP_HOST").map_err(|_| MailError::MissingConfig("SMTP_HOST".into()))?;
        let from =
            env::var("SMTP_FROM").map_err(|_| MailError::MissingConfig("SMTP_FROM".into()))?;
        let port = env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        Ok(Self {
            host,
            port,
            username: env::var("SMTP_USER").ok(),
            password: env::var("SMTP_PASSWORD").ok(),
            from,
        })
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: MailerConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Smtp(e.to_string()))?
            .port(config.port);

        if let (Some(user), Some(password)) = (config.username.clone(), config.password.clone()) {
            builder = builder.credentials(Credentials::new(user, password));
        }

        Ok(Self {
            transport: builder.build(),
            from: config.from,
        })
    }

    pub fn from_env() -> Result<Self, MailError> {
        Self::new(MailerConfig::from_env()?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        attachments: Vec<EmailAttachment>,
    ) -> Result<(), MailError> {
        let from = self
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(self.from.clone()))?;
        let to_addr = to
            .parse()
            .map_err(|_| MailError::InvalidAddress(to.to_string()))?;

        let mut multipart = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html_body.to_string()),
        );
        for attachment in attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(e.to_string()))?;
            multipart = multipart.singlepart(
                LettreAttachment::new(attachment.filename).body(attachment.bytes, content_type),
            );
        }

        let message = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .multipart(multipart)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Smtp(e.to_string()))
    }
}
