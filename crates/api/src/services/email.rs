//! Email service for delivering report mails.
//!
//! Supports multiple email providers:
//! - `console`: Logs emails to console (development)
//! - `smtp`: Sends via SMTP server
//! - `sendgrid`: Uses SendGrid API

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, error, info};

use domain::services::{DeliveryError, Mailer, OutgoingMail};

use crate::config::EmailConfig;

const SENDGRID_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Email service for sending report mails.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    http: reqwest::Client,
}

impl EmailService {
    /// Creates a new EmailService with the given configuration.
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }

    /// Check if email service is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn sender(&self) -> Result<Mailbox, DeliveryError> {
        let address: Address = self
            .config
            .sender_email
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(self.config.sender_email.clone()))?;
        let name = (!self.config.sender_name.is_empty()).then(|| self.config.sender_name.clone());
        Ok(Mailbox::new(name, address))
    }

    /// Builds the MIME message: text and HTML alternatives plus the attachment.
    async fn build_message(&self, mail: &OutgoingMail) -> Result<Message, DeliveryError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(mail.to.clone()))?;

        let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
            mail.body_text.clone(),
            mail.body_html.clone(),
        ));

        if let Some(attachment) = &mail.attachment {
            let bytes = tokio::fs::read(&attachment.path).await?;
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| DeliveryError::SendFailed(format!("Bad content type: {}", e)))?;
            body = body.singlepart(
                Attachment::new(attachment.file_name.clone()).body(bytes, content_type),
            );
        }

        Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(mail.subject.clone())
            .multipart(body)
            .map_err(|e| DeliveryError::SendFailed(e.to_string()))
    }

    /// Console provider - logs the mail (for development).
    async fn send_console(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        let attachment_bytes = match &mail.attachment {
            Some(attachment) => Some(tokio::fs::metadata(&attachment.path).await?.len()),
            None => None,
        };

        info!(
            to = %mail.to,
            subject = %mail.subject,
            from = %self.config.sender_email,
            attachment = ?mail.attachment.as_ref().map(|a| a.file_name.as_str()),
            attachment_bytes = ?attachment_bytes,
            "Report mail (console provider)"
        );
        debug!(body_html_length = mail.body_html.len(), "Report mail body");

        Ok(())
    }

    /// SMTP provider - sends via SMTP server.
    async fn send_smtp(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if self.config.smtp_host.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }

        let message = self.build_message(mail).await?;

        let builder = if self.config.smtp_use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| DeliveryError::SendFailed(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_host)
        };
        let mut builder = builder.port(self.config.smtp_port);
        if !self.config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ));
        }

        builder.build().send(message).await.map_err(|e| {
            error!(host = %self.config.smtp_host, error = %e, "SMTP delivery failed");
            DeliveryError::SendFailed(e.to_string())
        })?;

        info!(to = %mail.to, subject = %mail.subject, "Report mail sent via SMTP");
        Ok(())
    }

    /// SendGrid provider - sends via SendGrid API.
    async fn send_sendgrid(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(DeliveryError::NotConfigured);
        }

        let mut body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": mail.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": mail.subject,
            "content": [
                { "type": "text/plain", "value": mail.body_text },
                { "type": "text/html", "value": mail.body_html }
            ]
        });

        if let Some(attachment) = &mail.attachment {
            let bytes = tokio::fs::read(&attachment.path).await?;
            body["attachments"] = serde_json::json!([{
                "content": STANDARD.encode(bytes),
                "filename": attachment.file_name,
                "type": attachment.content_type,
                "disposition": "attachment"
            }]);
        }

        let response = self
            .http
            .post(SENDGRID_URL)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %mail.to, subject = %mail.subject, "Report mail sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(DeliveryError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[async_trait]
impl Mailer for EmailService {
    /// A disabled service reports `NotConfigured`; nothing counts as delivered.
    async fn send(&self, mail: &OutgoingMail) -> Result<(), DeliveryError> {
        if !self.config.enabled {
            debug!(to = %mail.to, subject = %mail.subject, "Email service disabled");
            return Err(DeliveryError::NotConfigured);
        }

        match self.config.provider.as_str() {
            "console" => self.send_console(mail).await,
            "smtp" => self.send_smtp(mail).await,
            "sendgrid" => self.send_sendgrid(mail).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(DeliveryError::NotConfigured)
            }
        }
    }
}
