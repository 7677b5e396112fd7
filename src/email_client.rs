use serde::Serialize;

use crate::configuration::EmailClientSettings;
use crate::error::{AppError, ConfigError, EmailError};
use crate::validators::is_valid_email;

/// HTTP client for the transactional email provider.
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: SenderEmail,
}

#[derive(Clone, Debug)]
pub struct SenderEmail(String);

impl SenderEmail {
    pub fn parse(s: &str) -> Result<Self, EmailError> {
        let email = is_valid_email(s).map_err(|e| EmailError::InvalidRecipient(e.to_string()))?;
        Ok(Self(email))
    }

    pub fn inner(&self) -> &str {
        &self.0
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(base_url: String, sender: SenderEmail, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            sender,
        }
    }

    pub fn from_settings(settings: &EmailClientSettings) -> Result<Self, AppError> {
        let sender = SenderEmail::parse(&settings.sender_email).map_err(|e| {
            ConfigError::InvalidValue(format!("email_client.sender_email: {}", e))
        })?;
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| ConfigError::InvalidValue(format!("email_client: {}", e)))?;

        Ok(Self::new(settings.base_url.clone(), sender, http_client))
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: self.sender.inner(),
            to: recipient,
            subject,
            text_body: text_content,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    EmailError::ServiceUnavailable(e.to_string())
                } else {
                    EmailError::SendFailed(e.to_string())
                }
            })?;

        response
            .error_for_status()
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}
