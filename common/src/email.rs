use serde::Serialize;

use crate::{
    env_config::EmailConfig,
    error::{AppError, Res},
};

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Clone)]
enum Transport {
    Http {
        client: reqwest::Client,
        url: String,
        api_key: String,
    },
    Log,
}

/// Transactional email sender.
///
/// Posts JSON messages to the configured email API, or only logs them when no
/// API URL is configured.
#[derive(Clone)]
pub struct EmailSender {
    from: String,
    transport: Transport,
}

impl EmailSender {
    pub fn new(config: &EmailConfig) -> Self {
        let transport = match &config.api_url {
            Some(url) => Transport::Http {
                client: reqwest::Client::new(),
                url: url.clone(),
                api_key: config.api_key.clone(),
            },
            None => Transport::Log,
        };
        EmailSender {
            from: config.from.clone(),
            transport,
        }
    }

    pub fn is_logging_only(&self) -> bool {
        matches!(self.transport, Transport::Log)
    }

    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Res<()> {
        let message = EmailMessage {
            from: self.from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        };

        match &self.transport {
            Transport::Log => {
                log::info!("Email to {} [{}]: {}", message.to, message.subject, message.html);
                Ok(())
            }
            Transport::Http {
                client,
                url,
                api_key,
            } => {
                let response = client
                    .post(url)
                    .bearer_auth(api_key)
                    .json(&message)
                    .send()
                    .await?;

                if response.status().is_success() {
                    Ok(())
                } else {
                    Err(AppError::Internal(format!(
                        "Email API returned error status: {}",
                        response.status()
                    )))
                }
            }
        }
    }
}
