use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("recipient address is empty")]
    MissingRecipient,

    #[error("mail transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryCodeMail {
    pub to: String,
    pub recipient_name: String,
    pub code: String,
    pub expires_in_minutes: i64,
}

impl DeliveryCodeMail {
    pub fn subject(&self) -> &'static str {
        "Your delivery verification code"
    }

    pub fn body(&self) -> String {
        format!(
            "Hi {}, your delivery code is {}. It expires in {} minutes.",
            self.recipient_name, self.code, self.expires_in_minutes
        )
    }
}

#[async_trait]
pub trait MailDispatcher: Send + Sync {
    async fn send_delivery_code(&self, mail: DeliveryCodeMail) -> Result<(), MailError>;
}

/// Writes mails to the log instead of a transport.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl MailDispatcher for LogMailer {
    async fn send_delivery_code(&self, mail: DeliveryCodeMail) -> Result<(), MailError> {
        if mail.to.trim().is_empty() {
            return Err(MailError::MissingRecipient);
        }

        info!(to = %mail.to, subject = mail.subject(), "delivery code mail dispatched");
        debug!(to = %mail.to, body = %mail.body(), "mail body");
        Ok(())
    }
}

/// Keeps every mail in memory; handy for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<DeliveryCodeMail>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<DeliveryCodeMail> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }

    pub fn last_code_for(&self, to: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|mail| mail.to == to)
            .map(|mail| mail.code)
    }
}

#[async_trait]
impl MailDispatcher for MemoryMailer {
    async fn send_delivery_code(&self, mail: DeliveryCodeMail) -> Result<(), MailError> {
        if mail.to.trim().is_empty() {
            return Err(MailError::MissingRecipient);
        }

        self.outbox
            .lock()
            .map_err(|err| MailError::Transport(format!("outbox poisoned: {err}")))?
            .push(mail);
        Ok(())
    }
}
