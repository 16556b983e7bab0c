use async_trait::async_trait;
use tracing::info;

use super::{MailError, Mailer, OutgoingEmail};

/// Logs messages instead of delivering them. Used when no SMTP host is configured.
pub struct ConsoleMailer {
    from: String,
}

impl ConsoleMailer {
    pub fn new(from: String) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Mailer for ConsoleMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        if email.to.is_empty() {
            return Err(MailError::InvalidAddress("no recipients".to_string()));
        }
        info!(
            from = %self.from,
            to = ?email.to,
            subject = %email.subject,
            body = %email.text_body,
            "Email (console backend)"
        );
        Ok(())
    }
}
