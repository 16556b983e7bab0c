use async_trait::async_trait;
use thiserror::Error;

pub mod console;
pub mod smtp;

#[cfg(test)]
pub mod testing;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build email: {0}")]
    Build(String),
    #[error("Failed to send email: {0}")]
    Send(String),
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

impl OutgoingEmail {
    pub fn new(to: Vec<String>, subject: impl Into<String>, text_body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            text_body: text_body.into(),
            html_body: None,
        }
    }

    /// Adds an HTML alternative built from the plain body.
    pub fn with_html_from_text(mut self) -> Self {
        let escaped = escape_html(&self.text_body);
        let paragraphs: Vec<String> = escaped
            .split("\n\n")
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>")))
            .collect();
        self.html_body = Some(paragraphs.join("\n"));
        self
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}
