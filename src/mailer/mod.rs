mod console;
mod smtp;

pub use console::ConsoleMailer;
pub use smtp::SmtpMailer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// A fully rendered reminder email, ready to hand to a transport.
#[derive(Debug, Clone)]
pub struct MailPayload {
    pub recipient_address: String,
    pub recipient_name: String,
    pub sender_name: String,
    pub subject: String,
    pub body_html: String,
    pub body_plain: String,
    /// The sales channel the reminder belongs to, passed through for
    /// transports that care about the originating storefront.
    pub sales_channel_id: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, payload: &MailPayload) -> Result<(), MailerError>;
}
