use super::{MailPayload, Mailer, MailerError};
use tracing::info;

/// Fallback transport used when no SMTP relay is configured. Logs the
/// rendered email instead of delivering it, which keeps local development
/// working without a mail server.
pub struct ConsoleMailer;

impl Mailer for ConsoleMailer {
    fn send(&self, payload: &MailPayload) -> Result<(), MailerError> {
        info!(
            to = %payload.recipient_address,
            recipient = %payload.recipient_name,
            subject = %payload.subject,
            "No SMTP configured, logging reminder email instead of sending"
        );
        info!("{}", payload.body_plain);
        Ok(())
    }
}
