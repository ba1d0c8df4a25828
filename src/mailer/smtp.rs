use super::{MailPayload, Mailer, MailerError};
use crate::config::SmtpSettings;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

/// Delivers reminder emails through an SMTP relay using STARTTLS.
pub struct SmtpMailer {
    transport: SmtpTransport,
    from_address: String,
    from_name: Option<String>,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailerError> {
        let mut builder = SmtpTransport::starttls_relay(&settings.host)?.port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: settings.from_address.clone(),
            from_name: settings.from_name.clone(),
        })
    }

    fn parse_mailbox(name: &str, address: &str) -> Result<Mailbox, MailerError> {
        let formatted = if name.trim().is_empty() {
            address.to_string()
        } else {
            format!("{} <{}>", name, address)
        };
        formatted
            .parse()
            .map_err(|_| MailerError::InvalidAddress(address.to_string()))
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, payload: &MailPayload) -> Result<(), MailerError> {
        // The template's sender name wins over the configured one
        let from_name = if payload.sender_name.trim().is_empty() {
            self.from_name.clone().unwrap_or_default()
        } else {
            payload.sender_name.clone()
        };

        let message = Message::builder()
            .from(Self::parse_mailbox(&from_name, &self.from_address)?)
            .to(Self::parse_mailbox(
                &payload.recipient_name,
                &payload.recipient_address,
            )?)
            .subject(&payload.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(payload.body_plain.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(payload.body_html.clone()),
                    ),
            )?;

        self.transport.send(&message)?;
        debug!(to = %payload.recipient_address, "Sent reminder email over SMTP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mailbox_with_and_without_name() {
        let boxed = SmtpMailer::parse_mailbox("Doe Jane", "jane@example.com").unwrap();
        assert_eq!(boxed.email.to_string(), "jane@example.com");
        assert_eq!(boxed.name.as_deref(), Some("Doe Jane"));

        let plain = SmtpMailer::parse_mailbox("", "jane@example.com").unwrap();
        assert!(plain.name.is_none());
    }

    #[test]
    fn test_parse_mailbox_rejects_garbage() {
        assert!(SmtpMailer::parse_mailbox("X", "not-an-address").is_err());
    }
}
