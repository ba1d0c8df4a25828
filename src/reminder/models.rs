use crate::mailer::MailerError;
use crate::sqlite_persistence::StoreError;
use thiserror::Error;

/// Outcome of one reminder run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Distinct emails successfully dispatched. This is the reported count.
    pub sent: usize,
    /// Candidates skipped because their channel has reminders disabled.
    pub skipped_disabled: usize,
    /// Candidates skipped because the cart was reminded within the cooldown
    /// window.
    pub skipped_recently_reminded: usize,
    pub failures: Vec<DispatchFailure>,
    /// Set when cancellation or the run deadline stopped the batch before
    /// all candidates were attempted.
    pub stopped_early: bool,
}

/// A single candidate that could not be dispatched. The batch continues past
/// these.
#[derive(Debug)]
pub struct DispatchFailure {
    pub email: String,
    pub cart_token: String,
    pub sales_channel_id: String,
    pub error: DispatchError,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No customer found for email")]
    CustomerNotFound,
    #[error("Failed to look up customer: {0}")]
    CustomerLookup(StoreError),
    #[error("Channel has no mail template configured")]
    TemplateNotConfigured,
    #[error("Configured mail template '{0}' does not exist")]
    TemplateNotFound(String),
    #[error("Failed to look up mail template: {0}")]
    TemplateLookup(StoreError),
    #[error("Failed to read channel configuration: {0}")]
    ChannelConfig(StoreError),
    #[error("Failed to load cart: {0}")]
    CartLoad(StoreError),
    #[error("Failed to render mail template: {0}")]
    TemplateRender(#[from] tera::Error),
    #[error("Failed to send reminder email: {0}")]
    MailSend(#[from] MailerError),
}

/// Errors that abort a whole run, as opposed to the per-record
/// [`DispatchError`]s collected in the summary.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// No abandoned carts matched the candidate query. Expected and
    /// non-fatal; the run ends cleanly with nothing sent.
    #[error("No abandoned carts to remind")]
    NoCandidates,
    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),
}
