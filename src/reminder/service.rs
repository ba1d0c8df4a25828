use super::models::{DispatchError, DispatchFailure, ReminderError, RunSummary};
use super::payload::build_payload;
use crate::commerce_store::{CartRecord, CommerceStore};
use crate::config::AppConfig;
use crate::mailer::Mailer;
use crate::server_store::ServerStore;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const CONFIG_KEY_ENABLED: &str = "Enabled";
const CONFIG_KEY_MAIL_TEMPLATE: &str = "MailTemplate";
const CONFIG_KEY_SHOP_URL: &str = "ShopUrl";

/// Policy knobs for a reminder run, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    /// A cart must have been inactive at least this long to be a candidate.
    pub min_inactive: Duration,
    /// Carts reminded within this window are skipped.
    pub resend_cooldown: Duration,
    /// Optional wall-clock budget for one run. When it elapses, no further
    /// dispatches are started.
    pub run_deadline: Option<std::time::Duration>,
}

impl ReminderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_inactive: Duration::minutes(config.min_inactive_minutes as i64),
            resend_cooldown: Duration::hours(config.resend_cooldown_hours as i64),
            run_deadline: match config.run_deadline_secs {
                0 => None,
                secs => Some(std::time::Duration::from_secs(secs)),
            },
        }
    }
}

/// Per-run scratch state. Owns the channel enablement cache, which lives
/// exactly as long as one run and is never shared across runs.
struct RunState {
    enabled: HashMap<String, bool>,
}

impl RunState {
    fn new() -> Self {
        Self {
            enabled: HashMap::new(),
        }
    }

    /// Channel enablement rule: the config value must equal "yes"
    /// case-insensitively; anything else, including no value at all, means
    /// disabled. Cached per channel for the rest of the run.
    fn is_enabled(
        &mut self,
        store: &dyn CommerceStore,
        sales_channel_id: &str,
    ) -> Result<bool, DispatchError> {
        if let Some(&cached) = self.enabled.get(sales_channel_id) {
            return Ok(cached);
        }
        let value = store
            .channel_config(CONFIG_KEY_ENABLED, sales_channel_id)
            .map_err(DispatchError::ChannelConfig)?;
        let enabled = value.is_some_and(|v| v.eq_ignore_ascii_case("yes"));
        self.enabled.insert(sales_channel_id.to_string(), enabled);
        Ok(enabled)
    }
}

enum DispatchOutcome {
    Sent,
    ChannelDisabled,
    RecentlyReminded,
}

pub struct ReminderService {
    commerce_store: Arc<dyn CommerceStore>,
    server_store: Arc<dyn ServerStore>,
    mailer: Arc<dyn Mailer>,
    settings: ReminderSettings,
}

impl ReminderService {
    pub fn new(
        commerce_store: Arc<dyn CommerceStore>,
        server_store: Arc<dyn ServerStore>,
        mailer: Arc<dyn Mailer>,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            commerce_store,
            server_store,
            mailer,
            settings,
        }
    }

    /// Execute one reminder run to completion. Returns `NoCandidates` when
    /// the candidate query is empty, `Storage` when it fails; everything
    /// that goes wrong after that point is isolated per record and
    /// collected in the summary.
    pub fn run_once(&self, cancel: &CancellationToken) -> Result<RunSummary, ReminderError> {
        let cutoff = Utc::now() - self.settings.min_inactive;
        let candidates = self.commerce_store.abandoned_carts(cutoff)?;
        if candidates.is_empty() {
            return Err(ReminderError::NoCandidates);
        }

        let deduped = dedupe_by_email(candidates);
        debug!(candidates = deduped.len(), "Selected reminder candidates");

        let deadline = self.settings.run_deadline.map(|d| Instant::now() + d);
        let mut run_state = RunState::new();
        let mut summary = RunSummary::default();

        for record in deduped {
            if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                summary.stopped_early = true;
                break;
            }

            match self.dispatch(&record, &mut run_state) {
                Ok(DispatchOutcome::Sent) => summary.sent += 1,
                Ok(DispatchOutcome::ChannelDisabled) => summary.skipped_disabled += 1,
                Ok(DispatchOutcome::RecentlyReminded) => summary.skipped_recently_reminded += 1,
                Err(error) => {
                    warn!(
                        email = %record.email,
                        cart_token = %record.cart_token,
                        %error,
                        "Reminder dispatch failed, continuing with remaining candidates"
                    );
                    summary.failures.push(DispatchFailure {
                        email: record.email,
                        cart_token: record.cart_token,
                        sales_channel_id: record.sales_channel_id,
                        error,
                    });
                }
            }
        }

        info!(
            sent = summary.sent,
            skipped_disabled = summary.skipped_disabled,
            skipped_recent = summary.skipped_recently_reminded,
            failed = summary.failures.len(),
            stopped_early = summary.stopped_early,
            "Reminder run finished"
        );
        Ok(summary)
    }

    fn dispatch(
        &self,
        record: &CartRecord,
        run_state: &mut RunState,
    ) -> Result<DispatchOutcome, DispatchError> {
        let channel = record.sales_channel_id.as_str();

        if !run_state.is_enabled(self.commerce_store.as_ref(), channel)? {
            return Ok(DispatchOutcome::ChannelDisabled);
        }

        if self.recently_reminded(&record.cart_token) {
            return Ok(DispatchOutcome::RecentlyReminded);
        }

        let customer = self
            .commerce_store
            .find_customer_by_email(&record.email)
            .map_err(DispatchError::CustomerLookup)?
            .ok_or(DispatchError::CustomerNotFound)?;

        // A missing cart loads as empty; the reminder still goes out.
        let cart = self
            .commerce_store
            .load_cart(&record.cart_token, channel)
            .map_err(DispatchError::CartLoad)?;

        let template_id = self
            .commerce_store
            .channel_config(CONFIG_KEY_MAIL_TEMPLATE, channel)
            .map_err(DispatchError::ChannelConfig)?
            .ok_or(DispatchError::TemplateNotConfigured)?;
        let template = self
            .commerce_store
            .find_mail_template(&template_id)
            .map_err(DispatchError::TemplateLookup)?
            .ok_or_else(|| DispatchError::TemplateNotFound(template_id.clone()))?;

        let shop_url = self
            .commerce_store
            .channel_config(CONFIG_KEY_SHOP_URL, channel)
            .map_err(DispatchError::ChannelConfig)?
            .unwrap_or_default();

        let payload = build_payload(channel, &customer, &cart, &template, &shop_url)?;
        self.mailer.send(&payload)?;

        // Losing the mark is tolerable; the cooldown check just becomes a
        // no-op for this cart until the next successful send.
        if let Err(error) = self
            .server_store
            .mark_reminded(&record.cart_token, &record.email, Utc::now())
        {
            warn!(cart_token = %record.cart_token, %error, "Failed to record reminder mark");
        }

        Ok(DispatchOutcome::Sent)
    }

    fn recently_reminded(&self, cart_token: &str) -> bool {
        match self.server_store.last_reminded_at(cart_token) {
            Ok(Some(at)) => Utc::now() - at < self.settings.resend_cooldown,
            Ok(None) => false,
            Err(error) => {
                warn!(%cart_token, %error, "Failed to read reminder mark, treating cart as unreminded");
                false
            }
        }
    }
}

/// Collapse candidates sharing an email into one record each, keeping the
/// last cart seen for that email while preserving first-encounter order.
fn dedupe_by_email(candidates: Vec<CartRecord>) -> Vec<CartRecord> {
    let mut by_email: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<CartRecord> = Vec::with_capacity(candidates.len());

    for record in candidates {
        match by_email.get(&record.email) {
            Some(&index) => deduped[index] = record,
            None => {
                by_email.insert(record.email.clone(), deduped.len());
                deduped.push(record);
            }
        }
    }
    deduped
}
