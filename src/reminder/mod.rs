//! Abandoned-cart detection and reminder dispatch.
//!
//! [`ReminderService::run_once`] selects candidate carts, deduplicates them
//! by customer email, and dispatches one reminder email per customer with
//! per-record error isolation.

mod models;
mod payload;
mod service;

pub use models::{DispatchError, DispatchFailure, ReminderError, RunSummary};
pub use payload::{build_payload, recipient_display_name};
pub use service::{ReminderService, ReminderSettings};
