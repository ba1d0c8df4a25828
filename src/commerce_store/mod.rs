//! Read access to the e-commerce platform database.
//!
//! The reminder logic only consumes this data; it never mutates carts,
//! customers or templates.

mod models;
mod schema;
mod sqlite_commerce_store;

pub use models::{Cart, CartRecord, Customer, LineItem, MailTemplate};
pub use schema::COMMERCE_VERSIONED_SCHEMAS;
pub use sqlite_commerce_store::SqliteCommerceStore;

use crate::sqlite_persistence::StoreError;
use chrono::{DateTime, Utc};

pub trait CommerceStore: Send + Sync {
    /// One row per cart with a known (non-guest) customer whose last
    /// activity is at or before `inactive_since`, in deterministic order.
    fn abandoned_carts(
        &self,
        inactive_since: DateTime<Utc>,
    ) -> Result<Vec<CartRecord>, StoreError>;

    /// Resolve a customer by exact email match.
    fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError>;

    /// Load a cart by token, scoped to its sales channel. An unknown token
    /// yields an empty cart, not an error.
    fn load_cart(&self, token: &str, sales_channel_id: &str) -> Result<Cart, StoreError>;

    /// Look up a per-channel configuration value.
    fn channel_config(
        &self,
        key: &str,
        sales_channel_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// Resolve a mail template by its configured identifier.
    fn find_mail_template(&self, id: &str) -> Result<Option<MailTemplate>, StoreError>;
}
