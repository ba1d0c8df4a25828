//! Entities read from the commerce platform database.

/// One row of the abandoned-cart candidate query: a cart that belongs to a
/// known customer. `sales_channel_id` is in its lower-cased identifier form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecord {
    pub email: String,
    pub cart_token: String,
    pub sales_channel_id: String,
}

/// A registered storefront customer.
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// An in-progress cart, identified by its token and scoped to a sales
/// channel. A token that cannot be found loads as an empty cart.
#[derive(Debug, Clone)]
pub struct Cart {
    pub token: String,
    pub sales_channel_id: String,
    pub line_items: Vec<LineItem>,
}

impl Cart {
    pub fn empty(token: &str, sales_channel_id: &str) -> Self {
        Self {
            token: token.to_string(),
            sales_channel_id: sales_channel_id.to_string(),
            line_items: Vec::new(),
        }
    }

    /// Total cart value in cents.
    pub fn total_cents(&self) -> i64 {
        self.line_items
            .iter()
            .map(|item| item.quantity * item.unit_price_cents)
            .sum()
    }
}

/// A single cart position, ordered by the stored position column.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LineItem {
    pub label: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A localized mail template resolved by identifier at send time. The fields
/// hold the translations for the active locale.
#[derive(Debug, Clone)]
pub struct MailTemplate {
    pub id: String,
    pub sender_name: String,
    pub subject: String,
    pub content_html: String,
    pub content_plain: String,
}
