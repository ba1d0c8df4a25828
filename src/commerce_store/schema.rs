//! SQLite schema for the commerce platform database.
//!
//! The service only ever reads these tables at runtime; the write helpers on
//! the store exist for seeding and tests.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const CUSTOMERS_TABLE_V1: Table = Table {
    name: "customers",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("email", &SqlType::Text, non_null = true),
        sqlite_column!("first_name", &SqlType::Text, non_null = true),
        sqlite_column!("last_name", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_customers_email", "email")],
    unique_constraints: &[],
};

/// Carts table. `customer_id` is NULL for guest carts, which are never
/// reminder candidates. `updated_at` is a unix timestamp of the last cart
/// activity.
const CARTS_TABLE_V1: Table = Table {
    name: "carts",
    columns: &[
        sqlite_column!("token", &SqlType::Text, is_primary_key = true),
        sqlite_column!("customer_id", &SqlType::Integer),
        sqlite_column!("sales_channel_id", &SqlType::Text, non_null = true),
        sqlite_column!("updated_at", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_carts_customer", "customer_id"),
        ("idx_carts_updated", "updated_at"),
    ],
    unique_constraints: &[],
};

const CART_LINE_ITEMS_TABLE_V1: Table = Table {
    name: "cart_line_items",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("cart_token", &SqlType::Text, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
        sqlite_column!("label", &SqlType::Text, non_null = true),
        sqlite_column!("quantity", &SqlType::Integer, non_null = true),
        sqlite_column!("unit_price_cents", &SqlType::Integer, non_null = true),
    ],
    indices: &[("idx_cart_line_items_token", "cart_token")],
    unique_constraints: &[],
};

/// Per-channel configuration values ("Enabled", "MailTemplate", "ShopUrl").
const CHANNEL_CONFIG_TABLE_V1: Table = Table {
    name: "channel_config",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true), // AUTOINCREMENT
        sqlite_column!("sales_channel_id", &SqlType::Text, non_null = true),
        sqlite_column!("key", &SqlType::Text, non_null = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["sales_channel_id", "key"]],
};

const MAIL_TEMPLATES_TABLE_V1: Table = Table {
    name: "mail_templates",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("sender_name", &SqlType::Text, non_null = true),
        sqlite_column!("subject", &SqlType::Text, non_null = true),
        sqlite_column!("content_html", &SqlType::Text, non_null = true),
        sqlite_column!("content_plain", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const COMMERCE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[
        CUSTOMERS_TABLE_V1,
        CARTS_TABLE_V1,
        CART_LINE_ITEMS_TABLE_V1,
        CHANNEL_CONFIG_TABLE_V1,
        MAIL_TEMPLATES_TABLE_V1,
    ],
    migration: None,
}];
