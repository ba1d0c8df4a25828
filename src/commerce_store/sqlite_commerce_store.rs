use super::models::{Cart, CartRecord, Customer, LineItem, MailTemplate};
use super::schema::COMMERCE_VERSIONED_SCHEMAS;
use super::CommerceStore;
use crate::sqlite_persistence::{open_database, StoreError};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteCommerceStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCommerceStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path.as_ref(), COMMERCE_VERSIONED_SCHEMAS, "commerce")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
        Ok(LineItem {
            label: row.get("label")?,
            quantity: row.get("quantity")?,
            unit_price_cents: row.get("unit_price_cents")?,
        })
    }

    // Write helpers for seeding and tests. The reminder path never calls
    // these; production data is written by the shop itself.

    pub fn insert_customer(&self, email: &str, first_name: &str, last_name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO customers (email, first_name, last_name) VALUES (?1, ?2, ?3)",
            params![email, first_name, last_name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn upsert_cart(
        &self,
        token: &str,
        customer_id: Option<i64>,
        sales_channel_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO carts (token, customer_id, sales_channel_id, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (token) DO UPDATE SET
                customer_id = excluded.customer_id,
                sales_channel_id = excluded.sales_channel_id,
                updated_at = excluded.updated_at",
            params![token, customer_id, sales_channel_id, updated_at.timestamp()],
        )?;
        Ok(())
    }

    pub fn add_line_item(
        &self,
        cart_token: &str,
        label: &str,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let position: i64 = conn.query_row(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM cart_line_items WHERE cart_token = ?1",
            params![cart_token],
            |row| row.get(0),
        )?;
        conn.execute(
            "INSERT INTO cart_line_items (cart_token, position, label, quantity, unit_price_cents)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![cart_token, position, label, quantity, unit_price_cents],
        )?;
        Ok(())
    }

    pub fn set_channel_config(&self, sales_channel_id: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO channel_config (sales_channel_id, key, value) VALUES (LOWER(?1), ?2, ?3)
             ON CONFLICT (sales_channel_id, key) DO UPDATE SET value = excluded.value",
            params![sales_channel_id, key, value],
        )?;
        Ok(())
    }

    pub fn insert_mail_template(&self, template: &MailTemplate) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO mail_templates (id, sender_name, subject, content_html, content_plain)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                template.id,
                template.sender_name,
                template.subject,
                template.content_html,
                template.content_plain
            ],
        )?;
        Ok(())
    }
}

impl CommerceStore for SqliteCommerceStore {
    fn abandoned_carts(
        &self,
        inactive_since: DateTime<Utc>,
    ) -> Result<Vec<CartRecord>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT customers.email AS email,
                    carts.token AS token,
                    LOWER(carts.sales_channel_id) AS sales_channel_id
             FROM carts
             INNER JOIN customers ON carts.customer_id = customers.id
             WHERE carts.customer_id IS NOT NULL
               AND carts.updated_at <= ?1
             ORDER BY carts.updated_at ASC, carts.rowid ASC",
        )?;

        let records = stmt
            .query_map(params![inactive_since.timestamp()], |row| {
                Ok(CartRecord {
                    email: row.get("email")?,
                    cart_token: row.get("token")?,
                    sales_channel_id: row.get("sales_channel_id")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn find_customer_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let customer = conn
            .query_row(
                "SELECT id, email, first_name, last_name FROM customers
                 WHERE email = ?1 ORDER BY id ASC LIMIT 1",
                params![email],
                |row| {
                    Ok(Customer {
                        id: row.get("id")?,
                        email: row.get("email")?,
                        first_name: row.get("first_name")?,
                        last_name: row.get("last_name")?,
                    })
                },
            )
            .optional()?;
        Ok(customer)
    }

    fn load_cart(&self, token: &str, sales_channel_id: &str) -> Result<Cart, StoreError> {
        let conn = self.conn.lock().unwrap();

        let exists: Option<String> = conn
            .query_row(
                "SELECT token FROM carts
                 WHERE token = ?1 AND LOWER(sales_channel_id) = LOWER(?2)",
                params![token, sales_channel_id],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_none() {
            return Ok(Cart::empty(token, sales_channel_id));
        }

        let mut stmt = conn.prepare(
            "SELECT label, quantity, unit_price_cents FROM cart_line_items
             WHERE cart_token = ?1 ORDER BY position ASC",
        )?;
        let line_items = stmt
            .query_map(params![token], Self::row_to_line_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Cart {
            token: token.to_string(),
            sales_channel_id: sales_channel_id.to_string(),
            line_items,
        })
    }

    fn channel_config(
        &self,
        key: &str,
        sales_channel_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM channel_config
                 WHERE sales_channel_id = LOWER(?1) AND key = ?2",
                params![sales_channel_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn find_mail_template(&self, id: &str) -> Result<Option<MailTemplate>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let template = conn
            .query_row(
                "SELECT id, sender_name, subject, content_html, content_plain
                 FROM mail_templates WHERE id = ?1",
                params![id],
                |row| {
                    Ok(MailTemplate {
                        id: row.get("id")?,
                        sender_name: row.get("sender_name")?,
                        subject: row.get("subject")?,
                        content_html: row.get("content_html")?,
                        content_plain: row.get("content_plain")?,
                    })
                },
            )
            .optional()?;
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn make_store() -> (SqliteCommerceStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteCommerceStore::new(dir.path().join("commerce.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_abandoned_carts_excludes_guest_carts() {
        let (store, _dir) = make_store();
        let now = Utc::now();
        let stale = now - Duration::hours(2);

        let customer_id = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        store
            .upsert_cart("T1", Some(customer_id), "c1", stale)
            .unwrap();
        store.upsert_cart("T2", None, "c1", stale).unwrap();

        let records = store.abandoned_carts(now).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cart_token, "T1");
        assert_eq!(records[0].email, "a@x.com");
    }

    #[test]
    fn test_abandoned_carts_respects_inactivity_cutoff() {
        let (store, _dir) = make_store();
        let now = Utc::now();

        let customer_id = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        store
            .upsert_cart("stale", Some(customer_id), "c1", now - Duration::hours(2))
            .unwrap();
        store
            .upsert_cart("fresh", Some(customer_id), "c1", now)
            .unwrap();

        let records = store.abandoned_carts(now - Duration::hours(1)).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cart_token, "stale");
    }

    #[test]
    fn test_abandoned_carts_lowercases_channel_id() {
        let (store, _dir) = make_store();
        let now = Utc::now();

        let customer_id = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        store
            .upsert_cart("T1", Some(customer_id), "98432DEF39FC4624B33213A56B8C944D", now)
            .unwrap();

        let records = store.abandoned_carts(now).unwrap();
        assert_eq!(
            records[0].sales_channel_id,
            "98432def39fc4624b33213a56b8c944d"
        );
    }

    #[test]
    fn test_abandoned_carts_ordered_by_activity() {
        let (store, _dir) = make_store();
        let now = Utc::now();

        let a = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        let b = store.insert_customer("b@x.com", "Bob", "Baker").unwrap();
        store
            .upsert_cart("newer", Some(b), "c1", now - Duration::hours(1))
            .unwrap();
        store
            .upsert_cart("older", Some(a), "c1", now - Duration::hours(3))
            .unwrap();

        let records = store.abandoned_carts(now).unwrap();
        assert_eq!(records[0].cart_token, "older");
        assert_eq!(records[1].cart_token, "newer");
    }

    #[test]
    fn test_find_customer_by_email() {
        let (store, _dir) = make_store();
        store.insert_customer("a@x.com", "Ann", "Archer").unwrap();

        let found = store.find_customer_by_email("a@x.com").unwrap().unwrap();
        assert_eq!(found.first_name, "Ann");
        assert_eq!(found.last_name, "Archer");

        assert!(store.find_customer_by_email("b@x.com").unwrap().is_none());
    }

    #[test]
    fn test_load_cart_with_ordered_line_items() {
        let (store, _dir) = make_store();
        let customer_id = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        store
            .upsert_cart("T1", Some(customer_id), "c1", Utc::now())
            .unwrap();
        store.add_line_item("T1", "Widget", 2, 499).unwrap();
        store.add_line_item("T1", "Gadget", 1, 1299).unwrap();

        let cart = store.load_cart("T1", "c1").unwrap();
        assert_eq!(cart.line_items.len(), 2);
        assert_eq!(cart.line_items[0].label, "Widget");
        assert_eq!(cart.line_items[1].label, "Gadget");
        assert_eq!(cart.total_cents(), 2 * 499 + 1299);
    }

    #[test]
    fn test_load_missing_cart_yields_empty_cart() {
        let (store, _dir) = make_store();
        let cart = store.load_cart("nope", "c1").unwrap();
        assert!(cart.line_items.is_empty());
        assert_eq!(cart.token, "nope");
    }

    #[test]
    fn test_load_cart_scoped_to_channel() {
        let (store, _dir) = make_store();
        let customer_id = store.insert_customer("a@x.com", "Ann", "Archer").unwrap();
        store
            .upsert_cart("T1", Some(customer_id), "c1", Utc::now())
            .unwrap();
        store.add_line_item("T1", "Widget", 1, 100).unwrap();

        // Wrong channel scope loads as empty
        let cart = store.load_cart("T1", "other-channel").unwrap();
        assert!(cart.line_items.is_empty());
    }

    #[test]
    fn test_channel_config_roundtrip() {
        let (store, _dir) = make_store();
        store.set_channel_config("C1", "Enabled", "yes").unwrap();

        // Lookup is case-insensitive on the channel id
        assert_eq!(
            store.channel_config("Enabled", "c1").unwrap().as_deref(),
            Some("yes")
        );
        assert_eq!(
            store.channel_config("Enabled", "C1").unwrap().as_deref(),
            Some("yes")
        );
        assert!(store.channel_config("Missing", "c1").unwrap().is_none());

        store.set_channel_config("C1", "Enabled", "no").unwrap();
        assert_eq!(
            store.channel_config("Enabled", "c1").unwrap().as_deref(),
            Some("no")
        );
    }

    #[test]
    fn test_mail_template_roundtrip() {
        let (store, _dir) = make_store();
        let template = MailTemplate {
            id: "tmpl-1".to_string(),
            sender_name: "Example Shop".to_string(),
            subject: "You forgot something".to_string(),
            content_html: "<p>Hi {{ first_name }}</p>".to_string(),
            content_plain: "Hi {{ first_name }}".to_string(),
        };
        store.insert_mail_template(&template).unwrap();

        let found = store.find_mail_template("tmpl-1").unwrap().unwrap();
        assert_eq!(found.subject, "You forgot something");
        assert!(store.find_mail_template("tmpl-2").unwrap().is_none());
    }
}
