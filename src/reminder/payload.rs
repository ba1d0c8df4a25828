//! Mail payload assembly: recipient naming and template rendering.
//!
//! The DB-sourced template strings are rendered with tera. Customer and
//! cart data enter the templates as context values only, so placeholder
//! syntax inside customer data is never expanded, and the HTML body is
//! registered under an `.html` name to get tera's autoescaping.

use crate::commerce_store::{Cart, Customer, MailTemplate};
use crate::mailer::MailPayload;
use tera::Tera;

const SUBJECT_TEMPLATE: &str = "subject";
const HTML_TEMPLATE: &str = "body.html";
const PLAIN_TEMPLATE: &str = "body.txt";

/// The display name used for the single recipient, formatted as
/// `"<last_name> <first_name>"`.
pub fn recipient_display_name(customer: &Customer) -> String {
    format!("{} {}", customer.last_name, customer.first_name)
}

fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.abs();
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

fn items_lines(cart: &Cart) -> String {
    cart.line_items
        .iter()
        .map(|item| format!("{} x {}", item.quantity, item.label))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Assemble the reminder email for one customer and cart. `shop_url` is the
/// channel's configured storefront base URL, or empty when unconfigured.
pub fn build_payload(
    sales_channel_id: &str,
    customer: &Customer,
    cart: &Cart,
    template: &MailTemplate,
    shop_url: &str,
) -> Result<MailPayload, tera::Error> {
    let mut engine = Tera::default();
    engine.add_raw_templates(vec![
        (SUBJECT_TEMPLATE, template.subject.as_str()),
        (HTML_TEMPLATE, template.content_html.as_str()),
        (PLAIN_TEMPLATE, template.content_plain.as_str()),
    ])?;

    let mut context = tera::Context::new();
    context.insert("first_name", &customer.first_name);
    context.insert("last_name", &customer.last_name);
    context.insert("email", &customer.email);
    context.insert("item_count", &cart.line_items.len());
    context.insert("items", &items_lines(cart));
    context.insert("line_items", &cart.line_items);
    context.insert("cart_total", &format_cents(cart.total_cents()));
    context.insert("shop_url", shop_url);

    Ok(MailPayload {
        recipient_address: customer.email.clone(),
        recipient_name: recipient_display_name(customer),
        sender_name: template.sender_name.clone(),
        subject: engine.render(SUBJECT_TEMPLATE, &context)?,
        body_html: engine.render(HTML_TEMPLATE, &context)?,
        body_plain: engine.render(PLAIN_TEMPLATE, &context)?,
        sales_channel_id: sales_channel_id.to_string(),
    })
}
