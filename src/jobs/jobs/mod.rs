//! Concrete job implementations.

mod abandoned_cart;

pub use abandoned_cart::{AbandonedCartJob, ABANDONED_CART_JOB_ID};
