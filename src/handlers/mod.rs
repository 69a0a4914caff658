//! HTTP request handlers.

pub mod api_keys;
pub mod health;
pub mod reports;
