//! Data models and API request/response types.

pub mod api_key;
pub mod report;
