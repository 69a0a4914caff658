//! Business logic services.

pub mod api_key_service;
pub mod audit_service;
pub mod report_service;
