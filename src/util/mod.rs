//! Utility functions shared across modules.
//!
//! - **URL validation**: SSRF guard for links taken from listing entries

mod url_validator;

pub use url_validator::{is_secure_base_url, validate_url, UrlValidationError};
