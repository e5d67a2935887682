//! Upstream listing retrieval.
//!
//! - [`types`] - Listing entries, fetch keys and the JSON envelope
//! - [`client`] - HTTP client for listing pages

mod client;
mod types;

pub use client::{ListingClient, ListingError};
pub use types::{FetchKey, Listing, ListingEntry};
