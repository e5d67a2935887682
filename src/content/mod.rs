//! Readable-body retrieval for listing entries.
//!
//! - [`ContentFetcher`] - the seam the loader calls once per unique entry
//! - [`ArticleFetcher`] - default implementation: self-post text, inline
//!   images, or article HTML through a reader proxy
//! - [`ReaderClient`] - the reader proxy client itself

mod article;
mod jina;

use crate::listing::ListingEntry;
use crate::util::UrlValidationError;
use async_trait::async_trait;
use thiserror::Error;

pub use article::ArticleFetcher;
pub use jina::ReaderClient;

/// Why one entry's body could not be produced.
///
/// Always local to that entry: the feed drops the item and carries on.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Refused article URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("Insecure reader URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Malformed self-post HTML: {0}")]
    Unescape(String),
}

/// Produces the readable body for a listing entry.
///
/// `Ok(None)` means the entry has no body worth inlining; the item is still
/// rendered from its metadata alone.
#[async_trait]
pub trait ContentFetcher: Send + Sync + 'static {
    async fn fetch(&self, entry: &ListingEntry) -> Result<Option<String>, ContentError>;
}
