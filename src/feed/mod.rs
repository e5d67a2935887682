//! Feed construction from listing entries.
//!
//! - [`filter`] - Per-request entry filters (safe, score floor, flair)
//! - [`loader`] - Batched concurrent loader resolving entries into items
//! - [`render`] - Entry + body to feed item
//! - [`assemble`] - Filter, load and build the feed envelope
//! - [`types`] - Feed and item values plus RSS serialization
//!
//! # Example
//!
//! ```ignore
//! let loader = ArticleLoader::new(fetcher, ItemRenderer::new(internal, mirror));
//! let assembler = FeedAssembler::new(loader, envelope);
//! let feed = assembler.assemble(title, &listing.entries, &filters, &Utc::now).await;
//! let xml = feed.to_rss()?;
//! ```

mod assemble;
mod filter;
mod loader;
mod render;
mod types;

pub use assemble::{system_clock, Clock, FeedAssembler, FeedEnvelope};
pub use filter::Filters;
pub use loader::{ArticleLoader, FetchResult, LoadError, DEFAULT_BATCH_CAPACITY, DEFAULT_FETCH_TIMEOUT};
pub use render::ItemRenderer;
pub use types::{Feed, FeedAuthor, FeedError, FeedItem};
