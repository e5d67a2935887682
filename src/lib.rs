//! RSS bridge for Reddit listings.
//!
//! A listing page is fetched from upstream, filtered, and every surviving
//! post is enriched concurrently with the readable content of the page it
//! links to before the result is rendered as RSS 2.0.

pub mod config;
pub mod content;
pub mod feed;
pub mod listing;
pub mod server;
pub mod util;
