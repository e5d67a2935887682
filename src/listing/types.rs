use serde::Deserialize;
use std::fmt;

// ============================================================================
// Listing Entry
// ============================================================================

/// One post from an upstream subreddit listing.
///
/// Only the fields the feed pipeline reads are deserialized; everything else
/// in the upstream payload is ignored. Every field is defaulted so a sparse or
/// partially redacted post (deleted author, missing flair) still decodes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ListingEntry {
    /// Base-36 post id, unique within the upstream service.
    pub id: String,
    pub title: String,
    pub author: String,
    /// Site-relative path to the comments page, e.g. `/r/rust/comments/abc/title/`.
    pub permalink: String,
    /// Link target. For self posts this points back at the comments page.
    pub url: String,
    /// Creation time as fractional epoch seconds (UTC).
    pub created_utc: f64,
    pub score: i64,
    pub link_flair_text: Option<String>,
    pub over_18: bool,
    /// Pre-rendered body HTML. Link posts carry none.
    pub body_html: Option<String>,
    /// Escaped HTML of a self post's text, as delivered by the listing API.
    pub selftext_html: Option<String>,
    pub is_self: bool,
    pub domain: String,
}

impl ListingEntry {
    /// Deduplication and ordering key for this entry.
    pub fn key(&self) -> FetchKey {
        FetchKey(self.id.clone())
    }

    /// Flair text, treating an absent flair as empty.
    pub fn flair(&self) -> &str {
        self.link_flair_text.as_deref().unwrap_or("")
    }

    /// Whether the entry carries its own rendered body.
    pub fn has_body_html(&self) -> bool {
        self.body_html.as_deref().is_some_and(|b| !b.is_empty())
    }
}

/// Loader key wrapping a listing entry id. Two keys are equal iff the ids are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FetchKey(String);

impl FetchKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FetchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Listing Envelope
// ============================================================================

/// One page of a subreddit listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub entries: Vec<ListingEntry>,
    /// Opaque continuation cursor for the next page.
    pub after: Option<String>,
}

/// Kind tag the upstream API uses for link posts.
pub(crate) const LINK_KIND: &str = "t3";

#[derive(Debug, Deserialize)]
pub(crate) struct RawListing {
    pub data: RawListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RawListingData {
    pub children: Vec<RawChild>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawChild {
    pub kind: String,
    pub data: serde_json::Value,
}

impl RawListing {
    /// Convert the raw envelope, keeping only link posts.
    ///
    /// A child that claims to be a link but fails to decode is skipped with a
    /// warning rather than failing the whole page.
    pub(crate) fn into_listing(self) -> Listing {
        let mut entries = Vec::with_capacity(self.data.children.len());
        for child in self.data.children {
            if child.kind != LINK_KIND {
                tracing::debug!(kind = %child.kind, "Skipping non-link listing child");
                continue;
            }
            match serde_json::from_value::<ListingEntry>(child.data) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, "Skipping undecodable listing entry"),
            }
        }
        Listing {
            entries,
            after: self.data.after.filter(|a| !a.is_empty()),
        }
    }
}
