use crate::feed::types::FeedItem;
use crate::listing::ListingEntry;
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use std::fmt::Write;

/// Turns a listing entry plus its fetched body into a [`FeedItem`].
///
/// Links pointing at the internal site are rewritten onto the mirror, and
/// every item gets a trailer linking the submitter and the comments page on
/// the mirror.
#[derive(Debug, Clone)]
pub struct ItemRenderer {
    internal_url: String,
    mirror_url: String,
}

impl ItemRenderer {
    pub fn new(internal_url: impl Into<String>, mirror_url: impl Into<String>) -> Self {
        Self {
            internal_url: internal_url.into().trim_end_matches('/').to_string(),
            mirror_url: mirror_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn mirror_url(&self) -> &str {
        &self.mirror_url
    }

    /// The entry's outbound link, moved onto the mirror when it targets the
    /// internal site.
    pub fn item_link(&self, entry: &ListingEntry) -> String {
        match entry.url.strip_prefix(self.internal_url.as_str()) {
            Some(rest) if !self.internal_url.is_empty() => format!("{}{}", self.mirror_url, rest),
            _ => entry.url.clone(),
        }
    }

    pub fn comments_link(&self, entry: &ListingEntry) -> String {
        format!("{}{}", self.mirror_url, entry.permalink)
    }

    pub fn render(&self, entry: &ListingEntry, body: Option<&str>) -> FeedItem {
        let link = self.item_link(entry);
        let comments = self.comments_link(entry);

        let mut content = String::with_capacity(body.map_or(0, str::len) + 256);
        if let Some(body) = body {
            content.push_str(body);
        }

        // Writing into a String cannot fail
        let _ = write!(
            content,
            r#"<p>submitted by <a href="{}/user/{}">/u/{}</a><br>"#,
            escape(self.mirror_url.as_str()),
            escape(entry.author.as_str()),
            escape(entry.author.as_str()),
        );
        if !entry.has_body_html() && link != comments {
            let _ = write!(
                content,
                r#"<span><a href="{}">[link]</a></span>   "#,
                escape(link.as_str())
            );
        }
        let _ = write!(
            content,
            r#"<span><a href="{}">[comments]</a></span></p>"#,
            escape(comments.as_str())
        );

        FeedItem {
            id: entry.id.clone(),
            title: entry.title.clone(),
            link,
            author: entry.author.clone(),
            created: created_at(entry.created_utc),
            content,
        }
    }
}

/// Fractional epoch seconds to a UTC time, dropping the fraction.
fn created_at(epoch_secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch_secs.trunc() as i64, 0).unwrap_or_default()
}
