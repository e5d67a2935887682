use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to write RSS document: {0}")]
    Write(#[from] rss::Error),
    #[error("RSS document is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// One rendered feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub author: String,
    pub created: DateTime<Utc>,
    /// HTML body: fetched content followed by the submitter/comments trailer.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAuthor {
    pub name: String,
    pub email: String,
}

/// A complete feed, built once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub title: String,
    pub link: String,
    pub description: String,
    pub author: FeedAuthor,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub items: Vec<FeedItem>,
}

impl FeedItem {
    fn to_rss_item(&self) -> rss::Item {
        let mut item = rss::Item::default();
        item.set_title(self.title.clone());
        item.set_link(self.link.clone());
        item.set_author(self.author.clone());
        item.set_guid(rss::Guid {
            value: self.id.clone(),
            permalink: false,
        });
        item.set_pub_date(self.created.to_rfc2822());
        item.set_content(self.content.clone());
        item
    }
}

impl Feed {
    /// Maps the feed onto an RSS 2.0 channel.
    pub fn to_channel(&self) -> rss::Channel {
        let mut channel = rss::Channel::default();
        channel.set_title(self.title.clone());
        channel.set_link(self.link.clone());
        channel.set_description(self.description.clone());
        channel.set_managing_editor(format!("{} ({})", self.author.email, self.author.name));
        channel.set_pub_date(self.created.to_rfc2822());
        channel.set_last_build_date(self.updated.to_rfc2822());

        let mut namespaces = BTreeMap::new();
        namespaces.insert("content".to_string(), CONTENT_NAMESPACE.to_string());
        channel.set_namespaces(namespaces);

        channel.set_items(self.items.iter().map(FeedItem::to_rss_item).collect::<Vec<_>>());
        channel
    }

    /// Serializes the feed into a complete RSS document.
    ///
    /// The document is written to memory first so a failure never leaves a
    /// truncated response behind.
    pub fn to_rss(&self) -> Result<String, FeedError> {
        let buf = self.to_channel().write_to(Vec::new())?;
        Ok(String::from_utf8(buf)?)
    }
}
