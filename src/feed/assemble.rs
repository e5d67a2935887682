use crate::feed::filter::Filters;
use crate::feed::loader::ArticleLoader;
use crate::feed::types::{Feed, FeedAuthor};
use crate::listing::ListingEntry;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;

/// Source of "now" for feed envelopes.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Static channel metadata shared by every feed this service produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEnvelope {
    pub link: String,
    pub description: String,
    pub author: FeedAuthor,
}

/// Filters listing entries, resolves them through the loader and builds the
/// feed.
pub struct FeedAssembler {
    loader: ArticleLoader,
    envelope: FeedEnvelope,
}

impl FeedAssembler {
    pub fn new(loader: ArticleLoader, envelope: FeedEnvelope) -> Self {
        Self { loader, envelope }
    }

    pub fn loader(&self) -> &ArticleLoader {
        &self.loader
    }

    /// Builds a feed from `entries`.
    ///
    /// Items appear in listing order. Entries rejected by `filters` are never
    /// fetched; entries whose fetch fails are left out without failing the
    /// feed.
    pub async fn assemble(
        &self,
        title: impl Into<String>,
        entries: &[ListingEntry],
        filters: &Filters,
        now: &(dyn Fn() -> DateTime<Utc> + Send + Sync),
    ) -> Feed {
        self.assemble_until(title, entries, filters, now, std::future::pending())
            .await
    }

    /// [`assemble`](Self::assemble) with a cancellation signal forwarded to
    /// the loader; items still unresolved at cancellation are left out.
    pub async fn assemble_until<C>(
        &self,
        title: impl Into<String>,
        entries: &[ListingEntry],
        filters: &Filters,
        now: &(dyn Fn() -> DateTime<Utc> + Send + Sync),
        cancelled: C,
    ) -> Feed
    where
        C: Future<Output = ()>,
    {
        let selected: Vec<ListingEntry> = entries
            .iter()
            .filter(|entry| filters.allows(entry))
            .cloned()
            .collect();
        tracing::debug!(
            listed = entries.len(),
            selected = selected.len(),
            "Filtered listing entries"
        );

        let results = self.loader.load_many_until(&selected, cancelled).await;

        let items: Vec<_> = selected
            .iter()
            .zip(results)
            .filter_map(|(entry, result)| match result {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!(id = %entry.id, error = %e, "Dropping item without content");
                    None
                }
            })
            .collect();

        let now = now();
        Feed {
            title: title.into(),
            link: self.envelope.link.clone(),
            description: self.envelope.description.clone(),
            author: self.envelope.author.clone(),
            created: now,
            updated: now,
            items,
        }
    }
}
