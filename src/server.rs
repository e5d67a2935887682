//! HTTP front end: `/` redirects to the about page, every other path is
//! treated as a listing path and answered with an RSS document.

use crate::config::Config;
use crate::content::{ArticleFetcher, ContentError, ContentFetcher, ReaderClient};
use crate::feed::{
    ArticleLoader, Clock, FeedAssembler, FeedAuthor, FeedEnvelope, FeedError, Filters,
    ItemRenderer,
};
use crate::listing::{ListingClient, ListingError};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;

const CACHE_CONTROL: &str = "s-maxage=1800, stale-while-revalidate=3600";

/// Request-level failures. Item-level fetch failures never get here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Listing(#[from] ListingError),
    #[error("{0}")]
    Feed(#[from] FeedError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "Feed request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Shared per-process handler state.
#[derive(Clone)]
pub struct AppState {
    pub listings: ListingClient,
    pub assembler: Arc<FeedAssembler>,
    pub clock: Clock,
    pub about_url: Arc<str>,
}

impl AppState {
    /// Wires the default article fetcher from `config`.
    pub fn from_config(config: &Config, clock: Clock) -> Result<Self, ContentError> {
        let client = reqwest::Client::new();
        let reader = ReaderClient::new(
            client.clone(),
            config.reader_url.as_deref(),
            config.reader_api_key(),
        )?;
        Ok(Self::with_fetcher(
            config,
            client,
            Arc::new(ArticleFetcher::new(reader)),
            clock,
        ))
    }

    /// Wires the state around an arbitrary content fetcher.
    pub fn with_fetcher(
        config: &Config,
        client: reqwest::Client,
        fetcher: Arc<dyn ContentFetcher>,
        clock: Clock,
    ) -> Self {
        let renderer = ItemRenderer::new(&config.internal_url, &config.mirror_url);
        let loader = ArticleLoader::new(fetcher, renderer)
            .with_batch_capacity(config.batch_capacity)
            .with_fetch_timeout(config.fetch_timeout());
        let envelope = FeedEnvelope {
            link: config.about_url.clone(),
            description: config.feed_description.clone(),
            author: FeedAuthor {
                name: config.author_name.clone(),
                email: config.author_email.clone(),
            },
        };

        Self {
            listings: ListingClient::new(client, &config.upstream_url, &config.user_agent),
            assembler: Arc::new(FeedAssembler::new(loader, envelope)),
            clock,
            about_url: Arc::from(config.about_url.as_str()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(about_redirect))
        .fallback(feed_handler)
        .with_state(state)
}

async fn about_redirect(State(state): State<AppState>) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, state.about_url.to_string())],
    )
        .into_response()
}

/// Dropping this future (client went away) drops the loader's task sets,
/// which aborts any article fetches still running.
async fn feed_handler(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    tracing::info!(path = %path_and_query, "Feed request");

    let listing = state.listings.fetch(path_and_query).await?;
    let filters = Filters::from_query(uri.query().unwrap_or_default());

    let feed = state
        .assembler
        .assemble(
            format!("reddit-rss {path_and_query}"),
            &listing.entries,
            &filters,
            state.clock.as_ref(),
        )
        .await;
    tracing::debug!(
        path = %path_and_query,
        listed = listing.entries.len(),
        items = feed.items.len(),
        "Assembled feed"
    );

    let rss = feed.to_rss()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/xml"),
            (header::CACHE_CONTROL, CACHE_CONTROL),
        ],
        rss,
    )
        .into_response())
}
