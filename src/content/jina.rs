use crate::content::ContentError;
use crate::util::{is_secure_base_url, validate_url};
use futures::StreamExt;
use pulldown_cmark::{html, Options, Parser};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

pub const DEFAULT_READER_URL: &str = "https://r.jina.ai";

const MAX_CONTENT_SIZE: usize = 5 * 1024 * 1024; // 5MB
const READER_TIMEOUT: Duration = Duration::from_secs(20);

/// Marker line the reader emits between its metadata header and the body.
const CONTENT_MARKER: &str = "Markdown Content:";

/// Client for a jina.ai compatible reader proxy.
///
/// The proxy takes `{base}/{article_url}` and answers with the article's
/// main content as Markdown, which is converted to HTML here.
#[derive(Clone)]
pub struct ReaderClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for ReaderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ReaderClient {
    /// Builds a reader client, rejecting a non-HTTPS base URL.
    pub fn new(
        client: reqwest::Client,
        base_url: Option<&str>,
        api_key: Option<SecretString>,
    ) -> Result<Self, ContentError> {
        let base = base_url.unwrap_or(DEFAULT_READER_URL).trim_end_matches('/');
        if !is_secure_base_url(base) {
            tracing::error!(base_url = %base, "Rejecting non-HTTPS reader URL");
            return Err(ContentError::InsecureBaseUrl);
        }
        if base != DEFAULT_READER_URL {
            tracing::info!(base_url = %base, "Using custom reader URL");
        }
        Ok(Self {
            client,
            base_url: base.to_string(),
            api_key,
        })
    }

    /// Fetches `url` through the reader and returns its content as HTML.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ContentError> {
        let markdown = self.fetch_markdown(url).await?;
        Ok(markdown_to_html(&markdown))
    }

    /// Fetches `url` through the reader and returns the raw Markdown body.
    pub async fn fetch_markdown(&self, url: &str) -> Result<String, ContentError> {
        let parsed = validate_url(url)?;
        let reader_url = format!("{}/{}", self.base_url, parsed.as_str());

        let mut request = self.client.get(&reader_url);

        // Only the official hosts receive the key
        let is_official =
            reader_url.starts_with("https://r.jina.ai/") || reader_url.starts_with("https://api.jina.ai/");
        if let Some(key) = &self.api_key {
            if is_official {
                request = request.header(
                    reqwest::header::AUTHORIZATION,
                    format!("Bearer {}", key.expose_secret()),
                );
            } else {
                tracing::debug!("Skipping reader API key for non-official reader URL");
            }
        }

        let response = tokio::time::timeout(READER_TIMEOUT, request.send())
            .await
            .map_err(|_| ContentError::Timeout)?
            .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        let text = read_limited_text(response, MAX_CONTENT_SIZE).await?;
        Ok(strip_boilerplate(strip_reader_header(&text)))
    }
}

/// Drops the `Title:` / `URL Source:` preamble the reader prepends.
fn strip_reader_header(content: &str) -> &str {
    match content.find(CONTENT_MARKER) {
        Some(idx) => content[idx + CONTENT_MARKER.len()..].trim_start(),
        None => content,
    }
}

/// Removes navigation and comment-form residue the reader leaves behind.
fn strip_boilerplate(content: &str) -> String {
    content
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.starts_with("[Skip to content]")
                || trimmed == "Loading Comments..."
                || trimmed == "Write a Comment..."
                || trimmed == "Menu"
                || trimmed.contains("Proudly powered by WordPress"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

async fn read_limited_text(
    response: reqwest::Response,
    limit: usize,
) -> Result<String, ContentError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ContentError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ContentError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8)
}
