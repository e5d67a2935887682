use crate::listing::types::{Listing, RawListing};
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_LISTING_SIZE: usize = 10 * 1024 * 1024; // 10MB
const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while retrieving a listing page.
///
/// Any of these is fatal to the feed request that triggered the fetch.
#[derive(Debug, Error)]
pub enum ListingError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Body was not a listing document
    #[error("Invalid listing JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the upstream listing API.
#[derive(Debug, Clone)]
pub struct ListingClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl ListingClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    /// Fetches one listing page.
    ///
    /// `path_and_query` is appended verbatim to the upstream base URL, so a
    /// request for `/r/rust/.json?limit=5` maps to
    /// `{base}/r/rust/.json?limit=5`.
    ///
    /// # Errors
    ///
    /// - [`ListingError::Network`] - Connection or TLS errors
    /// - [`ListingError::Timeout`] - Request exceeded 30 seconds
    /// - [`ListingError::HttpStatus`] - Non-2xx HTTP response
    /// - [`ListingError::ResponseTooLarge`] - Response exceeded 10MB
    /// - [`ListingError::Decode`] - Body is not a listing
    pub async fn fetch(&self, path_and_query: &str) -> Result<Listing, ListingError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        tracing::debug!(url = %url, "Fetching listing");

        let response = tokio::time::timeout(
            LISTING_TIMEOUT,
            self.client
                .get(&url)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .send(),
        )
        .await
        .map_err(|_| ListingError::Timeout)?
        .map_err(ListingError::Network)?;

        if !response.status().is_success() {
            return Err(ListingError::HttpStatus(response.status().as_u16()));
        }

        let bytes = read_limited_bytes(response, MAX_LISTING_SIZE).await?;
        let raw: RawListing = serde_json::from_slice(&bytes)?;
        let listing = raw.into_listing();

        tracing::debug!(
            url = %url,
            entries = listing.entries.len(),
            after = ?listing.after,
            "Fetched listing"
        );
        Ok(listing)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, ListingError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(ListingError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(ListingError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(ListingError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"{"kind": "Listing", "data": {"after": null, "children": [
        {"kind": "t3", "data": {"id": "a1", "title": "First", "score": 10}},
        {"kind": "t3", "data": {"id": "b2", "title": "Second", "score": 20}}
    ]}}"#;

    #[tokio::test]
    async fn test_fetch_listing_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/r/rust/.json"))
            .and(query_param("limit", "5"))
            .and(header("user-agent", "reddit-rss test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ListingClient::new(
            reqwest::Client::new(),
            format!("{}/", mock_server.uri()),
            "reddit-rss test",
        );
        let listing = client.fetch("/r/rust/.json?limit=5").await.unwrap();

        let ids: Vec<_> = listing.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b2"]);
        assert!(listing.after.is_none());
    }

    #[tokio::test]
    async fn test_fetch_listing_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let client = ListingClient::new(reqwest::Client::new(), mock_server.uri(), "ua");
        match client.fetch("/r/private/.json").await {
            Err(ListingError::HttpStatus(403)) => {}
            other => panic!("Expected HttpStatus(403), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_listing_bad_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&mock_server)
            .await;

        let client = ListingClient::new(reqwest::Client::new(), mock_server.uri(), "ua");
        let result = client.fetch("/r/rust/.json").await;
        assert!(matches!(result, Err(ListingError::Decode(_))));
    }
}
