use crate::content::{ContentError, ContentFetcher, ReaderClient};
use crate::listing::ListingEntry;
use async_trait::async_trait;
use quick_xml::escape::{escape, unescape};
use url::Url;

const IMAGE_HOSTS: &[&str] = &["i.redd.it", "i.imgur.com", "preview.redd.it"];
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];

/// What kind of body an entry yields.
#[derive(Debug, PartialEq)]
enum BodySource<'a> {
    /// Text stored with the entry itself
    SelfText,
    /// Direct link to an image, inlined as `<img>`
    Image(&'a str),
    /// External page, extracted through the reader
    Article(&'a str),
    /// Links back into the listing site (galleries, crossposts, videos)
    None,
}

fn classify(entry: &ListingEntry) -> BodySource<'_> {
    if entry.is_self {
        return BodySource::SelfText;
    }

    let Ok(url) = Url::parse(&entry.url) else {
        return BodySource::None;
    };
    let host = url.host_str().unwrap_or_default();

    let path = url.path().to_ascii_lowercase();
    if IMAGE_HOSTS.contains(&host) || IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return BodySource::Image(&entry.url);
    }

    if host == "reddit.com" || host.ends_with(".reddit.com") || host == "v.redd.it" {
        return BodySource::None;
    }

    BodySource::Article(&entry.url)
}

/// Default [`ContentFetcher`]: self-post text, inline images, or the linked
/// article extracted through a [`ReaderClient`].
#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    reader: ReaderClient,
}

impl ArticleFetcher {
    pub fn new(reader: ReaderClient) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl ContentFetcher for ArticleFetcher {
    async fn fetch(&self, entry: &ListingEntry) -> Result<Option<String>, ContentError> {
        match classify(entry) {
            BodySource::SelfText => self_text_html(entry),
            BodySource::Image(src) => Ok(Some(format!(r#"<p><img src="{}"></p>"#, escape(src)))),
            BodySource::Article(url) => {
                tracing::debug!(id = %entry.id, url = %url, "Fetching article body");
                self.reader.fetch_html(url).await.map(Some)
            }
            BodySource::None => Ok(None),
        }
    }
}

/// The listing API delivers self-post HTML entity-escaped; undo that once.
fn self_text_html(entry: &ListingEntry) -> Result<Option<String>, ContentError> {
    let Some(escaped) = entry.selftext_html.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let html = unescape(escaped).map_err(|e| ContentError::Unescape(e.to_string()))?;
    Ok(Some(html.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(url: &str) -> ListingEntry {
        ListingEntry {
            id: "t".into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&entry("https://i.redd.it/abc.png")),
            BodySource::Image("https://i.redd.it/abc.png")
        );
        assert_eq!(
            classify(&entry("https://cdn.example.com/pic.JPG?x=1")),
            BodySource::Image("https://cdn.example.com/pic.JPG?x=1")
        );
        assert_eq!(
            classify(&entry("https://www.reddit.com/gallery/xyz")),
            BodySource::None
        );
        assert_eq!(classify(&entry("https://v.redd.it/clip")), BodySource::None);
        assert_eq!(classify(&entry("not a url")), BodySource::None);
        assert_eq!(
            classify(&entry("https://blog.example.com/post")),
            BodySource::Article("https://blog.example.com/post")
        );

        let self_post = ListingEntry {
            is_self: true,
            ..entry("https://old.reddit.com/r/rust/comments/t/x/")
        };
        assert_eq!(classify(&self_post), BodySource::SelfText);
    }

    fn offline_fetcher() -> ArticleFetcher {
        // Points at a closed port; any network use would fail the test.
        let reader =
            ReaderClient::new(reqwest::Client::new(), Some("http://127.0.0.1:9"), None).unwrap();
        ArticleFetcher::new(reader)
    }

    #[tokio::test]
    async fn test_self_text_is_unescaped() {
        let post = ListingEntry {
            is_self: true,
            selftext_html: Some("&lt;div class=\"md\"&gt;&lt;p&gt;Hi &amp;amp; bye&lt;/p&gt;&lt;/div&gt;".into()),
            ..entry("https://old.reddit.com/r/x/comments/t/")
        };
        let body = offline_fetcher().fetch(&post).await.unwrap();
        assert_eq!(
            body.as_deref(),
            Some("<div class=\"md\"><p>Hi &amp; bye</p></div>")
        );
    }

    #[tokio::test]
    async fn test_self_post_without_text_has_no_body() {
        let post = ListingEntry {
            is_self: true,
            ..entry("https://old.reddit.com/r/x/comments/t/")
        };
        assert_eq!(offline_fetcher().fetch(&post).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_image_is_inlined() {
        let body = offline_fetcher()
            .fetch(&entry("https://i.redd.it/a.png?w=1&h=2"))
            .await
            .unwrap();
        assert_eq!(
            body.as_deref(),
            Some(r#"<p><img src="https://i.redd.it/a.png?w=1&amp;h=2"></p>"#)
        );
    }

    #[tokio::test]
    async fn test_article_goes_through_reader() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Some **bold** text"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let reader =
            ReaderClient::new(reqwest::Client::new(), Some(&mock_server.uri()), None).unwrap();
        let body = ArticleFetcher::new(reader)
            .fetch(&entry("https://news.example.com/story"))
            .await
            .unwrap()
            .unwrap();
        assert!(body.contains("<strong>bold</strong>"));
    }
}
