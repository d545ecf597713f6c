//! Best-effort page scraping: full article text and Open-Graph images.
//!
//! The full-content scraper is a fallback collaborator of the normalizer,
//! invoked only when feed-supplied text is too short. It fetches the source
//! page with a bounded timeout, extracts paragraph text using an ordered
//! list of structural selectors (`article`, common body-content containers,
//! `main`), and falls back to "all paragraphs longer than ~40 characters"
//! when structural extraction yields too little.
//!
//! Failures never propagate: the async wrappers return an empty/`None`
//! result and the caller continues with whatever text it already has. The
//! extraction itself is pure over an HTML string, so the selector logic is
//! unit-testable without any network.

use crate::feeds::{FeedError, USER_AGENT};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

/// Hard timeout for one page fetch.
pub const PAGE_TIMEOUT_SECS: u64 = 5;

/// Minimum text yield before structural extraction gives way to the
/// all-paragraphs fallback.
const MIN_STRUCTURAL_LEN: usize = 200;

/// Paragraphs shorter than this are ignored by the fallback pass
/// (navigation links, bylines, cookie banners).
const MIN_PARAGRAPH_LEN: usize = 40;

/// Structural containers tried in order; first sufficient yield wins.
const STRUCTURAL_SELECTORS: &[&str] = &[
    "article",
    ".article-body, .story-body, .post-content, #article-body",
    "main",
];

/// Read-only retrieval of an HTML page. Implemented over HTTP in
/// production and by fixtures in tests.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn get_html(&self, url: &str) -> Result<String, FeedError>;
}

/// HTTP implementation of [`PageSource`].
pub struct HttpPageSource {
    client: reqwest::Client,
}

impl HttpPageSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(PAGE_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpPageSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn get_html(&self, url: &str) -> Result<String, FeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FeedError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        response.text().await.map_err(FeedError::from_reqwest)
    }
}

/// Fetch a page and extract its main article text.
///
/// Returns an empty string on any failure; callers must tolerate an empty
/// scrape and continue with the snippet (or title) they already have.
#[instrument(level = "debug", skip_all, fields(url = %url))]
pub async fn fetch_article_text(page: &dyn PageSource, url: &str) -> String {
    match page.get_html(url).await {
        Ok(html) => {
            let text = extract_article_text(&html);
            debug!(bytes = text.len(), "Scraped article text");
            text
        }
        Err(e) => {
            debug!(error = %e, "Page scrape failed; continuing without it");
            String::new()
        }
    }
}

/// Fetch a page and extract its Open-Graph image, if any.
///
/// Best-effort: network or extraction failures yield `None`.
#[instrument(level = "debug", skip_all, fields(url = %url))]
pub async fn fetch_og_image(page: &dyn PageSource, url: &str) -> Option<String> {
    match page.get_html(url).await {
        Ok(html) => extract_og_image(&html),
        Err(e) => {
            debug!(error = %e, "Open-Graph scrape failed");
            None
        }
    }
}

/// Extract the main article text from an HTML document.
///
/// Scripts, navigation, and other non-content elements fall away naturally
/// because only `<p>` descendants of content containers are collected.
/// Paragraphs are joined with blank lines.
pub fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let p_selector = Selector::parse("p").unwrap();

    for selector_str in STRUCTURAL_SELECTORS {
        let container_selector = Selector::parse(selector_str).unwrap();
        let mut paragraphs = Vec::new();
        for container in document.select(&container_selector) {
            for p in container.select(&p_selector) {
                let text = element_text(&p);
                if !text.is_empty() {
                    paragraphs.push(text);
                }
            }
        }
        let total: usize = paragraphs.iter().map(|p| p.len()).sum();
        if total >= MIN_STRUCTURAL_LEN {
            return paragraphs.join("\n\n");
        }
    }

    // Structural extraction came up short; take every paragraph of
    // meaningful length anywhere in the document.
    let paragraphs: Vec<String> = document
        .select(&p_selector)
        .map(|p| element_text(&p))
        .filter(|t| t.len() > MIN_PARAGRAPH_LEN)
        .collect();
    paragraphs.join("\n\n")
}

/// Extract the Open-Graph (or Twitter card) image URL from an HTML document.
pub fn extract_og_image(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let og = Selector::parse(r#"meta[property="og:image"]"#).unwrap();
    let twitter = Selector::parse(r#"meta[name="twitter:image"]"#).unwrap();

    document
        .select(&og)
        .chain(document.select(&twitter))
        .find_map(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extract the first `<img src>` from an HTML fragment (feed-embedded
/// content), used by the normalizer's image selection chain.
pub fn extract_first_img(fragment: &str) -> Option<String> {
    let document = Html::parse_fragment(fragment);
    let img = Selector::parse("img[src]").unwrap();
    document
        .select(&img)
        .find_map(|el| el.value().attr("src"))
        .map(|s| s.to_string())
        .filter(|s| s.starts_with("http"))
}

fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_article_element() {
        let long = "This is a reasonably long paragraph of real article body text \
                    that should comfortably clear the structural yield threshold \
                    used by the extractor when it scans containers."
            .to_string();
        let html = format!(
            "<html><body><nav><p>Home | News | Sport</p></nav>\
             <article><p>{long}</p><p>{long}</p></article>\
             <footer><p>Copyright notice that is fairly long as well, honestly.</p></footer>\
             </body></html>"
        );

        let text = extract_article_text(&html);
        assert!(text.contains("reasonably long paragraph"));
        // Nav/footer live outside <article>, so they never make it in.
        assert!(!text.contains("Home | News"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_falls_back_to_long_paragraphs() {
        let html = "<html><body>\
            <div><p>Short.</p></div>\
            <div><p>This paragraph is long enough to be considered proper body \
            content even though it sits in an anonymous div.</p></div>\
            </body></html>";

        let text = extract_article_text(html);
        assert!(text.contains("long enough to be considered"));
        assert!(!text.contains("Short."));
    }

    #[test]
    fn test_empty_document_yields_empty_string() {
        assert_eq!(extract_article_text("<html><body></body></html>"), "");
        assert_eq!(extract_article_text(""), "");
    }

    #[test]
    fn test_extract_og_image() {
        let html = r#"<html><head>
            <meta property="og:image" content="https://example.com/og.jpg"/>
            </head><body></body></html>"#;
        assert_eq!(
            extract_og_image(html),
            Some("https://example.com/og.jpg".to_string())
        );
    }

    #[test]
    fn test_extract_og_image_twitter_fallback() {
        let html = r#"<html><head>
            <meta name="twitter:image" content="https://example.com/card.png"/>
            </head><body></body></html>"#;
        assert_eq!(
            extract_og_image(html),
            Some("https://example.com/card.png".to_string())
        );
    }

    #[test]
    fn test_extract_og_image_missing() {
        assert_eq!(extract_og_image("<html><head></head></html>"), None);
    }

    #[test]
    fn test_extract_first_img_from_fragment() {
        let fragment = r#"<p>Intro</p><img src="https://example.com/inline.png" alt=""/>"#;
        assert_eq!(
            extract_first_img(fragment),
            Some("https://example.com/inline.png".to_string())
        );
        assert_eq!(extract_first_img("<p>no images</p>"), None);
        // Relative src is useless without a base URL; skip it.
        assert_eq!(extract_first_img(r#"<img src="/relative.png"/>"#), None);
    }

    struct FailingPage;

    #[async_trait]
    impl PageSource for FailingPage {
        async fn get_html(&self, _url: &str) -> Result<String, FeedError> {
            Err(FeedError::Timeout)
        }
    }

    #[tokio::test]
    async fn test_fetch_article_text_swallows_failures() {
        let text = fetch_article_text(&FailingPage, "https://example.com/x").await;
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_fetch_og_image_swallows_failures() {
        let img = fetch_og_image(&FailingPage, "https://example.com/x").await;
        assert!(img.is_none());
    }
}
