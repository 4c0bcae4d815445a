//! Web content retrieval
//!
//! Retrieval never fails loudly: a page that cannot be fetched comes back
//! with empty body text and callers treat that as "nothing to read".

use crate::config::RetrievalConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_collaborator_call;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retrieved page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub body_text: String,
}

impl PageContent {
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.body_text.trim().is_empty()
    }
}

/// Trait for retrieving the textual content of a URL
#[async_trait]
pub trait ContentRetriever: Send + Sync {
    /// Fetch `url`; failures yield empty body text
    async fn retrieve(&self, url: &str) -> PageContent;
}

/// Tavily extract client with direct HTML fallback
pub struct TavilyExtractClient {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    html_fallback: bool,
    user_agent: String,
}

#[derive(Serialize)]
struct ExtractRequest<'a> {
    api_key: &'a str,
    urls: [&'a str; 1],
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractResult>,
    #[serde(default)]
    failed_results: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ExtractResult {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    raw_content: Option<String>,
}

impl TavilyExtractClient {
    pub fn new(config: &RetrievalConfig, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.is_empty()),
            endpoint: config.endpoint.clone(),
            html_fallback: config.html_fallback,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn extract(&self, url: &str) -> Result<PageContent> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::Configuration {
            message: "no API key for the extract endpoint".to_string(),
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExtractRequest {
                api_key,
                urls: [url],
            })
            .send()
            .await?
            .error_for_status()?;

        let data: ExtractResponse = response.json().await?;

        match data.results.into_iter().next() {
            Some(result) => Ok(PageContent {
                url: url.to_string(),
                title: result.title.unwrap_or_default(),
                body_text: result.raw_content.unwrap_or_default(),
            }),
            None => Err(AppError::Retrieval {
                url: url.to_string(),
                message: format!("extract failed ({} failed result(s))", data.failed_results.len()),
            }),
        }
    }

    async fn fetch_html(&self, url: &str) -> Result<PageContent> {
        let html = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(page_from_html(url, &html))
    }
}

#[async_trait]
impl ContentRetriever for TavilyExtractClient {
    async fn retrieve(&self, url: &str) -> PageContent {
        let start = Instant::now();

        let page = match self.extract(url).await {
            Ok(page) if !page.is_empty() => Ok(page),
            Ok(_) => Err(AppError::Retrieval {
                url: url.to_string(),
                message: "empty content".to_string(),
            }),
            Err(e) => Err(e),
        };

        let page = match page {
            Ok(page) => page,
            Err(e) if self.html_fallback => {
                debug!(url, error = %e, "Extract failed, fetching page directly");
                match self.fetch_html(url).await {
                    Ok(page) => page,
                    Err(e) => {
                        warn!(url, error = %e, "Direct fetch failed");
                        PageContent::empty(url)
                    }
                }
            }
            Err(e) => {
                warn!(url, error = %e, "Content retrieval failed");
                PageContent::empty(url)
            }
        };

        record_collaborator_call("retrieval", start.elapsed().as_secs_f64(), !page.is_empty());
        page
    }
}

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid title selector"));
static BODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid body selector"));

/// Elements whose text never reaches the reader
const SKIPPED: &[&str] = &[
    "head", "script", "style", "nav", "footer", "header", "noscript", "template",
];

/// Elements that start a new line of text
const BLOCKS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main",
    "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Build page content from a fetched HTML document
pub fn page_from_html(url: &str, html: &str) -> PageContent {
    let document = Html::parse_document(html);
    PageContent {
        url: url.to_string(),
        title: html_title(&document),
        body_text: html_to_text(&document),
    }
}

/// Extract the document title
pub fn html_title(document: &Html) -> String {
    document
        .select(&TITLE)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Reduce the document body to readable text, one phrase per line
pub fn html_to_text(document: &Html) -> String {
    let mut raw = String::new();
    for body in document.select(&BODY) {
        push_text(body, &mut raw);
    }

    raw.lines()
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        let block = BLOCKS.contains(&name);
        if block {
            out.push('\n');
        }
        push_text(child, out);
        if block {
            out.push('\n');
        }
    }
}

/// Create a retriever based on configuration
pub fn create_retriever(
    config: &RetrievalConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn ContentRetriever>> {
    Ok(Arc::new(TavilyExtractClient::new(config, api_key)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Budget &amp; Spending </title>
<style>body { color: red; }</style><script>var x = "<p>";</script></head>
<body><nav>Home | About</nav><h1>City budget</h1>
<p>The council approved   a 4% increase.</p><!-- tracking -->
<footer>Copyright</footer></body></html>"#;

    #[test]
    fn test_html_title() {
        assert_eq!(html_title(&Html::parse_document(PAGE)), "Budget & Spending");
        assert_eq!(html_title(&Html::parse_document("<p>no title</p>")), "");
    }

    #[test]
    fn test_html_to_text_drops_noise() {
        let text = html_to_text(&Html::parse_document(PAGE));
        assert!(text.contains("City budget"));
        assert!(text.contains("The council approved"));
        assert!(text.contains("a 4% increase."));
        assert!(!text.contains("Budget & Spending"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn test_entities_and_attributes_are_parsed() {
        let html = r#"<html><head><title>It&#8217;s news</title></head><body>
<p data-x="a>b">Growth was 5&#37; in 2024 &mdash; officials said.</p>
<div>Keep <b>reading</b></div></body></html>"#;
        let page = page_from_html("https://news.example", html);

        assert_eq!(page.title, "It\u{2019}s news");
        assert_eq!(
            page.body_text,
            "Growth was 5% in 2024 \u{2014} officials said.\nKeep reading"
        );
    }

    #[test]
    fn test_page_content_empty() {
        assert!(PageContent::empty("https://example.com").is_empty());
        let page = PageContent {
            url: "https://example.com".to_string(),
            title: String::new(),
            body_text: "  \n ".to_string(),
        };
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_without_fallback_yields_empty_page() {
        let config = RetrievalConfig {
            html_fallback: false,
            ..RetrievalConfig::default()
        };
        let client = TavilyExtractClient::new(&config, None).unwrap();
        let page = client.retrieve("https://example.com/article").await;
        assert!(page.is_empty());
        assert_eq!(page.url, "https://example.com/article");
    }
}
