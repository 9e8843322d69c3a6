//! HTTP page fetching and readable-text extraction.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use super::{build_http_client, PageFetcher};
use crate::config::FetchSettings;
use crate::errors::{FetchError, Result};

/// Elements whose content is never part of the readable text.
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "noscript", "svg", "iframe", "form",
    "template",
];

/// Content containers tried in priority order.
const CONTENT_SELECTORS: &[&str] = &["article", "main", "[role=\"main\"]", "body"];

/// What kind of body a content type announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Html,
    PlainText,
}

/// Fetches pages over HTTP and returns their readable text.
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    max_response_bytes: u64,
    timeout: Duration,
}

impl HttpPageFetcher {
    /// Creates a fetcher with its own client.
    pub fn new(settings: &FetchSettings, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_http_client(settings)?, settings, timeout))
    }

    /// Creates a fetcher sharing an existing client.
    ///
    /// `timeout` bounds each fetch, body included.
    pub fn with_client(client: Client, settings: &FetchSettings, timeout: Duration) -> Self {
        Self {
            client,
            max_response_bytes: settings.max_response_bytes,
            timeout,
        }
    }

    fn map_error(&self, err: &reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_string();
        let kind = classify_content_type(&content_type)
            .ok_or_else(|| FetchError::UnsupportedContentType(content_type.clone()))?;

        let max = self.max_response_bytes;
        if let Some(size) = response.content_length() {
            if size > max {
                return Err(FetchError::TooLarge { size, max });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.map_error(&e))? {
            body.extend_from_slice(&chunk);
            let size = body.len() as u64;
            if size > max {
                return Err(FetchError::TooLarge { size, max });
            }
        }

        let raw = String::from_utf8_lossy(&body);
        let text = match kind {
            BodyKind::Html => extract_readable_text(&raw),
            BodyKind::PlainText => normalise_whitespace(&raw),
        };
        debug!(url, bytes = body.len(), chars = text.chars().count(), "Fetched page");
        Ok(text)
    }
}

fn classify_content_type(content_type: &str) -> Option<BodyKind> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "text/html" | "application/xhtml+xml" => Some(BodyKind::Html),
        "text/plain" => Some(BodyKind::PlainText),
        _ => None,
    }
}

/// Extracts readable text from an HTML document.
///
/// Boilerplate elements are skipped, the first non-empty of `article`,
/// `main`, `[role="main"]` and `body` is used, and whitespace is collapsed.
///
/// ```
/// use searchflow::providers::extract_readable_text;
///
/// let html = "<html><body><nav>Menu</nav><article><p>Graphene  is\n carbon.</p></article></body></html>";
/// assert_eq!(extract_readable_text(html), "Graphene is carbon.");
/// ```
#[must_use]
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let mut raw = String::new();
            collect_text(element, &mut raw);
            let text = normalise_whitespace(&raw);
            if !text.is_empty() {
                return text;
            }
        }
    }

    String::new()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child) = ElementRef::wrap(child) {
            if !BOILERPLATE_TAGS.contains(&child.value().name()) {
                collect_text(child, out);
            }
        }
    }
}

fn normalise_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
