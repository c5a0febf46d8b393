//! Web page fetching and readable-text extraction

use ::scraper::{ElementRef, Html, Node, Selector};
use reqwest::{Client, Url};
use std::time::Duration;

use crate::config::ScraperConfig;
use crate::error::{Error, Result};

/// Elements whose text is page chrome or code rather than content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// Parse and validate a URL submitted for scraping
pub fn parse_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::validation("URL is required"));
    }

    let url = Url::parse(raw).map_err(|_| Error::validation("Invalid URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(Error::validation("Only http and https URLs can be scraped")),
    }
}

/// Fetches pages with a browser user agent and a bounded timeout
#[derive(Clone)]
pub struct WebScraper {
    client: Client,
}

impl WebScraper {
    /// Create a new scraper
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch `url` and return its readable text.
    ///
    /// Fails with [`Error::EmptyContent`] when nothing is left after cleanup.
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        tracing::debug!("Fetching {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::extraction(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::extraction(format!("{} returned HTTP {}", url, status)));
        }

        let html = response
            .text()
            .await
            .map_err(|e| Error::extraction(format!("Failed to read body of {}: {}", url, e)))?;

        let text = extract_readable_text(&html);
        if text.is_empty() {
            return Err(Error::EmptyContent);
        }

        tracing::debug!("Extracted {} characters from {}", text.chars().count(), url);
        Ok(text)
    }
}

/// Body text without scripts, styles or navigation, with whitespace
/// runs collapsed to single spaces
pub fn extract_readable_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    // Selector is a literal and always parses
    if let Ok(body_selector) = Selector::parse("body") {
        for body in document.select(&body_selector) {
            collect_text(body, &mut raw);
        }
    }

    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if !SKIPPED_ELEMENTS.contains(&el.name()) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
            }
            _ => {}
        }
    }
}

/// Collapse whitespace runs to one space and trim
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
