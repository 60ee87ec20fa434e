//! Parser adapter turning fetched bytes into page data
//!
//! This module handles parsing fetched content to extract:
//! - Page title, visible text and raw markup for HTML
//! - Outgoing links (anchors, image maps, frames and canonical links)
//! - Plain text for other `text/*` content
//!
//! The engine only talks to the [`HtmlParser`] trait, so the scraper-based
//! default can be swapped out.

use crate::url::normalize_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Reasons a fetched body could not be parsed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("body of {url} is not valid UTF-8")]
    InvalidEncoding { url: String },
}

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlParseData {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text, whitespace-collapsed
    pub text: String,

    /// The raw markup
    pub html: String,

    /// Normalized absolute links, in document order, without duplicates
    pub outgoing_urls: Vec<String>,
}

/// Parsed content of a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseData {
    Html(HtmlParseData),
    Text(String),
    /// Non-text content; the bytes stay on the page
    Binary,
}

impl ParseData {
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary)
    }

    pub fn as_html(&self) -> Option<&HtmlParseData> {
        match self {
            Self::Html(data) => Some(data),
            _ => None,
        }
    }

    /// Text content for HTML and plain text pages
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Html(data) => Some(&data.text),
            Self::Text(text) => Some(text),
            Self::Binary => None,
        }
    }

    /// Outgoing links; empty for anything but HTML
    pub fn outgoing_urls(&self) -> &[String] {
        match self {
            Self::Html(data) => &data.outgoing_urls,
            _ => &[],
        }
    }
}

/// Converts a fetched body into [`ParseData`]
pub trait HtmlParser: Send + Sync {
    /// Parses `body` fetched from `url`
    ///
    /// # Arguments
    ///
    /// * `body` - Raw response bytes
    /// * `content_type` - The Content-Type header, if any
    /// * `url` - The fetched URL, used to resolve relative links
    fn parse(&self, body: &[u8], content_type: Option<&str>, url: &Url)
        -> Result<ParseData, ParseError>;
}

/// Default [`HtmlParser`] backed by the `scraper` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ScraperParser;

impl HtmlParser for ScraperParser {
    fn parse(
        &self,
        body: &[u8],
        content_type: Option<&str>,
        url: &Url,
    ) -> Result<ParseData, ParseError> {
        let kind = ContentKind::of(content_type);
        if kind == ContentKind::Binary {
            return Ok(ParseData::Binary);
        }

        let decoded = std::str::from_utf8(body).map_err(|_| ParseError::InvalidEncoding {
            url: url.to_string(),
        })?;

        match kind {
            ContentKind::Html => Ok(ParseData::Html(parse_html(decoded, url))),
            _ => Ok(ParseData::Text(decoded.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Html,
    Text,
    Binary,
}

impl ContentKind {
    /// Missing Content-Type is treated as HTML
    fn of(content_type: Option<&str>) -> Self {
        let Some(value) = content_type else {
            return Self::Html;
        };
        let mime = value
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        if mime.is_empty() || mime.contains("html") {
            Self::Html
        } else if mime.starts_with("text/") || mime.ends_with("xml") || mime.ends_with("json") {
            Self::Text
        } else {
            Self::Binary
        }
    }
}

/// Parses HTML content and extracts title, text and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href>` and `<area href>`
/// - `<frame src>` and `<iframe src>`
/// - `<link rel="canonical" href>`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
///
/// Relative links resolve against `<base href>` when present.
///
/// # Example
///
/// ```
/// use crawlerbykc::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.outgoing_urls, vec!["https://example.com/page".to_string()]);
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> HtmlParseData {
    let document = Html::parse_document(html);
    let base_url = extract_base(&document, page_url);

    HtmlParseData {
        title: extract_title(&document),
        text: extract_text(&document),
        html: html.to_string(),
        outgoing_urls: extract_links(&document, &base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|base| base.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Collects visible text, skipping script and style contents
fn extract_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .map(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"))
            .unwrap_or(false);
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

/// Extracts all valid links from the HTML document, in document order
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href], area[href], frame[src], iframe[src], link[href]")
    else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let el = element.value();
        let target = match el.name() {
            "a" | "area" => {
                // Skip if it has the download attribute
                if el.attr("download").is_some() {
                    continue;
                }
                el.attr("href")
            }
            "frame" | "iframe" => el.attr("src"),
            "link" => {
                let canonical = el
                    .attr("rel")
                    .map(|rel| {
                        rel.split_whitespace()
                            .any(|r| r.eq_ignore_ascii_case("canonical"))
                    })
                    .unwrap_or(false);
                if !canonical {
                    continue;
                }
                el.attr("href")
            }
            _ => None,
        };

        if let Some(absolute) = target.and_then(|href| resolve_link(href, base_url)) {
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }
    }

    links
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok().map(|url| url.to_string())
}
