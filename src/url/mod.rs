//! URL handling module for crawlerbykc
//!
//! This module provides URL normalization, host keys for politeness, and the
//! [`WebUrl`] crawl target that flows through the frontier.

mod domain;
mod normalize;

pub use domain::{host_key, origin_of};
pub use normalize::normalize_url;

use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// A normalized URL together with its place in the crawl graph
///
/// Seeds have depth 0 and no parent; every discovered child has the depth of
/// its parent plus one. The document id is assigned by the frontier when the
/// URL is accepted and stays `None` for candidates that were never admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebUrl {
    url: Url,
    host: String,
    depth: u32,
    doc_id: Option<i64>,
    parent_doc_id: Option<i64>,
    parent_url: Option<String>,
}

impl WebUrl {
    /// Builds a depth-0 seed from raw input
    ///
    /// # Errors
    ///
    /// Returns a [`UrlError`] when the input is not an absolute http(s) URL.
    pub fn seed(raw: &str) -> UrlResult<Self> {
        Self::build(raw, 0, None, None)
    }

    /// Builds a child discovered on `parent`'s page
    pub fn child(raw: &str, parent: &WebUrl) -> UrlResult<Self> {
        Self::build(
            raw,
            parent.depth.saturating_add(1),
            parent.doc_id,
            Some(parent.url.as_str().to_string()),
        )
    }

    /// Builds the target of a redirect issued while fetching `from`
    ///
    /// The redirect target stands in for `from`, so it inherits its depth
    /// and parent rather than going one level deeper.
    pub fn redirect(raw: &str, from: &WebUrl) -> UrlResult<Self> {
        Self::build(raw, from.depth, from.parent_doc_id, from.parent_url.clone())
    }

    /// Rebuilds an admitted target from a durable frontier record
    pub(crate) fn restore(
        raw: &str,
        doc_id: i64,
        depth: u32,
        parent_doc_id: Option<i64>,
        parent_url: Option<String>,
    ) -> UrlResult<Self> {
        let mut url = Self::build(raw, depth, parent_doc_id, parent_url)?;
        url.doc_id = Some(doc_id);
        Ok(url)
    }

    fn build(
        raw: &str,
        depth: u32,
        parent_doc_id: Option<i64>,
        parent_url: Option<String>,
    ) -> UrlResult<Self> {
        let url = normalize_url(raw)?;
        let host = host_key(&url).ok_or_else(|| UrlError::MissingHost(raw.to_string()))?;
        Ok(Self {
            url,
            host,
            depth,
            doc_id: None,
            parent_doc_id,
            parent_url,
        })
    }

    pub(crate) fn with_doc_id(mut self, doc_id: i64) -> Self {
        self.doc_id = Some(doc_id);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The `host[:port]` politeness key
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn doc_id(&self) -> Option<i64> {
        self.doc_id
    }

    pub fn parent_doc_id(&self) -> Option<i64> {
        self.parent_doc_id
    }

    pub fn parent_url(&self) -> Option<&str> {
        self.parent_url.as_deref()
    }

    pub fn is_seed(&self) -> bool {
        self.parent_url.is_none() && self.depth == 0
    }
}

impl fmt::Display for WebUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
