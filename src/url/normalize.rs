use crate::UrlError;
use url::Url;

/// Normalizes a URL into the canonical form used for frontier identity
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Require a host; lowercase it (the `url` crate also drops default ports)
/// 4. Normalize path:
///    - Remove dot segments (. and ..)
///    - Collapse repeated slashes
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Sort query parameters, keeping their original encoding
/// 7. Remove empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use crawlerbykc::url::normalize_url;
///
/// let url = normalize_url("HTTP://Example.COM:80/a/../b?z=1&a=2#top").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/b?a=2&z=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Malformed {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered)).map_err(|e| UrlError::Malformed {
                    url: url_str.to_string(),
                    reason: format!("Failed to set host: {}", e),
                })?;
            }
        }
        _ => return Err(UrlError::MissingHost(url_str.to_string())),
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if let Some(sorted) = url.query().map(sort_query) {
        if sorted.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&sorted));
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and repeated slashes
///
/// A trailing slash is significant to most servers and is kept.
fn normalize_path(path: &str) -> String {
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }

    let trailing_slash = path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}

/// Sorts `key=value` pairs by key without decoding them
fn sort_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
    pairs.sort_by(|a, b| {
        let key_a = a.split('=').next().unwrap_or(a);
        let key_b = b.split('=').next().unwrap_or(b);
        key_a.cmp(key_b)
    });
    pairs.join("&")
}
