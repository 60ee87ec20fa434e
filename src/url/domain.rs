use url::Url;

/// Extracts the politeness key of a URL
///
/// Politeness and connection limits apply per `host[:port]`, so two servers
/// on the same machine but different ports are treated as different hosts.
/// Default ports are already dropped by the `url` crate.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use crawlerbykc::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Origin (`scheme://host[:port]`) used to locate robots.txt
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
