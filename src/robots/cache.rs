//! Per-host robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per run, through the same
//! polite fetcher used for pages. Concurrent first queries for one host wait
//! on a single fetch. Entries never expire during a run.

use crate::crawler::{FetchOutcome, PoliteFetcher};
use crate::robots::parser::{agent_token, ParsedRobots};
use crate::url::{host_key, origin_of, WebUrl};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

/// Redirect hops followed when fetching robots.txt
const MAX_ROBOTS_REDIRECTS: usize = 5;

type Entry = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Caches robots policies and answers allow/deny and crawl-delay queries
pub struct RobotsPolicyCache {
    fetcher: Arc<PoliteFetcher>,
    agent: String,
    enabled: bool,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RobotsPolicyCache {
    /// Creates a cache that fetches through `fetcher`
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The shared polite fetcher
    /// * `user_agent` - Full user-agent string; its product token selects robots groups
    /// * `enabled` - When false, every query answers allow-all without fetching
    pub fn new(fetcher: Arc<PoliteFetcher>, user_agent: &str, enabled: bool) -> Self {
        Self {
            fetcher,
            agent: agent_token(user_agent),
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The robots product token this cache matches groups with
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Checks whether `url` may be fetched
    ///
    /// The first query for a host fetches its robots.txt; later queries are
    /// answered from the cache.
    pub async fn is_allowed(&self, url: &WebUrl) -> bool {
        let policy = self.policy_for(url.url(), url.host()).await;
        let allowed = policy.is_allowed(url.as_str(), &self.agent);
        if !allowed {
            tracing::debug!("Disallowed by robots.txt: {}", url);
        }
        allowed
    }

    /// Robots crawl-delay for the host of `url`, if one is declared
    pub async fn crawl_delay(&self, url: &WebUrl) -> Option<Duration> {
        self.policy_for(url.url(), url.host())
            .await
            .crawl_delay(&self.agent)
    }

    /// Number of hosts with a resolved policy
    pub fn cached_hosts(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    async fn policy_for(&self, url: &Url, host: &str) -> Arc<ParsedRobots> {
        if !self.enabled {
            return Arc::new(ParsedRobots::allow_all());
        }

        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(entries.entry(host.to_string()).or_default())
        };

        let policy = cell
            .get_or_init(|| async {
                let robots = self.load(url).await;
                let delay = robots.crawl_delay(&self.agent);
                if let Some(delay) = delay {
                    tracing::info!("Host {} requests crawl-delay {:?}", host, delay);
                }
                self.fetcher.hosts().set_crawl_delay(host, delay);
                Arc::new(robots)
            })
            .await;

        Arc::clone(policy)
    }

    /// Fetches and parses robots.txt; anything but a 200 means allow-all
    async fn load(&self, page_url: &Url) -> ParsedRobots {
        let mut robots_url = match Url::parse(&format!("{}/robots.txt", origin_of(page_url))) {
            Ok(url) => url,
            Err(_) => return ParsedRobots::allow_all(),
        };

        for _ in 0..=MAX_ROBOTS_REDIRECTS {
            match self.fetcher.fetch(&robots_url).await {
                FetchOutcome::Success(page) if page.status == 200 => {
                    tracing::debug!("Fetched {}", robots_url);
                    return ParsedRobots::from_content(&String::from_utf8_lossy(&page.body));
                }
                FetchOutcome::Success(page) => {
                    tracing::debug!("{} answered {}, allowing all", robots_url, page.status);
                    return ParsedRobots::allow_all();
                }
                FetchOutcome::Redirect { location, .. } => match Url::parse(&location) {
                    Ok(next) if host_key(&next).is_some() => robots_url = next,
                    _ => return ParsedRobots::allow_all(),
                },
                FetchOutcome::Failure(e) => {
                    tracing::debug!("No robots.txt at {} ({}), allowing all", robots_url, e);
                    return ParsedRobots::allow_all();
                }
            }
        }

        tracing::warn!("Too many redirects for {}, allowing all", robots_url);
        ParsedRobots::allow_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;
    use crate::state::HostRegistry;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_cache(enabled: bool) -> RobotsPolicyCache {
        let config = CrawlConfig {
            politeness_delay: 0,
            user_agent_string: "TestBot/1.0".to_string(),
            ..CrawlConfig::default()
        };
        let hosts = Arc::new(HostRegistry::new(config.politeness(), 4));
        let fetcher = Arc::new(PoliteFetcher::new(&config, hosts).unwrap());
        RobotsPolicyCache::new(fetcher, &config.user_agent_string, enabled)
    }

    #[tokio::test]
    async fn test_disallow_and_crawl_delay() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /private/\nCrawl-delay: 2"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = create_test_cache(true);
        let open = WebUrl::seed(&format!("{}/public", server.uri())).unwrap();
        let closed = WebUrl::seed(&format!("{}/private/page", server.uri())).unwrap();

        assert!(cache.is_allowed(&open).await);
        assert!(!cache.is_allowed(&closed).await);
        assert_eq!(cache.crawl_delay(&open).await, Some(Duration::from_secs(2)));
        assert_eq!(
            cache.fetcher.hosts().host(open.host()).crawl_delay(),
            Some(Duration::from_secs(2))
        );
        assert_eq!(cache.cached_hosts(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cache = create_test_cache(true);
        let url = WebUrl::seed(&format!("{}/anything", server.uri())).unwrap();
        assert!(cache.is_allowed(&url).await);
        assert_eq!(cache.crawl_delay(&url).await, None);
    }

    #[tokio::test]
    async fn test_server_error_allows_all() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let cache = create_test_cache(true);
        let url = WebUrl::seed(&format!("{}/a", server.uri())).unwrap();
        assert!(cache.is_allowed(&url).await);
        assert!(cache.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn test_disabled_never_fetches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
            .expect(0)
            .mount(&server)
            .await;

        let cache = create_test_cache(false);
        let url = WebUrl::seed(&format!("{}/a", server.uri())).unwrap();
        assert!(cache.is_allowed(&url).await);
        assert_eq!(cache.cached_hosts(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_queries_fetch_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(create_test_cache(true));
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = Arc::clone(&cache);
            let url = WebUrl::seed(&format!("{}/p{}", server.uri(), i)).unwrap();
            handles.push(tokio::spawn(async move { cache.is_allowed(&url).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}
