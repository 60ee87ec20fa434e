//! Robots.txt parser implementation
//!
//! Allow/disallow matching is delegated to the robotstxt crate, which applies
//! longest-match semantics and prefers agent-specific groups over `*`.
//! Crawl-delay is not covered by that crate, so it is parsed here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Crawl-delay values above this many seconds are ignored
const MAX_CRAWL_DELAY_SECS: f64 = 3600.0;

/// Parsed robots.txt data for one host
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    /// Whether to allow all (true = allow all, false = parse content)
    allow_all: bool,
    /// Crawl-delay groups in file order
    groups: Vec<DelayGroup>,
}

#[derive(Debug, Clone, Default)]
struct DelayGroup {
    agents: Vec<String>,
    crawl_delay: Option<Duration>,
}

/// Product token used to match robots.txt groups
///
/// `"crawlerbykc/1.0 (+https://example.org)"` matches groups named `crawlerbykc`.
pub fn agent_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .find(|s| !s.is_empty())
        .unwrap_or("*")
        .to_string()
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
            groups: parse_delay_groups(content),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is missing, cannot be fetched, or
    /// robots handling is disabled.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
            groups: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_allow_all(&self) -> bool {
        self.allow_all
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The robots product token (see [`agent_token`])
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming the agent wins over the `*` group, even if the
    /// agent's group declares no delay of its own.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        if self.allow_all {
            return None;
        }

        let agent = user_agent.to_lowercase();
        let specific: Vec<&DelayGroup> = self
            .groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a != "*" && agent.starts_with(a.as_str())))
            .collect();

        if !specific.is_empty() {
            return specific.iter().find_map(|g| g.crawl_delay);
        }

        self.groups
            .iter()
            .filter(|g| g.agents.iter().any(|a| a == "*"))
            .find_map(|g| g.crawl_delay)
    }
}

/// Splits robots.txt into user-agent groups and records each group's crawl-delay
///
/// Consecutive `User-agent` lines share one group; a `User-agent` line that
/// follows any other directive starts a new one.
fn parse_delay_groups(content: &str) -> Vec<DelayGroup> {
    let mut groups: Vec<DelayGroup> = Vec::new();
    let mut in_agent_lines = false;

    for line in content.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !in_agent_lines {
                    groups.push(DelayGroup::default());
                    in_agent_lines = true;
                }
                if let Some(group) = groups.last_mut() {
                    group.agents.push(value.to_lowercase());
                }
            }
            "crawl-delay" => {
                in_agent_lines = false;
                if let (Some(group), Ok(secs)) = (groups.last_mut(), value.parse::<f64>()) {
                    if secs <= MAX_CRAWL_DELAY_SECS {
                        group.crawl_delay = Duration::try_from_secs_f64(secs).ok();
                    }
                }
            }
            _ => in_agent_lines = false,
        }
    }

    groups
}
