use crate::config::types::{Config, CrawlConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a launcher file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use crawlerbykc::config::load_config;
///
/// let config = load_config(Path::new("crawl.toml")).unwrap();
/// println!("Politeness delay: {}ms", config.crawl.politeness_delay);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates launcher content already in memory
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Hashes the crawl settings that change what a resumed crawl would admit
///
/// Stored with every durable run so a resumed crawl can tell that the
/// limits it was started with no longer match.
pub fn fingerprint_crawl_config(config: &CrawlConfig) -> String {
    let canonical = format!(
        "depth={};pages={};delay={};agent={};conns={};redirects={};robots={};links={}",
        config.max_depth_of_crawling,
        config.max_pages_to_fetch,
        config.politeness_delay,
        config.user_agent_string,
        config.max_connections_per_host,
        config.follow_redirects,
        config.respect_robots_txt,
        config.max_outgoing_links_to_follow,
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
