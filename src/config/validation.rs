use crate::config::types::{Config, CrawlConfig, LaunchConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire launcher configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_launch_config(&config.launch)?;
    Ok(())
}

/// Validates the crawl engine configuration
///
/// Unsigned fields cannot go negative, so the checks here cover the lower
/// bounds that zero would violate and the string fields.
pub fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.storage_folder.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage_folder cannot be empty".to_string(),
        ));
    }

    if config.user_agent_string.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent_string cannot be empty".to_string(),
        ));
    }

    if config.max_connections_per_host < 1 {
        return Err(ConfigError::Validation(format!(
            "max_connections_per_host must be >= 1, got {}",
            config.max_connections_per_host
        )));
    }

    if config.connection_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "connection_timeout must be >= 1ms, got {}ms",
            config.connection_timeout
        )));
    }

    if config.socket_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "socket_timeout must be >= 1ms, got {}ms",
            config.socket_timeout
        )));
    }

    if config.max_download_size < 1 {
        return Err(ConfigError::Validation(format!(
            "max_download_size must be >= 1 byte, got {}",
            config.max_download_size
        )));
    }

    Ok(())
}

/// Validates the launch section
fn validate_launch_config(config: &LaunchConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 256 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 256, got {}",
            config.workers
        )));
    }

    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "at least one seed URL is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    for prefix in &config.allowed_prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "allowed prefix cannot be empty".to_string(),
            ));
        }
    }

    for ext in &config.skip_extensions {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::InvalidPattern(format!(
                "skip extension '{}' must be non-empty and alphanumeric",
                ext
            )));
        }
    }

    Ok(())
}
