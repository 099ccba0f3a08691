use crate::config::types::{CacheConfig, Config, CrawlerConfig, FetcherConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if !(1..=64).contains(&config.num_threads) {
        return Err(invalid(format!(
            "crawler.num-threads must be between 1 and 64, got {}",
            config.num_threads
        )));
    }

    if config.robots_agent.trim().is_empty() {
        return Err(invalid("crawler.robots-agent cannot be empty"));
    }

    match config.robots_scheme.as_str() {
        "http" | "https" => {}
        other => {
            return Err(invalid(format!(
                "crawler.robots-scheme must be 'http' or 'https', got '{}'",
                other
            )))
        }
    }

    if config.robots_timeout_secs == 0 {
        return Err(invalid("crawler.robots-timeout-secs must be at least 1"));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 || config.fallback_timeout_secs == 0 {
        return Err(invalid("fetcher timeouts must be at least 1 second"));
    }

    if config.max_single_paragraph_chars < 100 {
        return Err(invalid(format!(
            "fetcher.max-single-paragraph-chars must be at least 100, got {}",
            config.max_single_paragraph_chars
        )));
    }

    Ok(())
}

/// Validates the identity sent to crawled sites
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid(format!(
            "user-agent.crawler-name must be non-empty, letters, digits and hyphens only, got '{}'",
            name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("contact-url '{}': {}", config.contact_url, e)))?;

    if !is_plausible_email(&config.contact_email) {
        return Err(invalid(format!(
            "user-agent.contact-email is not an email address: '{}'",
            config.contact_email
        )));
    }

    Ok(())
}

fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(invalid("cache.path cannot be empty"));
    }
    Ok(())
}

/// `local@domain.tld`, with exactly one `@`
fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.contains('@') && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}
