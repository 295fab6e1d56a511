use crate::config::types::{Config, RateLimitConfig, SearchConfig};
use crate::crawler::BackendKind;
use crate::source::host_matches_source;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_routing(config)?;
    validate_backends(config)?;

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.output.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.retry.base_delay_ms == 0 {
        return Err(ConfigError::Validation(
            "base-delay-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates search configuration and seed URLs
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "At least one search seed is required".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    for entry in &config.seeds {
        let url = Url::parse(&entry.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", entry.url, e))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                entry.url
            )));
        }

        // Local hosts are allowed so integration tests can seed mock servers
        if let Some(host) = url.host_str() {
            let local = host == "localhost" || host.starts_with("127.");
            if !local && !host_matches_source(entry.source, &url) {
                return Err(ConfigError::Validation(format!(
                    "Seed URL '{}' does not belong to source '{}'",
                    entry.url, entry.source
                )));
            }
        }
    }

    Ok(())
}

/// Every source appearing in a seed must have a routed backend
fn validate_routing(config: &Config) -> Result<(), ConfigError> {
    for entry in &config.search.seeds {
        if !config.routing.contains_key(&entry.source) {
            return Err(ConfigError::Validation(format!(
                "No backend routed for source '{}'",
                entry.source
            )));
        }
    }
    Ok(())
}

/// Routed backends must be configured, and their limits must be sane
fn validate_backends(config: &Config) -> Result<(), ConfigError> {
    let uses_managed = config.routing.values().any(|k| *k == BackendKind::Managed);
    let uses_direct = config.routing.values().any(|k| *k == BackendKind::Direct);

    if uses_managed {
        let managed = config.backends.managed.as_ref().ok_or_else(|| {
            ConfigError::Validation(
                "Routing uses the managed backend but [backends.managed] is missing".to_string(),
            )
        })?;

        Url::parse(&managed.endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid managed endpoint '{}': {}",
                managed.endpoint, e
            ))
        })?;

        if managed.api_key.is_empty() {
            return Err(ConfigError::Validation(
                "Managed backend api-key cannot be empty".to_string(),
            ));
        }

        validate_rate_limits("managed", &managed.limits)?;
    }

    if uses_direct {
        let direct = config.backends.direct.as_ref().ok_or_else(|| {
            ConfigError::Validation(
                "Routing uses the direct backend but [backends.direct] is missing".to_string(),
            )
        })?;

        validate_rate_limits("direct", &direct.limits)?;
    }

    Ok(())
}

fn validate_rate_limits(backend: &str, limits: &RateLimitConfig) -> Result<(), ConfigError> {
    if limits.max_requests < 1 {
        return Err(ConfigError::Validation(format!(
            "{} backend max-requests must be >= 1, got {}",
            backend, limits.max_requests
        )));
    }

    if limits.window_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "{} backend window-secs must be >= 1, got {}",
            backend, limits.window_secs
        )));
    }

    if limits.max_concurrent < 1 || limits.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "{} backend max-concurrent must be between 1 and 100, got {}",
            backend, limits.max_concurrent
        )));
    }

    Ok(())
}
