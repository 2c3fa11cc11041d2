use crate::config::types::{Config, CrawlerConfig, OracleConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use std::time::Duration;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    if let Some(oracle) = &config.oracle {
        validate_oracle_config(oracle)?;
    }
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Runs before any network activity; every failure here is fatal.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    // Zero delay is allowed; it only has to be representable
    config.request_delay()?;

    validate_timeout(
        "fetch_timeout_seconds",
        config.fetch_timeout_seconds,
        config.fetch_timeout()?,
    )?;
    validate_timeout(
        "scorer_timeout_seconds",
        config.scorer_timeout_seconds,
        config.scorer_timeout()?,
    )?;

    if config.priority_threshold > 10 {
        return Err(ConfigError::Validation(format!(
            "priority_threshold must be between 0 and 10, got {}",
            config.priority_threshold
        )));
    }

    if config.max_links_per_score_batch < 1 {
        return Err(ConfigError::Validation(
            "max_links_per_score_batch must be >= 1".to_string(),
        ));
    }

    if config.max_workers < 1 || config.max_workers > 100 {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and 100, got {}",
            config.max_workers
        )));
    }

    if config.max_body_chars == Some(0) {
        return Err(ConfigError::Validation(
            "max_body_chars must be >= 1 when set".to_string(),
        ));
    }

    if config.requests_per_minute == Some(0) {
        return Err(ConfigError::Validation(
            "requests_per_minute must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// A timeout must still be positive after conversion to a `Duration`
fn validate_timeout(name: &str, value: f64, timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::Validation(format!(
            "{} must be a positive number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    if let Some(email) = &config.contact_email {
        validate_email(email)?;
    }

    Ok(())
}

/// Validates oracle configuration
fn validate_oracle_config(config: &OracleConfig) -> Result<(), ConfigError> {
    let endpoint = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid oracle endpoint: {}", e)))?;

    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Oracle endpoint '{}' must use HTTP or HTTPS",
            config.endpoint
        )));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    if config.model.is_empty() {
        return Err(ConfigError::Validation("model cannot be empty".to_string()));
    }

    if config.max_content_chars < 1 {
        return Err(ConfigError::Validation(
            "max_content_chars must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("database_path", &config.database_path),
        ("jsonl_path", &config.jsonl_path),
        ("report_path", &config.report_path),
    ];

    for (name, path) in paths {
        if matches!(path, Some(p) if p.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "{} cannot be empty when set",
                name
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
