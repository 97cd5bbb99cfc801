use reqwest::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - API base URL is an absolute http(s) URL
/// - Source container has the `owner/name` shape
/// - Page size is within the upstream limit (1..=100)
/// - Worker pools and timeout are non-zero
/// - Retry status codes are real HTTP status codes
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let base = Url::parse(&config.api.base_url).map_err(|e| {
        ConfigError::ValidationError(format!("api.base_url is not a valid URL: {}", e))
    })?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "api.base_url must use http or https, got {}",
            base.scheme()
        )));
    }

    if config.api.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "api.timeout_secs cannot be 0".to_string(),
        ));
    }

    let mut parts = config.source.container.split('/');
    let well_formed = matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    );
    if !well_formed {
        return Err(ConfigError::ValidationError(format!(
            "source.container must look like owner/name, got {:?}",
            config.source.container
        )));
    }

    if !(1..=100).contains(&config.source.per_page) {
        return Err(ConfigError::ValidationError(
            "source.per_page must be between 1 and 100".to_string(),
        ));
    }

    if config.concurrency.page_workers == 0 || config.concurrency.enrich_workers == 0 {
        return Err(ConfigError::ValidationError(
            "concurrency workers cannot be 0".to_string(),
        ));
    }

    if let Some(bad) = config
        .retry
        .retry_statuses
        .iter()
        .find(|s| !(100..=599).contains(*s))
    {
        return Err(ConfigError::ValidationError(format!(
            "retry.retry_statuses contains invalid status {}",
            bad
        )));
    }

    Ok(())
}
