use crate::config::types::{Config, CrawlerConfig, OutputConfig};
use crate::{ConfigError, ConfigResult};

/// Upper bound on the number of concurrent workers
pub const MAX_CONCURRENCY: u32 = 64;

/// Upper bound on the post-settle grace delay
pub const MAX_GRACE_DELAY_MS: u64 = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> ConfigResult<()> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    for (name, value) in [
        ("navigation-timeout-ms", config.navigation_timeout_ms),
        ("settle-timeout-ms", config.settle_timeout_ms),
        ("request-timeout-ms", config.request_timeout_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("{} must be > 0", name)));
        }
    }

    if config.grace_delay_ms > MAX_GRACE_DELAY_MS {
        return Err(ConfigError::Validation(format!(
            "grace-delay-ms must be <= {}ms, got {}ms",
            MAX_GRACE_DELAY_MS, config.grace_delay_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> ConfigResult<()> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }
    Ok(())
}
