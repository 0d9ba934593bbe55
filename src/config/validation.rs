use crate::config::types::Config;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// # Rules
///
/// * `base-dir` must not be empty
/// * `timeout-secs` must be greater than zero
/// * `max-concurrent-downloads` must be greater than zero
/// * `database-path` must not be empty
/// * user agent name and version must not be empty
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.archive.base_dir.trim().is_empty() {
        return Err(ConfigError::Validation(
            "archive.base-dir must not be empty".to_string(),
        ));
    }

    if config.archive.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "archive.timeout-secs must be greater than zero".to_string(),
        ));
    }

    if config.archive.max_concurrent_downloads == 0 {
        return Err(ConfigError::Validation(
            "archive.max-concurrent-downloads must be greater than zero".to_string(),
        ));
    }

    if config.catalog.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "catalog.database-path must not be empty".to_string(),
        ));
    }

    if config.user_agent.name.trim().is_empty() || config.user_agent.version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent.name and user-agent.version must not be empty".to_string(),
        ));
    }

    Ok(())
}
