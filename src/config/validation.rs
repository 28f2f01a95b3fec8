//! Configuration validation
//!
//! Catches impossible settings at load time so the engine never has to.

use crate::config::types::Config;
use crate::ConfigError;

/// Validates a loaded configuration
///
/// # Returns
///
/// * `Ok(())` - The configuration is usable
/// * `Err(ConfigError::Validation)` - A setting is out of range
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.engine.threads == 0 {
        return Err(ConfigError::Validation(
            "engine.threads must be at least 1".to_string(),
        ));
    }

    if config.engine.domain_parallelism == 0 {
        return Err(ConfigError::Validation(
            "engine.domain-parallelism must be at least 1".to_string(),
        ));
    }

    if config.engine.buffer_size == 0 {
        return Err(ConfigError::Validation(
            "engine.buffer-size must be at least 1".to_string(),
        ));
    }

    if config.http.timeout_secs <= 0.0 || !config.http.timeout_secs.is_finite() {
        return Err(ConfigError::Validation(format!(
            "http.timeout-secs must be a positive number, got {}",
            config.http.timeout_secs
        )));
    }

    if config.http.connect_timeout_secs <= 0.0 || !config.http.connect_timeout_secs.is_finite() {
        return Err(ConfigError::Validation(format!(
            "http.connect-timeout-secs must be a positive number, got {}",
            config.http.connect_timeout_secs
        )));
    }

    if config.resolve.max_redirects == 0 {
        return Err(ConfigError::Validation(
            "resolve.max-redirects must be at least 1".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut config = Config::default();
        config.engine.threads = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let mut config = Config::default();
        config.engine.domain_parallelism = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = Config::default();
        config.engine.buffer_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_nonpositive_timeout_rejected() {
        let mut config = Config::default();
        config.http.timeout_secs = 0.0;
        assert!(validate(&config).is_err());

        config.http.timeout_secs = -1.0;
        assert!(validate(&config).is_err());

        config.http.timeout_secs = f64::NAN;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_max_redirects_rejected() {
        let mut config = Config::default();
        config.resolve.max_redirects = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_throttle_is_allowed() {
        let mut config = Config::default();
        config.engine.throttle_ms = 0;
        assert!(validate(&config).is_ok());
    }
}
