//! Reading configuration files from disk
//!
//! The file is read as raw bytes exactly once: the same buffer feeds both
//! the SHA-256 fingerprint (logged at startup so a run can be matched to
//! the exact settings it used) and the TOML parser.

use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A configuration file pulled from disk, plus its content fingerprint
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Hex SHA-256 of the raw file bytes
    pub fingerprint: String,
}

/// Reads, parses, validates and fingerprints a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(LoadedConfig)` - The usable configuration and its fingerprint
/// * `Err(ConfigError)` - Unreadable file, bad TOML, or out-of-range setting
pub fn read_config_file(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let raw = std::fs::read(path)?;
    let fingerprint = hex::encode(Sha256::digest(&raw));

    let text = std::str::from_utf8(&raw).map_err(|_| {
        ConfigError::Validation(format!("{} is not valid UTF-8", path.display()))
    })?;
    let config: Config = toml::from_str(text)?;
    validate(&config)?;

    Ok(LoadedConfig {
        config,
        fingerprint,
    })
}

/// Convenience wrapper when the fingerprint is not needed
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Ok(read_config_file(path)?.config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reads_and_validates_a_full_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "trawl.toml",
            br#"
[engine]
threads = 8
throttle-ms = 100
domain-parallelism = 2
buffer-size = 50

[http]
user-agent = "test-bot/1.0"
timeout-secs = 15.0

[resolve]
max-redirects = 10
"#,
        );

        let loaded = read_config_file(&path).unwrap();
        assert_eq!(loaded.config.engine.threads, 8);
        assert_eq!(loaded.config.engine.throttle_ms, 100);
        assert_eq!(
            loaded.config.http.user_agent.as_deref(),
            Some("test-bot/1.0")
        );
        assert_eq!(loaded.config.resolve.max_redirects, 10);
        assert_eq!(loaded.fingerprint.len(), 64);
    }

    #[test]
    fn test_fingerprint_follows_content_not_path() {
        let dir = TempDir::new().unwrap();
        let a = write_config(&dir, "a.toml", b"[engine]\nthreads = 2\n");
        let b = write_config(&dir, "b.toml", b"[engine]\nthreads = 2\n");
        let c = write_config(&dir, "c.toml", b"[engine]\nthreads = 3\n");

        let fp_a = read_config_file(&a).unwrap().fingerprint;
        let fp_b = read_config_file(&b).unwrap().fingerprint;
        let fp_c = read_config_file(&c).unwrap().fingerprint;

        assert_eq!(fp_a, fp_b);
        assert_ne!(fp_a, fp_c);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = read_config_file(Path::new("/nonexistent/trawl.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad.toml", b"[engine\nthreads = ");
        assert!(matches!(
            read_config_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_non_utf8_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "binary.toml", &[0xFF, 0xFE, 0x00, b'x']);
        assert!(matches!(
            read_config_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_settings() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "zero.toml", b"[engine]\nthreads = 0\n");
        assert!(matches!(
            read_config_file(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_load_config_drops_the_fingerprint() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "trawl.toml", b"[engine]\nbuffer-size = 10\n");
        let config = load_config(&path).unwrap();
        assert_eq!(config.engine.buffer_size, 10);
    }
}
