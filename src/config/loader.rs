//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here/cachr.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn bad_toml_is_parse_error() {
        let err = parse_config("[target\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_validation_errors() {
        let err = parse_config("[poll]\nfds_count = 0\n").unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors[0].field, "poll.fds_count"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn loads_from_disk() {
        let path = std::env::temp_dir().join(format!("cachr-config-{}.toml", std::process::id()));
        fs::write(&path, "[target]\nhost = \"upstream\"\nport = 81\n\n[cache]\nttl = 5\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.target.host, "upstream");
        assert_eq!(config.cache.ttl, 5);

        fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn sample_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("cachr.toml");
        let config = load_config(&path).unwrap();
        let defaults = ProxyConfig::default();

        assert_eq!(config.listen_address(), defaults.listen_address());
        assert_eq!(config.target_address(), defaults.target_address());
        assert_eq!(config.cache.ttl, defaults.cache.ttl);
        assert_eq!(config.limits.max_message_size, defaults.limits.max_message_size);
    }
}
