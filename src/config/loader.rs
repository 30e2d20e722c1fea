//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    InvalidPort(String),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::InvalidPort(v) => write!(f, "Invalid PORT value: {:?}", v),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration from a TOML file, apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: GatewayConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl GatewayConfig {
    /// Defaults plus environment overrides, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    /// Apply `PORT` and `USE_DOCKER`. Environment always wins over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").filter(|v| !v.is_empty()) {
            self.listener.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        // Only the literal "false" turns containers off.
        if let Some(use_docker) = lookup("USE_DOCKER") {
            self.workers.use_docker = use_docker != "false";
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides(env(&[])).unwrap();
        assert_eq!(config.listener.port, 2022);
        assert!(config.workers.use_docker);
    }

    #[test]
    fn test_port_override() {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides(env(&[("PORT", "3000")])).unwrap();
        assert_eq!(config.listener.port, 3000);

        let err = config.apply_env_overrides(env(&[("PORT", "abc")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
    }

    #[test]
    fn test_use_docker_only_false_disables() {
        let mut config = GatewayConfig::default();
        config.apply_env_overrides(env(&[("USE_DOCKER", "false")])).unwrap();
        assert!(!config.workers.use_docker);

        config.apply_env_overrides(env(&[("USE_DOCKER", "no")])).unwrap();
        assert!(config.workers.use_docker);

        config.apply_env_overrides(env(&[("USE_DOCKER", "FALSE")])).unwrap();
        assert!(config.workers.use_docker);
    }

    #[test]
    fn test_load_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[listener]
port = 4000

[[upstreams]]
prefix = "/"
target = "http://127.0.0.1:9000"

[workers]
containers = ["srs-server"]
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.upstreams.len(), 1);
        assert_eq!(config.workers.containers, vec!["srs-server".to_string()]);
        assert_eq!(config.timeouts.upstream_secs, 30);
    }

    #[test]
    fn test_load_config_rejects_missing_catch_all() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[upstreams]]
prefix = "/api/"
target = "http://127.0.0.1:1985"
"#
        )
        .unwrap();

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
