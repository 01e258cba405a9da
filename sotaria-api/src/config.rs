//! Configuration management for the Sotaria apiserver
//!
//! Settings are loaded from:
//! 1. Environment variables (highest priority)
//! 2. Configuration file (TOML format)
//! 3. Default values (lowest priority)

use crate::logging::LogRotation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SotariaConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub kubernetes: KubernetesConfig,
    pub identity: IdentityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for rolling log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// hourly, daily or never
    pub rotation: String,
    /// JSON console output
    pub json: bool,
}

/// Kubernetes client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Explicit kubeconfig path; inferred when unset
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    /// How long startup waits for the directory caches
    pub sync_timeout_secs: u64,
}

/// Front-proxy identity headers set by the aggregation layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub username_headers: Vec<String>,
    pub group_headers: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8443,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            rotation: "daily".to_string(),
            json: false,
        }
    }
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            sync_timeout_secs: 30,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            username_headers: vec!["X-Remote-User".to_string()],
            group_headers: vec!["X-Remote-Group".to_string()],
        }
    }
}

impl KubernetesConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }
}

impl SotariaConfig {
    /// Load configuration from the environment and an optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_config_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_path_buf(), e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let paths = [
            std::env::var("SOTARIA_CONFIG").ok().map(PathBuf::from),
            Some(PathBuf::from("/etc/sotaria/config.toml")),
            Some(PathBuf::from("./sotaria.toml")),
        ];

        paths.into_iter().flatten().find(|p| p.exists())
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("SOTARIA_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SOTARIA_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        // Logging
        if let Some(level) = lookup("SOTARIA_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = lookup("SOTARIA_LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(json) = lookup("SOTARIA_LOG_JSON").and_then(|v| v.parse().ok()) {
            self.logging.json = json;
        }

        // Kubernetes
        if let Some(path) = lookup("SOTARIA_KUBECONFIG") {
            self.kubernetes.kubeconfig = Some(PathBuf::from(path));
        }
        if let Some(context) = lookup("SOTARIA_KUBE_CONTEXT") {
            self.kubernetes.context = Some(context);
        }
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("Port cannot be 0".to_string()));
        }

        if LogRotation::parse(&self.logging.rotation).is_none() {
            return Err(ConfigError::Validation(format!(
                "Unknown log rotation '{}', expected hourly, daily or never",
                self.logging.rotation
            )));
        }

        if self.kubernetes.sync_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Kubernetes sync timeout must be greater than 0".to_string(),
            ));
        }

        if self.identity.username_headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "At least one username header is required".to_string(),
            ));
        }
        if self.identity.group_headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "At least one group header is required".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0:?}: {1}")]
    FileRead(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Config validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SotariaConfig::default();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.logging.rotation, "daily");
        assert_eq!(config.kubernetes.sync_timeout(), Duration::from_secs(30));
        assert_eq!(config.identity.username_headers, vec!["X-Remote-User"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SotariaConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = SotariaConfig::default();
        config.logging.rotation = "weekly".to_string();
        assert!(config.validate().is_err());

        let mut config = SotariaConfig::default();
        config.kubernetes.sync_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = SotariaConfig::default();
        config.identity.group_headers.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9443

[identity]
username_headers = ["X-Remote-User", "X-Forwarded-User"]
"#
        )
        .unwrap();

        let config = SotariaConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9443);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.identity.username_headers.len(), 2);
        assert_eq!(config.identity.group_headers, vec!["X-Remote-Group"]);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            SotariaConfig::load_from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));

        let missing = SotariaConfig::load_from_file(Path::new("/nonexistent/sotaria.toml"));
        assert!(matches!(missing, Err(ConfigError::FileRead(_, _))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SOTARIA_PORT", "6443"),
            ("SOTARIA_LOG_LEVEL", "debug"),
            ("SOTARIA_LOG_JSON", "true"),
            ("SOTARIA_KUBE_CONTEXT", "staging"),
            ("SOTARIA_HOST", "127.0.0.1"),
        ]
        .into_iter()
        .collect();

        let mut config = SotariaConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 6443);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.kubernetes.context.as_deref(), Some("staging"));
        assert!(config.kubernetes.kubeconfig.is_none());
    }

    #[test]
    fn test_unparseable_port_override_ignored() {
        let mut config = SotariaConfig::default();
        config.apply_overrides(|key| (key == "SOTARIA_PORT").then(|| "https".to_string()));
        assert_eq!(config.server.port, 8443);
    }

    #[test]
    fn test_generate_sample_config() {
        let sample = SotariaConfig::generate_sample();
        assert!(sample.contains("[server]"));
        assert!(sample.contains("[logging]"));
        assert!(sample.contains("[kubernetes]"));
        assert!(sample.contains("[identity]"));

        let parsed: SotariaConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.server.port, 8443);
    }
}
