use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{RootError, RootResult};

/// Where the authorization endpoint lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// URL of the plugin's authorization endpoint.
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Host API key sent as `X-Api-Key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Total time allowed for one request.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_endpoint_url() -> String {
    "http://127.0.0.1:5000/api/plugin/print_auth_plugin".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    5
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Address the inbound plugin-message listener binds to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5080
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Top-level configuration for the printauth binary.
///
/// Loaded from a TOML file (typically `~/.printauth/config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootConfig {
    /// Plugin identifier that host messages must carry to start a handshake.
    #[serde(default = "default_plugin_id")]
    pub plugin_id: String,

    #[serde(default)]
    pub endpoint: EndpointConfig,

    #[serde(default)]
    pub listen: ListenConfig,
}

fn default_plugin_id() -> String {
    "print_auth_plugin".to_string()
}

/// Returns `$HOME/<suffix>` if HOME is available, otherwise `./<suffix>`.
fn dirs_or_default(suffix: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(suffix))
        .unwrap_or_else(|_| PathBuf::from(suffix))
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            plugin_id: default_plugin_id(),
            endpoint: EndpointConfig::default(),
            listen: ListenConfig::default(),
        }
    }
}

impl RootConfig {
    /// Load configuration from a TOML file. If the file does not exist,
    /// returns a default configuration.
    pub fn load(path: &Path) -> RootResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(RootError::Io)?;
        let config: RootConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> RootResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RootError::Config(format!("TOML serialize error: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(RootError::Io)?;
        }
        std::fs::write(path, contents).map_err(RootError::Io)?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> RootResult<()> {
        if self.plugin_id.is_empty() || self.plugin_id.chars().any(char::is_whitespace) {
            return Err(RootError::Config(format!(
                "plugin_id must be non-empty without whitespace, got '{}'",
                self.plugin_id
            )));
        }
        printauth_transport::http::parse_endpoint(&self.endpoint.url)
            .map_err(|e| RootError::Config(format!("endpoint.url: {}", e)))?;
        if self.endpoint.timeout_secs == 0 {
            return Err(RootError::Config("endpoint.timeout_secs must be > 0".into()));
        }
        if self.endpoint.connect_timeout_secs == 0 {
            return Err(RootError::Config(
                "endpoint.connect_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Return the path to the default config file location.
    pub fn default_config_path() -> PathBuf {
        dirs_or_default(".printauth/config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RootConfig::default();
        assert_eq!(config.plugin_id, "print_auth_plugin");
        assert!(config.endpoint.url.ends_with("/api/plugin/print_auth_plugin"));
        assert_eq!(config.endpoint.api_key, None);
        assert_eq!(config.endpoint.timeout(), Duration::from_secs(10));
        assert_eq!(config.endpoint.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.listen.bind, "127.0.0.1");
        assert_eq!(config.listen.port, 5080);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
plugin_id = "shop_gate"

[endpoint]
url = "https://printer.local/api/plugin/shop_gate"
api_key = "abc123"
timeout_secs = 20

[listen]
port = 9090
"#;
        let config: RootConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.plugin_id, "shop_gate");
        assert_eq!(config.endpoint.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.endpoint.timeout_secs, 20);
        assert_eq!(config.endpoint.connect_timeout_secs, 5);
        assert_eq!(config.listen.bind, "127.0.0.1");
        assert_eq!(config.listen.port, 9090);
    }

    #[test]
    fn test_config_validate_ok() {
        assert!(RootConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_bad_plugin_id() {
        let mut config = RootConfig::default();
        config.plugin_id = "".into();
        assert!(config.validate().is_err());
        config.plugin_id = "print auth".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_bad_url() {
        let mut config = RootConfig::default();
        config.endpoint.url = "file:///etc/passwd".into();
        assert!(matches!(config.validate(), Err(RootError::Config(_))));
        config.endpoint.url = "nonsense".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_zero_timeouts() {
        let mut config = RootConfig::default();
        config.endpoint.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RootConfig::default();
        config.endpoint.connect_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = RootConfig::load(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config, RootConfig::default());
    }

    #[test]
    fn test_config_load_rejects_invalid() {
        let dir = std::env::temp_dir().join("printauth-test-config-invalid");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[endpoint]\ntimeout_secs = 0\n").unwrap();

        assert!(matches!(RootConfig::load(&path), Err(RootError::Config(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = std::env::temp_dir().join("printauth-test-config");
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("config.toml");

        let mut config = RootConfig::default();
        config.endpoint.api_key = Some("secret".into());
        config.listen.port = 6000;

        config.save(&path).unwrap();
        let loaded = RootConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_default_config_path() {
        assert!(RootConfig::default_config_path().ends_with(".printauth/config.toml"));
    }
}
