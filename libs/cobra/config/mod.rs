use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable that overrides `connection.rolesecret`
pub const ROLE_SECRET_ENV: &str = "COBRA_ROLE_SECRET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarMissing(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where and as whom to connect
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub appkey: String,
    pub rolename: String,
    #[serde(default)]
    pub rolesecret: String,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: impl Into<String>,
        appkey: impl Into<String>,
        rolename: impl Into<String>,
        rolesecret: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            appkey: appkey.into(),
            rolename: rolename.into(),
            rolesecret: rolesecret.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("endpoint", &self.endpoint),
            ("appkey", &self.appkey),
            ("rolename", &self.rolename),
            ("rolesecret", &self.rolesecret),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{} must not be empty", name)));
            }
        }

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ConfigError::ValidationError(format!("endpoint '{}': {}", self.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ConfigError::ValidationError(format!(
                "endpoint scheme must be ws or wss, got '{}'",
                endpoint.scheme()
            )));
        }

        Ok(())
    }

    /// `{endpoint}/v2?appkey={appkey}`
    pub fn url(&self) -> Result<String> {
        let base = self.endpoint.trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/v2", base))
            .map_err(|e| ConfigError::ValidationError(format!("endpoint '{}': {}", self.endpoint, e)))?;
        url.query_pairs_mut().append_pair("appkey", &self.appkey);
        Ok(url.into())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("appkey", &self.appkey)
            .field("rolename", &self.rolename)
            .field("rolesecret", &"<redacted>")
            .finish()
    }
}

/// Timing and retry knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSettings {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// `None` retries forever
    #[serde(default)]
    pub max_reconnect_attempts: Option<usize>,
    /// Consecutive rejected authentications before giving up; `None` never gives up
    #[serde(default = "default_max_auth_rejections")]
    pub max_auth_rejections: Option<usize>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    #[serde(default = "default_publish_timeout_secs")]
    pub publish_timeout_secs: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_auth_rejections() -> Option<usize> {
    Some(5)
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_response_timeout_secs() -> u64 {
    10
}

fn default_publish_timeout_secs() -> u64 {
    5
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: None,
            max_auth_rejections: default_max_auth_rejections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            response_timeout_secs: default_response_timeout_secs(),
            publish_timeout_secs: default_publish_timeout_secs(),
        }
    }
}

impl ClientSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_secs == 0 || self.response_timeout_secs == 0 || self.publish_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("timeouts must be greater than 0".to_string()));
        }
        if self.max_auth_rejections == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_auth_rejections must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything the example subscriber needs, as laid out in `config/cobra.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CobraConfig {
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub settings: ClientSettings,
    pub channel: String,
    #[serde(default)]
    pub filter: Option<String>,
}

impl CobraConfig {
    /// Load configuration from a YAML file, taking the role secret from
    /// `COBRA_ROLE_SECRET` when it is set
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        Self::from_yaml(&yaml_content, std::env::var(ROLE_SECRET_ENV).ok())
    }

    pub fn from_yaml(yaml: &str, secret_override: Option<String>) -> Result<Self> {
        let mut config: CobraConfig = serde_yaml::from_str(yaml)?;

        if let Some(secret) = secret_override.filter(|s| !s.is_empty()) {
            config.connection.rolesecret = secret;
        }
        if config.connection.rolesecret.is_empty() {
            return Err(ConfigError::EnvVarMissing(ROLE_SECRET_ENV.to_string()));
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.connection.validate()?;
        self.settings.validate()?;
        if self.channel.trim().is_empty() {
            return Err(ConfigError::ValidationError("channel must not be empty".to_string()));
        }
        Ok(())
    }
}
