//! CLI utilities for binaries
//!
//! Resolves which configuration file a binary should read.

use std::path::PathBuf;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Subscriber configuration (config/cobra.yaml)
    Subscriber,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Subscriber => "config/cobra.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    pub fn env_var_name(&self) -> &str {
        "COBRA_CONFIG_PATH"
    }
}

/// Configuration path from `COBRA_CONFIG_PATH`, or the type's default
///
/// A custom path always wins over the environment.
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    if let ConfigType::Custom(path) = &config_type {
        return PathBuf::from(path);
    }
    std::env::var(config_type.env_var_name())
        .unwrap_or_else(|_| config_type.default_path().to_string())
        .into()
}

/// Command line arguments, program name excluded
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
