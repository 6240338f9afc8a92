//! Configuration management for the Thor driver
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    #[serde(default)]
    pub tx: TxParams,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Poll interval for head tracking; 0 disables it
    #[serde(default)]
    pub head_poll_interval_ms: u64,
}

impl NodeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    15_000
}

/// Default transaction parameters applied to every build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TxParams {
    /// Lifetime in blocks after the referenced block
    #[serde(default = "default_expiration")]
    pub expiration: u32,
    #[serde(default)]
    pub gas_price_coef: u8,
}

fn default_expiration() -> u32 {
    18
}

impl Default for TxParams {
    fn default() -> Self {
        Self {
            expiration: default_expiration(),
            gas_price_coef: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Names of environment variables holding hex private keys, in wallet order
    #[serde(default)]
    pub private_key_envs: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Load settings from the file named by `THOR_DRIVER_CONFIG`
    pub fn load() -> Result<Self> {
        let config_path = env::var("THOR_DRIVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));
        Self::load_from(&config_path)
    }

    /// Load settings from a specific file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.url.trim().is_empty() {
            anyhow::bail!("node.url must not be empty");
        }
        if self.node.timeout_ms == 0 {
            anyhow::bail!("node.timeout_ms must be positive");
        }
        if self.tx.expiration == 0 {
            anyhow::bail!("tx.expiration must be at least one block");
        }
        if self.wallet.private_key_envs.is_empty() {
            tracing::warn!("No wallet keys configured - signing will fail");
        }

        Ok(())
    }

    /// Read the configured private keys from the environment
    pub fn wallet_keys(&self) -> Result<Vec<String>> {
        self.wallet
            .private_key_envs
            .iter()
            .map(|name| {
                env::var(name).with_context(|| format!("Environment variable {} not set", name))
            })
            .collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
