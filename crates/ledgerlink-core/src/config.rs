//! Configuration system for ledgerlink clients.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LEDGERLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ledgerlink/config.toml
//!   3. ~/.config/ledgerlink/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::limits::{self, LimitSettings};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerlinkConfig {
    pub identity: IdentityConfig,
    pub enrollment: EnrollmentConfig,
    pub limits: LimitSettings,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Organization the client enrolls under.
    pub org: String,
    /// Credentials presented to the enrollment authority. The enrollment id
    /// is also the member name recorded in issued identities.
    pub enrollment_id: String,
    pub secret: String,
    /// Directory for the file credential store.
    pub credential_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Base URL of the enrollment API.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub channel: String,
    pub chaincode_id: String,
    /// Per-peer join timeout.
    pub join_timeout_ms: u64,
    pub orderers: Vec<NodeConfig>,
    pub peers: Vec<NodeConfig>,
}

/// One remote endpoint as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// `grpcs://host:port` or `grpc://host:port`.
    pub url: String,
    /// PEM file holding the trust root for this endpoint.
    pub tls_root: PathBuf,
    pub hostname_override: Option<String>,
    pub send_limit_override: Option<i64>,
    pub receive_limit_override: Option<i64>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            org: "org1".to_string(),
            enrollment_id: "admin".to_string(),
            secret: "adminpw".to_string(),
            credential_dir: data_dir().join("credentials"),
        }
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:7054".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            channel: "mychannel".to_string(),
            chaincode_id: "example_cc".to_string(),
            join_timeout_ms: 30_000,
            orderers: Vec::new(),
            peers: Vec::new(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

pub fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ledgerlink")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("ledgerlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Malformed input to configuration or construction calls. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("unknown setting: {0}")]
    UnknownSetting(String),
    #[error("invalid value {value} for {key}: must be -1 or greater")]
    InvalidLimit { key: String, value: i64 },
    #[error("invalid value for option {option}: {reason}")]
    InvalidOption { option: String, reason: String },
    #[error("malformed endpoint address {0:?}: {1}")]
    InvalidAddress(String, String),
    #[error("invalid PEM material: {0}")]
    InvalidPem(String),
    #[error("TLS setup failed: {0}")]
    Tls(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LedgerlinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            LedgerlinkConfig::default()
        };
        config.apply_env_overrides()?;
        config.limits.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LEDGERLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
            }
            let text = toml::to_string_pretty(&LedgerlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(path, text)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        Ok(())
    }

    /// Apply LEDGERLINK_* env var overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LEDGERLINK_IDENTITY__ORG") {
            self.identity.org = v;
        }
        if let Some(v) = lookup("LEDGERLINK_ENROLLMENT__URL") {
            self.enrollment.url = v;
        }
        if let Some(v) = lookup("LEDGERLINK_NETWORK__CHANNEL") {
            self.network.channel = v;
        }
        for key in [
            limits::LEGACY_SEND_LIMIT,
            limits::CURRENT_SEND_LIMIT,
            limits::LEGACY_RECEIVE_LIMIT,
            limits::CURRENT_RECEIVE_LIMIT,
        ] {
            let var = format!(
                "LEDGERLINK_LIMITS__{}",
                key.replace('-', "_").to_uppercase()
            );
            if let Some(v) = lookup(&var) {
                let value: i64 = v.trim().parse().map_err(|_| ConfigError::InvalidOption {
                    option: var.clone(),
                    reason: format!("{v:?} is not an integer"),
                })?;
                self.limits = self.limits.set(key, value)?;
            }
        }
        Ok(())
    }
}
