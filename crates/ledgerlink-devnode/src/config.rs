//! Devnode configuration.
//!
//! Resolution order: environment variables → config file → defaults.
//! File: $LEDGERLINK_DEVNODE_CONFIG, else `devnode.toml` in the ledgerlink
//! config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ledgerlink_core::config::{config_dir, data_dir, ConfigError};
use ledgerlink_core::limits::{self, SizeLimit};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevnodeConfig {
    /// RPC listen address.
    pub rpc_listen: String,
    /// Enrollment API listen address.
    pub api_listen: String,
    /// Serve RPC over mutual TLS. Plain TCP otherwise.
    pub tls: bool,
    /// Names the node's server certificate is valid for.
    pub hostnames: Vec<String>,
    pub channels: Vec<String>,
    pub members: Vec<MemberConfig>,
    /// Largest request body accepted, -1 for unlimited.
    pub max_receive_bytes: i64,
    /// Where `ca.pem` is written.
    pub state_dir: PathBuf,
}

/// A member the CA will enroll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub org: String,
    pub enrollment_id: String,
    pub secret: String,
}

impl Default for DevnodeConfig {
    fn default() -> Self {
        Self {
            rpc_listen: "127.0.0.1:7051".to_string(),
            api_listen: "127.0.0.1:7054".to_string(),
            tls: true,
            hostnames: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            channels: vec!["mychannel".to_string()],
            members: vec![MemberConfig {
                org: "org1".to_string(),
                enrollment_id: "admin".to_string(),
                secret: "adminpw".to_string(),
            }],
            max_receive_bytes: limits::UNLIMITED,
            state_dir: data_dir().join("devnode"),
        }
    }
}

impl DevnodeConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            DevnodeConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        limits::validate("max_receive_bytes", config.max_receive_bytes)?;
        Ok(config)
    }

    pub fn file_path() -> PathBuf {
        std::env::var("LEDGERLINK_DEVNODE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("devnode.toml"))
    }

    pub fn receive_limit(&self) -> SizeLimit {
        SizeLimit::from_setting(self.max_receive_bytes)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LEDGERLINK_DEVNODE__RPC_LISTEN") {
            self.rpc_listen = v;
        }
        if let Some(v) = lookup("LEDGERLINK_DEVNODE__API_LISTEN") {
            self.api_listen = v;
        }
        if let Some(v) = lookup("LEDGERLINK_DEVNODE__STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("LEDGERLINK_DEVNODE__MAX_RECEIVE_BYTES") {
            self.max_receive_bytes = v.trim().parse().map_err(|_| ConfigError::InvalidOption {
                option: "LEDGERLINK_DEVNODE__MAX_RECEIVE_BYTES".to_string(),
                reason: format!("{v:?} is not an integer"),
            })?;
        }
        Ok(())
    }
}
