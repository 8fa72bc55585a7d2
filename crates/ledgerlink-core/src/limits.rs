//! Message-size limit policy.
//!
//! Four settings feed endpoint construction:
//!
//!   legacy-send-limit      deprecated name, 0 = ignore and fall through
//!   current-send-limit     -1 = unlimited
//!   legacy-receive-limit   deprecated name, 0 = ignore and fall through
//!   current-receive-limit  -1 = unlimited
//!
//! Resolution order for one direction, highest first:
//!   1. per-endpoint override
//!   2. legacy setting, unless it is the 0 sentinel
//!   3. current setting
//!   4. transport default
//!
//! `LimitSettings` is a value. An endpoint resolves against the snapshot it
//! was built with and never looks at settings again.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Transport default for outgoing messages when no setting applies.
pub const DEFAULT_MAX_SEND_BYTES: usize = 1024 * 1024;

/// Transport default for incoming messages when no setting applies.
pub const DEFAULT_MAX_RECEIVE_BYTES: usize = 4 * 1024 * 1024;

/// Setting value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Legacy setting value meaning "not set, ask the next tier".
pub const LEGACY_IGNORE: i64 = 0;

pub const LEGACY_SEND_LIMIT: &str = "legacy-send-limit";
pub const CURRENT_SEND_LIMIT: &str = "current-send-limit";
pub const LEGACY_RECEIVE_LIMIT: &str = "legacy-receive-limit";
pub const CURRENT_RECEIVE_LIMIT: &str = "current-receive-limit";

/// An effective payload size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLimit {
    Unlimited,
    Bytes(usize),
}

impl SizeLimit {
    /// Interpret a validated setting value. Negative means unlimited.
    pub fn from_setting(value: i64) -> Self {
        if value < 0 {
            SizeLimit::Unlimited
        } else {
            SizeLimit::Bytes(value as usize)
        }
    }

    /// Does a message of `len` bytes fit?
    pub fn allows(&self, len: usize) -> bool {
        match self {
            SizeLimit::Unlimited => true,
            SizeLimit::Bytes(max) => len <= *max,
        }
    }
}

impl std::fmt::Display for SizeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeLimit::Unlimited => write!(f, "unlimited"),
            SizeLimit::Bytes(n) => write!(f, "{n}"),
        }
    }
}

/// Send and receive limits fixed at endpoint construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLimits {
    pub send: SizeLimit,
    pub receive: SizeLimit,
}

impl Default for ResolvedLimits {
    fn default() -> Self {
        Self {
            send: SizeLimit::Bytes(DEFAULT_MAX_SEND_BYTES),
            receive: SizeLimit::Bytes(DEFAULT_MAX_RECEIVE_BYTES),
        }
    }
}

/// Snapshot of the limit settings. `None` = not set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LimitSettings {
    pub legacy_send_limit: Option<i64>,
    pub current_send_limit: Option<i64>,
    pub legacy_receive_limit: Option<i64>,
    pub current_receive_limit: Option<i64>,
}

impl LimitSettings {
    /// Set one setting by its key name, returning the new snapshot.
    pub fn set(mut self, key: &str, value: i64) -> Result<Self, ConfigError> {
        validate(key, value)?;
        match key {
            LEGACY_SEND_LIMIT => self.legacy_send_limit = Some(value),
            CURRENT_SEND_LIMIT => self.current_send_limit = Some(value),
            LEGACY_RECEIVE_LIMIT => self.legacy_receive_limit = Some(value),
            CURRENT_RECEIVE_LIMIT => self.current_receive_limit = Some(value),
            other => return Err(ConfigError::UnknownSetting(other.to_string())),
        }
        Ok(self)
    }

    /// Clear one setting by its key name.
    pub fn unset(mut self, key: &str) -> Result<Self, ConfigError> {
        match key {
            LEGACY_SEND_LIMIT => self.legacy_send_limit = None,
            CURRENT_SEND_LIMIT => self.current_send_limit = None,
            LEGACY_RECEIVE_LIMIT => self.legacy_receive_limit = None,
            CURRENT_RECEIVE_LIMIT => self.current_receive_limit = None,
            other => return Err(ConfigError::UnknownSetting(other.to_string())),
        }
        Ok(self)
    }

    /// Look up one setting by key name.
    pub fn get(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match key {
            LEGACY_SEND_LIMIT => Ok(self.legacy_send_limit),
            CURRENT_SEND_LIMIT => Ok(self.current_send_limit),
            LEGACY_RECEIVE_LIMIT => Ok(self.legacy_receive_limit),
            CURRENT_RECEIVE_LIMIT => Ok(self.current_receive_limit),
            other => Err(ConfigError::UnknownSetting(other.to_string())),
        }
    }

    /// Check every populated value. Used after deserializing a config file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            (LEGACY_SEND_LIMIT, self.legacy_send_limit),
            (CURRENT_SEND_LIMIT, self.current_send_limit),
            (LEGACY_RECEIVE_LIMIT, self.legacy_receive_limit),
            (CURRENT_RECEIVE_LIMIT, self.current_receive_limit),
        ] {
            if let Some(v) = value {
                validate(key, v)?;
            }
        }
        Ok(())
    }

    /// Resolve both directions for one endpoint.
    pub fn resolve(
        &self,
        send_override: Option<i64>,
        receive_override: Option<i64>,
    ) -> ResolvedLimits {
        ResolvedLimits {
            send: resolve_one(
                send_override,
                self.legacy_send_limit,
                self.current_send_limit,
                SizeLimit::Bytes(DEFAULT_MAX_SEND_BYTES),
            ),
            receive: resolve_one(
                receive_override,
                self.legacy_receive_limit,
                self.current_receive_limit,
                SizeLimit::Bytes(DEFAULT_MAX_RECEIVE_BYTES),
            ),
        }
    }
}

fn resolve_one(
    endpoint_override: Option<i64>,
    legacy: Option<i64>,
    current: Option<i64>,
    transport_default: SizeLimit,
) -> SizeLimit {
    if let Some(v) = endpoint_override {
        return SizeLimit::from_setting(v);
    }
    // 0 on the legacy name is the ignore sentinel, never a 0-byte limit.
    if let Some(v) = legacy.filter(|v| *v != LEGACY_IGNORE) {
        return SizeLimit::from_setting(v);
    }
    if let Some(v) = current {
        return SizeLimit::from_setting(v);
    }
    transport_default
}

/// Reject values below -1.
pub fn validate(key: &str, value: i64) -> Result<(), ConfigError> {
    if value < UNLIMITED {
        return Err(ConfigError::InvalidLimit {
            key: key.to_string(),
            value,
        });
    }
    Ok(())
}
