//! Credential persistence, keyed by `"{org}/{member}/{role}"`.

use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use ledgerlink_core::{Identity, Role};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store I/O at {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("corrupt credential {0}: {1}")]
    Corrupt(String, serde_json::Error),

    #[error("invalid credential key {0:?}")]
    InvalidKey(String),
}

/// An identity as it is written to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub org: String,
    pub member: String,
    pub role: Role,
    pub certificate: String,
    pub private_key: String,
}

impl StoredCredential {
    pub fn key(&self) -> String {
        credential_key(&self.org, &self.member, self.role)
    }

    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            org: identity.org().to_string(),
            member: identity.member().to_string(),
            role: identity.role(),
            certificate: String::from_utf8_lossy(identity.certificate()).into_owned(),
            private_key: String::from_utf8_lossy(identity.private_key()).into_owned(),
        }
    }

    pub fn into_identity(self) -> Identity {
        Identity::new(
            self.certificate.into_bytes(),
            self.private_key.into_bytes(),
            self.org,
            self.member,
            self.role,
        )
    }
}

pub fn credential_key(org: &str, member: &str, role: Role) -> String {
    format!("{org}/{member}/{role}")
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredCredential>, StoreError>;
    fn put(&self, credential: &StoredCredential) -> Result<(), StoreError>;
    /// Returns whether something was removed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

// ── Memory ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, StoredCredential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<StoredCredential>, StoreError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn put(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        self.entries.insert(credential.key(), credential.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).is_some())
    }
}

// ── File ──────────────────────────────────────────────────────────────────────

/// One JSON file per credential: `{dir}/{org}__{member}__{role}.json`.
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let parts: Vec<&str> = key.split('/').collect();
        let valid = parts.len() == 3
            && parts.iter().all(|p| {
                !p.is_empty()
                    && *p != "."
                    && *p != ".."
                    && !p.contains('\\')
                    && !p.contains("__")
            });
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", parts.join("__"))))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<StoredCredential>, StoreError> {
        let path = self.path_for(key)?;
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(key.to_string(), e))
    }

    fn put(&self, credential: &StoredCredential) -> Result<(), StoreError> {
        let key = credential.key();
        let path = self.path_for(&key)?;
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::Io(self.dir.clone(), e))?;
        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| StoreError::Corrupt(key.clone(), e))?;
        std::fs::write(&path, json).map_err(|e| StoreError::Io(path.clone(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| StoreError::Io(path.clone(), e))?;
        }

        tracing::debug!(key, path = %path.display(), "credential stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(path, e)),
        }
    }
}
