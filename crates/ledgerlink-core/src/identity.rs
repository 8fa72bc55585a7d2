//! Enrolled identities and transaction identifiers.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto;

/// What an identity was enrolled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Client certificate for mutual TLS.
    Tls,
    /// Signing identity for requests.
    Application,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Tls => "tls",
            Role::Application => "application",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A certificate and private key issued to one organization member.
///
/// Immutable once issued. The private key is wiped from memory on drop
/// and never printed.
#[derive(Clone)]
pub struct Identity {
    certificate: Vec<u8>,
    private_key: Zeroizing<Vec<u8>>,
    org: String,
    member: String,
    role: Role,
}

impl Identity {
    pub fn new(
        certificate: Vec<u8>,
        private_key: Vec<u8>,
        org: impl Into<String>,
        member: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            certificate,
            private_key: Zeroizing::new(private_key),
            org: org.into(),
            member: member.into(),
            role,
        }
    }

    /// PEM-encoded certificate.
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    /// PEM-encoded private key.
    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// `member@org`
    pub fn organization_member(&self) -> String {
        format!("{}@{}", self.member, self.org)
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("member", &self.organization_member())
            .field("role", &self.role)
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Length of the random nonce carried by each transaction.
pub const NONCE_LEN: usize = 24;

/// A fresh identifier for one submitted request.
///
///   value = hex(BLAKE3(nonce || creator_certificate))
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId {
    value: String,
    nonce: Vec<u8>,
}

impl TransactionId {
    /// Generate a new id bound to the creator's certificate.
    pub fn generate(creator_certificate: &[u8]) -> Self {
        let nonce = crypto::generate_nonce::<NONCE_LEN>().to_vec();
        let mut hasher = crypto::Hasher::new();
        hasher.update(&nonce);
        hasher.update(creator_certificate);
        Self {
            value: hex::encode(hasher.finalize()),
            nonce,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}
