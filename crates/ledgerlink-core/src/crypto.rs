//! Cryptographic primitives for ledgerlink.
//!
//! Provides three things:
//!   1. BLAKE3 hashing, used for transaction ids and genesis digests
//!   2. Random nonces
//!   3. PEM loading and request signing with an enrolled identity's key
//!
//! Signing goes through rustls' ring provider so that any key rustls can
//! use for client authentication can also sign requests.

use std::io::BufReader;
use std::sync::Arc;

use rand::RngCore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::{Signer, SigningKey};
use rustls::SignatureScheme;
use thiserror::Error;

// ── BLAKE3 ────────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte BLAKE3 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Incremental BLAKE3 hasher.
///
/// # Example
/// ```
/// use ledgerlink_core::crypto::Hasher;
/// let mut h = Hasher::new();
/// h.update(b"hello ");
/// h.update(b"world");
/// assert_eq!(h.finalize(), ledgerlink_core::crypto::hash(b"hello world"));
/// ```
pub struct Hasher(blake3::Hasher);

impl Hasher {
    pub fn new() -> Self {
        Self(blake3::Hasher::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        *self.0.finalize().as_bytes()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── Nonces ────────────────────────────────────────────────────────────────────

/// Generate a cryptographically random nonce of `N` bytes.
pub fn generate_nonce<const N: usize>() -> [u8; N] {
    let mut nonce = [0u8; N];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}

// ── PEM ───────────────────────────────────────────────────────────────────────

/// Parse every certificate in a PEM bundle.
pub fn load_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, CryptoError> {
    let mut reader = BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CryptoError::Pem(e.to_string()))?;
    if certs.is_empty() {
        return Err(CryptoError::Pem("no certificates found".to_string()));
    }
    Ok(certs)
}

/// Parse the first private key in a PEM document (PKCS#8, SEC1 or PKCS#1).
pub fn load_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, CryptoError> {
    let mut reader = BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| CryptoError::Pem(e.to_string()))?
        .ok_or_else(|| CryptoError::Pem("no private key found".to_string()))
}

// ── Signing ───────────────────────────────────────────────────────────────────

/// Schemes offered to the key, in preference order.
const SIGNING_SCHEMES: &[SignatureScheme] = &[
    SignatureScheme::ECDSA_NISTP256_SHA256,
    SignatureScheme::ECDSA_NISTP384_SHA384,
    SignatureScheme::ED25519,
    SignatureScheme::RSA_PSS_SHA256,
];

/// Signs request payloads with one private key.
///
/// Built once per client context; safe to share across tasks.
pub struct RequestSigner {
    signer: Box<dyn Signer>,
}

impl RequestSigner {
    /// Build a signer from a PEM private key.
    pub fn from_pem(private_key_pem: &[u8]) -> Result<Self, CryptoError> {
        let key = load_private_key(private_key_pem)?;
        let signing_key: Arc<dyn SigningKey> = rustls::crypto::ring::sign::any_supported_type(&key)
            .map_err(|e| CryptoError::UnsupportedKey(e.to_string()))?;
        let signer = signing_key
            .choose_scheme(SIGNING_SCHEMES)
            .ok_or_else(|| CryptoError::UnsupportedKey("no usable signature scheme".to_string()))?;
        Ok(Self { signer })
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.signer.scheme()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        self.signer
            .sign(message)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("scheme", &self.signer.scheme())
            .finish()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("PEM parse failed: {0}")]
    Pem(String),

    #[error("unsupported private key: {0}")]
    UnsupportedKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
