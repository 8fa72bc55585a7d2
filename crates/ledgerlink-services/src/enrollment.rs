//! Identity enrollment.
//!
//! `EnrollmentClient` holds registrar credentials per organization and asks
//! an `EnrollmentAuthority` to issue TLS and application identities. One
//! attempt per call: no retries, no caching.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ledgerlink_core::ca::{CaError, DevAuthority, IssuedCredential};
use ledgerlink_core::crypto::{load_certificates, load_private_key};
use ledgerlink_core::{Identity, Role};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("enrollment authority unreachable: {0}")]
    Unreachable(String),

    #[error("enrollment rejected: {0}")]
    Rejected(String),

    #[error("no registrar credentials for organization {0}")]
    UnknownOrganization(String),

    #[error("malformed enrollment response: {0}")]
    MalformedResponse(String),
}

// ── Authority ─────────────────────────────────────────────────────────────────

/// Body of an enrollment call, as sent over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub org: String,
    pub enrollment_id: String,
    pub secret: String,
    pub role: Role,
}

/// Something that turns registrar credentials into a certificate.
#[async_trait]
pub trait EnrollmentAuthority: Send + Sync {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<IssuedCredential, EnrollmentError>;

    fn describe(&self) -> String;
}

/// In-process authority backed by a `DevAuthority`.
pub struct LocalAuthority {
    ca: Arc<DevAuthority>,
}

impl LocalAuthority {
    pub fn new(ca: Arc<DevAuthority>) -> Self {
        Self { ca }
    }
}

#[async_trait]
impl EnrollmentAuthority for LocalAuthority {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<IssuedCredential, EnrollmentError> {
        self.ca
            .enroll(
                &request.org,
                &request.enrollment_id,
                &request.secret,
                request.role,
            )
            .map_err(|e| match e {
                CaError::UnknownMember { .. } | CaError::InvalidSecret { .. } => {
                    EnrollmentError::Rejected(e.to_string())
                }
                CaError::Generation(_) => EnrollmentError::Unreachable(e.to_string()),
            })
    }

    fn describe(&self) -> String {
        format!("local CA {}", self.ca.name())
    }
}

/// Error body returned by the enrollment API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Authority reached over HTTP: `POST {base}/enroll`.
pub struct HttpAuthority {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthority {
    pub fn new(base_url: impl Into<String>) -> Result<Self, EnrollmentError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| EnrollmentError::Unreachable(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl EnrollmentAuthority for HttpAuthority {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<IssuedCredential, EnrollmentError> {
        let url = format!("{}/enroll", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| EnrollmentError::Unreachable(format!("{url}: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<IssuedCredential>()
                .await
                .map_err(|e| EnrollmentError::MalformedResponse(e.to_string()));
        }

        let reason = resp
            .json::<ErrorBody>()
            .await
            .map(|b| b.error)
            .unwrap_or_else(|_| status.to_string());
        if status.is_client_error() {
            Err(EnrollmentError::Rejected(reason))
        } else {
            Err(EnrollmentError::Unreachable(format!("{status}: {reason}")))
        }
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Registrar {
    enrollment_id: String,
    secret: String,
}

/// Enrolls organization members through one authority.
pub struct EnrollmentClient {
    authority: Arc<dyn EnrollmentAuthority>,
    registrars: HashMap<String, Registrar>,
}

impl EnrollmentClient {
    pub fn new(authority: Arc<dyn EnrollmentAuthority>) -> Self {
        Self {
            authority,
            registrars: HashMap::new(),
        }
    }

    /// Credentials used when enrolling on behalf of `org`.
    pub fn with_registrar(
        mut self,
        org: impl Into<String>,
        enrollment_id: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.registrars.insert(
            org.into(),
            Registrar {
                enrollment_id: enrollment_id.into(),
                secret: secret.into(),
            },
        );
        self
    }

    /// A client certificate for mutual TLS.
    pub async fn enroll_tls(&self, org: &str) -> Result<Identity, EnrollmentError> {
        self.enroll(org, Role::Tls).await
    }

    /// A signing identity for requests.
    pub async fn enroll_application_user(&self, org: &str) -> Result<Identity, EnrollmentError> {
        self.enroll(org, Role::Application).await
    }

    async fn enroll(&self, org: &str, role: Role) -> Result<Identity, EnrollmentError> {
        let registrar = self
            .registrars
            .get(org)
            .ok_or_else(|| EnrollmentError::UnknownOrganization(org.to_string()))?;
        let request = EnrollmentRequest {
            org: org.to_string(),
            enrollment_id: registrar.enrollment_id.clone(),
            secret: registrar.secret.clone(),
            role,
        };

        let issued = match self.authority.enroll(&request).await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::warn!(
                    org,
                    %role,
                    authority = %self.authority.describe(),
                    error = %e,
                    "enrollment failed"
                );
                return Err(e);
            }
        };
        load_certificates(issued.certificate.as_bytes())
            .map_err(|e| EnrollmentError::MalformedResponse(format!("certificate: {e}")))?;
        load_private_key(issued.private_key.as_bytes())
            .map_err(|e| EnrollmentError::MalformedResponse(format!("private key: {e}")))?;

        tracing::info!(org, member = %request.enrollment_id, %role, "enrolled");
        Ok(Identity::new(
            issued.certificate.into_bytes(),
            issued.private_key.into_bytes(),
            org,
            request.enrollment_id,
            role,
        ))
    }
}
