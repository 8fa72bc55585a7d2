//! Development certificate authority.
//!
//! Generates a self-signed root on construction and issues leaf
//! certificates to registered organization members. Backs the devnode's
//! enrollment API and the in-process `LocalAuthority`; not meant to guard
//! anything real.

use dashmap::DashMap;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use serde::{Deserialize, Serialize};

use crate::identity::Role;

/// PEM material handed back by an enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCredential {
    pub certificate: String,
    pub private_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CaError {
    #[error("unknown member {member} in {org}")]
    UnknownMember { org: String, member: String },

    #[error("invalid secret for {member} in {org}")]
    InvalidSecret { org: String, member: String },

    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),
}

/// An in-memory CA with a member registry.
pub struct DevAuthority {
    name: String,
    cert: Certificate,
    key: KeyPair,
    /// (org, member) -> secret
    members: DashMap<(String, String), String>,
}

impl DevAuthority {
    /// Generate a fresh root.
    pub fn new(name: &str) -> Result<Self, CaError> {
        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.distinguished_name.push(DnType::CommonName, name);
        let key = KeyPair::generate()?;
        let cert = params.self_signed(&key)?;
        tracing::info!(ca = name, "development CA generated");
        Ok(Self {
            name: name.to_string(),
            cert,
            key,
            members: DashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root certificate, the trust root for everything this CA issues.
    pub fn root_pem(&self) -> String {
        self.cert.pem()
    }

    /// Register a member that may later enroll with `secret`.
    pub fn register(&self, org: &str, member: &str, secret: &str) {
        self.members
            .insert((org.to_string(), member.to_string()), secret.to_string());
        tracing::debug!(org, member, "member registered");
    }

    /// Does the registry know this organization at all?
    pub fn knows_org(&self, org: &str) -> bool {
        self.members.iter().any(|e| e.key().0 == org)
    }

    /// Check credentials and issue a client certificate.
    pub fn enroll(
        &self,
        org: &str,
        member: &str,
        secret: &str,
        role: Role,
    ) -> Result<IssuedCredential, CaError> {
        let expected = self
            .members
            .get(&(org.to_string(), member.to_string()))
            .map(|s| s.value().clone())
            .ok_or_else(|| CaError::UnknownMember {
                org: org.to_string(),
                member: member.to_string(),
            })?;
        if expected != secret {
            return Err(CaError::InvalidSecret {
                org: org.to_string(),
                member: member.to_string(),
            });
        }

        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.distinguished_name.push(DnType::CommonName, member);
        params.distinguished_name.push(DnType::OrganizationName, org);
        params
            .distinguished_name
            .push(DnType::OrganizationalUnitName, role.as_str());
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        if role == Role::Tls {
            params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
        }
        let issued = self.issue(params)?;
        tracing::info!(org, member, %role, "identity issued");
        Ok(issued)
    }

    /// Issue a server certificate valid for `hostnames`.
    pub fn issue_server(&self, hostnames: &[String]) -> Result<IssuedCredential, CaError> {
        let mut params = CertificateParams::new(hostnames.to_vec())?;
        if let Some(first) = hostnames.first() {
            params.distinguished_name.push(DnType::CommonName, first.as_str());
        }
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        self.issue(params)
    }

    fn issue(&self, params: CertificateParams) -> Result<IssuedCredential, CaError> {
        let key = KeyPair::generate()?;
        let cert = params.signed_by(&key, &self.cert, &self.key)?;
        Ok(IssuedCredential {
            certificate: cert.pem(),
            private_key: key.serialize_pem(),
        })
    }
}
