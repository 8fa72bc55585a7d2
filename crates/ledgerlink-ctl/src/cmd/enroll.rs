//! `enroll`: obtain TLS and application identities and store them.

use std::sync::Arc;

use anyhow::{Context, Result};

use ledgerlink_core::config::LedgerlinkConfig;
use ledgerlink_services::{CredentialStore, EnrollmentClient, HttpAuthority, StoredCredential};

use super::network::credential_store;

pub async fn run(config: &LedgerlinkConfig) -> Result<()> {
    let authority = HttpAuthority::new(&config.enrollment.url)?;
    let client = EnrollmentClient::new(Arc::new(authority)).with_registrar(
        &config.identity.org,
        &config.identity.enrollment_id,
        &config.identity.secret,
    );
    let store = credential_store(config);

    let tls = client
        .enroll_tls(&config.identity.org)
        .await
        .context("TLS enrollment failed")?;
    let app = client
        .enroll_application_user(&config.identity.org)
        .await
        .context("application enrollment failed")?;

    for identity in [&tls, &app] {
        let stored = StoredCredential::from_identity(identity);
        store.put(&stored)?;
        println!("✓ {} identity stored as {}", identity.role(), stored.key());
    }
    println!("  directory : {}", store.dir().display());
    Ok(())
}
