use crate::*;

use ledgerlink_core::Role;
use ledgerlink_services::EnrollmentError;

#[tokio::test]
async fn test_enroll_issues_both_roles_over_http() {
    let net = TestNetwork::start().await.unwrap();
    assert_eq!(net.tls.role(), Role::Tls);
    assert_eq!(net.ctx.identity().role(), Role::Application);
    assert_eq!(net.tls.organization_member(), "admin@org1");
    net.stop().await;
}

#[tokio::test]
async fn test_enroll_wrong_secret_is_rejected() {
    let net = TestNetwork::start().await.unwrap();
    let authority = HttpAuthority::new(net.node.api_url()).unwrap();
    let client = EnrollmentClient::new(Arc::new(authority)).with_registrar(ORG, ADMIN, "wrong");

    let err = client.enroll_tls(ORG).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::Rejected(_)), "{err:?}");
    net.stop().await;
}

#[tokio::test]
async fn test_enroll_org_unknown_to_authority_is_rejected() {
    let net = TestNetwork::start().await.unwrap();
    let authority = HttpAuthority::new(net.node.api_url()).unwrap();
    let client = EnrollmentClient::new(Arc::new(authority)).with_registrar("org9", ADMIN, ADMIN_SECRET);

    let err = client.enroll_application_user("org9").await.unwrap_err();
    assert!(matches!(err, EnrollmentError::Rejected(_)), "{err:?}");
    net.stop().await;
}

#[tokio::test]
async fn test_enroll_api_status_codes() {
    let net = TestNetwork::start().await.unwrap();
    let url = format!("{}/enroll", net.node.api_url());
    let http = reqwest::Client::new();

    let status = |body: serde_json::Value| {
        let http = http.clone();
        let url = url.clone();
        async move { http.post(&url).json(&body).send().await.unwrap().status().as_u16() }
    };

    assert_eq!(
        status(serde_json::json!({
            "org": ORG, "enrollment_id": ADMIN, "secret": ADMIN_SECRET, "role": "tls"
        }))
        .await,
        200
    );
    assert_eq!(
        status(serde_json::json!({
            "org": ORG, "enrollment_id": ADMIN, "secret": "nope", "role": "tls"
        }))
        .await,
        401
    );
    assert_eq!(
        status(serde_json::json!({
            "org": "org9", "enrollment_id": ADMIN, "secret": ADMIN_SECRET, "role": "tls"
        }))
        .await,
        404
    );
    assert_eq!(
        status(serde_json::json!({
            "org": ORG, "enrollment_id": "ghost", "secret": ADMIN_SECRET, "role": "application"
        }))
        .await,
        404
    );
    net.stop().await;
}

#[tokio::test]
async fn test_enroll_unreachable_authority() {
    let port = closed_port().await.unwrap();
    let authority = HttpAuthority::new(format!("http://127.0.0.1:{port}")).unwrap();
    let client = EnrollmentClient::new(Arc::new(authority)).with_registrar(ORG, ADMIN, ADMIN_SECRET);
    let err = client.enroll_tls(ORG).await.unwrap_err();
    assert!(matches!(err, EnrollmentError::Unreachable(_)), "{err:?}");
}
