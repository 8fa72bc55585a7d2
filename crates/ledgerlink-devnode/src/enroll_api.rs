//! HTTP enrollment API in front of the development CA.
//!
//!   POST /enroll  {org, enrollment_id, secret, role}
//!     200 {certificate, private_key}
//!     401 bad secret
//!     404 unknown org or member

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use ledgerlink_core::ca::{CaError, DevAuthority, IssuedCredential};
use ledgerlink_core::Role;

#[derive(Debug, Deserialize)]
pub struct EnrollBody {
    pub org: String,
    pub enrollment_id: String,
    pub secret: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody { error: error.into() }))
}

pub fn router(ca: Arc<DevAuthority>) -> Router {
    Router::new()
        .route("/enroll", post(handle_enroll))
        .with_state(ca)
}

pub async fn handle_enroll(
    State(ca): State<Arc<DevAuthority>>,
    Json(req): Json<EnrollBody>,
) -> Result<Json<IssuedCredential>, ApiError> {
    if !ca.knows_org(&req.org) {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("unknown organization {}", req.org),
        ));
    }
    match ca.enroll(&req.org, &req.enrollment_id, &req.secret, req.role) {
        Ok(issued) => Ok(Json(issued)),
        Err(e @ CaError::UnknownMember { .. }) => Err(api_error(StatusCode::NOT_FOUND, e.to_string())),
        Err(e @ CaError::InvalidSecret { .. }) => {
            tracing::warn!(org = %req.org, member = %req.enrollment_id, "enrollment with bad secret");
            Err(api_error(StatusCode::UNAUTHORIZED, e.to_string()))
        }
        Err(e @ CaError::Generation(_)) => {
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Serve the API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    ca: Arc<DevAuthority>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(ca))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;
    Ok(())
}
