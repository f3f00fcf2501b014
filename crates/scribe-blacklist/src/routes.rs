//! HTTP surface for the blacklist checker.
//!
//! One endpoint: `POST /v1/blacklist/check_hash`. An empty body is accepted
//! and treated as `{}`. Reconciliation runs synchronously against the
//! controller's read-only API, which never leaves the process.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::Result;
use crate::plugin::BlacklistPlugin;
use crate::reconciler::CheckHashResult;

/// Shared state for the blacklist routes.
#[derive(Clone)]
pub struct AppState {
    pub plugin: Arc<BlacklistPlugin>,
}

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Invalid request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Reconciliation failure.
    #[error("internal error: {0}")]
    Internal(#[from] crate::error::Error),
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone())),
            Self::Internal(err) => {
                tracing::error!(error = %err, "blacklist check failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    Some("An internal error occurred".to_string()),
                )
            }
        };
        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

/// Build the blacklist router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/blacklist/check_hash", post(check_hash))
        .with_state(state)
}

/// `POST /v1/blacklist/check_hash`
async fn check_hash(
    State(state): State<AppState>,
    body: String,
) -> std::result::Result<Json<CheckHashResult>, ApiError> {
    // an empty body is rewritten to an empty parameter object
    let body = if body.is_empty() { "{}".to_owned() } else { body };
    serde_json::from_str::<serde_json::Value>(&body)
        .map_err(|e| ApiError::BadRequest(format!("body is not JSON: {e}")))?;
    let result = state.plugin.check_hash()?;
    Ok(Json(result))
}

/// Bind and serve the blacklist routes.
///
/// Warns when the transport is reachable from beyond the local host.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    if !addr.ip().is_loopback() {
        warn!(
            %addr,
            "blacklist endpoint is not bound to loopback; it is reachable from outside this host"
        );
    }
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "blacklist endpoint listening");
    let app = router(state).layer(TraceLayer::new_for_http());
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlacklistConfig;
    use crate::reconciler::tests::StaticReader;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let reader = StaticReader::consistent(&["a", "b"], "alice");
        let config = BlacklistConfig {
            producer_name: Some("alice".into()),
            ..BlacklistConfig::default()
        };
        AppState {
            plugin: Arc::new(BlacklistPlugin::new(config, Arc::new(reader))),
        }
    }

    async fn post_body(state: AppState, body: &str) -> (StatusCode, serde_json::Value) {
        let app = router(state);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/blacklist/check_hash")
                    .body(Body::from(body.to_owned()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn empty_body_is_accepted() {
        let (status, body) = post_body(test_state(), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "OK");
        assert_eq!(body["local_hash"], body["onchain_hash"]);
    }

    #[tokio::test]
    async fn json_body_is_accepted() {
        let (status, body) = post_body(test_state(), "{}").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["submitted_hash"].is_string());
    }

    #[tokio::test]
    async fn non_json_body_is_a_bad_request() {
        let (status, body) = post_body(test_state(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn mismatch_is_reported_in_the_verdict() {
        let reader = StaticReader::new(&["a", "b"]).with_table(
            "theblacklist",
            vec![serde_json::json!({"type": "actor-blacklist", "accounts": ["a", "b", "c"]})],
        );
        let state = AppState {
            plugin: Arc::new(BlacklistPlugin::new(
                BlacklistConfig::default(),
                Arc::new(reader),
            )),
        };
        let (status, body) = post_body(state, "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["msg"], "local and ecaf hash MISMATCH!");
    }
}
