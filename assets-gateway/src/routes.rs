//! Route definitions for the assets gateway.
//!
//! One uniform HTTP surface over all registered stores. Every request
//! walks the same ordered stages: unprotected-path check,
//! authentication, kind resolution, adapter delegation, envelope
//! normalization. No stage retries and nothing is kept between
//! requests.

use crate::auth::{is_unprotected, AuthGate, CallerIdentity};
use crate::store::{AssetMetadata, StoreError, StoreRegistry};
use axum::{
    extract::{Extension, Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use gateway_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<dyn AuthGate>,
    pub registry: Arc<StoreRegistry>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Uniform error envelope returned for every failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub category: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub kinds: Vec<String>,
}

/// Create request body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetRequest {
    pub parent_id: String,
    pub payload: Value,
}

/// Create response body.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetResponse {
    pub raw_id: String,
}

/// Listing response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListChildrenResponse {
    pub assets: Vec<AssetMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub parent: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorEnvelope>);

/// Map a gateway error to its caller-visible envelope.
fn error_response(err: Error) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let correlation = match &err {
        Error::Upstream { correlation } => Some(correlation.clone()),
        _ => None,
    };
    // Upstream details never leave the gateway; only the category and
    // the correlation id do.
    let message = match &err {
        Error::Upstream { .. } => "upstream service failure".to_string(),
        other => other.to_string(),
    };
    (
        status,
        Json(ErrorEnvelope {
            category: err.category().to_string(),
            message,
            correlation,
        }),
    )
}

/// Lift an adapter error into the gateway taxonomy.
///
/// Backend messages stay in the logs: upstream failures get a fresh
/// correlation id, backend rejections are reduced to a generic
/// validation message. Only gateway-authored `Validation` text is
/// forwarded as-is.
fn map_store_error(kind: &str, err: StoreError) -> Error {
    match err {
        StoreError::NotFound(id) => Error::NotFound(format!("{kind}/{id}")),
        StoreError::Validation(message) => Error::Validation(message),
        StoreError::Rejected { status, body } => {
            tracing::warn!(
                kind = %kind,
                status = %status,
                body = %body,
                "Backend rejected request"
            );
            Error::Validation(format!("request rejected by the {kind} store"))
        }
        StoreError::Upstream { status, message } => {
            let correlation = uuid::Uuid::new_v4().to_string();
            tracing::error!(
                kind = %kind,
                status = ?status,
                message = %message,
                correlation = %correlation,
                "Upstream store failure"
            );
            Error::Upstream { correlation }
        }
    }
}

/// Authentication middleware.
///
/// Stage 1 and 2 of the request pipeline: unprotected paths proceed
/// with an anonymous identity and never touch the gate; everything
/// else must produce a caller identity or short-circuits here.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if is_unprotected(request.uri().path()) {
        request.extensions_mut().insert(CallerIdentity::anonymous());
        return Ok(next.run(request).await);
    }

    match state.gate.authenticate(request.headers()).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %request.uri().path(), "Authentication failed");
            Err(error_response(err.into()))
        }
    }
}

/// Build the gateway routes on top of the given state.
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/assets/:kind",
            post(create_asset_handler).get(list_children_handler),
        )
        .route(
            "/assets/:kind/:raw_id",
            get(fetch_asset_handler)
                .put(update_asset_handler)
                .delete(delete_asset_handler),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe; bypasses authentication.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        service: "assets-gateway".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        kinds: state.registry.kinds(),
    })
}

async fn fetch_asset_handler(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(String, String)>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<Json<AssetMetadata>, ApiError> {
    let adapter = state.registry.resolve(&kind).map_err(error_response)?;

    tracing::debug!(user_id = %identity.user_id, kind = %kind, raw_id = %raw_id, "Fetching asset");
    let metadata = adapter
        .fetch(&raw_id)
        .await
        .map_err(|e| error_response(map_store_error(&kind, e)))?;
    Ok(Json(metadata))
}

async fn create_asset_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Extension(identity): Extension<CallerIdentity>,
    Json(request): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<CreateAssetResponse>), ApiError> {
    let adapter = state.registry.resolve(&kind).map_err(error_response)?;

    tracing::info!(
        user_id = %identity.user_id,
        kind = %kind,
        parent_id = %request.parent_id,
        "Creating asset"
    );
    let raw_id = adapter
        .create(&request.parent_id, &request.payload)
        .await
        .map_err(|e| error_response(map_store_error(&kind, e)))?;

    Ok((StatusCode::CREATED, Json(CreateAssetResponse { raw_id })))
}

async fn update_asset_handler(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(String, String)>,
    Extension(identity): Extension<CallerIdentity>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let adapter = state.registry.resolve(&kind).map_err(error_response)?;

    tracing::info!(user_id = %identity.user_id, kind = %kind, raw_id = %raw_id, "Updating asset");
    adapter
        .update(&raw_id, &payload)
        .await
        .map_err(|e| error_response(map_store_error(&kind, e)))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_asset_handler(
    State(state): State<AppState>,
    Path((kind, raw_id)): Path<(String, String)>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<StatusCode, ApiError> {
    let adapter = state.registry.resolve(&kind).map_err(error_response)?;

    tracing::info!(user_id = %identity.user_id, kind = %kind, raw_id = %raw_id, "Deleting asset");
    adapter
        .delete(&raw_id)
        .await
        .map_err(|e| error_response(map_store_error(&kind, e)))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_children_handler(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
    Extension(identity): Extension<CallerIdentity>,
) -> Result<Json<ListChildrenResponse>, ApiError> {
    let adapter = state.registry.resolve(&kind).map_err(error_response)?;

    let parent_id = query.parent.ok_or_else(|| {
        error_response(Error::Validation("missing `parent` query parameter".into()))
    })?;

    tracing::debug!(user_id = %identity.user_id, kind = %kind, parent_id = %parent_id, "Listing children");
    let assets = adapter
        .list_children(&parent_id)
        .await
        .map_err(|e| error_response(map_store_error(&kind, e)))?;
    Ok(Json(ListChildrenResponse { assets }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shapes() {
        let (status, Json(envelope)) = error_response(Error::UnknownKind("widget".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(envelope.category, "unknown_kind");
        assert!(envelope.correlation.is_none());

        let (status, Json(envelope)) =
            error_response(Error::Upstream { correlation: "c-1".into() });
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(envelope.correlation.as_deref(), Some("c-1"));
        assert_eq!(envelope.message, "upstream service failure");
    }

    #[test]
    fn test_map_store_error_hides_upstream_body() {
        let err = map_store_error(
            "data",
            StoreError::Upstream {
                status: Some(500),
                message: "internal topology leaked here".into(),
            },
        );
        let (_, Json(envelope)) = error_response(err);
        assert!(!envelope.message.contains("topology"));
        assert!(envelope.correlation.is_some());
    }

    #[test]
    fn test_map_store_error_hides_rejected_body() {
        let err = map_store_error(
            "data",
            StoreError::Rejected {
                status: 422,
                body: "keyspace assets_v2 schema mismatch on node scylla-3".into(),
            },
        );
        let (status, Json(envelope)) = error_response(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(envelope.category, "validation_error");
        assert!(!envelope.message.contains("scylla-3"));
        assert!(!envelope.message.contains("keyspace"));
    }

    #[test]
    fn test_map_store_error_not_found() {
        let err = map_store_error("story", StoreError::NotFound("xyz".into()));
        assert!(matches!(err, Error::NotFound(m) if m == "story/xyz"));
    }
}
