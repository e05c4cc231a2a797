//! Store adapters for the backing asset services.
//!
//! Provides a unified interface over the heterogeneous stores behind
//! the gateway (flux projects, CDN packages, generic data records,
//! stories) with a consistent metadata shape and error contract. Each
//! adapter is a stateless wrapper over one outbound client handle and
//! issues exactly one backend call per operation.

mod data;
mod flux;
mod package;
mod story;

pub use data::DataStore;
pub use flux::FluxStore;
pub use package::PackageStore;
pub use story::StoryStore;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use gateway_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Adapter Trait
// ============================================================================

/// Unified interface over one backing asset store.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// The asset kind this adapter owns (registry key).
    fn kind(&self) -> &str;

    /// Fetch the metadata of one asset by its backend-native id.
    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError>;

    /// Create an asset under `parent_id`; returns the backend-native id.
    async fn create(&self, parent_id: &str, payload: &Value) -> Result<String, StoreError>;

    /// Replace the content of an existing asset.
    async fn update(&self, raw_id: &str, payload: &Value) -> Result<(), StoreError>;

    /// Delete an asset.
    async fn delete(&self, raw_id: &str) -> Result<(), StoreError>;

    /// List the direct children of `parent_id`.
    ///
    /// Finite and restartable: every call re-queries the backend, no
    /// cursor is retained across calls.
    async fn list_children(&self, parent_id: &str) -> Result<Vec<AssetMetadata>, StoreError>;
}

impl std::fmt::Debug for dyn StoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Error from a store adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend reports no such id
    #[error("not found: {0}")]
    NotFound(String),

    /// Request rejected by the gateway before reaching the backend
    #[error("validation failed: {0}")]
    Validation(String),

    /// Backend rejected the request with a non-404 4xx; the body is
    /// for the logs, never for the caller
    #[error("backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Transport failure or 5xx from the backend
    #[error("upstream failure ({status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },
}

/// Map a non-success backend status to a [`StoreError`].
///
/// 404 → `NotFound`, other 4xx → `Rejected`, everything else →
/// `Upstream`. The body is kept for logging only; the router never
/// forwards it to the caller.
pub(crate) fn classify_status(status: reqwest::StatusCode, raw_id: &str, body: &str) -> StoreError {
    if status == reqwest::StatusCode::NOT_FOUND {
        StoreError::NotFound(raw_id.to_string())
    } else if status.is_client_error() {
        StoreError::Rejected {
            status: status.as_u16(),
            body: body.to_string(),
        }
    } else {
        StoreError::Upstream {
            status: Some(status.as_u16()),
            message: body.to_string(),
        }
    }
}

/// Map a reqwest transport error to a [`StoreError`].
pub(crate) fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Upstream {
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Derive the globally unique, opaque asset id from a backend-native id.
///
/// The encoding keeps backend ids with slashes or other separators safe
/// in a path segment.
pub fn asset_id_of(raw_id: &str) -> String {
    URL_SAFE_NO_PAD.encode(raw_id.as_bytes())
}

/// Normalized asset metadata returned by every adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Globally unique opaque identifier
    pub asset_id: String,
    /// Backend-native identifier within the owning store
    pub raw_id: String,
    /// Asset kind (the registry key of the owning adapter)
    pub kind: String,
    /// Display name
    pub name: String,
    /// Access-scoping group, when the backend reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_group: Option<String>,
    /// Direct content link, when the store exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_url: Option<String>,
}

// ============================================================================
// Store Registry
// ============================================================================

/// Immutable kind → adapter lookup table.
///
/// Populated once during composition, then shared read-only across all
/// request tasks. Registration of an already-present kind is a
/// deployment error and aborts startup.
#[derive(Debug)]
pub struct StoreRegistry {
    adapters: HashMap<String, Arc<dyn StoreAdapter>>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its declared kind. Startup only.
    pub fn register(&mut self, adapter: Arc<dyn StoreAdapter>) -> Result<(), Error> {
        let kind = adapter.kind().to_string();
        if self.adapters.contains_key(&kind) {
            return Err(Error::DuplicateKind(kind));
        }
        self.adapters.insert(kind, adapter);
        Ok(())
    }

    /// Resolve the adapter owning `kind`.
    pub fn resolve(&self, kind: &str) -> Result<Arc<dyn StoreAdapter>, Error> {
        self.adapters
            .get(kind)
            .cloned()
            .ok_or_else(|| Error::UnknownKind(kind.to_string()))
    }

    /// List the registered kinds, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.adapters.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeAdapter(&'static str);

    #[async_trait]
    impl StoreAdapter for FakeAdapter {
        fn kind(&self) -> &str {
            self.0
        }
        async fn fetch(&self, _raw_id: &str) -> Result<AssetMetadata, StoreError> {
            unimplemented!()
        }
        async fn create(&self, _parent_id: &str, _payload: &Value) -> Result<String, StoreError> {
            unimplemented!()
        }
        async fn update(&self, _raw_id: &str, _payload: &Value) -> Result<(), StoreError> {
            unimplemented!()
        }
        async fn delete(&self, _raw_id: &str) -> Result<(), StoreError> {
            unimplemented!()
        }
        async fn list_children(&self, _parent_id: &str) -> Result<Vec<AssetMetadata>, StoreError> {
            unimplemented!()
        }
    }

    #[test]
    fn test_resolve_returns_registered_instance() {
        let mut registry = StoreRegistry::new();
        let adapter: Arc<dyn StoreAdapter> = Arc::new(FakeAdapter("data"));
        registry.register(adapter.clone()).unwrap();

        let resolved = registry.resolve("data").unwrap();
        assert!(Arc::ptr_eq(&resolved, &adapter));

        // idempotent lookup: same instance on repeated calls
        let again = registry.resolve("data").unwrap();
        assert!(Arc::ptr_eq(&again, &adapter));
    }

    #[test]
    fn test_resolve_unknown_kind() {
        let mut registry = StoreRegistry::new();
        registry.register(Arc::new(FakeAdapter("package"))).unwrap();

        let err = registry.resolve("widget").unwrap_err();
        assert!(matches!(err, Error::UnknownKind(k) if k == "widget"));
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut registry = StoreRegistry::new();
        registry.register(Arc::new(FakeAdapter("story"))).unwrap();

        let err = registry.register(Arc::new(FakeAdapter("story"))).unwrap_err();
        assert!(matches!(err, Error::DuplicateKind(k) if k == "story"));
    }

    #[test]
    fn test_kinds_sorted() {
        let mut registry = StoreRegistry::new();
        registry.register(Arc::new(FakeAdapter("story"))).unwrap();
        registry.register(Arc::new(FakeAdapter("data"))).unwrap();
        assert_eq!(registry.kinds(), vec!["data", "story"]);
    }

    #[test]
    fn test_classify_status() {
        let not_found = classify_status(reqwest::StatusCode::NOT_FOUND, "abc", "");
        assert!(matches!(not_found, StoreError::NotFound(id) if id == "abc"));

        let rejected = classify_status(reqwest::StatusCode::UNPROCESSABLE_ENTITY, "abc", "bad name");
        assert!(matches!(rejected, StoreError::Rejected { status: 422, body } if body == "bad name"));

        let upstream = classify_status(reqwest::StatusCode::BAD_GATEWAY, "abc", "boom");
        assert!(matches!(upstream, StoreError::Upstream { status: Some(502), .. }));
    }

    #[test]
    fn test_asset_id_is_opaque_and_path_safe() {
        let asset_id = asset_id_of("group/sub/item");
        assert!(!asset_id.contains('/'));
        assert_ne!(asset_id, "group/sub/item");
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let meta = AssetMetadata {
            asset_id: asset_id_of("abc"),
            raw_id: "abc".into(),
            kind: "data".into(),
            name: "foo".into(),
            owner_group: None,
            content_url: Some("http://storage/api/files/abc".into()),
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"rawId\""));
        assert!(json.contains("\"contentUrl\""));
        assert!(!json.contains("ownerGroup"));
    }
}
