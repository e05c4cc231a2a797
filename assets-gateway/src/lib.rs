//! Assets gateway - one HTTP surface over heterogeneous asset stores.
//!
//! The gateway fans a single logical "asset" abstraction out across
//! several backing services, each with its own identity scheme, and
//! enforces one authentication policy uniformly across all of them:
//! - per-kind store adapters behind one capability interface
//! - an immutable kind → adapter registry built at startup
//! - pluggable authentication gates (local bypass, cookie session,
//!   bearer token)
//! - a stateless router normalizing every outcome into one envelope
//!
//! ## Architecture
//!
//! ```text
//! Client → Gate (authenticate) → Registry (resolve kind) → Adapter → Store
//! ```

#![warn(clippy::all)]

pub mod auth;
pub mod cache;
pub mod oidc;
pub mod routes;
pub mod store;

pub use auth::{AuthGate, BearerGate, CallerIdentity, CookieGate, LocalGate};
pub use cache::{InMemoryTokenCache, TokenCache};
pub use oidc::{OidcClient, TokenVerifier, VerifiedIdentity};
pub use routes::{build_routes, AppState};
pub use store::{
    AssetMetadata, DataStore, FluxStore, PackageStore, StoreAdapter, StoreError, StoreRegistry,
    StoryStore,
};

use gateway_common::config::{AuthConfig, AuthMode, Config};
use gateway_common::{Error, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Compose the registry and gate from a validated configuration.
///
/// Runs once at startup; a `DuplicateKind` or missing identity-provider
/// setting here is fatal.
pub fn compose(config: &Config) -> Result<AppState> {
    let mut registry = StoreRegistry::new();
    registry.register(Arc::new(FluxStore::new(&config.backends.flux_url)))?;
    registry.register(Arc::new(PackageStore::new(&config.backends.cdn_url)))?;
    registry.register(Arc::new(DataStore::new(
        &config.backends.docdb_url,
        &config.backends.storage_url,
    )))?;
    registry.register(Arc::new(StoryStore::new(&config.backends.stories_url)))?;

    let gate: Arc<dyn AuthGate> = match config.auth.mode {
        AuthMode::Local => {
            tracing::warn!("Local auth bypass active; not for deployed profiles");
            Arc::new(LocalGate::new())
        }
        AuthMode::Cookie => Arc::new(CookieGate::new(
            &config.auth.cookie_name,
            Arc::new(oidc_client(&config.auth)?),
            Arc::new(InMemoryTokenCache::new()),
            Duration::from_secs(config.auth.cache_ttl_secs),
        )),
        AuthMode::Bearer => Arc::new(BearerGate::new(Arc::new(oidc_client(&config.auth)?))),
    };

    tracing::info!(
        auth_mode = ?config.auth.mode,
        kinds = ?registry.kinds(),
        "Gateway composed"
    );

    Ok(AppState {
        gate,
        registry: Arc::new(registry),
    })
}

fn oidc_client(auth: &AuthConfig) -> Result<OidcClient> {
    let base_url = auth
        .openid_base_url
        .clone()
        .ok_or_else(|| Error::Config("auth.openid_base_url is required".into()))?;
    let client_id = auth
        .client_id
        .clone()
        .ok_or_else(|| Error::Config("auth.client_id is required".into()))?;
    let client_secret = auth
        .client_secret
        .clone()
        .ok_or_else(|| Error::Config("auth.client_secret is required".into()))?;
    Ok(OidcClient::new(base_url, client_id, client_secret))
}

/// Build the gateway router with routes and middleware.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::build_routes(state).layer(cors)
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let state = compose(config)?;

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));
    let router = build_router(state);

    tracing::info!("Starting assets gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
