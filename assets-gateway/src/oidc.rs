//! Identity-provider client.
//!
//! Token validation goes through OIDC token introspection: the gateway
//! never verifies signatures locally, it asks the provider whether the
//! token is active and maps the introspection claims to a
//! [`CallerIdentity`]. The [`TokenVerifier`] trait is the seam that
//! lets the gates be exercised against a fake provider in tests.

use crate::auth::{AuthError, CallerIdentity};
use async_trait::async_trait;
use serde::Deserialize;

/// Result of a successful token validation.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub identity: CallerIdentity,
    /// Seconds until the provider considers the token expired
    pub expires_in: Option<u64>,
}

/// Validates a raw token against the identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// OIDC introspection client.
pub struct OidcClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl OidcClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

#[async_trait]
impl TokenVerifier for OidcClient {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        let url = format!(
            "{}/protocol/openid-connect/token/introspect",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("token", token),
            ])
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // any non-2xx here means we could not check the credential
            return Err(AuthError::ProviderUnavailable(format!(
                "introspection returned {status}"
            )));
        }

        let introspection: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        if !introspection.active {
            return Err(AuthError::Unauthenticated("token rejected".into()));
        }

        Ok(introspection.into_verified())
    }
}

// ============================================================================
// Introspection wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    /// Absolute expiry, seconds since epoch
    #[serde(default)]
    exp: Option<i64>,
}

impl IntrospectionResponse {
    fn into_verified(self) -> VerifiedIdentity {
        let user_id = self
            .preferred_username
            .or(self.sub)
            .unwrap_or_else(|| "unknown".into());
        let is_admin = self.groups.iter().any(|g| g == "admin");
        let expires_in = self.exp.map(|exp| {
            let now = chrono::Utc::now().timestamp();
            exp.saturating_sub(now).max(0) as u64
        });

        VerifiedIdentity {
            identity: CallerIdentity {
                user_id,
                groups: self.groups,
                is_admin,
            },
            expires_in,
        }
    }
}
