//! CDN package store adapter.
//!
//! Package raw ids are the url-safe base64 encoding of the package
//! name, so a name like `@scope/lib` travels safely in a path segment.

use super::{asset_id_of, classify_status, transport_error, AssetMetadata, StoreAdapter, StoreError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

pub const PACKAGE_KIND: &str = "package";

/// Encode a package name into its raw id.
pub fn raw_id_of(package_name: &str) -> String {
    URL_SAFE_NO_PAD.encode(package_name.as_bytes())
}

/// Decode a raw id back into the package name.
pub fn package_name_of(raw_id: &str) -> Result<String, StoreError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw_id.as_bytes())
        .map_err(|_| StoreError::Validation(format!("malformed package id: {raw_id}")))?;
    String::from_utf8(bytes)
        .map_err(|_| StoreError::Validation(format!("malformed package id: {raw_id}")))
}

/// Adapter over the CDN/package backend.
pub struct PackageStore {
    client: reqwest::Client,
    base_url: String,
}

impl PackageStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn metadata(&self, package: PackageInfo) -> AssetMetadata {
        let raw_id = raw_id_of(&package.name);
        AssetMetadata {
            asset_id: asset_id_of(&raw_id),
            raw_id,
            kind: PACKAGE_KIND.into(),
            name: package.name,
            owner_group: package.owner_group,
            content_url: None,
        }
    }
}

#[async_trait]
impl StoreAdapter for PackageStore {
    fn kind(&self) -> &str {
        PACKAGE_KIND
    }

    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError> {
        // the CDN route takes the encoded raw id as-is; decoding up
        // front rejects malformed ids and gives error messages the
        // readable package name
        let name = package_name_of(raw_id)?;
        let url = format!("{}/packages/{}", self.base_url, raw_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &name, &body));
        }

        let package: PackageInfo = response.json().await.map_err(transport_error)?;
        Ok(self.metadata(package))
    }

    async fn create(&self, parent_id: &str, payload: &Value) -> Result<String, StoreError> {
        let url = format!("{}/packages", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("folder", parent_id)])
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, parent_id, &body));
        }

        let published: PackageInfo = response.json().await.map_err(transport_error)?;
        Ok(raw_id_of(&published.name))
    }

    async fn update(&self, raw_id: &str, payload: &Value) -> Result<(), StoreError> {
        let name = package_name_of(raw_id)?;
        let url = format!("{}/packages/{}", self.base_url, raw_id);
        let response = self
            .client
            .put(&url)
            .json(payload)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &name, &body));
        }
        Ok(())
    }

    async fn delete(&self, raw_id: &str) -> Result<(), StoreError> {
        let name = package_name_of(raw_id)?;
        let url = format!("{}/packages/{}", self.base_url, raw_id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &name, &body));
        }
        Ok(())
    }

    async fn list_children(&self, parent_id: &str) -> Result<Vec<AssetMetadata>, StoreError> {
        let url = format!("{}/packages", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("folder", parent_id)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, parent_id, &body));
        }

        let listing: PackageListing = response.json().await.map_err(transport_error)?;
        Ok(listing
            .packages
            .into_iter()
            .map(|p| self.metadata(p))
            .collect())
    }
}

// ============================================================================
// CDN API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageInfo {
    name: String,
    #[serde(default)]
    owner_group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackageListing {
    packages: Vec<PackageInfo>,
}
