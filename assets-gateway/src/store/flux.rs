//! Flux-project store adapter.

use super::{asset_id_of, classify_status, transport_error, AssetMetadata, StoreAdapter, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const FLUX_KIND: &str = "flux-project";

/// Adapter over the flux-project backend.
pub struct FluxStore {
    client: reqwest::Client,
    base_url: String,
}

impl FluxStore {
    /// Create a new flux adapter pointed at the given base URL.
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

    fn metadata(&self, project: FluxProject) -> AssetMetadata {
        AssetMetadata {
            asset_id: asset_id_of(&project.project_id),
            raw_id: project.project_id,
            kind: FLUX_KIND.into(),
            name: project.name,
            owner_group: project.group_id,
            content_url: None,
        }
    }
}

#[async_trait]
impl StoreAdapter for FluxStore {
    fn kind(&self) -> &str {
        FLUX_KIND
    }

    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError> {
        let url = format!("{}/projects/{}", self.base_url, raw_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, raw_id, &body));
        }

        let project: FluxProject = response.json().await.map_err(transport_error)?;
        Ok(self.metadata(project))
    }

    async fn create(&self, parent_id: &str, payload: &Value) -> Result<String, StoreError> {
        let url = format!("{}/projects", self.base_url);
        let body = NewProjectRequest {
            folder_id: parent_id.to_string(),
            project: payload.clone(),
        };
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, parent_id, &body));
        }

        let created: NewProjectResponse = response.json().await.map_err(transport_error)?;
        Ok(created.project_id)
    }

    async fn update(&self, raw_id: &str, payload: &Value) -> Result<(), StoreError> {
        let url = format!("{}/projects/{}", self.base_url, raw_id);
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
            return Err(classify_status(status, raw_id, &body));
        }
        Ok(())
    }

    async fn delete(&self, raw_id: &str) -> Result<(), StoreError> {
        let url = format!("{}/projects/{}", self.base_url, raw_id);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, raw_id, &body));
        }
        Ok(())
    }

    async fn list_children(&self, parent_id: &str) -> Result<Vec<AssetMetadata>, StoreError> {
        let url = format!("{}/projects", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("folder-id", parent_id)])
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, parent_id, &body));
        }

        let listing: ProjectListing = response.json().await.map_err(transport_error)?;
        Ok(listing
            .projects
            .into_iter()
            .map(|p| self.metadata(p))
            .collect())
    }
}

// ============================================================================
// Flux API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FluxProject {
    project_id: String,
    name: String,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewProjectRequest {
    folder_id: String,
    project: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewProjectResponse {
    project_id: String,
}

#[derive(Debug, Deserialize)]
struct ProjectListing {
    projects: Vec<FluxProject>,
}
