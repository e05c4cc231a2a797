//! Stories store adapter.

use super::{asset_id_of, classify_status, transport_error, AssetMetadata, StoreAdapter, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STORY_KIND: &str = "story";

/// Adapter over the stories backend.
pub struct StoryStore {
    client: reqwest::Client,
    base_url: String,
}

impl StoryStore {
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

    fn metadata(&self, story: Story) -> AssetMetadata {
        AssetMetadata {
            asset_id: asset_id_of(&story.story_id),
            raw_id: story.story_id,
            kind: STORY_KIND.into(),
            name: story.title,
            owner_group: story.group_id,
            content_url: None,
        }
    }
}

#[async_trait]
impl StoreAdapter for StoryStore {
    fn kind(&self) -> &str {
        STORY_KIND
    }

    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError> {
        let url = format!("{}/stories/{}", self.base_url, raw_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, raw_id, &body));
        }

        let story: Story = response.json().await.map_err(transport_error)?;
        Ok(self.metadata(story))
    }

    async fn create(&self, parent_id: &str, payload: &Value) -> Result<String, StoreError> {
        let url = format!("{}/stories", self.base_url);
        let body = NewStoryRequest {
            folder_id: parent_id.to_string(),
            story: payload.clone(),
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

        let created: NewStoryResponse = response.json().await.map_err(transport_error)?;
        Ok(created.story_id)
    }

    async fn update(&self, raw_id: &str, payload: &Value) -> Result<(), StoreError> {
        let url = format!("{}/stories/{}", self.base_url, raw_id);
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
        let url = format!("{}/stories/{}", self.base_url, raw_id);
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
        let url = format!("{}/stories", self.base_url);
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

        let listing: StoryListing = response.json().await.map_err(transport_error)?;
        Ok(listing
            .stories
            .into_iter()
            .map(|s| self.metadata(s))
            .collect())
    }
}

// ============================================================================
// Stories API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Story {
    story_id: String,
    title: String,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewStoryRequest {
    folder_id: String,
    story: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewStoryResponse {
    story_id: String,
}

#[derive(Debug, Deserialize)]
struct StoryListing {
    stories: Vec<Story>,
}
