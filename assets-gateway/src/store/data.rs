//! Generic data store adapter.
//!
//! Data assets live as records in a docdb service; the payload bytes
//! sit in a companion storage cluster under the same id. All five
//! operations go to the docdb; the storage base URL is only used to
//! build the `contentUrl` of returned metadata, so each operation
//! still issues a single outbound call.

use super::{asset_id_of, classify_status, transport_error, AssetMetadata, StoreAdapter, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DATA_KIND: &str = "data";

/// Adapter over the docdb/storage pair backing generic data assets.
pub struct DataStore {
    client: reqwest::Client,
    docdb_url: String,
    storage_url: String,
}

impl DataStore {
    pub fn new(docdb_url: impl Into<String>, storage_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            docdb_url: docdb_url.into(),
            storage_url: storage_url.into(),
        }
    }

    fn metadata(&self, record: DataRecord) -> AssetMetadata {
        let content_url = format!("{}/files/{}", self.storage_url, record.record_id);
        AssetMetadata {
            asset_id: asset_id_of(&record.record_id),
            raw_id: record.record_id,
            kind: DATA_KIND.into(),
            name: record.name,
            owner_group: record.group_id,
            content_url: Some(content_url),
        }
    }
}

#[async_trait]
impl StoreAdapter for DataStore {
    fn kind(&self) -> &str {
        DATA_KIND
    }

    async fn fetch(&self, raw_id: &str) -> Result<AssetMetadata, StoreError> {
        let url = format!("{}/records/{}", self.docdb_url, raw_id);
        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, raw_id, &body));
        }

        let record: DataRecord = response.json().await.map_err(transport_error)?;
        Ok(self.metadata(record))
    }

    async fn create(&self, parent_id: &str, payload: &Value) -> Result<String, StoreError> {
        let url = format!("{}/records", self.docdb_url);
        let body = NewRecordRequest {
            folder_id: parent_id.to_string(),
            document: payload.clone(),
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

        let created: NewRecordResponse = response.json().await.map_err(transport_error)?;
        Ok(created.record_id)
    }

    async fn update(&self, raw_id: &str, payload: &Value) -> Result<(), StoreError> {
        let url = format!("{}/records/{}", self.docdb_url, raw_id);
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
        let url = format!("{}/records/{}", self.docdb_url, raw_id);
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
        let url = format!("{}/records", self.docdb_url);
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

        let listing: RecordListing = response.json().await.map_err(transport_error)?;
        Ok(listing
            .records
            .into_iter()
            .map(|r| self.metadata(r))
            .collect())
    }
}

// ============================================================================
// DocDb API Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataRecord {
    record_id: String,
    name: String,
    #[serde(default)]
    group_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewRecordRequest {
    folder_id: String,
    document: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewRecordResponse {
    record_id: String,
}

#[derive(Debug, Deserialize)]
struct RecordListing {
    records: Vec<DataRecord>,
}
