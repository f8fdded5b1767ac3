use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{AssetDocument, DocumentQuery, Patch};

/// The primitives the synchronizer needs from a content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Returns every document matching `query`, ordered by id.
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<Value>>;

    /// Applies a field-level merge patch; fields not named are left alone.
    async fn patch(&self, document_id: &str, patch: Patch) -> Result<()>;

    /// Writes `document` (which must carry `_id` and `_type`) in full.
    async fn create_or_replace(&self, document: Value) -> Result<()>;

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<AssetDocument>;
}

pub async fn fetch_typed<T: DeserializeOwned>(
    store: &dyn ContentStore,
    query: &DocumentQuery,
) -> Result<Vec<T>> {
    store
        .fetch_documents(query)
        .await?
        .into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .collect()
}

pub async fn fetch_first<T: DeserializeOwned>(
    store: &dyn ContentStore,
    query: DocumentQuery,
) -> Result<Option<T>> {
    let mut docs = fetch_typed(store, &query.limit(1)).await?;
    Ok(if docs.is_empty() {
        None
    } else {
        Some(docs.swap_remove(0))
    })
}
