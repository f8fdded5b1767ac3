use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cmsstore::{AssetDocument, ContentStore, DocumentQuery, Patch, Result};
use serde_json::Value;
use tracing::info;

/// Passes reads through to the wrapped store and drops every write.
pub struct DryRunStore {
    inner: Arc<dyn ContentStore>,
    dropped_writes: AtomicUsize,
}

impl DryRunStore {
    pub fn new(inner: Arc<dyn ContentStore>) -> Self {
        Self {
            inner,
            dropped_writes: AtomicUsize::new(0),
        }
    }

    /// Writes that would have been sent.
    pub fn dropped_writes(&self) -> usize {
        self.dropped_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContentStore for DryRunStore {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<Value>> {
        self.inner.fetch_documents(query).await
    }

    async fn patch(&self, document_id: &str, patch: Patch) -> Result<()> {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        info!(
            document_id,
            set = ?patch.set.field_names(),
            unset = ?patch.unset,
            "[dry-run] would patch"
        );
        Ok(())
    }

    async fn create_or_replace(&self, document: Value) -> Result<()> {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        let document_id = document.get("_id").and_then(Value::as_str).unwrap_or_default();
        info!(document_id, "[dry-run] would create");
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: Option<&str>,
    ) -> Result<AssetDocument> {
        self.dropped_writes.fetch_add(1, Ordering::Relaxed);
        info!(filename, bytes = bytes.len(), "[dry-run] would upload image");
        Ok(AssetDocument {
            id: format!("image-dry-run-{filename}"),
            url: None,
        })
    }
}
