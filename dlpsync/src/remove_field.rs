//! Bulk removal of one field from every document of a type.

use std::io::{BufRead, Write};
use std::sync::Arc;

use cmsstore::utils::id::{is_draft_id, published_id};
use cmsstore::{ContentStore, DocumentQuery, Patch};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SyncError};
use crate::stats::RemovalStats;

pub const PREVIEW_LIMIT: usize = 10;

/// Preview lines for the documents about to lose `field`.
pub fn preview_lines(documents: &[Value], field: &str) -> Vec<String> {
    let mut lines: Vec<String> = documents
        .iter()
        .take(PREVIEW_LIMIT)
        .enumerate()
        .map(|(index, document)| {
            let id = document.get("_id").and_then(Value::as_str).unwrap_or_default();
            let label = if is_draft_id(id) {
                format!("{} (draft)", published_id(id))
            } else {
                id.to_string()
            };
            let value = document.get(field).cloned().unwrap_or(Value::Null);
            format!("{}. {label} - {field}: {value}", index + 1)
        })
        .collect();
    if documents.len() > PREVIEW_LIMIT {
        lines.push(format!("... and {} more documents", documents.len() - PREVIEW_LIMIT));
    }
    lines
}

/// Asks `question` on `output` and reads one answer line; only `y`/`yes` confirm.
pub fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<bool> {
    write!(output, "{question} (y/N): ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

pub struct FieldRemoval {
    store: Arc<dyn ContentStore>,
    doc_type: String,
    field: String,
}

impl FieldRemoval {
    pub fn new(
        store: Arc<dyn ContentStore>,
        doc_type: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Self> {
        let doc_type = doc_type.into();
        let field = field.into();
        if doc_type.trim().is_empty() || field.trim().is_empty() {
            return Err(SyncError::Config(
                "document type and field name are required".to_string(),
            ));
        }
        Ok(Self {
            store,
            doc_type,
            field,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    /// Drafts and published documents that still define the field.
    pub async fn find(&self) -> Result<Vec<Value>> {
        info!(doc_type = %self.doc_type, field = %self.field, "querying documents");
        let query = DocumentQuery::of_type(self.doc_type.as_str()).defined(self.field.as_str());
        let documents = self.store.fetch_documents(&query).await?;
        info!(count = documents.len(), field = %self.field, "found documents with field");
        Ok(documents)
    }

    /// Unsets the field on each document; a failed patch is counted and the loop goes on.
    pub async fn remove(&self, documents: &[Value], dry_run: bool) -> RemovalStats {
        let mut stats = RemovalStats {
            matched: documents.len(),
            ..Default::default()
        };
        let total = documents.len();
        for (index, document) in documents.iter().enumerate() {
            let progress = format!("[{}/{}]", index + 1, total);
            let Some(document_id) = document.get("_id").and_then(Value::as_str) else {
                warn!(%progress, "document without _id");
                stats.errors += 1;
                continue;
            };
            debug!(%progress, document_id, "processing document");
            if !dry_run {
                if let Err(err) = self
                    .store
                    .patch(document_id, Patch::unset([self.field.as_str()]))
                    .await
                {
                    error!(%progress, document_id, error = %err, "failed to remove field");
                    stats.errors += 1;
                    continue;
                }
            }
            stats.removed += 1;
            info!(%progress, document_id, dry_run, "removed field");
        }
        stats
    }
}
