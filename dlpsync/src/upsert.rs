use std::sync::Arc;

use cmsstore::{ContentStore, Patch, WriteSet, DATA_DAO_TYPE};
use serde::Serialize;
use serde_json::Value;

/// Result of writing one DataDAO document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created { document_id: String },
    Updated { document_id: String, fields: Vec<String> },
    NoChanges { document_id: String },
    Errored { document_id: String, message: String },
}

impl UpsertOutcome {
    pub fn document_id(&self) -> &str {
        match self {
            UpsertOutcome::Created { document_id }
            | UpsertOutcome::Updated { document_id, .. }
            | UpsertOutcome::NoChanges { document_id }
            | UpsertOutcome::Errored { document_id, .. } => document_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, UpsertOutcome::Errored { .. })
    }
}

/// Turns planned write-sets into store calls.
#[derive(Clone)]
pub struct RecordWriter {
    store: Arc<dyn ContentStore>,
}

impl RecordWriter {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, document_id: &str, writes: WriteSet) -> UpsertOutcome {
        let mut document = writes.into_map();
        document.insert("_id".to_string(), Value::String(document_id.to_string()));
        document.insert("_type".to_string(), Value::String(DATA_DAO_TYPE.to_string()));

        match self.store.create_or_replace(Value::Object(document)).await {
            Ok(()) => UpsertOutcome::Created {
                document_id: document_id.to_string(),
            },
            Err(err) => UpsertOutcome::Errored {
                document_id: document_id.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Merge-patches `writes` into the document; an empty write-set issues no call.
    pub async fn update(&self, document_id: &str, writes: WriteSet) -> UpsertOutcome {
        if writes.is_empty() {
            return UpsertOutcome::NoChanges {
                document_id: document_id.to_string(),
            };
        }
        let fields = writes
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        match self.store.patch(document_id, Patch::set(writes)).await {
            Ok(()) => UpsertOutcome::Updated {
                document_id: document_id.to_string(),
                fields,
            },
            Err(err) => UpsertOutcome::Errored {
                document_id: document_id.to_string(),
                message: err.to_string(),
            },
        }
    }
}
