//! In-process content store. Backs dry runs of the tooling and the test suites.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{Result, StoreError};
use crate::models::{AssetDocument, DocumentQuery, Patch};
use crate::store::ContentStore;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Fetch { doc_type: String },
    Patch { document_id: String, set: Vec<String>, unset: Vec<String> },
    CreateOrReplace { document_id: String },
    Upload { filename: String },
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        !matches!(self, StoreCall::Fetch { .. })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    documents: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<StoreCall>>,
    failing_writes: Mutex<HashSet<String>>,
    fail_reads: AtomicBool,
    uploads: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn document_id(document: &Value) -> Option<&str> {
    document.get("_id").and_then(Value::as_str)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let store = Self::new();
        for document in documents {
            store.insert(document);
        }
        store
    }

    /// Seeds a document without recording a call.
    pub fn insert(&self, document: Value) {
        if let Some(id) = document_id(&document).map(str::to_string) {
            lock(&self.documents).insert(id, document);
        }
    }

    pub fn get(&self, document_id: &str) -> Option<Value> {
        lock(&self.documents).get(document_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls().into_iter().filter(StoreCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    /// Makes every subsequent write to `document_id` fail.
    pub fn fail_writes_to(&self, document_id: impl Into<String>) {
        lock(&self.failing_writes).insert(document_id.into());
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) {
        lock(&self.calls).push(call);
    }

    fn ensure_writable(&self, document_id: &str) -> Result<()> {
        if lock(&self.failing_writes).contains(document_id) {
            return Err(StoreError::Api {
                status: 500,
                body: format!("simulated write failure for {document_id}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn fetch_documents(&self, query: &DocumentQuery) -> Result<Vec<Value>> {
        query.validate()?;
        self.record(StoreCall::Fetch {
            doc_type: query.doc_type.clone(),
        });
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 503,
                body: "simulated read failure".to_string(),
            });
        }

        let documents = lock(&self.documents);
        let matching = documents.values().filter(|doc| query.matches(doc)).cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn patch(&self, document_id: &str, patch: Patch) -> Result<()> {
        self.record(StoreCall::Patch {
            document_id: document_id.to_string(),
            set: patch.set.field_names().into_iter().map(str::to_string).collect(),
            unset: patch.unset.clone(),
        });
        self.ensure_writable(document_id)?;

        let mut documents = lock(&self.documents);
        let fields = documents
            .get_mut(document_id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound(document_id.to_string()))?;
        for field in &patch.unset {
            fields.remove(field);
        }
        for (field, value) in patch.set.into_map() {
            fields.insert(field, value);
        }
        Ok(())
    }

    async fn create_or_replace(&self, document: Value) -> Result<()> {
        let id = document_id(&document)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::InvalidArg("documents need an _id".to_string()))?
            .to_string();
        self.record(StoreCall::CreateOrReplace {
            document_id: id.clone(),
        });
        self.ensure_writable(&id)?;
        lock(&self.documents).insert(id, document);
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _content_type: Option<&str>,
    ) -> Result<AssetDocument> {
        self.record(StoreCall::Upload {
            filename: filename.to_string(),
        });
        self.ensure_writable(filename)?;
        if bytes.is_empty() {
            return Err(StoreError::InvalidArg("empty upload".to_string()));
        }
        let n = self.uploads.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AssetDocument {
            id: format!("image-{n}-{filename}"),
            url: None,
        })
    }
}
