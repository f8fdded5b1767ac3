use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cmsstore::utils::id::{data_dao_document_id, draft_id, is_draft_id};
use cmsstore::{ContentStore, DocumentQuery, DATA_DAO_TYPE};
use dlpfetcher::address::is_linkable_address;
use dlpfetcher::{DlpFetcher, FetcherError, ProcessedDlp};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::assets::{AssetImporter, AssetSource};
use crate::error::Result;
use crate::mapper::{is_open, plan_create, plan_update, token_description, DataDaoInput};
use crate::stats::SyncStats;
use crate::token::{TokenLink, TokenLinker};
use crate::upsert::{RecordWriter, UpsertOutcome};

/// Where a run currently is. `Failed` is only entered from the first two phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    FetchingFeed,
    IndexingExisting,
    Reconciling { index: usize, total: usize },
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::FetchingFeed => write!(f, "fetching feed"),
            SyncPhase::IndexingExisting => write!(f, "indexing existing records"),
            SyncPhase::Reconciling { index, total } => {
                write!(f, "reconciling item {}/{}", index + 1, total)
            }
            SyncPhase::Summarizing => write!(f, "summarizing"),
            SyncPhase::Done => write!(f, "done"),
            SyncPhase::Failed => write!(f, "failed"),
        }
    }
}

/// A stored DataDAO document as found at index time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingRecord {
    pub document_id: String,
    pub fields: Map<String, Value>,
}

/// Stored DataDAO documents keyed by feed id. Built once per run.
#[derive(Debug, Clone, Default)]
pub struct ExistingIndex {
    records: HashMap<u64, ExistingRecord>,
}

fn stored_dlp_id(fields: &Map<String, Value>) -> Option<u64> {
    match fields.get("id")? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ExistingIndex {
    /// Reads every DataDAO with an `id`, drafts included.
    pub async fn load(store: &dyn ContentStore) -> Result<Self> {
        let query = DocumentQuery::of_type(DATA_DAO_TYPE).defined("id");
        let documents = store.fetch_documents(&query).await?;
        Ok(Self::from_documents(documents))
    }

    /// When a draft and a published copy share an id, the draft wins.
    pub fn from_documents(documents: impl IntoIterator<Item = Value>) -> Self {
        let mut records: HashMap<u64, ExistingRecord> = HashMap::new();
        for document in documents {
            let Value::Object(fields) = document else {
                continue;
            };
            let Some(document_id) = fields.get("_id").and_then(Value::as_str).map(str::to_string)
            else {
                continue;
            };
            let Some(dlp_id) = stored_dlp_id(&fields) else {
                warn!(document_id = %document_id, "stored DataDAO has no usable id");
                continue;
            };
            let keep_current = records
                .get(&dlp_id)
                .is_some_and(|current| is_draft_id(&current.document_id) && !is_draft_id(&document_id));
            if !keep_current {
                records.insert(dlp_id, ExistingRecord { document_id, fields });
            }
        }
        Self { records }
    }

    pub fn get(&self, dlp_id: u64) -> Option<&ExistingRecord> {
        self.records.get(&dlp_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Reconciles the DLP feed into DataDAO and token documents.
pub struct Synchronizer {
    fetcher: DlpFetcher,
    store: Arc<dyn ContentStore>,
    assets: AssetImporter,
    tokens: TokenLinker,
    writer: RecordWriter,
    item_delay: Duration,
    phase: SyncPhase,
}

impl Synchronizer {
    pub fn new(
        fetcher: DlpFetcher,
        store: Arc<dyn ContentStore>,
        asset_source: Arc<dyn AssetSource>,
    ) -> Self {
        let assets = AssetImporter::new(asset_source, store.clone());
        Self {
            fetcher,
            tokens: TokenLinker::new(store.clone(), assets.clone()),
            writer: RecordWriter::new(store.clone()),
            assets,
            store,
            item_delay: Duration::from_millis(100),
            phase: SyncPhase::Idle,
        }
    }

    pub fn with_item_delay(mut self, item_delay: Duration) -> Self {
        self.item_delay = item_delay;
        self
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn enter(&mut self, phase: SyncPhase) {
        debug!(from = %self.phase, to = %phase, "sync phase");
        self.phase = phase;
    }

    /// One full pass. Feed and index failures abort the run; item failures are counted.
    pub async fn run(&mut self) -> Result<SyncStats> {
        self.enter(SyncPhase::FetchingFeed);
        let items = match self.fetcher.fetch_all().await {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, "failed to fetch DLP feed");
                self.enter(SyncPhase::Failed);
                return Err(err.into());
            }
        };
        info!(count = items.len(), "fetched DLPs");

        self.enter(SyncPhase::IndexingExisting);
        let index = match ExistingIndex::load(self.store.as_ref()).await {
            Ok(index) => index,
            Err(err) => {
                error!(error = %err, "failed to read existing DataDAOs");
                self.enter(SyncPhase::Failed);
                return Err(err);
            }
        };
        info!(count = index.len(), "indexed existing DataDAOs");

        let mut stats = SyncStats::default();
        let total = items.len();
        for (position, item) in items.into_iter().enumerate() {
            self.enter(SyncPhase::Reconciling { index: position, total });
            if position > 0 && !self.item_delay.is_zero() {
                tokio::time::sleep(self.item_delay).await;
            }
            stats.processed += 1;

            let dlp = match item {
                Ok(dlp) => dlp,
                Err(FetcherError::InvalidRecord { id, name, reason }) => {
                    error!(dlp_id = %id, name = %name, error = %reason, "failed to process DLP");
                    stats.errors += 1;
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "failed to process DLP");
                    stats.errors += 1;
                    continue;
                }
            };
            if !dlp.has_name() {
                info!(dlp_id = dlp.id, "skipping DLP without a name");
                stats.skipped += 1;
                continue;
            }

            let (dlp_id, name) = (dlp.id, dlp.name.trim().to_string());
            let outcome = self.reconcile(dlp, index.get(dlp_id)).await;
            match &outcome {
                UpsertOutcome::Created { document_id } => {
                    info!(dlp_id, name = %name, document_id = %document_id, "created DataDAO")
                }
                UpsertOutcome::Updated { document_id, fields } => {
                    info!(dlp_id, name = %name, document_id = %document_id, ?fields, "updated DataDAO")
                }
                UpsertOutcome::NoChanges { document_id } => {
                    debug!(dlp_id, name = %name, document_id = %document_id, "no changes")
                }
                UpsertOutcome::Errored { document_id, message } => error!(
                    dlp_id,
                    name = %name,
                    document_id = %document_id,
                    error = %message,
                    "failed to write DataDAO"
                ),
            }
            stats.record(&outcome);
        }

        self.enter(SyncPhase::Summarizing);
        info!(
            processed = stats.processed,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            errors = stats.errors,
            "sync finished"
        );
        self.enter(SyncPhase::Done);
        Ok(stats)
    }

    /// Token first, then the DataDAO itself.
    pub async fn reconcile(
        &self,
        dlp: ProcessedDlp,
        existing: Option<&ExistingRecord>,
    ) -> UpsertOutcome {
        let existing_fields = existing.map(|record| &record.fields);
        let document_id = match existing {
            Some(record) => record.document_id.clone(),
            None => draft_id(&data_dao_document_id(dlp.id)),
        };

        let icon = if is_open(existing_fields, "icon") {
            self.assets
                .import(&dlp.icon_url, &format!("dlp-{}-icon", dlp.id))
                .await
        } else {
            None
        };

        let token_id = if is_linkable_address(&dlp.token) {
            self.tokens
                .upsert(TokenLink {
                    address: &dlp.token,
                    symbol: dlp.token_symbol.as_deref(),
                    icon_url: &dlp.icon_url,
                    description: token_description(&dlp, existing_fields),
                    data_dao_id: &document_id,
                })
                .await
        } else {
            None
        };

        let input = DataDaoInput {
            icon,
            token_id,
            ..DataDaoInput::new(dlp)
        };
        match existing {
            Some(record) => {
                self.writer
                    .update(&record.document_id, plan_update(&input, &record.fields))
                    .await
            }
            None => self.writer.create(&document_id, plan_create(&input)).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_copy_wins_over_published() {
        let index = ExistingIndex::from_documents([
            json!({ "_id": "drafts.dataDAO-3", "id": 3, "name": "draft" }),
            json!({ "_id": "dataDAO-3", "id": 3, "name": "published" }),
            json!({ "_id": "dataDAO-4", "id": "4" }),
            json!({ "_id": "dataDAO-x", "id": "x" }),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(3).unwrap().document_id, "drafts.dataDAO-3");
        assert_eq!(index.get(4).unwrap().document_id, "dataDAO-4");
    }

    #[test]
    fn later_draft_replaces_earlier_published() {
        let index = ExistingIndex::from_documents([
            json!({ "_id": "dataDAO-3", "id": 3 }),
            json!({ "_id": "drafts.dataDAO-3", "id": 3 }),
        ]);
        assert_eq!(index.get(3).unwrap().document_id, "drafts.dataDAO-3");
    }

    #[test]
    fn phase_display() {
        assert_eq!(
            SyncPhase::Reconciling { index: 6, total: 10 }.to_string(),
            "reconciling item 7/10"
        );
    }
}
