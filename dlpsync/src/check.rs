//! Pre-flight check of configuration, store access and the feed.

use std::io::Write;
use std::sync::Arc;

use cmsstore::{ContentStore, DocumentQuery, WriteSet, DATA_DAO_TYPE};
use dlpfetcher::{DlpFetcher, ProcessedDlp, SubgraphDlp};
use serde_json::Value;
use tracing::error;

use crate::config::{
    DATASET_VAR, EXPLORER_URL_VAR, PROJECT_ID_VAR, SUBGRAPH_URL_VAR, WRITE_TOKEN_VAR,
};
use crate::error::{Result, SyncError};
use crate::mapper::{plan_create, DataDaoInput};

const SAMPLE_DOCUMENTS: usize = 3;

/// Renders a stored scalar for display whatever its JSON type.
fn shown_field(document: &Value, key: &str) -> String {
    match document.get(key) {
        None | Some(Value::Null) => "?".to_string(),
        Some(Value::String(text)) if text.trim().is_empty() => "?".to_string(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// One row per setting. Secrets are reported as set or missing, never echoed.
pub fn env_report(lookup: impl Fn(&str) -> Option<String>) -> Vec<(&'static str, String)> {
    let shown = |key: &str| {
        lookup(key)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "missing".to_string())
    };
    let flag = |key: &str| {
        let set = lookup(key).is_some_and(|value| !value.trim().is_empty());
        let status = if set { "set" } else { "missing" };
        status.to_string()
    };
    vec![
        (PROJECT_ID_VAR, shown(PROJECT_ID_VAR)),
        (DATASET_VAR, shown(DATASET_VAR)),
        (WRITE_TOKEN_VAR, flag(WRITE_TOKEN_VAR)),
        (SUBGRAPH_URL_VAR, flag(SUBGRAPH_URL_VAR)),
        (
            EXPLORER_URL_VAR,
            lookup(EXPLORER_URL_VAR).map_or_else(|| "default".to_string(), |_| "set".to_string()),
        ),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    /// Stored documents as raw JSON; hand edits may not match the field types.
    pub sample_documents: Vec<Value>,
    pub sample_dlps: Vec<SubgraphDlp>,
    /// What the first feed item would be created as, before enrichment.
    pub preview: Option<WriteSet>,
}

pub struct ConnectionCheck {
    store: Arc<dyn ContentStore>,
    fetcher: DlpFetcher,
}

impl ConnectionCheck {
    pub fn new(store: Arc<dyn ContentStore>, fetcher: DlpFetcher) -> Self {
        Self { store, fetcher }
    }

    pub async fn run<W: Write>(&self, out: &mut W) -> Result<CheckReport> {
        let mut report = CheckReport::default();

        writeln!(out, "Checking store access...")?;
        let query = DocumentQuery::of_type(DATA_DAO_TYPE).limit(SAMPLE_DOCUMENTS);
        report.sample_documents = self
            .store
            .fetch_documents(&query)
            .await
            .map_err(|err| {
                error!(error = %err, "store query failed");
                SyncError::CheckFailed(format!("store query failed: {err}"))
            })?;
        writeln!(
            out,
            "Store query OK ({} DataDAO documents sampled)",
            report.sample_documents.len()
        )?;
        for document in &report.sample_documents {
            writeln!(
                out,
                "  - {} (ID: {})",
                shown_field(document, "name"),
                shown_field(document, "id")
            )?;
        }

        writeln!(out, "Checking subgraph access...")?;
        report.sample_dlps = self.fetcher.fetch_sample(1).await.map_err(|err| {
            error!(error = %err, "subgraph query failed");
            SyncError::CheckFailed(format!("subgraph query failed: {err}"))
        })?;
        writeln!(out, "Subgraph query OK ({} DLPs sampled)", report.sample_dlps.len())?;

        if let Some(raw) = report.sample_dlps.first().cloned() {
            let dlp = ProcessedDlp::from_raw(raw).map_err(|err| {
                SyncError::CheckFailed(format!("sample DLP could not be mapped: {err}"))
            })?;
            let preview = plan_create(&DataDaoInput::new(dlp));
            writeln!(out, "Sample mapped DataDAO:")?;
            writeln!(
                out,
                "{}",
                serde_json::to_string_pretty(&Value::Object(preview.clone().into_map()))
                    .unwrap_or_default()
            )?;
            report.preview = Some(preview);
        }

        writeln!(out, "All checks passed.")?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn secrets_are_never_echoed() {
        let vars: HashMap<&str, &str> = [
            (PROJECT_ID_VAR, "abc123"),
            (DATASET_VAR, "production"),
            (WRITE_TOKEN_VAR, "sk-secret"),
        ]
        .into_iter()
        .collect();
        let report = env_report(|key: &str| vars.get(key).map(|v| v.to_string()));

        assert_eq!(report[0], (PROJECT_ID_VAR, "abc123".to_string()));
        assert_eq!(report[2], (WRITE_TOKEN_VAR, "set".to_string()));
        assert_eq!(report[3], (SUBGRAPH_URL_VAR, "missing".to_string()));
        assert_eq!(report[4], (EXPLORER_URL_VAR, "default".to_string()));
        assert!(report.iter().all(|(_, value)| !value.contains("sk-secret")));
    }

    #[test]
    fn stored_fields_are_shown_whatever_their_type() {
        let document = serde_json::json!({ "id": "4", "name": "Sleep", "contributorCount": 7.5 });
        assert_eq!(shown_field(&document, "id"), "4");
        assert_eq!(shown_field(&document, "contributorCount"), "7.5");
        assert_eq!(shown_field(&serde_json::json!({ "id": 9 }), "id"), "9");
        assert_eq!(shown_field(&serde_json::json!({ "name": " " }), "name"), "?");
        assert_eq!(shown_field(&document, "website"), "?");
    }
}
