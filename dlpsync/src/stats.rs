use std::fmt;

use serde::Serialize;

use crate::upsert::UpsertOutcome;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SyncStats {
    pub fn record(&mut self, outcome: &UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created { .. } => self.created += 1,
            UpsertOutcome::Updated { .. } => self.updated += 1,
            UpsertOutcome::NoChanges { .. } => {}
            UpsertOutcome::Errored { .. } => self.errors += 1,
        }
    }

    /// Processed items that needed no write.
    pub fn unchanged(&self) -> usize {
        self.processed
            .saturating_sub(self.created + self.updated + self.skipped + self.errors)
    }
}

impl fmt::Display for SyncStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} created, {} updated, {} unchanged, {} skipped, {} errors",
            self.processed,
            self.created,
            self.updated,
            self.unchanged(),
            self.skipped,
            self.errors
        )
    }
}

/// Per-document counts for a field removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemovalStats {
    pub matched: usize,
    pub removed: usize,
    pub errors: usize,
}
