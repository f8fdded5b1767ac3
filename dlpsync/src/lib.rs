//! DataDAO synchronizer: reconciles the DLP subgraph feed into CMS documents.
//!
//! The run pipeline is `fetch feed → index existing → reconcile each item`, with
//! the two-tier field table in [`mapper`] deciding which stored fields the feed
//! owns and which ones only get filled in once.

pub mod assets;
pub mod check;
pub mod cli;
pub mod config;
pub mod dry_run;
pub mod error;
pub mod mapper;
pub mod remove_field;
pub mod stats;
pub mod sync;
pub mod token;
pub mod upsert;

pub use crate::cli::{run_cli, Cli};
pub use crate::config::{Environment, SyncConfig};
pub use crate::dry_run::DryRunStore;
pub use crate::error::{Result, SyncError};
pub use crate::stats::{RemovalStats, SyncStats};
pub use crate::sync::{ExistingIndex, SyncPhase, Synchronizer};
pub use crate::upsert::UpsertOutcome;
