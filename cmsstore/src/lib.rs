//! Content-store access for the DataDAO synchronizer.
//!
//! `cmsstore` is the only crate that knows how documents are persisted. It provides:
//! - the typed `TokenDocument` model and the `WriteSet`
//!   used to express field-level merges,
//! - the `ContentStore` trait with its query / patch / create-or-replace / upload primitives,
//! - `CmsClient`, the HTTP implementation against the hosted store,
//! - `MemoryStore`, an in-process implementation for dry runs and tests.

pub mod client;
pub mod config;
pub mod errors;
pub mod memory;
pub mod models;
pub mod store;
pub mod utils;

pub use crate::client::CmsClient;
pub use crate::config::StoreConfig;
pub use crate::errors::{Result, StoreError};
pub use crate::memory::MemoryStore;
pub use crate::models::{
    AssetDocument, DocumentQuery, ImageRef, Patch, Reference,
    TokenDocument, WriteSet, DATA_DAO_TYPE, TOKEN_TYPE,
};
pub use crate::store::{fetch_first, fetch_typed, ContentStore};
