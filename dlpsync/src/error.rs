use cmsstore::StoreError;
use dlpfetcher::FetcherError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("fetch error: {0}")]
    Fetcher(#[from] FetcherError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection check failed: {0}")]
    CheckFailed(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
