use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Api { url: String, status: u16 },

    #[error("malformed response envelope: {0}")]
    Malformed(String),

    #[error("subgraph reported errors: {0}")]
    GraphQl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("failed to fetch from all IPFS gateways:\n{details}\n\nOriginal URL: {url}")]
    AllGatewaysFailed { url: String, details: String },

    #[error("invalid DLP record {id} ({name}): {reason}")]
    InvalidRecord {
        id: String,
        name: String,
        reason: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParam(String),
}

pub type Result<T> = std::result::Result<T, FetcherError>;
