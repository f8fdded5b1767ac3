use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{FetcherError, Result};

pub const DEFAULT_EXPLORER_URL: &str = "https://vanascan.io";

#[async_trait]
pub trait SymbolSource: Send + Sync {
    /// `Ok(None)` when the address is known but carries no token symbol.
    async fn fetch_symbol(&self, address: &str) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    #[serde(default)]
    token: Option<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    symbol: Option<String>,
}

/// Block-explorer address lookups (`/api/v2/addresses/{address}`).
#[derive(Clone, Debug)]
pub struct ExplorerClient {
    http: Client,
    base_url: String,
}

impl Default for ExplorerClient {
    fn default() -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_EXPLORER_URL.to_string(),
        }
    }
}

impl ExplorerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/api/v2/addresses/{}", self.base_url, address.to_lowercase())
    }
}

#[async_trait]
impl SymbolSource for ExplorerClient {
    async fn fetch_symbol(&self, address: &str) -> Result<Option<String>> {
        let url = self.address_url(address);
        log::debug!("Fetching token info from {}", url);
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetcherError::Api {
                url,
                status: status.as_u16(),
            });
        }
        let info: AddressInfo = response.json().await?;
        Ok(info
            .token
            .and_then(|token| token.symbol)
            .map(|symbol| symbol.trim().to_string())
            .filter(|symbol| !symbol.is_empty()))
    }
}
