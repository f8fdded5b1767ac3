use std::time::Duration;

use serde::Deserialize;

use crate::error::{FetcherError, Result};
use crate::explorer::DEFAULT_EXPLORER_URL;
use crate::ipfs::{DEFAULT_GATEWAYS, GATEWAY_TIMEOUT};

#[derive(Deserialize, Debug, Clone)]
pub struct FetcherConfig {
    pub subgraph_url: String,
    #[serde(default = "default_explorer_url")]
    pub explorer_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_concurrency")]
    pub enrich_concurrency: usize,
    #[serde(default = "default_gateways")]
    pub ipfs_gateways: Vec<String>,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_explorer_url() -> String {
    DEFAULT_EXPLORER_URL.to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_delay_ms() -> u64 {
    100
}

fn default_concurrency() -> usize {
    1
}

fn default_gateways() -> Vec<String> {
    DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect()
}

fn default_gateway_timeout_secs() -> u64 {
    GATEWAY_TIMEOUT.as_secs()
}

impl FetcherConfig {
    pub fn new(subgraph_url: impl Into<String>) -> Self {
        Self {
            subgraph_url: subgraph_url.into(),
            explorer_url: default_explorer_url(),
            page_size: default_page_size(),
            page_delay_ms: default_delay_ms(),
            enrich_concurrency: default_concurrency(),
            ipfs_gateways: default_gateways(),
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subgraph_url.trim().is_empty() {
            return Err(FetcherError::InvalidParam(
                "subgraph URL is not set".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(FetcherError::InvalidParam(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
