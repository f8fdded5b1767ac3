//! Content-addressed fetches with public gateway fallback.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{FetcherError, Result};

pub const DEFAULT_GATEWAYS: [&str; 4] = [
    "https://ipfs.io",
    "https://gateway.pinata.cloud",
    "https://dweb.link",
    "https://cloudflare-ipfs.com",
];

pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

static CID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/ipfs/([a-zA-Z0-9]+)",
        r"^ipfs://([a-zA-Z0-9]+)",
        r"^https?://([a-zA-Z0-9]+)\.ipfs\.",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("CID pattern compiles"))
    .collect()
});

/// Pulls the CID out of `…/ipfs/<cid>`, `ipfs://<cid>` or `https://<cid>.ipfs.<host>`.
pub fn extract_cid(url: &str) -> Option<String> {
    CID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|cid| cid.as_str().to_string())
    })
}

/// URLs to try in order: the original (unless it is an `ipfs://` URI), then each gateway.
pub fn candidate_urls(url: &str, gateways: &[String]) -> Vec<String> {
    let mut urls = Vec::new();
    if !url.starts_with("ipfs://") {
        urls.push(url.to_string());
    }
    if let Some(cid) = extract_cid(url) {
        for gateway in gateways {
            let candidate = format!("{}/ipfs/{}", gateway.trim_end_matches('/'), cid);
            if !urls.contains(&candidate) {
                urls.push(candidate);
            }
        }
    }
    urls
}

#[derive(Clone, Debug)]
pub struct GatewayFetcher {
    http: Client,
    gateways: Vec<String>,
    timeout: Duration,
}

impl Default for GatewayFetcher {
    fn default() -> Self {
        Self {
            http: Client::new(),
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            timeout: GATEWAY_TIMEOUT,
        }
    }
}

impl GatewayFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gateways(mut self, gateways: Vec<String>) -> Self {
        self.gateways = gateways;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    /// Returns the body of the first candidate URL that answers with a 2xx.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let url = url.trim();
        let candidates = candidate_urls(url, &self.gateways);
        if candidates.is_empty() {
            return Err(FetcherError::InvalidUrl(url.to_string()));
        }

        log::debug!("Fetching {} from {} candidate URL(s)", url, candidates.len());
        let mut failures = Vec::new();
        for (idx, candidate) in candidates.iter().enumerate() {
            log::debug!("Trying gateway {}/{}: {}", idx + 1, candidates.len(), candidate);
            match self.try_fetch(candidate).await {
                Ok(bytes) => {
                    log::debug!("Fetched {} bytes from {}", bytes.len(), candidate);
                    return Ok(bytes);
                }
                Err(reason) => {
                    log::warn!("Gateway failed: {} - {}", candidate, reason);
                    failures.push(format!("  - {candidate}: {reason}"));
                }
            }
        }

        Err(FetcherError::AllGatewaysFailed {
            url: url.to_string(),
            details: failures.join("\n"),
        })
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let bytes = self.fetch_bytes(url).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self
            .http
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| err.to_string())
    }
}
