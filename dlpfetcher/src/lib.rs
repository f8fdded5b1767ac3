pub mod address;
pub mod client;
pub mod config;
pub mod enrich;
pub mod error;
pub mod explorer;
pub mod ipfs;
pub mod models;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

pub use crate::client::{fetch_all_dlps, DlpPageSource, SubgraphClient};
pub use crate::config::FetcherConfig;
pub use crate::enrich::{latest_refiner, Enricher};
pub use crate::error::{FetcherError, Result};
pub use crate::explorer::{ExplorerClient, SymbolSource};
pub use crate::ipfs::GatewayFetcher;
pub use crate::models::{LatestRefiner, ProcessedDlp, RefinerSchema, SubgraphDlp, SubgraphRefiner};
pub use crate::schema::{GatewaySchemaSource, SchemaSource};

/// Feed walk plus enrichment.
#[derive(Clone)]
pub struct DlpFetcher {
    feed: Arc<dyn DlpPageSource>,
    enricher: Enricher,
    page_size: usize,
    page_delay: Duration,
    concurrency: usize,
}

impl DlpFetcher {
    pub fn new(feed: Arc<dyn DlpPageSource>, enricher: Enricher) -> Self {
        Self {
            feed,
            enricher,
            page_size: 100,
            page_delay: Duration::from_millis(100),
            concurrency: 1,
        }
    }

    pub fn from_config(config: &FetcherConfig) -> Result<Self> {
        config.validate()?;
        let feed = SubgraphClient::new(config.subgraph_url.clone())?;
        let gateways = GatewayFetcher::new()
            .with_gateways(config.ipfs_gateways.clone())
            .with_timeout(config.gateway_timeout());
        let enricher = Enricher::new(
            Arc::new(GatewaySchemaSource::new(gateways)),
            Arc::new(ExplorerClient::new(config.explorer_url.clone())),
        );
        Ok(Self::new(Arc::new(feed), enricher)
            .with_paging(config.page_size, config.page_delay())
            .with_concurrency(config.enrich_concurrency))
    }

    pub fn with_paging(mut self, page_size: usize, page_delay: Duration) -> Self {
        self.page_size = page_size;
        self.page_delay = page_delay;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The whole raw feed. Errors if any page fails.
    pub async fn fetch_raw(&self) -> Result<Vec<SubgraphDlp>> {
        fetch_all_dlps(self.feed.as_ref(), self.page_size, self.page_delay).await
    }

    /// The whole feed, enriched. The outer error is fatal; inner errors belong to single items.
    pub async fn fetch_all(&self) -> Result<Vec<Result<ProcessedDlp>>> {
        let raws = self.fetch_raw().await?;
        log::info!(
            "Enriching {} DLPs (concurrency {})",
            raws.len(),
            self.concurrency
        );
        Ok(self.enricher.enrich_all(raws, self.concurrency).await)
    }

    /// First `count` feed items, unenriched.
    pub async fn fetch_sample(&self, count: usize) -> Result<Vec<SubgraphDlp>> {
        self.feed.fetch_page(count, 0).await
    }
}
