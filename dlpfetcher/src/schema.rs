use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::ipfs::GatewayFetcher;
use crate::models::RefinerSchema;

#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn fetch_schema(&self, url: &str) -> Result<RefinerSchema>;
}

/// Reads refiner schema documents through the IPFS gateway fallback.
#[derive(Clone, Debug, Default)]
pub struct GatewaySchemaSource {
    fetcher: GatewayFetcher,
}

impl GatewaySchemaSource {
    pub fn new(fetcher: GatewayFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl SchemaSource for GatewaySchemaSource {
    async fn fetch_schema(&self, url: &str) -> Result<RefinerSchema> {
        log::debug!("Fetching refiner schema from {}", url);
        let body: Value = self.fetcher.fetch_json(url).await?;
        let schema = RefinerSchema::from_json(&body)?;
        log::debug!(
            "Parsed refiner schema '{}' (version '{}')",
            schema.name,
            schema.version
        );
        Ok(schema)
    }
}
