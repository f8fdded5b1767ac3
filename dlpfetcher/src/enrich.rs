use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::address::is_linkable_address;
use crate::error::Result;
use crate::explorer::SymbolSource;
use crate::models::{LatestRefiner, ProcessedDlp, SubgraphDlp, SubgraphRefiner};
use crate::schema::SchemaSource;

/// Highest numeric refiner id among refiners that carry a schema URL.
///
/// Ids are compared as numbers; on a tie the refiner listed last wins.
pub fn latest_refiner(refiners: &[SubgraphRefiner]) -> Option<LatestRefiner> {
    refiners
        .iter()
        .filter(|refiner| !refiner.schema_definition_url.trim().is_empty())
        .filter_map(|refiner| match refiner.id.trim().parse::<u64>() {
            Ok(id) => Some(LatestRefiner {
                id,
                url: refiner.schema_definition_url.clone(),
            }),
            Err(_) => {
                log::debug!("Ignoring refiner with non-numeric id '{}'", refiner.id);
                None
            }
        })
        .max_by_key(|refiner| refiner.id)
}

/// Adds schema and token-symbol data to raw feed items.
#[derive(Clone)]
pub struct Enricher {
    schemas: Arc<dyn SchemaSource>,
    symbols: Arc<dyn SymbolSource>,
}

impl Enricher {
    pub fn new(schemas: Arc<dyn SchemaSource>, symbols: Arc<dyn SymbolSource>) -> Self {
        Self { schemas, symbols }
    }

    /// Fails only when the item itself is unusable; lookup failures degrade to absent data.
    pub async fn enrich(&self, raw: SubgraphDlp) -> Result<ProcessedDlp> {
        let refiner = latest_refiner(&raw.refiners);
        let mut dlp = ProcessedDlp::from_raw(raw)?;

        if let Some(refiner) = &refiner {
            match self.schemas.fetch_schema(refiner.url.trim()).await {
                Ok(schema) => dlp.schema = Some(schema),
                Err(err) => log::error!(
                    "Failed to fetch refiner schema for DLP {} from {}: {}",
                    dlp.id,
                    refiner.url,
                    err
                ),
            }
        }
        dlp.latest_refiner = refiner;

        if is_linkable_address(&dlp.token) {
            match self.symbols.fetch_symbol(&dlp.token).await {
                Ok(Some(symbol)) => {
                    log::debug!("Found token symbol for DLP {}: {}", dlp.id, symbol);
                    dlp.token_symbol = Some(symbol);
                }
                Ok(None) => log::debug!("No token symbol found for DLP {} token {}", dlp.id, dlp.token),
                Err(err) => log::error!(
                    "Failed to fetch token symbol for DLP {} token {}: {}",
                    dlp.id,
                    dlp.token,
                    err
                ),
            }
        }

        Ok(dlp)
    }

    /// Enriches up to `concurrency` items at a time; output keeps feed order.
    pub async fn enrich_all(
        &self,
        raws: Vec<SubgraphDlp>,
        concurrency: usize,
    ) -> Vec<Result<ProcessedDlp>> {
        stream::iter(raws)
            .map(|raw| self.enrich(raw))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetcherError;
    use crate::models::RefinerSchema;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn refiner(id: &str, url: &str) -> SubgraphRefiner {
        SubgraphRefiner {
            id: id.into(),
            schema_definition_url: url.into(),
        }
    }

    #[test]
    fn latest_refiner_compares_ids_numerically() {
        let refiners = vec![refiner("2", "a"), refiner("10", "b"), refiner("5", "")];
        assert_eq!(
            latest_refiner(&refiners),
            Some(LatestRefiner {
                id: 10,
                url: "b".into()
            })
        );
    }

    #[test]
    fn latest_refiner_ignores_blank_urls_and_bad_ids() {
        assert_eq!(latest_refiner(&[]), None);
        assert_eq!(latest_refiner(&[refiner("9", "  ")]), None);
        assert_eq!(
            latest_refiner(&[refiner("x", "a"), refiner("3", "c")]).map(|r| r.id),
            Some(3)
        );
    }

    #[test]
    fn latest_refiner_tie_keeps_last_seen() {
        let picked = latest_refiner(&[refiner("4", "first"), refiner("4", "second")]);
        assert_eq!(picked.map(|r| r.url), Some("second".to_string()));
    }

    struct FixedSchema {
        fail: bool,
    }

    #[async_trait]
    impl SchemaSource for FixedSchema {
        async fn fetch_schema(&self, url: &str) -> Result<RefinerSchema> {
            if self.fail {
                return Err(FetcherError::AllGatewaysFailed {
                    url: url.into(),
                    details: "  - mock: timeout".into(),
                });
            }
            Ok(RefinerSchema {
                name: format!("schema at {url}"),
                description: "Refined data".into(),
                ..Default::default()
            })
        }
    }

    #[derive(Default)]
    struct CountingSymbols {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SymbolSource for CountingSymbols {
        async fn fetch_symbol(&self, _address: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("VSLEEP".into()))
        }
    }

    fn raw(id: &str, token: &str) -> SubgraphDlp {
        SubgraphDlp {
            id: id.into(),
            name: format!("DLP {id}"),
            token: token.into(),
            refiners: vec![refiner("1", "ipfs://QmOne"), refiner("12", "ipfs://QmTwelve")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn enrich_fills_schema_and_symbol() {
        let symbols = Arc::new(CountingSymbols::default());
        let enricher = Enricher::new(Arc::new(FixedSchema { fail: false }), symbols.clone());

        let dlp = enricher
            .enrich(raw("4", "0x1111111111111111111111111111111111111111"))
            .await
            .unwrap();
        assert_eq!(dlp.latest_refiner.as_ref().map(|r| r.id), Some(12));
        assert_eq!(
            dlp.schema.map(|s| s.name),
            Some("schema at ipfs://QmTwelve".to_string())
        );
        assert_eq!(dlp.token_symbol.as_deref(), Some("VSLEEP"));
        assert_eq!(symbols.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schema_failure_degrades_to_no_schema() {
        let symbols = Arc::new(CountingSymbols::default());
        let enricher = Enricher::new(Arc::new(FixedSchema { fail: true }), symbols.clone());

        let dlp = enricher
            .enrich(raw("4", "0x0000000000000000000000000000000000000000"))
            .await
            .unwrap();
        assert!(dlp.schema.is_none());
        assert_eq!(dlp.latest_refiner.map(|r| r.id), Some(12));
        assert!(dlp.token_symbol.is_none());
        assert_eq!(symbols.calls.load(Ordering::SeqCst), 0, "zero address is never looked up");
    }

    struct FailingSymbols;

    #[async_trait]
    impl SymbolSource for FailingSymbols {
        async fn fetch_symbol(&self, address: &str) -> Result<Option<String>> {
            Err(FetcherError::Api {
                url: format!("https://explorer.test/api/v2/tokens/{address}"),
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn symbol_failure_degrades_to_no_symbol() {
        let enricher = Enricher::new(Arc::new(FixedSchema { fail: false }), Arc::new(FailingSymbols));

        let dlp = enricher
            .enrich(raw("6", "0x1111111111111111111111111111111111111111"))
            .await
            .unwrap();
        assert!(dlp.token_symbol.is_none());
        assert_eq!(dlp.token, "0x1111111111111111111111111111111111111111");
        assert!(dlp.schema.is_some());
    }

    #[tokio::test]
    async fn padded_token_address_is_looked_up() {
        let symbols = Arc::new(CountingSymbols::default());
        let enricher = Enricher::new(Arc::new(FixedSchema { fail: false }), symbols.clone());

        let dlp = enricher
            .enrich(raw("8", " 0x2222222222222222222222222222222222222222  "))
            .await
            .unwrap();
        assert_eq!(dlp.token_symbol.as_deref(), Some("VSLEEP"));
        assert_eq!(symbols.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn enrich_all_keeps_feed_order_and_isolates_bad_items() {
        let enricher = Enricher::new(
            Arc::new(FixedSchema { fail: false }),
            Arc::new(CountingSymbols::default()),
        );
        let raws = vec![raw("1", ""), raw("two", ""), raw("3", "")];

        let results = enricher.enrich_all(raws, 4).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().map(|d| d.id).ok(), Some(1));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().map(|d| d.id).ok(), Some(3));
    }
}
