use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::{FetcherError, Result};
use crate::models::{DlpsData, GraphQlResponse, SubgraphDlp};

const DLPS_QUERY: &str = r#"
query Dlps($first: Int!, $skip: Int!) {
  dlps(first: $first, skip: $skip, orderBy: id, orderDirection: asc) {
    name
    id
    address
    creator
    token
    owner
    treasury
    isVerified
    isRewardEligible
    createdAt
    metadata
    iconUrl
    website
    totals {
      totalFileContributions
      uniqueFileContributors
    }
    refiners {
      id
      schemaDefinitionUrl
    }
  }
}
"#;

/// One page of the DLP feed, ordered by id ascending.
#[async_trait]
pub trait DlpPageSource: Send + Sync {
    async fn fetch_page(&self, first: usize, skip: usize) -> Result<Vec<SubgraphDlp>>;
}

#[derive(Clone, Debug)]
pub struct SubgraphClient {
    http: Client,
    url: String,
}

impl SubgraphClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_http_client(url, Client::new())
    }

    pub fn with_http_client(url: impl Into<String>, http: Client) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|_| FetcherError::InvalidUrl(url.clone()))?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl DlpPageSource for SubgraphClient {
    async fn fetch_page(&self, first: usize, skip: usize) -> Result<Vec<SubgraphDlp>> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "query": DLPS_QUERY,
                "variables": { "first": first, "skip": skip },
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetcherError::Api {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let envelope: GraphQlResponse<DlpsData> = response
            .json()
            .await
            .map_err(|err| FetcherError::Malformed(err.to_string()))?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|err| err.message).collect();
            return Err(FetcherError::GraphQl(messages.join("; ")));
        }

        envelope
            .data
            .and_then(|data| data.dlps)
            .ok_or_else(|| FetcherError::Malformed("response has no data.dlps".to_string()))
    }
}

/// Walks the feed page by page until a short page comes back.
///
/// Any page failure aborts the walk; a truncated feed is never returned.
pub async fn fetch_all_dlps(
    source: &dyn DlpPageSource,
    page_size: usize,
    page_delay: Duration,
) -> Result<Vec<SubgraphDlp>> {
    if page_size == 0 {
        return Err(FetcherError::InvalidParam(
            "page size must be at least 1".to_string(),
        ));
    }

    let mut all = Vec::new();
    let mut skip = 0;
    let mut page = 0;
    loop {
        page += 1;
        log::debug!("Fetching page {} (skip: {}, first: {})", page, skip, page_size);
        let items = source.fetch_page(page_size, skip).await?;
        let fetched = items.len();
        all.extend(items);
        log::info!(
            "Page {}: fetched {} DLPs (total so far: {})",
            page,
            fetched,
            all.len()
        );

        if fetched < page_size {
            break;
        }
        skip += page_size;
        if !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }
    }

    log::info!("Fetched {} DLPs from the subgraph in {} page(s)", all.len(), page);
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct PagedFeed {
        total: usize,
        requests: Mutex<Vec<(usize, usize)>>,
        fail_at_skip: Option<usize>,
    }

    impl PagedFeed {
        fn new(total: usize) -> Self {
            Self {
                total,
                requests: Mutex::new(Vec::new()),
                fail_at_skip: None,
            }
        }
    }

    #[async_trait]
    impl DlpPageSource for PagedFeed {
        async fn fetch_page(&self, first: usize, skip: usize) -> Result<Vec<SubgraphDlp>> {
            self.requests.lock().unwrap().push((first, skip));
            if self.fail_at_skip == Some(skip) {
                return Err(FetcherError::Api {
                    url: "mock".into(),
                    status: 502,
                });
            }
            Ok((skip..self.total.min(skip + first))
                .map(|n| SubgraphDlp {
                    id: (n + 1).to_string(),
                    name: format!("DLP {}", n + 1),
                    ..Default::default()
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn full_page_then_short_page_concatenates_both() {
        let feed = PagedFeed::new(7);
        let dlps = fetch_all_dlps(&feed, 5, Duration::ZERO).await.unwrap();
        assert_eq!(dlps.len(), 7);
        assert_eq!(dlps[6].id, "7");
        assert_eq!(*feed.requests.lock().unwrap(), vec![(5, 0), (5, 5)]);
    }

    #[tokio::test]
    async fn exact_multiple_stops_on_empty_page() {
        let feed = PagedFeed::new(10);
        let dlps = fetch_all_dlps(&feed, 5, Duration::ZERO).await.unwrap();
        assert_eq!(dlps.len(), 10);
        assert_eq!(feed.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn later_page_failure_discards_earlier_pages() {
        let mut feed = PagedFeed::new(12);
        feed.fail_at_skip = Some(5);
        let err = fetch_all_dlps(&feed, 5, Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, FetcherError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let feed = PagedFeed::new(3);
        assert!(matches!(
            fetch_all_dlps(&feed, 0, Duration::ZERO).await,
            Err(FetcherError::InvalidParam(_))
        ));
        assert!(feed.requests.lock().unwrap().is_empty());
    }
}
