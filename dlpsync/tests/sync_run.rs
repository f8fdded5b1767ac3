use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cmsstore::memory::StoreCall;
use cmsstore::MemoryStore;
use dlpfetcher::models::SubgraphTotals;
use dlpfetcher::{
    DlpFetcher, DlpPageSource, Enricher, FetcherError, RefinerSchema, SchemaSource,
    SubgraphDlp, SubgraphRefiner, SymbolSource,
};
use dlpsync::assets::AssetSource;
use dlpsync::{DryRunStore, SyncPhase, SyncStats, Synchronizer};
use serde_json::json;

const TOKEN: &str = "0xAaAa00000000000000000000000000000000BbBb";
const ZERO: &str = "0x0000000000000000000000000000000000000000";

struct Feed {
    items: Vec<SubgraphDlp>,
    fail_from_skip: Option<usize>,
}

#[async_trait]
impl DlpPageSource for Feed {
    async fn fetch_page(&self, first: usize, skip: usize) -> dlpfetcher::Result<Vec<SubgraphDlp>> {
        if self.fail_from_skip.is_some_and(|from| skip >= from) {
            return Err(FetcherError::Api {
                url: "http://subgraph.test".into(),
                status: 502,
            });
        }
        Ok(self.items.iter().skip(skip).take(first).cloned().collect())
    }
}

struct Schemas;

#[async_trait]
impl SchemaSource for Schemas {
    async fn fetch_schema(&self, _url: &str) -> dlpfetcher::Result<RefinerSchema> {
        Ok(RefinerSchema {
            name: "Sessions".into(),
            description: "Per-session records".into(),
            ..Default::default()
        })
    }
}

struct Symbols;

#[async_trait]
impl SymbolSource for Symbols {
    async fn fetch_symbol(&self, _address: &str) -> dlpfetcher::Result<Option<String>> {
        Ok(Some("DAT".into()))
    }
}

struct Icons;

#[async_trait]
impl AssetSource for Icons {
    async fn download(&self, _url: &str) -> Result<Vec<u8>, FetcherError> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

fn dlp(id: u64, name: &str, token: &str) -> SubgraphDlp {
    SubgraphDlp {
        id: id.to_string(),
        name: name.into(),
        address: format!("0x{id:040x}"),
        token: token.into(),
        metadata: format!("DLP number {id}"),
        icon_url: format!("https://cdn.test/{id}.png"),
        website: "https://dlp.test".into(),
        is_verified: Some(true),
        is_reward_eligible: true,
        totals: Some(SubgraphTotals {
            total_file_contributions: Some(json!("120")),
            unique_file_contributors: Some(json!(7)),
        }),
        refiners: vec![SubgraphRefiner {
            id: "3".into(),
            schema_definition_url: "https://ipfs.io/ipfs/QmSchema".into(),
        }],
        ..Default::default()
    }
}

fn feed(items: Vec<SubgraphDlp>) -> Feed {
    Feed {
        items,
        fail_from_skip: None,
    }
}

fn synchronizer(feed: Feed, store: Arc<dyn cmsstore::ContentStore>) -> Synchronizer {
    let enricher = Enricher::new(Arc::new(Schemas), Arc::new(Symbols));
    let fetcher = DlpFetcher::new(Arc::new(feed), enricher).with_paging(2, Duration::ZERO);
    Synchronizer::new(fetcher, store, Arc::new(Icons)).with_item_delay(Duration::ZERO)
}

#[tokio::test]
async fn first_run_creates_drafts_and_second_run_writes_nothing() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let items = vec![dlp(1, "Alpha", TOKEN), dlp(2, "Beta", ZERO), dlp(3, "Gamma", "")];

    let stats = synchronizer(feed(items.clone()), store.clone()).run().await?;
    assert_eq!(
        stats,
        SyncStats {
            processed: 3,
            created: 3,
            ..Default::default()
        }
    );
    let alpha = store.get("drafts.dataDAO-1").expect("alpha created as draft");
    assert_eq!(alpha["_type"], json!("dataDAO"));
    assert_eq!(alpha["id"], json!(1));
    assert_eq!(alpha["filesCount"], json!(120));
    assert_eq!(alpha["refinerId"], json!(3));
    assert_eq!(alpha["dataName"], json!("Sessions"));
    assert_eq!(alpha["frequencyOfContribution"], json!("unspecified"));
    assert_eq!(alpha["icon"]["asset"]["_ref"], json!("image-1-dlp-1-icon"));

    store.clear_calls();
    let mut second = synchronizer(feed(items), store.clone());
    let stats = second.run().await?;
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.created + stats.updated + stats.errors, 0);
    assert_eq!(stats.unchanged(), 3);
    assert!(store.writes().is_empty(), "unexpected writes: {:?}", store.writes());
    assert_eq!(second.phase(), SyncPhase::Done);
    Ok(())
}

#[tokio::test]
async fn token_is_linked_only_for_real_addresses() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let items = vec![
        dlp(1, "Alpha", TOKEN),
        dlp(2, "Beta", ZERO),
        dlp(3, "Gamma", "0x1234"),
    ];
    synchronizer(feed(items), store.clone()).run().await?;

    let token_id = format!("token-{}", TOKEN.to_lowercase());
    let alpha = store.get("drafts.dataDAO-1").unwrap();
    assert_eq!(alpha["token"], json!({ "_type": "reference", "_ref": token_id }));

    let token = store.get(&token_id).expect("token published");
    assert_eq!(token["tokenContract"], json!(TOKEN.to_lowercase()));
    assert_eq!(token["tokenSymbol"], json!("DAT"));
    assert_eq!(token["tokenName"], json!("DAT"));
    assert_eq!(token["description"], json!("DLP number 1"));
    assert_eq!(token["associatedDataDAO"]["_ref"], json!("drafts.dataDAO-1"));

    for id in ["drafts.dataDAO-2", "drafts.dataDAO-3"] {
        assert!(store.get(id).unwrap().get("token").is_none(), "{id} has a token");
    }
    assert_eq!(store.len(), 4);
    Ok(())
}

#[tokio::test]
async fn existing_records_keep_edits_and_take_feed_values() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::with_documents([
        json!({
            "_id": "dataDAO-1",
            "_type": "dataDAO",
            "id": 1,
            "name": "Alpha (curated)",
            "website": "https://alpha.curated",
            "isVerified": false,
            "filesCount": 5
        }),
        json!({ "_id": "dataDAO-2", "_type": "dataDAO", "id": 2, "name": "Published" }),
        json!({ "_id": "drafts.dataDAO-2", "_type": "dataDAO", "id": 2, "name": "Draft" }),
    ]));

    let stats = synchronizer(feed(vec![dlp(1, "Alpha", ""), dlp(2, "Beta", "")]), store.clone())
        .run()
        .await?;
    assert_eq!(stats.updated, 2);

    let alpha = store.get("dataDAO-1").unwrap();
    assert_eq!(alpha["name"], json!("Alpha (curated)"));
    assert_eq!(alpha["website"], json!("https://alpha.curated"));
    assert_eq!(alpha["isVerified"], json!(true));
    assert_eq!(alpha["filesCount"], json!(120));
    assert_eq!(alpha["description"], json!("DLP number 1"));

    assert_eq!(store.get("drafts.dataDAO-2").unwrap()["isVerified"], json!(true));
    assert!(store.get("dataDAO-2").unwrap().get("isVerified").is_none());
    assert!(store.get("drafts.dataDAO-1").is_none());
    Ok(())
}

#[tokio::test]
async fn one_failing_item_does_not_stop_the_run() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    store.fail_writes_to("drafts.dataDAO-7");
    let items = (1..=9).map(|id| dlp(id, &format!("DLP {id}"), "")).collect();

    let stats = synchronizer(feed(items), store.clone()).run().await?;
    assert_eq!(stats.processed, 9);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.created, 8);
    assert!(store.get("drafts.dataDAO-8").is_some());
    assert!(store.get("drafts.dataDAO-9").is_some());
    Ok(())
}

#[tokio::test]
async fn unusable_items_are_counted_not_written() -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let mut bad_id = dlp(0, "Broken", "");
    bad_id.id = "not-a-number".into();
    let items = vec![dlp(1, "   ", ""), bad_id, dlp(3, "", ""), dlp(4, "Delta", "")];

    let stats = synchronizer(feed(items), store.clone()).run().await?;
    assert_eq!(
        stats,
        SyncStats {
            processed: 4,
            created: 1,
            updated: 0,
            skipped: 2,
            errors: 1,
        }
    );
    assert!(store.get("drafts.dataDAO-1").is_none());
    assert!(!store
        .writes()
        .iter()
        .any(|call| matches!(call, StoreCall::Upload { filename } if filename == "dlp-1-icon")));
    Ok(())
}

#[tokio::test]
async fn feed_failure_aborts_before_any_write() {
    let store = Arc::new(MemoryStore::new());
    let items = (1..=5).map(|id| dlp(id, "Named", "")).collect();
    let mut sync = synchronizer(
        Feed {
            items,
            fail_from_skip: Some(2),
        },
        store.clone(),
    );

    assert!(sync.run().await.is_err());
    assert_eq!(sync.phase(), SyncPhase::Failed);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn index_failure_aborts_the_run() {
    let store = Arc::new(MemoryStore::new());
    store.fail_reads(true);
    let mut sync = synchronizer(feed(vec![dlp(1, "Alpha", "")]), store.clone());

    assert!(sync.run().await.is_err());
    assert_eq!(sync.phase(), SyncPhase::Failed);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn dry_run_reports_without_writing() -> anyhow::Result<()> {
    let inner = Arc::new(MemoryStore::with_documents([json!({
        "_id": "dataDAO-1", "_type": "dataDAO", "id": 1, "name": "Alpha", "isVerified": false
    })]));
    let store = Arc::new(DryRunStore::new(inner.clone()));

    let stats = synchronizer(feed(vec![dlp(1, "Alpha", TOKEN), dlp(2, "Beta", "")]), store.clone())
        .run()
        .await?;
    assert_eq!(stats.created, 1);
    assert_eq!(stats.updated, 1);
    assert!(store.dropped_writes() > 0);
    assert!(inner.writes().is_empty());
    assert_eq!(inner.get("dataDAO-1").unwrap()["isVerified"], json!(false));
    Ok(())
}

#[tokio::test]
async fn connection_check_samples_store_and_feed() -> anyhow::Result<()> {
    use dlpsync::check::ConnectionCheck;

    let store = Arc::new(MemoryStore::with_documents([
        json!({ "_id": "dataDAO-1", "_type": "dataDAO", "id": 1, "name": "Alpha" }),
    ]));
    let enricher = Enricher::new(Arc::new(Schemas), Arc::new(Symbols));
    let fetcher = DlpFetcher::new(Arc::new(feed(vec![dlp(5, "Echo", TOKEN)])), enricher);

    let mut out = Vec::new();
    let report = ConnectionCheck::new(store.clone(), fetcher).run(&mut out).await?;
    assert_eq!(report.sample_documents.len(), 1);
    assert_eq!(report.sample_dlps.len(), 1);
    let preview = report.preview.expect("preview of the sampled DLP");
    assert_eq!(preview.get("id"), Some(&json!(5)));
    assert_eq!(preview.get("name"), Some(&json!("Echo")));

    let printed = String::from_utf8(out)?;
    assert!(printed.contains("Alpha (ID: 1)"));
    assert!(printed.ends_with("All checks passed.\n"));
    assert!(store.writes().is_empty());
    Ok(())
}

#[tokio::test]
async fn connection_check_fails_on_store_errors() {
    use dlpsync::check::ConnectionCheck;
    use dlpsync::SyncError;

    let store = Arc::new(MemoryStore::new());
    store.fail_reads(true);
    let enricher = Enricher::new(Arc::new(Schemas), Arc::new(Symbols));
    let fetcher = DlpFetcher::new(Arc::new(feed(vec![])), enricher);

    let result = ConnectionCheck::new(store, fetcher).run(&mut Vec::new()).await;
    assert!(matches!(result, Err(SyncError::CheckFailed(_))));
}

#[tokio::test]
async fn hand_edited_documents_pass_the_check_and_sync() -> anyhow::Result<()> {
    use dlpsync::check::ConnectionCheck;

    let store = Arc::new(MemoryStore::with_documents([json!({
        "_id": "dataDAO-4",
        "_type": "dataDAO",
        "id": "4",
        "name": "Delta",
        "contributorCount": 7.5
    })]));
    let enricher = Enricher::new(Arc::new(Schemas), Arc::new(Symbols));
    let fetcher = DlpFetcher::new(Arc::new(feed(vec![dlp(4, "Delta", "")])), enricher);

    let mut out = Vec::new();
    let report = ConnectionCheck::new(store.clone(), fetcher).run(&mut out).await?;
    assert_eq!(report.sample_documents.len(), 1);
    assert!(String::from_utf8(out)?.contains("Delta (ID: 4)"));

    let stats = synchronizer(feed(vec![dlp(4, "Delta", "")]), store.clone()).run().await?;
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.errors, 0);
    assert_eq!(store.get("dataDAO-4").unwrap()["contributorCount"], json!(7));
    Ok(())
}
