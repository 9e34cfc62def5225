// tests/rollup_cascade.rs
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use news_digest::error::{StoreError, StoreResult};
use news_digest::models::{DigestRecord, NewsItem, Sentiment, TierKind, Watermark};
use news_digest::oracle::mock::MockOracle;
use news_digest::oracle::DynOracle;
use news_digest::orchestrator::{Orchestrator, TierStatus};
use news_digest::store::{DynStore, InsertOutcome, RecordStore, SqliteStore};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 2, 7, 0, 0).unwrap()
}

fn item(key: &str, published: DateTime<Utc>, sentiment: Sentiment) -> NewsItem {
    NewsItem {
        unique_key: key.to_string(),
        title: format!("Headline {key}"),
        source_id: "https://news.example.com/rss".into(),
        body_summary: "• something happened".into(),
        sentiment,
        verdict: "Worth watching.".into(),
        created_at: published,
        published_at: published,
        published_at_estimated: false,
    }
}

fn digest(tier: TierKind, key: &str, start: &str, end: &str, s: Sentiment) -> DigestRecord {
    DigestRecord {
        tier,
        bucket_key: key.to_string(),
        period_start: date(start),
        period_end: date(end),
        summary: "• seeded".into(),
        sentiment: s,
        verdict: "Seeded.".into(),
        child_count: 1,
        sentiment_breakdown: BTreeMap::from([(s, 1)]),
        trending_topics: vec!["seed".into()],
        created_at: now(),
    }
}

async fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::in_memory().await.expect("store"))
}

/// Two items on the 11th, one each on the 13th and 14th of March 2024.
async fn seed_week(store: &dyn RecordStore) {
    let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
    for it in [
        item("a", at(11, 9), Sentiment::Positive),
        item("b", at(11, 23), Sentiment::Negative),
        item("c", at(13, 0), Sentiment::Positive),
        item("d", at(14, 15), Sentiment::Neutral),
    ] {
        store.insert_item(&it).await.unwrap();
    }
}

fn orchestrator(store: DynStore, mock: &Arc<MockOracle>) -> Orchestrator {
    let oracle: DynOracle = mock.clone();
    Orchestrator::new(store, oracle)
}

#[tokio::test]
async fn daily_digest_counts_and_breakdown() {
    let store = memory_store().await;
    seed_week(store.as_ref()).await;
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-11")), now())
        .await;
    assert_eq!(
        r.status,
        TierStatus::Created {
            bucket_key: "2024-03-11".into(),
            child_count: 2
        }
    );
    assert_eq!(mock.calls(), 1);

    let d = store
        .find_digest(TierKind::Daily, "2024-03-11")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(d.sentiment_breakdown.values().sum::<u32>(), d.child_count);
    assert_eq!(d.sentiment_breakdown.get(&Sentiment::Positive), Some(&1));
    assert_eq!(d.sentiment_breakdown.get(&Sentiment::Negative), Some(&1));
    assert_eq!(d.trending_topics, vec!["daily".to_string()]);
    assert!(d.summary.starts_with("• 2 entries"));
}

#[tokio::test]
async fn weekly_without_daily_digests_is_no_data() {
    let store = memory_store().await;
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Weekly, Some(date("2024-03-14")), now())
        .await;
    assert_eq!(
        r.status,
        TierStatus::NoData {
            bucket_key: "2024-03-11/2024-03-17".into()
        }
    );
    assert_eq!(mock.calls(), 0);
    assert!(store
        .find_digest(TierKind::Weekly, "2024-03-11/2024-03-17")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn existing_monthly_digest_skips_without_oracle_call() {
    let store = memory_store().await;
    store
        .insert_digest(&digest(
            TierKind::Monthly,
            "2024-03",
            "2024-03-01",
            "2024-03-31",
            Sentiment::Neutral,
        ))
        .await
        .unwrap();
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Monthly, Some(date("2024-03-20")), now())
        .await;
    assert_eq!(
        r.status,
        TierStatus::AlreadyExists {
            bucket_key: "2024-03".into()
        }
    );
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn monthly_takes_only_weeks_inside_the_month() {
    let store = memory_store().await;
    for (key, s, e, sent) in [
        ("2024-02-26/2024-03-03", "2024-02-26", "2024-03-03", Sentiment::Negative),
        ("2024-03-04/2024-03-10", "2024-03-04", "2024-03-10", Sentiment::Positive),
        ("2024-03-11/2024-03-17", "2024-03-11", "2024-03-17", Sentiment::Positive),
        ("2024-03-25/2024-03-31", "2024-03-25", "2024-03-31", Sentiment::Neutral),
    ] {
        store
            .insert_digest(&digest(TierKind::Weekly, key, s, e, sent))
            .await
            .unwrap();
    }
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Monthly, Some(date("2024-03-01")), now())
        .await;
    assert_eq!(
        r.status,
        TierStatus::Created {
            bucket_key: "2024-03".into(),
            child_count: 3
        }
    );
    let m = store
        .find_digest(TierKind::Monthly, "2024-03")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(m.period_start, date("2024-03-01"));
    assert_eq!(m.period_end, date("2024-03-31"));
    assert_eq!(m.sentiment, Sentiment::Positive);
    assert_eq!(m.sentiment_breakdown.get(&Sentiment::Negative), None);
    assert_eq!(m.sentiment_breakdown.values().sum::<u32>(), 3);
}

#[tokio::test]
async fn default_windows_follow_the_run_date() {
    let store = memory_store().await;
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store, &mock);
    let run = Utc.with_ymd_and_hms(2024, 1, 5, 3, 0, 0).unwrap();

    let reports = orch.run_all(None, run).await;
    let keys: Vec<String> = reports
        .iter()
        .map(|r| match &r.status {
            TierStatus::NoData { bucket_key } => bucket_key.clone(),
            other => panic!("unexpected {other:?}"),
        })
        .collect();
    // Friday 2024-01-05: yesterday, the previous ISO week, the previous month.
    assert_eq!(
        keys,
        vec!["2024-01-04", "2023-12-25/2023-12-31", "2023-12"]
    );
}

#[tokio::test]
async fn full_cascade_is_idempotent() {
    let store = memory_store().await;
    seed_week(store.as_ref()).await;
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(store.clone(), &mock);

    for d in ["2024-03-11", "2024-03-12", "2024-03-13"] {
        orch.run_tier(TierKind::Daily, Some(date(d)), now()).await;
    }
    let first = orch.run_all(Some(date("2024-03-14")), now()).await;
    assert!(first
        .iter()
        .all(|r| matches!(r.status, TierStatus::Created { .. })));
    // 11th, 13th, 14th have items; the 12th was empty.
    assert_eq!(
        first[1].status,
        TierStatus::Created {
            bucket_key: "2024-03-11/2024-03-17".into(),
            child_count: 3
        }
    );
    let calls = mock.calls();

    let second = orch.run_all(Some(date("2024-03-14")), now()).await;
    assert!(second
        .iter()
        .all(|r| matches!(r.status, TierStatus::AlreadyExists { .. })));
    assert_eq!(mock.calls(), calls);

    let weekly = store
        .digests_within(TierKind::Weekly, date("2024-03-01"), date("2024-03-31"))
        .await
        .unwrap();
    assert_eq!(weekly.len(), 1);
}

#[tokio::test]
async fn oracle_failure_leaves_nothing_and_rerun_succeeds() {
    let store = memory_store().await;
    seed_week(store.as_ref()).await;
    let mock = Arc::new(MockOracle::failing());
    let orch = orchestrator(store.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-14")), now())
        .await;
    assert!(matches!(r.status, TierStatus::Failed { .. }));
    assert!(store
        .find_digest(TierKind::Daily, "2024-03-14")
        .await
        .unwrap()
        .is_none());

    mock.set_failing(false);
    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-14")), now())
        .await;
    assert!(matches!(r.status, TierStatus::Created { child_count: 1, .. }));
}

/// Delegates to SQLite but refuses digest inserts while `fail_digests` is set,
/// and answers "not found" to digest lookups while `hide_digests` is set.
struct FlakyStore {
    inner: Arc<SqliteStore>,
    fail_digests: AtomicBool,
    hide_digests: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Arc<SqliteStore>, fail_digests: bool, hide_digests: bool) -> Self {
        Self {
            inner,
            fail_digests: AtomicBool::new(fail_digests),
            hide_digests: AtomicBool::new(hide_digests),
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn watermark(&self, source_id: &str) -> StoreResult<Option<Watermark>> {
        self.inner.watermark(source_id).await
    }
    async fn upsert_watermark(
        &self,
        source_id: &str,
        last_seen: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.inner.upsert_watermark(source_id, last_seen, now).await
    }
    async fn find_item(&self, unique_key: &str) -> StoreResult<Option<NewsItem>> {
        self.inner.find_item(unique_key).await
    }
    async fn insert_item(&self, item: &NewsItem) -> StoreResult<InsertOutcome> {
        self.inner.insert_item(item).await
    }
    async fn items_published_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<NewsItem>> {
        self.inner.items_published_between(start, end).await
    }
    async fn find_digest(
        &self,
        tier: TierKind,
        bucket_key: &str,
    ) -> StoreResult<Option<DigestRecord>> {
        if self.hide_digests.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_digest(tier, bucket_key).await
    }
    async fn digests_within(
        &self,
        tier: TierKind,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> StoreResult<Vec<DigestRecord>> {
        self.inner.digests_within(tier, first_day, last_day).await
    }
    async fn insert_digest(&self, digest: &DigestRecord) -> StoreResult<InsertOutcome> {
        if self.fail_digests.load(Ordering::SeqCst) {
            return Err(StoreError::corrupt(digest.tier.table(), "disk full"));
        }
        self.inner.insert_digest(digest).await
    }
}

#[tokio::test]
async fn store_insert_failure_leaves_nothing_and_rerun_succeeds() {
    let inner = memory_store().await;
    seed_week(inner.as_ref()).await;
    let flaky = Arc::new(FlakyStore::new(inner.clone(), true, false));
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(flaky.clone(), &mock);

    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-11")), now())
        .await;
    match &r.status {
        TierStatus::Failed { error } => assert!(error.contains("disk full")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(inner
        .find_digest(TierKind::Daily, "2024-03-11")
        .await
        .unwrap()
        .is_none());

    flaky.fail_digests.store(false, Ordering::SeqCst);
    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-11")), now())
        .await;
    assert!(matches!(r.status, TierStatus::Created { child_count: 2, .. }));
}

#[tokio::test]
async fn failed_tier_does_not_stop_the_cascade() {
    let inner = memory_store().await;
    seed_week(inner.as_ref()).await;
    let flaky = Arc::new(FlakyStore::new(inner.clone(), true, false));
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(flaky, &mock);

    let reports = orch.run_all(Some(date("2024-03-14")), now()).await;
    assert_eq!(reports.len(), 3);
    assert!(matches!(reports[0].status, TierStatus::Failed { .. }));
    // Nothing was committed below, so the upper tiers see empty windows.
    assert!(matches!(reports[1].status, TierStatus::NoData { .. }));
    assert!(matches!(reports[2].status, TierStatus::NoData { .. }));
}

#[tokio::test]
async fn digest_inserted_by_a_concurrent_run_is_reported_as_existing() {
    let inner = memory_store().await;
    seed_week(inner.as_ref()).await;
    let existing = digest(
        TierKind::Daily,
        "2024-03-11",
        "2024-03-11",
        "2024-03-11",
        Sentiment::Neutral,
    );
    inner.insert_digest(&existing).await.unwrap();

    // The existence check misses the row, as if it landed right after the check.
    let racing = Arc::new(FlakyStore::new(inner.clone(), false, true));
    let mock = Arc::new(MockOracle::new());
    let orch = orchestrator(racing, &mock);

    let r = orch
        .run_tier(TierKind::Daily, Some(date("2024-03-11")), now())
        .await;
    assert_eq!(
        r.status,
        TierStatus::AlreadyExists {
            bucket_key: "2024-03-11".into()
        }
    );
    assert_eq!(mock.calls(), 1);

    let rows = inner
        .digests_within(TierKind::Daily, date("2024-03-11"), date("2024-03-11"))
        .await
        .unwrap();
    assert_eq!(rows, vec![existing]);
}
