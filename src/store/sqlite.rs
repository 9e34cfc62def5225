//! SQLite-backed [`RecordStore`].
//!
//! Timestamps are stored as unix seconds, calendar days as `YYYY-MM-DD` text,
//! breakdown/topic lists as JSON text. Primary keys on `unique_key` and on each
//! digest table's `bucket_key` make both inserts conflict-tolerant, so two runs
//! racing past the existence check still leave one row per key.

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{InsertOutcome, RecordStore};
use crate::error::{StoreError, StoreResult};
use crate::models::{DigestRecord, NewsItem, Sentiment, TierKind, Watermark};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and run migrations.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Runs are sequential; one connection keeps check-then-insert ordering simple.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        Self::with_pool(pool).await
    }

    /// Private in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // The database lives as long as its single connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_state (
                source_id TEXT PRIMARY KEY,
                last_seen_ts INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS news_items (
                unique_key TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                source_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                sentiment TEXT NOT NULL,
                verdict TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                published_at INTEGER NOT NULL,
                published_at_estimated INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_items_published ON news_items(published_at)",
        )
        .execute(&self.pool)
        .await?;

        for tier in TierKind::ALL {
            let table = tier.table();
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    bucket_key TEXT PRIMARY KEY,
                    period_start TEXT NOT NULL,
                    period_end TEXT NOT NULL,
                    summary TEXT NOT NULL,
                    sentiment TEXT NOT NULL,
                    verdict TEXT NOT NULL,
                    child_count INTEGER NOT NULL,
                    sentiment_breakdown TEXT NOT NULL,
                    trending_topics TEXT NOT NULL,
                    created_at INTEGER NOT NULL
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_period ON {table}(period_start, period_end)"
            ))
            .execute(&self.pool)
            .await?;
        }

        debug!("sqlite schema ready");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn watermark(&self, source_id: &str) -> StoreResult<Option<Watermark>> {
        let row = sqlx::query(
            "SELECT source_id, last_seen_ts, updated_at FROM feed_state WHERE source_id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| -> StoreResult<Watermark> {
            Ok(Watermark {
                source_id: r.try_get("source_id")?,
                last_seen: r.try_get("last_seen_ts")?,
                updated_at: from_unix("feed_state", r.try_get("updated_at")?)?,
            })
        })
        .transpose()
    }

    async fn upsert_watermark(
        &self,
        source_id: &str,
        last_seen: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO feed_state (source_id, last_seen_ts, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                last_seen_ts = MAX(feed_state.last_seen_ts, excluded.last_seen_ts),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source_id)
        .bind(last_seen)
        .bind(now.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_item(&self, unique_key: &str) -> StoreResult<Option<NewsItem>> {
        let row = sqlx::query("SELECT * FROM news_items WHERE unique_key = ?")
            .bind(unique_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn insert_item(&self, item: &NewsItem) -> StoreResult<InsertOutcome> {
        let res = sqlx::query(
            r#"
            INSERT INTO news_items (
                unique_key, title, source_id, summary, sentiment, verdict,
                created_at, published_at, published_at_estimated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(unique_key) DO NOTHING
            "#,
        )
        .bind(&item.unique_key)
        .bind(&item.title)
        .bind(&item.source_id)
        .bind(&item.body_summary)
        .bind(item.sentiment.as_str())
        .bind(&item.verdict)
        .bind(item.created_at.timestamp())
        .bind(item.published_at.timestamp())
        .bind(item.published_at_estimated)
        .execute(&self.pool)
        .await?;
        Ok(outcome(res.rows_affected()))
    }

    async fn items_published_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<NewsItem>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM news_items
            WHERE published_at >= ? AND published_at < ?
            ORDER BY published_at ASC, unique_key ASC
            "#,
        )
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect()
    }

    async fn find_digest(
        &self,
        tier: TierKind,
        bucket_key: &str,
    ) -> StoreResult<Option<DigestRecord>> {
        let sql = format!("SELECT * FROM {} WHERE bucket_key = ?", tier.table());
        let row = sqlx::query(&sql)
            .bind(bucket_key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(|r| digest_from_row(tier, r)).transpose()
    }

    async fn digests_within(
        &self,
        tier: TierKind,
        first_day: NaiveDate,
        last_day: NaiveDate,
    ) -> StoreResult<Vec<DigestRecord>> {
        let sql = format!(
            "SELECT * FROM {} WHERE period_start >= ? AND period_end <= ? ORDER BY period_start ASC",
            tier.table()
        );
        let rows = sqlx::query(&sql)
            .bind(first_day)
            .bind(last_day)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| digest_from_row(tier, r)).collect()
    }

    async fn insert_digest(&self, digest: &DigestRecord) -> StoreResult<InsertOutcome> {
        let sql = format!(
            r#"
            INSERT INTO {} (
                bucket_key, period_start, period_end, summary, sentiment, verdict,
                child_count, sentiment_breakdown, trending_topics, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket_key) DO NOTHING
            "#,
            digest.tier.table()
        );
        let res = sqlx::query(&sql)
            .bind(&digest.bucket_key)
            .bind(digest.period_start)
            .bind(digest.period_end)
            .bind(&digest.summary)
            .bind(digest.sentiment.as_str())
            .bind(&digest.verdict)
            .bind(i64::from(digest.child_count))
            .bind(serde_json::to_string(&digest.sentiment_breakdown)?)
            .bind(serde_json::to_string(&digest.trending_topics)?)
            .bind(digest.created_at.timestamp())
            .execute(&self.pool)
            .await?;
        Ok(outcome(res.rows_affected()))
    }
}

fn outcome(rows_affected: u64) -> InsertOutcome {
    if rows_affected == 0 {
        InsertOutcome::AlreadyExists
    } else {
        InsertOutcome::Inserted
    }
}

fn from_unix(table: &'static str, secs: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StoreError::corrupt(table, format!("timestamp out of range: {secs}")))
}

fn sentiment_col(table: &'static str, row: &SqliteRow) -> StoreResult<Sentiment> {
    let raw: String = row.try_get("sentiment")?;
    Sentiment::from_str(&raw).map_err(|e| StoreError::corrupt(table, e))
}

fn item_from_row(row: &SqliteRow) -> StoreResult<NewsItem> {
    Ok(NewsItem {
        unique_key: row.try_get("unique_key")?,
        title: row.try_get("title")?,
        source_id: row.try_get("source_id")?,
        body_summary: row.try_get("summary")?,
        sentiment: sentiment_col("news_items", row)?,
        verdict: row.try_get("verdict")?,
        created_at: from_unix("news_items", row.try_get("created_at")?)?,
        published_at: from_unix("news_items", row.try_get("published_at")?)?,
        published_at_estimated: row.try_get("published_at_estimated")?,
    })
}

fn digest_from_row(tier: TierKind, row: &SqliteRow) -> StoreResult<DigestRecord> {
    let table = tier.table();
    let child_count: i64 = row.try_get("child_count")?;
    let breakdown: String = row.try_get("sentiment_breakdown")?;
    let topics: String = row.try_get("trending_topics")?;
    Ok(DigestRecord {
        tier,
        bucket_key: row.try_get("bucket_key")?,
        period_start: row.try_get("period_start")?,
        period_end: row.try_get("period_end")?,
        summary: row.try_get("summary")?,
        sentiment: sentiment_col(table, row)?,
        verdict: row.try_get("verdict")?,
        child_count: u32::try_from(child_count)
            .map_err(|_| StoreError::corrupt(table, format!("child_count {child_count}")))?,
        sentiment_breakdown: serde_json::from_str::<BTreeMap<Sentiment, u32>>(&breakdown)?,
        trending_topics: serde_json::from_str(&topics)?,
        created_at: from_unix(table, row.try_get("created_at")?)?,
    })
}
