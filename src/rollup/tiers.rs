//! The three tier instantiations of [`Rollup`](super::Rollup).

use async_trait::async_trait;
use chrono::NaiveDate;

use super::Tier;
use crate::error::StoreResult;
use crate::models::{DigestRecord, NewsItem, TierKind};
use crate::store::RecordStore;
use crate::window::{self, Bucket, DayBucket, MonthBucket, WeekBucket};

/// News items published in one UTC day → daily digest.
pub struct Daily;

/// Daily digests of one ISO week → weekly digest.
pub struct Weekly;

/// Weekly digests lying entirely inside one calendar month → monthly digest.
pub struct Monthly;

#[async_trait]
impl Tier for Daily {
    type Bucket = DayBucket;
    type Child = NewsItem;

    fn kind(&self) -> TierKind {
        TierKind::Daily
    }
    fn bucket_for(&self, reference: NaiveDate) -> DayBucket {
        window::day_bucket(reference)
    }
    fn default_reference(&self, today: NaiveDate) -> NaiveDate {
        window::default_day_reference(today)
    }
    async fn fetch_children(
        &self,
        store: &dyn RecordStore,
        bucket: &DayBucket,
    ) -> StoreResult<Vec<NewsItem>> {
        store
            .items_published_between(bucket.start(), bucket.end())
            .await
    }
}

#[async_trait]
impl Tier for Weekly {
    type Bucket = WeekBucket;
    type Child = DigestRecord;

    fn kind(&self) -> TierKind {
        TierKind::Weekly
    }
    fn bucket_for(&self, reference: NaiveDate) -> WeekBucket {
        window::week_bucket(reference)
    }
    fn default_reference(&self, today: NaiveDate) -> NaiveDate {
        window::default_week_reference(today)
    }
    async fn fetch_children(
        &self,
        store: &dyn RecordStore,
        bucket: &WeekBucket,
    ) -> StoreResult<Vec<DigestRecord>> {
        store
            .digests_within(TierKind::Daily, bucket.first_day(), bucket.last_day())
            .await
    }
}

#[async_trait]
impl Tier for Monthly {
    type Bucket = MonthBucket;
    type Child = DigestRecord;

    fn kind(&self) -> TierKind {
        TierKind::Monthly
    }
    fn bucket_for(&self, reference: NaiveDate) -> MonthBucket {
        window::month_bucket(reference)
    }
    fn default_reference(&self, today: NaiveDate) -> NaiveDate {
        window::default_month_reference(today)
    }
    async fn fetch_children(
        &self,
        store: &dyn RecordStore,
        bucket: &MonthBucket,
    ) -> StoreResult<Vec<DigestRecord>> {
        store
            .digests_within(TierKind::Weekly, bucket.first_day(), bucket.last_day())
            .await
    }
}
