//! Caller-facing operations: today's word, ad-hoc word lists, and the year plan.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::normalize::NormalizedWord;
use crate::selector::{Exclusions, Selector};
use crate::store::{DailyWord, WordStore, YearWord};
use crate::upstream::Upstream;

/// Riyadh keeps UTC+03:00 all year.
const RIYADH_UTC_OFFSET_HOURS: i64 = 3;

/// Calendar date (`YYYY-MM-DD`) in Riyadh at the given instant.
pub fn riyadh_date(now: DateTime<Utc>) -> String {
    (now + Duration::hours(RIYADH_UTC_OFFSET_HOURS))
        .date_naive()
        .format("%Y-%m-%d")
        .to_string()
}

pub struct WordService<U> {
    selector: Selector<U>,
    store: WordStore,
}

impl<U: Upstream> WordService<U> {
    pub fn new(selector: Selector<U>, store: WordStore) -> Self {
        Self { selector, store }
    }

    pub fn store(&self) -> &WordStore {
        &self.store
    }

    /// Configured default `(min, max)` word length.
    pub fn length_bounds(&self) -> (usize, usize) {
        let config = self.selector.config();
        (config.min_len, config.max_len)
    }

    /// Today's word, read through the cache unless `refresh` is set.
    pub async fn today(&self, refresh: bool) -> Result<DailyWord> {
        self.daily_for(&riyadh_date(Utc::now()), refresh).await
    }

    /// The word for `ymd`. A refresh drops the cached row and guarantees the
    /// new pick is neither its word nor its entry; its write overwrites any
    /// row a concurrent plain read stored in the meantime.
    pub async fn daily_for(&self, ymd: &str, refresh: bool) -> Result<DailyWord> {
        let exclusions = if refresh {
            match self.store.delete_daily(ymd).await? {
                Some(previous) => {
                    info!(ymd, previous = %previous.word, "refreshing daily word");
                    Exclusions::from_previous(&previous.word, previous.entry_id.as_deref())
                }
                None => Exclusions::default(),
            }
        } else {
            if let Some(cached) = self.store.daily(ymd).await? {
                debug!(ymd, word = %cached.word, "daily word cache hit");
                return Ok(cached);
            }
            Exclusions::default()
        };

        let pick = self.selector.pick_daily(&exclusions).await?;
        let record = DailyWord::from_pick(ymd, &pick, &self.selector.config().lexicon_name);
        self.persist_daily(&record, refresh).await
    }

    /// Stores `record` and returns the row that ends up in the cache. A plain
    /// write defers to an existing row; an overwrite replaces it.
    async fn persist_daily(&self, record: &DailyWord, overwrite: bool) -> Result<DailyWord> {
        if overwrite {
            self.store.upsert_daily(record).await?;
        } else if !self.store.insert_daily_if_absent(record).await? {
            info!(ymd = %record.date, "daily word already stored by a concurrent request");
        }
        self.store
            .daily(&record.date)
            .await?
            .ok_or(Error::Storage(sqlx::Error::RowNotFound))
    }

    /// `count` distinct definition-bearing words within the length window.
    pub async fn words(
        &self,
        count: usize,
        min_len: usize,
        max_len: usize,
    ) -> Result<Vec<NormalizedWord>> {
        self.selector.collect(count, min_len, max_len).await
    }

    /// Rebuilds the plan with day indices `1..=count`. The previous plan stays
    /// in place unless the full count was collected.
    pub async fn build_year_plan(&self, count: usize) -> Result<usize> {
        let config = self.selector.config();
        let words = self
            .selector
            .collect(count, config.min_len, config.max_len)
            .await?;
        let plan: Vec<YearWord> = words
            .iter()
            .zip(1u32..)
            .map(|(word, day_index)| YearWord::from_pick(day_index, word))
            .collect();
        self.store.replace_year_plan(&plan).await?;
        info!(count = plan.len(), "year plan stored");
        Ok(plan.len())
    }

    pub async fn year_word(&self, day_index: u32) -> Result<Option<YearWord>> {
        self.store.year_word(day_index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::FakeUpstream;
    use chrono::TimeZone;
    use serde_json::json;

    async fn service(upstream: FakeUpstream) -> WordService<FakeUpstream> {
        let config = Config::default().with_max_attempts(2);
        let store = WordStore::in_memory().await.unwrap();
        WordService::new(Selector::new(upstream, config), store)
    }

    fn two_words() -> FakeUpstream {
        FakeUpstream::with_entries(vec![
            json!({"lemma": "كتابة", "id": "1"}),
            json!({"lemma": "مدرسة", "id": "2"}),
        ])
        .with_senses("كتابة", json!(["تدوين"]))
        .with_senses("مدرسة", json!(["مكان التعليم"]))
    }

    #[test]
    fn riyadh_date_rolls_over_at_21_utc() {
        let before = Utc.with_ymd_and_hms(2025, 3, 1, 20, 59, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 3, 1, 21, 0, 0).unwrap();
        assert_eq!(riyadh_date(before), "2025-03-01");
        assert_eq!(riyadh_date(after), "2025-03-02");
    }

    #[tokio::test]
    async fn daily_word_is_read_through() {
        let service = service(two_words()).await;
        let first = service.daily_for("2025-05-05", false).await.unwrap();
        let searches = service.selector.upstream().searches();
        let second = service.daily_for("2025-05-05", false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.selector.upstream().searches(), searches);
        assert_eq!(first.word, "كتابة");
        assert_eq!(first.definition.as_deref(), Some("تدوين"));
        assert_eq!(first.source, "معجم الرياض للغة العربية المعاصرة");
    }

    #[tokio::test]
    async fn refresh_picks_a_different_word() {
        let service = service(two_words()).await;
        let first = service.daily_for("2025-05-05", false).await.unwrap();
        let refreshed = service.daily_for("2025-05-05", true).await.unwrap();

        assert_ne!(first.word, refreshed.word);
        assert_eq!(refreshed.word, "مدرسة");
        assert_eq!(
            service.store().daily("2025-05-05").await.unwrap(),
            Some(refreshed)
        );
    }

    #[tokio::test]
    async fn plain_write_returns_the_row_that_won() {
        let service = service(two_words()).await;
        let stored = service.daily_for("2025-08-08", false).await.unwrap();
        let late = DailyWord::from_pick(
            "2025-08-08",
            &NormalizedWord::from_word("مدرسة"),
            "src",
        );
        let returned = service.persist_daily(&late, false).await.unwrap();
        assert_eq!(returned, stored);
    }

    #[tokio::test]
    async fn refresh_write_replaces_a_concurrently_stored_word() {
        let service = service(two_words()).await;
        let first = service.daily_for("2025-08-09", false).await.unwrap();

        // A plain read re-stored the old word after the refresh deleted it.
        service.store().delete_daily("2025-08-09").await.unwrap();
        service.store().insert_daily_if_absent(&first).await.unwrap();

        let mut pick = NormalizedWord::from_word("مدرسة");
        pick.entry_id = Some("2".to_string());
        let refreshed = DailyWord::from_pick("2025-08-09", &pick, "src");
        let returned = service.persist_daily(&refreshed, true).await.unwrap();

        assert_eq!(returned, refreshed);
        assert_ne!(returned.word, first.word);
        assert_eq!(
            service.store().daily("2025-08-09").await.unwrap(),
            Some(refreshed)
        );
    }

    #[tokio::test]
    async fn refresh_without_cache_just_picks() {
        let service = service(two_words()).await;
        let word = service.daily_for("2025-06-06", true).await.unwrap();
        assert_eq!(word.word, "كتابة");
    }

    #[tokio::test]
    async fn upstream_failure_stores_nothing() {
        let service = service(FakeUpstream::with_entries(vec![json!({"lemma": "x"})])).await;
        let err = service.daily_for("2025-07-07", false).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(_)));
        assert!(service.store().daily("2025-07-07").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn year_plan_is_indexed_from_one() {
        let service = service(two_words()).await;
        assert_eq!(service.build_year_plan(2).await.unwrap(), 2);

        let day_one = service.year_word(1).await.unwrap().unwrap();
        let day_two = service.year_word(2).await.unwrap().unwrap();
        assert_eq!(day_one.word, "كتابة");
        assert_eq!(day_two.word, "مدرسة");
        assert_eq!(day_two.senses, vec!["مكان التعليم".to_string()]);
        assert!(service.year_word(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn short_year_plan_keeps_previous_one() {
        let service = service(two_words()).await;
        service.build_year_plan(2).await.unwrap();
        assert!(service.build_year_plan(3).await.is_err());
        assert_eq!(service.store().year_plan_len().await.unwrap(), 2);
    }
}
