//! Randomized candidate selection over the upstream search endpoint.

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::arabic::{DEFAULT_QUERY, SEED_TOKENS, is_pure_arabic_letters};
use crate::config::{Config, check_bounds};
use crate::error::{Error, Result};
use crate::normalize::{NormalizedWord, extract_definitions, normalize_entry};
use crate::upstream::Upstream;

const SENSE_CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::new(512).unwrap();

/// Inclusive bounds on the diacritic-free length of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthWindow {
    pub min: usize,
    pub max: usize,
}

impl LengthWindow {
    pub fn new(min: usize, max: usize) -> Result<Self> {
        check_bounds(min, max)?;
        Ok(Self { min, max })
    }

    pub fn contains(&self, length: usize) -> bool {
        (self.min..=self.max).contains(&length)
    }
}

/// Words and entry ids a run must not pick again.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    words: HashSet<String>,
    entry_ids: HashSet<String>,
}

impl Exclusions {
    pub fn from_previous(word: &str, entry_id: Option<&str>) -> Self {
        let mut exclusions = Self::default();
        exclusions.words.insert(word.to_string());
        if let Some(id) = entry_id {
            exclusions.entry_ids.insert(id.to_string());
        }
        exclusions
    }

    pub fn contains(&self, word: &NormalizedWord) -> bool {
        self.words.contains(&word.word)
            || word
                .entry_id
                .as_ref()
                .is_some_and(|id| self.entry_ids.contains(id))
    }

    pub fn insert(&mut self, word: &NormalizedWord) {
        self.words.insert(word.word.clone());
        if let Some(id) = &word.entry_id {
            self.entry_ids.insert(id.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.entry_ids.is_empty()
    }
}

/// Why an entry was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingHeadword,
    NotArabic,
    OutOfRange,
    Duplicate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingHeadword => write!(f, "missing headword"),
            Rejection::NotArabic => write!(f, "not pure Arabic letters"),
            Rejection::OutOfRange => write!(f, "length out of range"),
            Rejection::Duplicate => write!(f, "already chosen"),
        }
    }
}

/// Applies the playability rules to one raw entry.
pub fn screen(
    entry: &Value,
    window: &LengthWindow,
    exclusions: &Exclusions,
) -> std::result::Result<NormalizedWord, Rejection> {
    let word = normalize_entry(entry).ok_or(Rejection::MissingHeadword)?;
    if !is_pure_arabic_letters(&word.word) {
        return Err(Rejection::NotArabic);
    }
    if !window.contains(word.length) {
        return Err(Rejection::OutOfRange);
    }
    if exclusions.contains(&word) {
        return Err(Rejection::Duplicate);
    }
    Ok(word)
}

pub struct Selector<U> {
    upstream: U,
    config: Config,
    sense_cache: Mutex<LruCache<String, Vec<String>>>,
}

impl<U: Upstream> Selector<U> {
    pub fn new(upstream: U, config: Config) -> Self {
        Self {
            upstream,
            config,
            sense_cache: Mutex::new(LruCache::new(SENSE_CACHE_CAPACITY)),
        }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Picks one playable word, preferring one with a definition.
    ///
    /// Each attempt searches a random seed at a random offset and scans the
    /// batch in upstream order. The first entry with a definition wins; the
    /// first valid entry without one is kept in case no better entry turns up
    /// before the budget runs out.
    pub async fn pick_daily(&self, exclusions: &Exclusions) -> Result<NormalizedWord> {
        let window = LengthWindow::new(self.config.min_len, self.config.max_len)?;
        let (lexicon_id, total) = self.candidate_space().await?;
        let mut fallback: Option<NormalizedWord> = None;

        for attempt in 1..=self.config.max_attempts {
            let (seed, offset) = draw(total);
            let batch = self
                .upstream
                .fetch_batch(&lexicon_id, offset, self.config.batch_size, Some(seed))
                .await?;
            debug!(attempt, seed, offset, entries = batch.len(), "scanning batch");

            for entry in &batch {
                let mut word = match screen(entry, &window, exclusions) {
                    Ok(word) => word,
                    Err(reason) => {
                        trace!(%reason, "entry rejected");
                        continue;
                    }
                };
                word.lexicon_id = Some(lexicon_id.clone());
                word.senses = self.senses_for(&lexicon_id, &word).await;
                if !word.senses.is_empty() {
                    info!(word = %word.word, attempt, "picked word with definition");
                    return Ok(word);
                }
                if fallback.is_none() {
                    debug!(word = %word.word, "keeping definition-less fallback");
                    fallback = Some(word);
                }
            }
        }

        match fallback {
            Some(word) => {
                warn!(word = %word.word, "no definition found within budget, using fallback");
                Ok(word)
            }
            None => Err(Error::UpstreamUnavailable(format!(
                "no suitable word after {} attempts",
                self.config.max_attempts
            ))),
        }
    }

    /// Collects exactly `count` distinct words that all carry definitions.
    pub async fn collect(
        &self,
        count: usize,
        min_len: usize,
        max_len: usize,
    ) -> Result<Vec<NormalizedWord>> {
        let window = LengthWindow::new(min_len, max_len)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        let (lexicon_id, total) = self.candidate_space().await?;
        let budget = self.config.batch_budget(count);
        let mut seen = Exclusions::default();
        let mut collected = Vec::with_capacity(count);

        for attempt in 1..=budget {
            if collected.len() >= count {
                break;
            }
            let (seed, offset) = draw(total);
            let batch = self
                .upstream
                .fetch_batch(&lexicon_id, offset, self.config.batch_size, Some(seed))
                .await?;

            for entry in &batch {
                if collected.len() >= count {
                    break;
                }
                let Ok(mut word) = screen(entry, &window, &seen) else {
                    continue;
                };
                word.lexicon_id = Some(lexicon_id.clone());
                word.senses = self.senses_for(&lexicon_id, &word).await;
                if word.senses.is_empty() {
                    continue;
                }
                seen.insert(&word);
                collected.push(word);
            }
            debug!(attempt, collected = collected.len(), count, "batch scanned");
        }

        if collected.len() < count {
            return Err(Error::UpstreamUnavailable(format!(
                "collected {} of {count} words within {budget} attempts",
                collected.len()
            )));
        }
        info!(count, "collected words");
        Ok(collected)
    }

    async fn candidate_space(&self) -> Result<(String, u64)> {
        let lexicon_id = self.upstream.resolve_lexicon().await?;
        let total = self
            .upstream
            .count_candidates(&lexicon_id, Some(DEFAULT_QUERY))
            .await?;
        if total == 0 {
            return Err(Error::UpstreamUnavailable(format!(
                "no entries found in lexicon {lexicon_id}"
            )));
        }
        debug!(%lexicon_id, total, "candidate space");
        Ok((lexicon_id, total))
    }

    /// Definitions for a word, memoized per entry id (or headword). Lookup
    /// failures count as "no definition" for this candidate only.
    async fn senses_for(&self, lexicon_id: &str, word: &NormalizedWord) -> Vec<String> {
        let key = match &word.entry_id {
            Some(id) => format!("entry:{id}"),
            None => format!("word:{}", word.word),
        };
        if let Some(hit) = self.sense_cache.lock().get(&key) {
            return hit.clone();
        }
        let senses = match self
            .upstream
            .fetch_senses(lexicon_id, word.entry_id.as_deref(), &word.word)
            .await
        {
            Ok(payload) => extract_definitions(&payload),
            Err(err) => {
                warn!(word = %word.word, error = %err, "sense lookup failed");
                return Vec::new();
            }
        };
        self.sense_cache.lock().put(key, senses.clone());
        senses
    }
}

/// A random seed token and a random offset below `total`.
fn draw(total: u64) -> (&'static str, u64) {
    let mut rng = rand::thread_rng();
    let seed = SEED_TOKENS.choose(&mut rng).copied().unwrap_or(DEFAULT_QUERY);
    let offset = if total > 0 { rng.gen_range(0..total) } else { 0 };
    (seed, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeUpstream;
    use serde_json::json;

    fn selector(upstream: FakeUpstream) -> Selector<FakeUpstream> {
        Selector::new(upstream, Config::default().with_max_attempts(3))
    }

    #[test]
    fn screen_applies_rules_in_order() {
        let window = LengthWindow::new(4, 7).unwrap();
        let none = Exclusions::default();
        assert_eq!(
            screen(&json!({}), &window, &none),
            Err(Rejection::MissingHeadword)
        );
        assert_eq!(
            screen(&json!({"lemma": "book"}), &window, &none),
            Err(Rejection::NotArabic)
        );
        assert_eq!(
            screen(&json!({"lemma": "قلم"}), &window, &none),
            Err(Rejection::OutOfRange)
        );
        assert_eq!(
            screen(&json!({"lemma": "استقلالية"}), &window, &none),
            Err(Rejection::OutOfRange)
        );
        let previous = Exclusions::from_previous("مدرسة", Some("e1"));
        assert_eq!(
            screen(&json!({"lemma": "مَدْرَسَة", "id": "e1"}), &window, &previous),
            Err(Rejection::Duplicate)
        );
        assert_eq!(
            screen(&json!({"lemma": "مدرسة"}), &window, &previous),
            Err(Rejection::Duplicate)
        );
        let accepted = screen(&json!({"lemma": "مَدْرَسَة"}), &window, &none).unwrap();
        assert_eq!(accepted.length, 5);
    }

    #[tokio::test]
    async fn daily_pick_prefers_entry_with_definition() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "قلم"}),
            json!({"lemma": "كتابة", "id": "a"}),
            json!({"lemma": "مدرسة", "id": "b"}),
        ])
        .with_senses("مدرسة", json!([{"senses": ["مكان التعليم"]}]));
        let word = selector(upstream).pick_daily(&Exclusions::default()).await.unwrap();
        assert_eq!(word.word, "مدرسة");
        assert_eq!(word.definition(), Some("مكان التعليم"));
        assert_eq!(word.lexicon_id.as_deref(), Some("Riyadh"));
    }

    #[tokio::test]
    async fn daily_pick_falls_back_to_first_valid_entry() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "x"}),
            json!({"lemma": "كتابة"}),
            json!({"lemma": "مدرسة"}),
        ]);
        let word = selector(upstream).pick_daily(&Exclusions::default()).await.unwrap();
        assert_eq!(word.word, "كتابة");
        assert!(word.senses.is_empty());
    }

    #[tokio::test]
    async fn daily_pick_honors_exclusions() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "كتابة", "id": "a"}),
            json!({"lemma": "مدرسة", "id": "b"}),
        ])
        .with_senses("كتابة", json!(["تدوين"]))
        .with_senses("مدرسة", json!(["مكان التعليم"]));
        let exclusions = Exclusions::from_previous("كتابة", Some("a"));
        let word = selector(upstream).pick_daily(&exclusions).await.unwrap();
        assert_eq!(word.word, "مدرسة");
    }

    #[tokio::test]
    async fn daily_pick_fails_without_candidates() {
        let empty = FakeUpstream::with_entries(Vec::new());
        assert!(matches!(
            selector(empty).pick_daily(&Exclusions::default()).await,
            Err(Error::UpstreamUnavailable(_))
        ));

        let invalid = FakeUpstream::with_entries(vec![json!({"lemma": "book"})]);
        assert!(matches!(
            selector(invalid).pick_daily(&Exclusions::default()).await,
            Err(Error::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn failing_sense_lookup_counts_as_missing_definition() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "كتابة"}),
            json!({"lemma": "مدرسة"}),
        ])
        .with_failing_senses("كتابة")
        .with_senses("مدرسة", json!(["مكان التعليم"]));
        let word = selector(upstream).pick_daily(&Exclusions::default()).await.unwrap();
        assert_eq!(word.word, "مدرسة");
    }

    #[tokio::test]
    async fn sense_lookups_are_memoized() {
        let upstream = FakeUpstream::with_entries(vec![json!({"lemma": "كتابة", "id": "k"})]);
        let selector = selector(upstream);
        let first = selector.pick_daily(&Exclusions::default()).await.unwrap();
        assert_eq!(first.word, "كتابة");
        // One lookup for the first attempt; later attempts and runs hit the cache.
        let _ = selector.pick_daily(&Exclusions::default()).await.unwrap();
        assert_eq!(selector.upstream().sense_queries(), 1);
    }

    #[tokio::test]
    async fn collect_returns_distinct_words_and_ids() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "كتابة", "id": "1"}),
            json!({"lemma": "كتابة", "id": "2"}),
            json!({"lemma": "مدرسة", "id": "1"}),
            json!({"lemma": "مدرسة", "id": "3"}),
            json!({"lemma": "حديقة"}),
            json!({"lemma": "سماء"}),
        ])
        .with_senses("كتابة", json!(["تدوين"]))
        .with_senses("مدرسة", json!(["مكان التعليم"]))
        .with_senses("حديقة", json!(["بستان"]))
        .with_senses("سماء", json!(["ما علا"]));
        let words = selector(upstream).collect(3, 4, 7).await.unwrap();
        let surface: Vec<_> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(surface, vec!["كتابة", "مدرسة", "حديقة"]);
        assert_eq!(words[1].entry_id.as_deref(), Some("3"));
        assert!(words.iter().all(|w| (4..=7).contains(&w.length)));
        assert!(words.iter().all(|w| !w.senses.is_empty()));
    }

    #[tokio::test]
    async fn collect_never_returns_a_short_list() {
        let upstream = FakeUpstream::with_entries(vec![
            json!({"lemma": "كتابة"}),
            json!({"lemma": "مدرسة"}),
        ])
        .with_senses("كتابة", json!(["تدوين"]));
        let err = selector(upstream).collect(2, 4, 7).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamUnavailable(msg) if msg.contains("1 of 2")));
    }

    #[tokio::test]
    async fn collect_validates_window_and_zero_count() {
        let upstream = FakeUpstream::with_entries(Vec::new());
        let selector = selector(upstream);
        assert!(matches!(
            selector.collect(3, 7, 4).await,
            Err(Error::Config(_))
        ));
        assert!(selector.collect(0, 4, 7).await.unwrap().is_empty());
    }
}
