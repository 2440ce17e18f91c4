//! Scripted in-memory upstream shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::upstream::Upstream;

/// Serves the same entry list for every search and answers sense queries
/// from a word-keyed table. Entry-id lookups are always rejected with 404,
/// so every definition goes through the free-text path.
#[derive(Default)]
pub struct FakeUpstream {
    entries: Vec<Value>,
    senses: HashMap<String, Value>,
    failing: HashSet<String>,
    sense_queries: AtomicUsize,
    searches: AtomicUsize,
}

impl FakeUpstream {
    pub fn with_entries(entries: Vec<Value>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    pub fn with_senses(mut self, word: &str, payload: Value) -> Self {
        self.senses.insert(word.to_string(), payload);
        self
    }

    pub fn with_failing_senses(mut self, word: &str) -> Self {
        self.failing.insert(word.to_string());
        self
    }

    pub fn sense_queries(&self) -> usize {
        self.sense_queries.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl Upstream for FakeUpstream {
    async fn resolve_lexicon(&self) -> Result<String> {
        Ok("Riyadh".to_string())
    }

    async fn count_candidates(&self, _lexicon_id: &str, _query: Option<&str>) -> Result<u64> {
        Ok(self.entries.len() as u64)
    }

    async fn fetch_batch(
        &self,
        _lexicon_id: &str,
        _offset: u64,
        _limit: usize,
        _query: Option<&str>,
    ) -> Result<Vec<Value>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }

    async fn fetch_senses_by_entry(&self, _lexicon_id: &str, _entry_id: &str) -> Result<Value> {
        Err(Error::Http {
            status: 404,
            path: "/public/senses".to_string(),
        })
    }

    async fn fetch_senses_by_query(&self, _lexicon_id: &str, word: &str) -> Result<Value> {
        self.sense_queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(word) {
            return Err(Error::Http {
                status: 500,
                path: "/public/senses".to_string(),
            });
        }
        Ok(self.senses.get(word).cloned().unwrap_or_else(|| json!([])))
    }
}
