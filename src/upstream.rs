//! Client for the KSAA dictionary API.
//!
//! The upstream accepts more than one parameter convention for the same
//! endpoint and answers 400/404 to the ones it does not understand. Each
//! call walks an ordered list of conventions via [`try_in_order`].

use std::fmt::Debug;
use std::future::Future;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info};

use crate::arabic::query_or_default;
use crate::config::Config;
use crate::envelope::{Envelope, find_lexicon};
use crate::error::{Error, Result};
use crate::normalize::extract_definitions;

const LEXICONS_PATH: &str = "/public/lexicons";
const SEARCH_PATH: &str = "/public/search";
const SENSES_PATH: &str = "/public/senses";
const API_KEY_HEADER: &str = "apikey";
/// Page size for the second total probe when the first one reports nothing.
const RECOUNT_LIMIT: usize = 10;

/// Pagination conventions of the search endpoint, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchConvention {
    /// `lexiconId` with `offset`/`limit`.
    OffsetLimit,
    /// `lexiconIds` with `page`/`size`.
    PageSize,
}

pub const SEARCH_CONVENTIONS: &[SearchConvention] =
    &[SearchConvention::OffsetLimit, SearchConvention::PageSize];

/// Identifier parameter names accepted by the senses endpoint, in order.
pub const SENSE_ID_PARAMS: &[&str] = &["entryId", "entryIds", "lexicalEntryId"];

impl SearchConvention {
    pub fn params(
        self,
        query: &str,
        lexicon_id: &str,
        offset: u64,
        limit: usize,
    ) -> Vec<(&'static str, String)> {
        let limit = limit.max(1);
        match self {
            SearchConvention::OffsetLimit => vec![
                ("query", query.to_string()),
                ("lexiconId", lexicon_id.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ],
            SearchConvention::PageSize => vec![
                ("query", query.to_string()),
                ("lexiconIds", lexicon_id.to_string()),
                ("page", (offset / limit as u64).to_string()),
                ("size", limit.to_string()),
            ],
        }
    }
}

/// Runs `attempt` for each strategy until one returns something other than a
/// 400/404. Any other error stops the walk; if every strategy is rejected the
/// last rejection is returned.
pub async fn try_in_order<S, T, F, Fut>(strategies: &[S], mut attempt: F) -> Result<T>
where
    S: Copy + Debug,
    F: FnMut(S) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut rejected = None;
    for &strategy in strategies {
        match attempt(strategy).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_fallback_status() => {
                debug!(?strategy, error = %err, "convention rejected, trying next");
                rejected = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(rejected.unwrap_or_else(|| Error::Config("no request conventions to try".into())))
}

/// The dictionary operations the selector depends on.
pub trait Upstream: Send + Sync {
    /// Configured lexicon id, or the id of the lexicon whose name matches.
    fn resolve_lexicon(&self) -> impl Future<Output = Result<String>> + Send;

    /// Size of the candidate space for `query`; zero when nothing parseable came back.
    fn count_candidates(
        &self,
        lexicon_id: &str,
        query: Option<&str>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Raw entries starting at `offset`.
    fn fetch_batch(
        &self,
        lexicon_id: &str,
        offset: u64,
        limit: usize,
        query: Option<&str>,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    fn fetch_senses_by_entry(
        &self,
        lexicon_id: &str,
        entry_id: &str,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn fetch_senses_by_query(
        &self,
        lexicon_id: &str,
        word: &str,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Senses payload for an entry: by id first, then by free-text headword
    /// when the id lookup is rejected or carries no definition.
    fn fetch_senses(
        &self,
        lexicon_id: &str,
        entry_id: Option<&str>,
        word: &str,
    ) -> impl Future<Output = Result<Value>> + Send {
        async move {
            if let Some(entry_id) = entry_id {
                match self.fetch_senses_by_entry(lexicon_id, entry_id).await {
                    Ok(payload) if !extract_definitions(&payload).is_empty() => {
                        return Ok(payload);
                    }
                    Ok(_) => debug!(entry_id, "entry lookup had no definition"),
                    Err(err) if err.is_fallback_status() => {
                        debug!(entry_id, error = %err, "entry lookup rejected")
                    }
                    Err(err) => return Err(err),
                }
            }
            self.fetch_senses_by_query(lexicon_id, word).await
        }
    }
}

/// HTTP implementation of [`Upstream`].
#[derive(Clone)]
pub struct SiwarClient {
    http: reqwest::Client,
    base: String,
    lexicon_id: Option<String>,
    lexicon_name: String,
}

impl SiwarClient {
    pub fn new(config: &Config) -> Result<Self> {
        let key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| Error::Config("KSAA_API_KEY is not set".into()))?;
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(key)
                .map_err(|err| Error::Config(format!("invalid API key header: {err}")))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            base: config.api_base.trim_end_matches('/').to_string(),
            lexicon_id: config.lexicon_id.clone().filter(|id| !id.trim().is_empty()),
            lexicon_name: config.lexicon_name.clone(),
        })
    }

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base, path);
        let response = self.http.get(&url).query(params).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn search(
        &self,
        lexicon_id: &str,
        offset: u64,
        limit: usize,
        query: Option<&str>,
    ) -> Result<Envelope> {
        let query = query_or_default(query);
        let payload = try_in_order(SEARCH_CONVENTIONS, |convention| {
            let params = convention.params(query, lexicon_id, offset, limit);
            async move { self.get_json(SEARCH_PATH, &params).await }
        })
        .await?;
        Ok(Envelope::decode(payload))
    }
}

impl Upstream for SiwarClient {
    async fn resolve_lexicon(&self) -> Result<String> {
        if let Some(id) = &self.lexicon_id {
            return Ok(id.clone());
        }
        let payload = self.get_json(LEXICONS_PATH, &[]).await?;
        let lexicon = find_lexicon(payload, &self.lexicon_name)
            .ok_or_else(|| Error::LexiconNotFound(self.lexicon_name.clone()))?;
        info!(lexicon_id = %lexicon.id, name = %lexicon.name, "resolved lexicon by name");
        Ok(lexicon.id)
    }

    async fn count_candidates(&self, lexicon_id: &str, query: Option<&str>) -> Result<u64> {
        let total = self.search(lexicon_id, 0, 1, query).await?.total();
        if total > 0 {
            return Ok(total);
        }
        Ok(self.search(lexicon_id, 0, RECOUNT_LIMIT, query).await?.total())
    }

    async fn fetch_batch(
        &self,
        lexicon_id: &str,
        offset: u64,
        limit: usize,
        query: Option<&str>,
    ) -> Result<Vec<Value>> {
        Ok(self
            .search(lexicon_id, offset, limit, query)
            .await?
            .into_items())
    }

    async fn fetch_senses_by_entry(&self, lexicon_id: &str, entry_id: &str) -> Result<Value> {
        try_in_order(SENSE_ID_PARAMS, |name| {
            let params = [
                (name, entry_id.to_string()),
                ("lexiconId", lexicon_id.to_string()),
            ];
            async move { self.get_json(SENSES_PATH, &params).await }
        })
        .await
    }

    async fn fetch_senses_by_query(&self, lexicon_id: &str, word: &str) -> Result<Value> {
        let params = [
            ("query", query_or_default(Some(word)).to_string()),
            ("lexiconIds", lexicon_id.to_string()),
        ];
        self.get_json(SENSES_PATH, &params).await
    }
}
