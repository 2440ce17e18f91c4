//! Error types shared by the upstream client, selector, and store.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The upstream could not produce an acceptable pick: zero candidates,
    /// an exhausted attempt budget, or a short batch.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// No lexicon display name matched the configured name.
    #[error("lexicon not found by name: {0}")]
    LexiconNotFound(String),

    /// Upstream answered with a non-success status.
    #[error("upstream returned HTTP {status} for {path}")]
    Http { status: u16, path: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// 400 and 404 mean "wrong parameter convention", not "upstream down".
    pub fn is_fallback_status(&self) -> bool {
        matches!(self, Error::Http { status: 400 | 404, .. })
    }

    /// Failures that belong to the upstream rather than to the caller or the store.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamUnavailable(_)
                | Error::LexiconNotFound(_)
                | Error::Http { .. }
                | Error::Transport(_)
                | Error::Decode(_)
        )
    }
}
