use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE: &str = "https://siwar.ksaa.gov.sa/api/v1/external";
pub const DEFAULT_LEXICON_NAME: &str = "معجم الرياض للغة العربية المعاصرة";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://kalima.db?mode=rwc";
pub const DEFAULT_MIN_LEN: usize = 4;
pub const DEFAULT_MAX_LEN: usize = 7;

/// Process-wide settings, built once at startup and handed to the client,
/// selector, and store constructors.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub api_key: Option<String>,
    /// Explicit lexicon identifier; skips the name lookup when set.
    pub lexicon_id: Option<String>,
    /// Substring matched against lexicon display names.
    pub lexicon_name: String,
    pub min_len: usize,
    pub max_len: usize,
    /// Search attempts for the daily pick.
    pub max_attempts: usize,
    /// Entries requested per search call.
    pub batch_size: usize,
    /// Batch collection budget is `attempt_floor + attempt_multiplier * count`.
    pub attempt_floor: usize,
    pub attempt_multiplier: usize,
    pub request_timeout: Duration,
    pub database_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            lexicon_id: None,
            lexicon_name: DEFAULT_LEXICON_NAME.to_string(),
            min_len: DEFAULT_MIN_LEN,
            max_len: DEFAULT_MAX_LEN,
            max_attempts: 40,
            batch_size: 20,
            attempt_floor: 40,
            attempt_multiplier: 4,
            request_timeout: Duration::from_secs(30),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_lexicon_id(mut self, id: impl Into<String>) -> Self {
        self.lexicon_id = Some(id.into());
        self
    }

    pub fn with_lexicon_name(mut self, name: impl Into<String>) -> Self {
        self.lexicon_name = name.into();
        self
    }

    pub fn with_length_bounds(mut self, min_len: usize, max_len: usize) -> Self {
        self.min_len = min_len;
        self.max_len = max_len;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Attempt budget for collecting `count` distinct words.
    pub fn batch_budget(&self, count: usize) -> usize {
        self.attempt_floor
            .saturating_add(self.attempt_multiplier.saturating_mul(count))
    }

    pub fn validate(&self) -> Result<()> {
        check_bounds(self.min_len, self.max_len)?;
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(Error::Config("attempt budget must be at least 1".into()));
        }
        Ok(())
    }
}

pub(crate) fn check_bounds(min_len: usize, max_len: usize) -> Result<()> {
    if min_len == 0 || min_len > max_len {
        return Err(Error::Config(format!(
            "invalid length window [{min_len}, {max_len}]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_wordle_sized() {
        let config = Config::default();
        assert_eq!((config.min_len, config.max_len), (4, 7));
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_budget(10), 80);
    }

    #[test]
    fn api_base_drops_trailing_slash() {
        let config = Config::default().with_api_base("http://localhost:9000/");
        assert_eq!(config.api_base, "http://localhost:9000");
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = Config::default().with_length_bounds(6, 3);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(check_bounds(0, 3).is_err());
    }
}
