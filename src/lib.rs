//! Daily Arabic word selection backed by the KSAA Siwar dictionary API.
//!
//! [`Selector`] draws playable candidates from the upstream search endpoint,
//! [`WordService`] caches one word per Riyadh calendar day and keeps the
//! year plan, and [`WordStore`] persists both in SQLite.

pub mod arabic;
pub mod config;
pub mod envelope;
pub mod error;
pub mod normalize;
pub mod selector;
pub mod service;
pub mod store;
pub mod upstream;
#[cfg(feature = "web")]
pub mod web;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use normalize::NormalizedWord;
pub use selector::Selector;
pub use service::WordService;
pub use store::{DailyWord, WordStore, YearWord};
pub use upstream::{SiwarClient, Upstream};
