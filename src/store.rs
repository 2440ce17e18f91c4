//! SQLite persistence for the daily cache and the year plan.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::error::Result;
use crate::normalize::NormalizedWord;

const SCHEMA_VERSION: i64 = 1;

const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS daily_word_cache (
    ymd TEXT PRIMARY KEY,
    word TEXT NOT NULL,
    bare TEXT NOT NULL,
    length INTEGER NOT NULL,
    definition TEXT,
    entry_id TEXT,
    lexicon_id TEXT,
    source TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS year_word (
    day_index INTEGER PRIMARY KEY,
    word TEXT NOT NULL,
    bare TEXT NOT NULL,
    length INTEGER NOT NULL,
    entry_id TEXT,
    lexicon_id TEXT,
    definition TEXT,
    senses TEXT
);
"#;

/// The word served for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyWord {
    pub date: String,
    pub word: String,
    pub bare: String,
    pub length: usize,
    pub definition: Option<String>,
    pub entry_id: Option<String>,
    pub lexicon_id: Option<String>,
    pub source: String,
}

impl DailyWord {
    pub fn from_pick(date: impl Into<String>, pick: &NormalizedWord, source: &str) -> Self {
        Self {
            date: date.into(),
            word: pick.word.clone(),
            bare: pick.bare.clone(),
            length: pick.length,
            definition: pick.definition().map(str::to_string),
            entry_id: pick.entry_id.clone(),
            lexicon_id: pick.lexicon_id.clone(),
            source: source.to_string(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            date: row.try_get("ymd")?,
            word: row.try_get("word")?,
            bare: row.try_get("bare")?,
            length: row.try_get::<i64, _>("length")? as usize,
            definition: row.try_get("definition")?,
            entry_id: row.try_get("entry_id")?,
            lexicon_id: row.try_get("lexicon_id")?,
            source: row.try_get("source")?,
        })
    }
}

/// One slot of the precomputed plan, keyed by day index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearWord {
    pub day_index: u32,
    pub word: String,
    pub bare: String,
    pub length: usize,
    pub entry_id: Option<String>,
    pub lexicon_id: Option<String>,
    pub definition: Option<String>,
    pub senses: Vec<String>,
}

impl YearWord {
    pub fn from_pick(day_index: u32, pick: &NormalizedWord) -> Self {
        Self {
            day_index,
            word: pick.word.clone(),
            bare: pick.bare.clone(),
            length: pick.length,
            entry_id: pick.entry_id.clone(),
            lexicon_id: pick.lexicon_id.clone(),
            definition: pick.definition().map(str::to_string),
            senses: pick.senses.clone(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        let senses: Option<String> = row.try_get("senses")?;
        let senses = match senses {
            Some(text) => serde_json::from_str(&text)?,
            None => Vec::new(),
        };
        Ok(Self {
            day_index: row.try_get::<i64, _>("day_index")? as u32,
            word: row.try_get("word")?,
            bare: row.try_get("bare")?,
            length: row.try_get::<i64, _>("length")? as usize,
            entry_id: row.try_get("entry_id")?,
            lexicon_id: row.try_get("lexicon_id")?,
            definition: row.try_get("definition")?,
            senses,
        })
    }
}

#[derive(Clone)]
pub struct WordStore {
    pool: SqlitePool,
}

impl WordStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        info!(url, "opened word store");
        Self::with_pool(pool).await
    }

    /// A private in-memory database; one pinned connection keeps it alive.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn daily(&self, ymd: &str) -> Result<Option<DailyWord>> {
        sqlx::query("SELECT * FROM daily_word_cache WHERE ymd = ?")
            .bind(ymd)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(DailyWord::from_row)
            .transpose()
    }

    /// Inserts unless the date already has a row; returns whether this call won.
    pub async fn insert_daily_if_absent(&self, record: &DailyWord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_word_cache
            (ymd, word, bare, length, definition, entry_id, lexicon_id, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ymd) DO NOTHING
            "#,
        )
        .bind(&record.date)
        .bind(&record.word)
        .bind(&record.bare)
        .bind(record.length as i64)
        .bind(&record.definition)
        .bind(&record.entry_id)
        .bind(&record.lexicon_id)
        .bind(&record.source)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Writes the row for `record.date`, replacing whatever is stored.
    pub async fn upsert_daily(&self, record: &DailyWord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_word_cache
            (ymd, word, bare, length, definition, entry_id, lexicon_id, source)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(ymd) DO UPDATE SET
                word = excluded.word,
                bare = excluded.bare,
                length = excluded.length,
                definition = excluded.definition,
                entry_id = excluded.entry_id,
                lexicon_id = excluded.lexicon_id,
                source = excluded.source,
                created_at = datetime('now')
            "#,
        )
        .bind(&record.date)
        .bind(&record.word)
        .bind(&record.bare)
        .bind(record.length as i64)
        .bind(&record.definition)
        .bind(&record.entry_id)
        .bind(&record.lexicon_id)
        .bind(&record.source)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes the row for `ymd`, returning what was there.
    pub async fn delete_daily(&self, ymd: &str) -> Result<Option<DailyWord>> {
        sqlx::query("DELETE FROM daily_word_cache WHERE ymd = ? RETURNING *")
            .bind(ymd)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(DailyWord::from_row)
            .transpose()
    }

    /// Replaces the whole plan atomically.
    pub async fn replace_year_plan(&self, words: &[YearWord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM year_word").execute(&mut *tx).await?;
        for record in words {
            let senses = if record.senses.is_empty() {
                None
            } else {
                Some(serde_json::to_string(&record.senses)?)
            };
            sqlx::query(
                r#"
                INSERT INTO year_word
                (day_index, word, bare, length, entry_id, lexicon_id, definition, senses)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(day_index) DO UPDATE SET
                    word = excluded.word,
                    bare = excluded.bare,
                    length = excluded.length,
                    entry_id = excluded.entry_id,
                    lexicon_id = excluded.lexicon_id,
                    definition = excluded.definition,
                    senses = excluded.senses
                "#,
            )
            .bind(record.day_index as i64)
            .bind(&record.word)
            .bind(&record.bare)
            .bind(record.length as i64)
            .bind(&record.entry_id)
            .bind(&record.lexicon_id)
            .bind(&record.definition)
            .bind(senses)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = words.len(), "year plan replaced");
        Ok(())
    }

    pub async fn year_word(&self, day_index: u32) -> Result<Option<YearWord>> {
        sqlx::query("SELECT * FROM year_word WHERE day_index = ?")
            .bind(day_index as i64)
            .fetch_optional(&self.pool)
            .await?
            .as_ref()
            .map(YearWord::from_row)
            .transpose()
    }

    pub async fn year_plan_len(&self) -> Result<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM year_word")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("count")? as u32)
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current: i64 = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM _migrations")
        .fetch_one(pool)
        .await?
        .try_get("version")?;

    for version in (current + 1)..=SCHEMA_VERSION {
        let (name, sql) = match version {
            1 => ("initial_schema", MIGRATION_V1),
            _ => unreachable!("no migration registered for version {version}"),
        };
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
            .bind(version)
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(version, name, "applied migration");
    }
    Ok(())
}
