// src/sink.rs
//! Append-only insight storage.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection};
use tracing::info;

use crate::error::PersistenceError;
use crate::record::MessageRecord;
use crate::scoring::{storage_precision, Engagement, EngagementLevel};

/// One scored message ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementInsight {
    pub author: String,
    pub timestamp: String,
    pub category: String,
    pub sentiment: f64,
    pub message_length: u32,
    pub engagement_score: f64,
    pub engagement_level: EngagementLevel,
}

impl EngagementInsight {
    pub fn from_record(record: &MessageRecord, engagement: Engagement) -> Self {
        Self {
            author: record.author.clone(),
            timestamp: record.timestamp.clone(),
            category: record.category.clone(),
            sentiment: record.sentiment,
            message_length: record.message_length,
            engagement_score: engagement.score,
            engagement_level: engagement.level,
        }
    }
}

/// A persisted row, including the sink-assigned `id` and `processed_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredInsight {
    pub id: i64,
    pub author: String,
    pub timestamp: String,
    pub category: String,
    pub sentiment: f64,
    pub message_length: i64,
    pub engagement_score: f64,
    pub engagement_level: String,
    pub processed_at: String,
}

pub trait InsightSink {
    /// Create the schema if absent. Safe to call repeatedly; never drops data.
    fn initialize(&mut self) -> Result<(), PersistenceError>;

    /// Append one row and return its id.
    fn store(&mut self, insight: &EngagementInsight) -> Result<i64, PersistenceError>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS engagement_insights (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        author           TEXT,
        timestamp        TEXT,
        category         TEXT,
        sentiment        REAL,
        message_length   INTEGER,
        engagement_score REAL,
        engagement_level TEXT,
        processed_at     TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
";

pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open (or create) the database file, creating its parent directory.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| PersistenceError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path).map_err(|source| PersistenceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Insight store opened at {}", path.display());
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory().map_err(|source| PersistenceError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Ok(Self { conn })
    }

    /// Last `limit` rows in insertion order.
    pub fn recent(&self, limit: u32) -> Result<Vec<StoredInsight>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, author, timestamp, category, sentiment, message_length,
                        engagement_score, engagement_level, processed_at
                 FROM (SELECT * FROM engagement_insights ORDER BY id DESC LIMIT ?1)
                 ORDER BY id ASC",
            )
            .map_err(PersistenceError::Query)?;
        let rows = stmt
            .query_map([limit], |row| {
                Ok(StoredInsight {
                    id: row.get(0)?,
                    author: row.get(1)?,
                    timestamp: row.get(2)?,
                    category: row.get(3)?,
                    sentiment: row.get(4)?,
                    message_length: row.get(5)?,
                    engagement_score: row.get(6)?,
                    engagement_level: row.get(7)?,
                    processed_at: row.get(8)?,
                })
            })
            .map_err(PersistenceError::Query)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(PersistenceError::Query)
    }

    /// Row totals per engagement level (levels with no rows are omitted).
    pub fn level_counts(&self) -> Result<BTreeMap<String, i64>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT engagement_level, COUNT(*) FROM engagement_insights
                 GROUP BY engagement_level",
            )
            .map_err(PersistenceError::Query)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(PersistenceError::Query)?;
        rows.collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(PersistenceError::Query)
    }
}

impl InsightSink for SqliteSink {
    fn initialize(&mut self) -> Result<(), PersistenceError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(PersistenceError::Schema)?;
        info!("Insight schema ready");
        Ok(())
    }

    fn store(&mut self, insight: &EngagementInsight) -> Result<i64, PersistenceError> {
        self.conn
            .execute(
                "INSERT INTO engagement_insights
                 (author, timestamp, category, sentiment, message_length, engagement_score, engagement_level)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    insight.author,
                    insight.timestamp,
                    insight.category,
                    insight.sentiment,
                    insight.message_length,
                    storage_precision(insight.engagement_score),
                    insight.engagement_level.as_str(),
                ],
            )
            .map_err(|source| PersistenceError::Insert {
                author: insight.author.clone(),
                source,
            })?;
        Ok(self.conn.last_insert_rowid())
    }
}
