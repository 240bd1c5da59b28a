//! SQLite persistence for the learning pipeline
//!
//! Schema:
//! - training_examples: append-only log of (text, prediction,
//!   correction, reward) records
//! - vocabulary: ordered token list; position + 1 == embedding index
//! - meta: key/value pipeline state (retrain watermark)
//!
//! Model weights live next to the database as a safetensors file; this
//! module only hands out the path.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, warn};

use crate::event::ParsedEventData;
use crate::vocab::Vocabulary;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS training_examples (
    id INTEGER PRIMARY KEY,
    text TEXT NOT NULL,
    prediction TEXT NOT NULL,
    correction TEXT NOT NULL,
    reward REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vocabulary (
    position INTEGER PRIMARY KEY,
    token TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const WEIGHTS_FILE: &str = "model.safetensors";
const TRAINED_THROUGH_KEY: &str = "trained_through";

/// One recorded correction. Immutable once written; destroyed only by
/// `clear_all`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub text: String,
    pub prediction: ParsedEventData,
    pub correction: ParsedEventData,
    /// Field-similarity reward in [0, 1].
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
}

/// Database handle plus the sibling weights-file path.
pub struct Store {
    conn: Connection,
    weights_path: PathBuf,
}

impl Store {
    /// Open (or create) the store under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
        let db_path = data_dir.join("gigtext.sqlite3");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            weights_path: data_dir.join(WEIGHTS_FILE),
        })
    }

    /// In-memory store for tests. The weights path points at a unique
    /// throwaway location and is only meaningful if actually written.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        let unique = format!(
            "gigtext-{}-{}-{}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed),
            WEIGHTS_FILE
        );
        Ok(Self {
            conn,
            weights_path: std::env::temp_dir().join(unique),
        })
    }

    /// Where the scoring model's weights are persisted.
    pub fn weights_path(&self) -> &Path {
        &self.weights_path
    }

    /// Append a training example to the log.
    pub fn add_example(&self, example: &TrainingExample) -> Result<()> {
        self.conn.execute(
            "INSERT INTO training_examples (text, prediction, correction, reward, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                example.text,
                serde_json::to_string(&example.prediction)?,
                serde_json::to_string(&example.correction)?,
                example.reward,
                example.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// All training examples, oldest first.
    pub fn load_examples(&self) -> Result<Vec<TrainingExample>> {
        let mut stmt = self.conn.prepare(
            "SELECT text, prediction, correction, reward, created_at
             FROM training_examples ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut examples = Vec::new();
        for row in rows {
            let (text, prediction, correction, reward, created_at) = row?;
            examples.push(TrainingExample {
                text,
                prediction: serde_json::from_str(&prediction)
                    .context("corrupt prediction record")?,
                correction: serde_json::from_str(&correction)
                    .context("corrupt correction record")?,
                reward,
                timestamp: DateTime::parse_from_rfc3339(&created_at)
                    .context("corrupt example timestamp")?
                    .with_timezone(&Utc),
            });
        }
        Ok(examples)
    }

    /// Number of recorded examples.
    pub fn example_count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM training_examples", [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    /// Top `n` examples with reward above 0.7, best first.
    pub fn best_examples(&self, n: usize) -> Result<Vec<TrainingExample>> {
        let mut examples = self.load_examples()?;
        examples.retain(|e| e.reward > 0.7);
        examples.sort_by(|a, b| b.reward.total_cmp(&a.reward));
        examples.truncate(n);
        Ok(examples)
    }

    /// How many examples the model has already been retrained over.
    pub fn trained_through(&self) -> Result<usize> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?",
                params![TRAINED_THROUGH_KEY],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Advance the retrain watermark after a completed pass.
    pub fn set_trained_through(&self, count: usize) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![TRAINED_THROUGH_KEY, count.to_string()],
        )?;
        Ok(())
    }

    /// Replace the persisted vocabulary with the current ordered tokens.
    pub fn save_vocabulary(&mut self, vocab: &Vocabulary) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM vocabulary", [])?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO vocabulary (position, token) VALUES (?, ?)")?;
            for (position, token) in vocab.tokens().iter().enumerate() {
                stmt.execute(params![position as i64, token])?;
            }
        }
        tx.commit()?;
        debug!(tokens = vocab.len(), "vocabulary persisted");
        Ok(())
    }

    /// Load the persisted vocabulary, preserving index assignment order.
    pub fn load_vocabulary(&self, capacity: usize) -> Result<Vocabulary> {
        let mut stmt = self
            .conn
            .prepare("SELECT token FROM vocabulary ORDER BY position")?;
        let tokens: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(Vocabulary::from_tokens(tokens, capacity))
    }

    /// Wipe everything: training log, vocabulary, watermark, weights.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM training_examples", [])?;
        self.conn.execute("DELETE FROM vocabulary", [])?;
        self.conn.execute("DELETE FROM meta", [])?;
        if self.weights_path.exists() {
            if let Err(err) = std::fs::remove_file(&self.weights_path) {
                warn!(%err, "failed to remove weights file");
            }
        }
        Ok(())
    }
}
