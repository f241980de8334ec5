use std::{
    collections::HashMap,
    fs,
    path::Path,
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use shared::domain::{CourseId, ExamId};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Autosave entries are scoped per course and exam; the two halves are stored
/// as separate key columns so ids containing separators cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AutosaveKey {
    pub course_id: CourseId,
    pub exam_id: ExamId,
}

impl AutosaveKey {
    pub fn new(course_id: CourseId, exam_id: ExamId) -> Self {
        Self { course_id, exam_id }
    }
}

/// Saved answers in question order. `None` marks a slot that was never filled.
pub type SavedAnswers = Vec<Option<String>>;

#[derive(Debug, Clone)]
pub struct AutosaveEntry {
    pub key: AutosaveKey,
    pub answers: SavedAnswers,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait AutosaveStore: Send + Sync {
    async fn load_answers(&self, key: &AutosaveKey) -> Result<Option<SavedAnswers>>;
    async fn save_answers(&self, key: &AutosaveKey, answers: &[String]) -> Result<()>;
    async fn clear_answers(&self, key: &AutosaveKey) -> Result<()>;
}

/// Encodes the answer set the way it is persisted: unanswered slots become
/// JSON nulls.
pub fn encode_answers(answers: &[String]) -> Result<String> {
    let slots: SavedAnswers = answers
        .iter()
        .map(|answer| (!answer.is_empty()).then(|| answer.clone()))
        .collect();
    serde_json::to_string(&slots).context("failed to encode autosave answers")
}

pub fn decode_answers(raw: &str) -> Result<SavedAnswers> {
    serde_json::from_str(raw).context("autosave entry is not a JSON array of strings")
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        create_database_dir(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Each connection to an in-memory database sees its own empty schema.
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open autosave database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_entries(&self, course_id: &CourseId) -> Result<Vec<AutosaveEntry>> {
        let rows = sqlx::query(
            "SELECT course_id, exam_id, answers_json, updated_at
             FROM autosaves
             WHERE course_id = ?
             ORDER BY exam_id",
        )
        .bind(course_id.as_str())
        .fetch_all(&self.pool)
        .await
        .context("failed to list autosave entries")?;

        rows.into_iter()
            .map(|row| -> Result<AutosaveEntry> {
                let raw: String = row.try_get("answers_json")?;
                let updated_at: Option<String> = row.try_get("updated_at")?;
                Ok(AutosaveEntry {
                    key: AutosaveKey::new(
                        CourseId(row.try_get("course_id")?),
                        ExamId(row.try_get("exam_id")?),
                    ),
                    answers: decode_answers(&raw)?,
                    updated_at: updated_at.as_deref().and_then(parse_sqlite_timestamp),
                })
            })
            .collect()
    }
}

#[async_trait]
impl AutosaveStore for Storage {
    async fn load_answers(&self, key: &AutosaveKey) -> Result<Option<SavedAnswers>> {
        let row = sqlx::query(
            "SELECT answers_json FROM autosaves WHERE course_id = ?1 AND exam_id = ?2",
        )
        .bind(key.course_id.as_str())
        .bind(key.exam_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("failed to load autosave entry")?;

        row.map(|row| decode_answers(&row.get::<String, _>(0)))
            .transpose()
    }

    async fn save_answers(&self, key: &AutosaveKey, answers: &[String]) -> Result<()> {
        let encoded = encode_answers(answers)?;
        sqlx::query(
            r#"
            INSERT INTO autosaves (course_id, exam_id, answers_json, updated_at)
            VALUES (?1, ?2, ?3, CURRENT_TIMESTAMP)
            ON CONFLICT(course_id, exam_id) DO UPDATE SET
                answers_json = excluded.answers_json,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.course_id.as_str())
        .bind(key.exam_id.as_str())
        .bind(encoded)
        .execute(&self.pool)
        .await
        .context("failed to save autosave entry")?;
        debug!(course_id = %key.course_id, exam_id = %key.exam_id, slots = answers.len(), "autosaved answers");
        Ok(())
    }

    async fn clear_answers(&self, key: &AutosaveKey) -> Result<()> {
        sqlx::query("DELETE FROM autosaves WHERE course_id = ?1 AND exam_id = ?2")
            .bind(key.course_id.as_str())
            .bind(key.exam_id.as_str())
            .execute(&self.pool)
            .await
            .context("failed to clear autosave entry")?;
        Ok(())
    }
}

/// Process-local store for front ends that do not need answers to survive a
/// restart.
#[derive(Clone, Default)]
pub struct MemoryAutosaveStore {
    entries: Arc<RwLock<HashMap<AutosaveKey, String>>>,
}

impl MemoryAutosaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw value as-is, bypassing encoding.
    pub async fn insert_raw(&self, key: AutosaveKey, raw: impl Into<String>) {
        self.entries.write().await.insert(key, raw.into());
    }

    pub async fn contains(&self, key: &AutosaveKey) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl AutosaveStore for MemoryAutosaveStore {
    async fn load_answers(&self, key: &AutosaveKey) -> Result<Option<SavedAnswers>> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|raw| decode_answers(raw))
            .transpose()
    }

    async fn save_answers(&self, key: &AutosaveKey, answers: &[String]) -> Result<()> {
        let encoded = encode_answers(answers)?;
        self.entries.write().await.insert(key.clone(), encoded);
        Ok(())
    }

    async fn clear_answers(&self, key: &AutosaveKey) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

fn parse_sqlite_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

/// Local file behind a `sqlite:` url, without the query string.
fn sqlite_file_path(database_url: &str) -> Option<&Path> {
    if is_memory_url(database_url) {
        return None;
    }
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().filter(|path| !path.is_empty())?;
    Some(Path::new(path))
}

fn create_database_dir(database_url: &str) -> Result<()> {
    let Some(dir) = sqlite_file_path(database_url).and_then(Path::parent) else {
        return Ok(());
    };
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    debug!(dir = %dir.display(), "creating autosave database directory");
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create autosave directory '{}'", dir.display()))
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
