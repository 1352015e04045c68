use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::domain::Question;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("serialization failure: {0}")]
    Serialization(String),

    #[error("quiz not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizRowStatus {
    Generating,
    Ready,
    Completed,
}

impl QuizRowStatus {
    fn as_str(&self) -> &'static str {
        match self {
            QuizRowStatus::Generating => "generating",
            QuizRowStatus::Ready => "ready",
            QuizRowStatus::Completed => "completed",
        }
    }

    fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "generating" => Ok(QuizRowStatus::Generating),
            "ready" => Ok(QuizRowStatus::Ready),
            "completed" => Ok(QuizRowStatus::Completed),
            other => Err(StoreError::Serialization(format!(
                "unknown quiz status: {}",
                other
            ))),
        }
    }
}

/// Row in the `quizzes` relation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct QuizRecord {
    pub id: String,
    pub topic: String,
    pub num_questions: usize,
    pub source_material: Option<String>,
    pub difficulty: Option<String>,
    pub created_at: DateTime<Utc>,
    pub status: QuizRowStatus,
}

/// Row in the `questions` relation. `question_num` is dense and 1-based in
/// emission order.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoredQuestion {
    pub id: String,
    pub quiz_id: String,
    pub question_num: u32,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
    pub explanation: String,
}

/// Persistence for completed and in-progress quizzes. Used by front-ends;
/// the generation pipeline itself never touches it.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn init(&self) -> StoreResult<()>;
    async fn create_quiz(&self, record: &QuizRecord) -> StoreResult<()>;
    /// Appends the next question, returning its 1-based number. The quiz
    /// flips from generating to ready when the first question lands.
    async fn append_question(&self, quiz_id: &str, question: &Question) -> StoreResult<u32>;
    async fn complete_quiz(&self, quiz_id: &str) -> StoreResult<()>;
    async fn get_quiz(&self, id: &str) -> StoreResult<Option<(QuizRecord, Vec<StoredQuestion>)>>;
    async fn list_quizzes(&self) -> StoreResult<Vec<QuizRecord>>;
}

pub struct SqliteQuizStore {
    db_path: PathBuf,
}

impl SqliteQuizStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            db_path: path.as_ref().to_path_buf(),
        }
    }

    fn open(path: &Path) -> StoreResult<Connection> {
        Connection::open(path).map_err(|e| StoreError::Storage(e.to_string()))
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = Self::open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Storage(format!("blocking task failed: {}", e)))?
    }
}

fn parse_datetime(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("invalid datetime: {}", e)))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, i64, Option<String>, Option<String>, String, String)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn record_from_parts(
    parts: (String, String, i64, Option<String>, Option<String>, String, String),
) -> StoreResult<QuizRecord> {
    let (id, topic, num_questions, source_material, difficulty, created_at, status) = parts;
    Ok(QuizRecord {
        id,
        topic,
        num_questions: num_questions.max(0) as usize,
        source_material,
        difficulty,
        created_at: parse_datetime(&created_at)?,
        status: QuizRowStatus::parse(&status)?,
    })
}

#[async_trait]
impl QuizStore for SqliteQuizStore {
    async fn init(&self) -> StoreResult<()> {
        log::info!("Creating quiz tables at {}", self.db_path.display());
        self.with_conn(|conn| {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS quizzes (
                    id TEXT PRIMARY KEY,
                    topic TEXT NOT NULL,
                    num_questions INTEGER NOT NULL,
                    source_material TEXT,
                    difficulty TEXT,
                    created_at TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'generating'
                );
                CREATE TABLE IF NOT EXISTS questions (
                    id TEXT PRIMARY KEY,
                    quiz_id TEXT NOT NULL,
                    question_num INTEGER NOT NULL,
                    text TEXT NOT NULL,
                    options TEXT NOT NULL,
                    correct_answer INTEGER NOT NULL,
                    explanation TEXT,
                    FOREIGN KEY (quiz_id) REFERENCES quizzes(id)
                );
                "#,
            )
            .map_err(|e| StoreError::Storage(e.to_string()))
        })
        .await
    }

    async fn create_quiz(&self, record: &QuizRecord) -> StoreResult<()> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO quizzes (id, topic, num_questions, source_material, difficulty, created_at, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.topic,
                    record.num_questions as i64,
                    record.source_material,
                    record.difficulty,
                    record.created_at.to_rfc3339(),
                    record.status.as_str(),
                ],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn append_question(&self, quiz_id: &str, question: &Question) -> StoreResult<u32> {
        let quiz_id = quiz_id.to_string();
        let question = question.clone();
        self.with_conn(move |conn| {
            let options = serde_json::to_string(&question.options)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;

            let tx = conn
                .transaction()
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let next_num: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(question_num), 0) + 1 FROM questions WHERE quiz_id = ?1",
                    params![quiz_id],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            tx.execute(
                "INSERT INTO questions (id, quiz_id, question_num, text, options, correct_answer, explanation) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    question.id,
                    quiz_id,
                    next_num,
                    question.text,
                    options,
                    question.correct_answer as i64,
                    question.explanation,
                ],
            )
            .map_err(|e| StoreError::Storage(e.to_string()))?;

            if next_num == 1 {
                tx.execute(
                    "UPDATE quizzes SET status = 'ready' WHERE id = ?1 AND status = 'generating'",
                    params![quiz_id],
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            }

            tx.commit().map_err(|e| StoreError::Storage(e.to_string()))?;
            Ok(next_num as u32)
        })
        .await
    }

    async fn complete_quiz(&self, quiz_id: &str) -> StoreResult<()> {
        let quiz_id = quiz_id.to_string();
        self.with_conn(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE quizzes SET status = 'completed' WHERE id = ?1",
                    params![quiz_id],
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;
            if updated == 0 {
                return Err(StoreError::NotFound(quiz_id));
            }
            Ok(())
        })
        .await
    }

    async fn get_quiz(&self, id: &str) -> StoreResult<Option<(QuizRecord, Vec<StoredQuestion>)>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let parts = conn
                .query_row(
                    "SELECT id, topic, num_questions, source_material, difficulty, created_at, status \
                     FROM quizzes WHERE id = ?1",
                    params![id],
                    row_to_record,
                )
                .optional()
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let Some(parts) = parts else {
                return Ok(None);
            };
            let record = record_from_parts(parts)?;

            let mut stmt = conn
                .prepare(
                    "SELECT id, quiz_id, question_num, text, options, correct_answer, explanation \
                     FROM questions WHERE quiz_id = ?1 ORDER BY question_num",
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map(params![record.id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, Option<String>>(6)?,
                    ))
                })
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let mut questions = Vec::new();
            for row in rows {
                let (id, quiz_id, question_num, text, options, correct_answer, explanation) =
                    row.map_err(|e| StoreError::Storage(e.to_string()))?;
                let options: Vec<String> = serde_json::from_str(&options)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                questions.push(StoredQuestion {
                    id,
                    quiz_id,
                    question_num: question_num.max(0) as u32,
                    text,
                    options,
                    correct_answer: correct_answer.max(0) as usize,
                    explanation: explanation.unwrap_or_default(),
                });
            }

            Ok(Some((record, questions)))
        })
        .await
    }

    async fn list_quizzes(&self) -> StoreResult<Vec<QuizRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, topic, num_questions, source_material, difficulty, created_at, status \
                     FROM quizzes ORDER BY created_at DESC",
                )
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], row_to_record)
                .map_err(|e| StoreError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let parts = row.map_err(|e| StoreError::Storage(e.to_string()))?;
                records.push(record_from_parts(parts)?);
            }
            Ok(records)
        })
        .await
    }
}
