//! Question archive: immutable records of past daily questions.
//!
//! The archive is independent of live voting. It supports create, read by
//! identifier, list, delete, and "latest archived" lookups.
//!
//! Backends are dispatched through the [`ArchiveBackend`] enum rather than a
//! trait object, since async methods are not dyn-compatible.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use daypoll_types::{ArchivedQuestion, NewArchivedQuestion};
use sqlx::{PgPool, Row};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::postgres::PostgresPool;

const SELECT_COLUMNS: &str = "question_id, archive_date, question_text, first_choice, \
     second_choice, first_choice_count, second_choice_count, total_participants, \
     created_by, created_at";

// ---------------------------------------------------------------------------
// Backend dispatch
// ---------------------------------------------------------------------------

/// An archive store backend.
#[derive(Clone)]
pub enum ArchiveBackend {
    /// `PostgreSQL` `questions` table.
    Postgres(PostgresArchive),
    /// In-process map, for tests and deployments without a database.
    Memory(MemoryArchive),
}

impl ArchiveBackend {
    /// Persist a new archived question and return the stored row.
    pub async fn create(&self, question: NewArchivedQuestion) -> Result<ArchivedQuestion, ArchiveError> {
        match self {
            Self::Postgres(archive) => archive.create(question).await,
            Self::Memory(archive) => Ok(archive.create(question).await),
        }
    }

    /// Fetch an archived question by identifier.
    pub async fn get(&self, question_id: Uuid) -> Result<ArchivedQuestion, ArchiveError> {
        match self {
            Self::Postgres(archive) => archive.get(question_id).await,
            Self::Memory(archive) => archive.get(question_id).await,
        }
    }

    /// All archived questions, newest archive date first.
    pub async fn list(&self) -> Result<Vec<ArchivedQuestion>, ArchiveError> {
        match self {
            Self::Postgres(archive) => archive.list().await,
            Self::Memory(archive) => Ok(archive.list().await),
        }
    }

    /// Delete an archived question.
    pub async fn delete(&self, question_id: Uuid) -> Result<(), ArchiveError> {
        match self {
            Self::Postgres(archive) => archive.delete(question_id).await,
            Self::Memory(archive) => archive.delete(question_id).await,
        }
    }

    /// The most recently archived question, if any.
    pub async fn latest(&self) -> Result<Option<ArchivedQuestion>, ArchiveError> {
        match self {
            Self::Postgres(archive) => archive.latest().await,
            Self::Memory(archive) => Ok(archive.latest().await),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL backend
// ---------------------------------------------------------------------------

/// Operations on the `questions` table.
#[derive(Clone)]
pub struct PostgresArchive {
    pool: PgPool,
}

impl PostgresArchive {
    /// Create an archive bound to a connection pool.
    pub fn new(pool: &PostgresPool) -> Self {
        Self {
            pool: pool.pool().clone(),
        }
    }

    /// Insert a question.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::InvalidValue`] if a count exceeds `BIGINT`.
    /// Returns [`ArchiveError::Postgres`] if the insert fails.
    pub async fn create(&self, question: NewArchivedQuestion) -> Result<ArchivedQuestion, ArchiveError> {
        let row = question.into_archived(Utc::now());

        sqlx::query(
            r"INSERT INTO questions (question_id, archive_date, question_text, first_choice,
                  second_choice, first_choice_count, second_choice_count, total_participants,
                  created_by, created_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(row.question_id)
        .bind(row.archive_date)
        .bind(&row.question_text)
        .bind(&row.first_choice)
        .bind(&row.second_choice)
        .bind(to_bigint("first_choice_count", row.first_choice_count)?)
        .bind(to_bigint("second_choice_count", row.second_choice_count)?)
        .bind(to_bigint("total_participants", row.total_participants)?)
        .bind(&row.created_by)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(question_id = %row.question_id, "Archived question");
        Ok(row)
    }

    /// Fetch a question by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] if no row matches.
    pub async fn get(&self, question_id: Uuid) -> Result<ArchivedQuestion, ArchiveError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM questions WHERE question_id = $1");
        let row = sqlx::query(&sql)
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ArchiveError::NotFound(question_id))?;
        row_to_question(&row)
    }

    /// All questions, newest archive date first.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Postgres`] if the query fails.
    pub async fn list(&self) -> Result<Vec<ArchivedQuestion>, ArchiveError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM questions ORDER BY archive_date DESC, created_at DESC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_question).collect()
    }

    /// Delete a question.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] if no row was deleted.
    pub async fn delete(&self, question_id: Uuid) -> Result<(), ArchiveError> {
        let result = sqlx::query("DELETE FROM questions WHERE question_id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ArchiveError::NotFound(question_id));
        }
        Ok(())
    }

    /// The question with the latest archive date (newest insert on ties).
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Postgres`] if the query fails.
    pub async fn latest(&self) -> Result<Option<ArchivedQuestion>, ArchiveError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM questions \
             ORDER BY archive_date DESC, created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_question).transpose()
    }
}

fn to_bigint(column: &str, value: u64) -> Result<i64, ArchiveError> {
    i64::try_from(value)
        .map_err(|e| ArchiveError::InvalidValue(format!("{column} = {value}: {e}")))
}

fn from_bigint(column: &str, value: i64) -> Result<u64, ArchiveError> {
    u64::try_from(value)
        .map_err(|e| ArchiveError::InvalidValue(format!("{column} = {value}: {e}")))
}

fn row_to_question(row: &sqlx::postgres::PgRow) -> Result<ArchivedQuestion, ArchiveError> {
    Ok(ArchivedQuestion {
        question_id: row.try_get::<Uuid, _>("question_id")?,
        archive_date: row.try_get::<NaiveDate, _>("archive_date")?,
        question_text: row.try_get("question_text")?,
        first_choice: row.try_get("first_choice")?,
        second_choice: row.try_get("second_choice")?,
        first_choice_count: from_bigint(
            "first_choice_count",
            row.try_get("first_choice_count")?,
        )?,
        second_choice_count: from_bigint(
            "second_choice_count",
            row.try_get("second_choice_count")?,
        )?,
        total_participants: from_bigint(
            "total_participants",
            row.try_get("total_participants")?,
        )?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-process archive. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    rows: Arc<RwLock<BTreeMap<Uuid, ArchivedQuestion>>>,
}

impl MemoryArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a question.
    pub async fn create(&self, question: NewArchivedQuestion) -> ArchivedQuestion {
        let row = question.into_archived(Utc::now());
        self.rows.write().await.insert(row.question_id, row.clone());
        row
    }

    /// Fetch a question by identifier.
    pub async fn get(&self, question_id: Uuid) -> Result<ArchivedQuestion, ArchiveError> {
        self.rows
            .read()
            .await
            .get(&question_id)
            .cloned()
            .ok_or(ArchiveError::NotFound(question_id))
    }

    /// All questions, newest archive date first.
    pub async fn list(&self) -> Vec<ArchivedQuestion> {
        let mut rows: Vec<_> = self.rows.read().await.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.archive_date
                .cmp(&a.archive_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.question_id.cmp(&a.question_id))
        });
        rows
    }

    /// Delete a question.
    pub async fn delete(&self, question_id: Uuid) -> Result<(), ArchiveError> {
        self.rows
            .write()
            .await
            .remove(&question_id)
            .map(|_| ())
            .ok_or(ArchiveError::NotFound(question_id))
    }

    /// The question with the latest archive date.
    pub async fn latest(&self) -> Option<ArchivedQuestion> {
        self.list().await.into_iter().next()
    }
}
