use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, ExamSnapshot, Question};
use crate::repositories::{attempts, exams};
use crate::services::attempt_lifecycle::AttemptError;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("attempt {0} was modified outside its write lock")]
    LostUpdate(String),
}

/// Identity of an attempt: one per (student, exam).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct AttemptKey {
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
}

impl AttemptKey {
    pub(crate) fn new(student_id: impl Into<String>, exam_id: impl Into<String>) -> Self {
        Self { student_id: student_id.into(), exam_id: exam_id.into() }
    }

    pub(crate) fn of(attempt: &Attempt) -> Self {
        Self::new(attempt.student_id.clone(), attempt.exam_id.clone())
    }

    pub(crate) fn lock_name(&self) -> String {
        format!("exam_attempt:{}:{}", self.student_id, self.exam_id)
    }
}

/// Pure transition applied under the attempt's write lock. Returning an
/// attempt whose `version` did not move means "nothing to persist".
pub(crate) type AttemptMutation =
    Box<dyn FnOnce(Option<Attempt>) -> Result<Attempt, AttemptError> + Send>;

#[async_trait]
pub(crate) trait AttemptStore: Send + Sync {
    async fn find(&self, key: &AttemptKey) -> Result<Option<Attempt>, StoreError>;

    async fn find_by_id(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError>;

    /// Single read-modify-write unit for one attempt. Concurrent calls for
    /// the same key are serialized.
    async fn mutate(
        &self,
        key: &AttemptKey,
        mutation: AttemptMutation,
    ) -> Result<Attempt, AttemptError>;

    /// In-progress attempts whose deadline is at or before `cutoff`.
    async fn list_overdue(
        &self,
        cutoff: PrimitiveDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptKey>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Read-only view of the exam authoring service's data.
#[async_trait]
pub(crate) trait ExamCatalog: Send + Sync {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<ExamSnapshot>, StoreError>;

    /// Questions of `exam_id` that still exist, keyed by id. Missing ids and
    /// ids belonging to other exams are simply absent.
    async fn find_questions(
        &self,
        exam_id: &str,
        question_ids: &[String],
    ) -> Result<HashMap<String, Question>, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgStore {
    async fn find(&self, key: &AttemptKey) -> Result<Option<Attempt>, StoreError> {
        Ok(attempts::find_by_key(&self.pool, &key.student_id, &key.exam_id).await?)
    }

    async fn find_by_id(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError> {
        Ok(attempts::find_by_id(&self.pool, attempt_id).await?)
    }

    async fn mutate(
        &self,
        key: &AttemptKey,
        mutation: AttemptMutation,
    ) -> Result<Attempt, AttemptError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // Serializes the no-row-yet case too, where FOR UPDATE has nothing to lock.
        attempts::acquire_attempt_lock(&mut *tx, &key.lock_name())
            .await
            .map_err(StoreError::from)?;

        let current = attempts::lock_by_key(&mut *tx, &key.student_id, &key.exam_id)
            .await
            .map_err(StoreError::from)?;
        let previous_version = current.as_ref().map(|attempt| attempt.version);

        // On error the transaction is dropped and rolled back.
        let next = mutation(current)?;

        match previous_version {
            None => {
                let inserted =
                    attempts::insert(&mut *tx, &next).await.map_err(StoreError::from)?;
                if !inserted {
                    return Err(StoreError::LostUpdate(next.id.clone()).into());
                }
            }
            Some(version) if version != next.version => {
                let updated = attempts::update(&mut *tx, &next, version)
                    .await
                    .map_err(StoreError::from)?;
                if !updated {
                    return Err(StoreError::LostUpdate(next.id.clone()).into());
                }
            }
            Some(_) => {}
        }

        tx.commit().await.map_err(StoreError::from)?;
        Ok(next)
    }

    async fn list_overdue(
        &self,
        cutoff: PrimitiveDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptKey>, StoreError> {
        let rows = attempts::list_overdue(&self.pool, cutoff, i64::from(limit)).await?;
        Ok(rows.into_iter().map(|(student_id, exam_id)| AttemptKey { student_id, exam_id }).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ExamCatalog for PgStore {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<ExamSnapshot>, StoreError> {
        let Some(exam) = exams::find_by_id(&self.pool, exam_id).await? else {
            return Ok(None);
        };
        let questions = exams::list_questions(&self.pool, exam_id).await?;
        Ok(Some(ExamSnapshot { exam, questions }))
    }

    async fn find_questions(
        &self,
        exam_id: &str,
        question_ids: &[String],
    ) -> Result<HashMap<String, Question>, StoreError> {
        let questions = exams::find_questions_by_ids(&self.pool, exam_id, question_ids).await?;
        Ok(questions.into_iter().map(|question| (question.id.clone(), question)).collect())
    }
}
