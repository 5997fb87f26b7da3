use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use anyhow::Context;
use async_trait::async_trait;
use time::PrimitiveDateTime;

use crate::db::models::{Attempt, ExamSnapshot, Question};
use crate::db::types::AttemptStatus;
use crate::repositories::store::{
    AttemptKey, AttemptMutation, AttemptStore, ExamCatalog, StoreError,
};
use crate::services::attempt_lifecycle::AttemptError;

/// In-process store. Every attempt mutation runs under one mutex.
#[derive(Default)]
pub(crate) struct MemoryStore {
    attempts: Mutex<HashMap<AttemptKey, Attempt>>,
    exams: RwLock<HashMap<String, ExamSnapshot>>,
    deleted_questions: RwLock<Vec<String>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Seeds exams from a JSON array of `{ "exam": {..}, "questions": [..] }`.
    pub(crate) fn load_fixtures(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read exam fixtures {}", path.display()))?;
        let snapshots: Vec<ExamSnapshot> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse exam fixtures {}", path.display()))?;

        let store = Self::new();
        for snapshot in snapshots {
            store.insert_exam(snapshot);
        }
        Ok(store)
    }

    pub(crate) fn insert_exam(&self, snapshot: ExamSnapshot) {
        let mut exams = self.exams.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        exams.insert(snapshot.exam.id.clone(), snapshot);
    }

    /// Marks a question as removed from the catalog. Already-recorded answers keep pointing at it.
    pub(crate) fn delete_question(&self, question_id: &str) {
        let mut deleted =
            self.deleted_questions.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        deleted.push(question_id.to_string());
    }

    pub(crate) fn exam_count(&self) -> usize {
        self.exams.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    fn attempts(&self) -> MutexGuard<'_, HashMap<AttemptKey, Attempt>> {
        self.attempts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_deleted(&self, question_id: &str) -> bool {
        self.deleted_questions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .any(|id| id == question_id)
    }
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn find(&self, key: &AttemptKey) -> Result<Option<Attempt>, StoreError> {
        Ok(self.attempts().get(key).cloned())
    }

    async fn find_by_id(&self, attempt_id: &str) -> Result<Option<Attempt>, StoreError> {
        Ok(self.attempts().values().find(|attempt| attempt.id == attempt_id).cloned())
    }

    async fn mutate(
        &self,
        key: &AttemptKey,
        mutation: AttemptMutation,
    ) -> Result<Attempt, AttemptError> {
        let mut attempts = self.attempts();
        let current = attempts.get(key).cloned();
        let previous_version = current.as_ref().map(|attempt| attempt.version);

        let next = mutation(current)?;
        if previous_version != Some(next.version) {
            attempts.insert(key.clone(), next.clone());
        }
        Ok(next)
    }

    async fn list_overdue(
        &self,
        cutoff: PrimitiveDateTime,
        limit: u32,
    ) -> Result<Vec<AttemptKey>, StoreError> {
        let attempts = self.attempts();
        let mut overdue: Vec<(PrimitiveDateTime, AttemptKey)> = attempts
            .iter()
            .filter(|(_, attempt)| attempt.status == AttemptStatus::InProgress)
            .filter_map(|(key, attempt)| {
                attempt.deadline_at.filter(|deadline| *deadline <= cutoff).map(|d| (d, key.clone()))
            })
            .collect();
        overdue.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(overdue.into_iter().take(limit.max(1) as usize).map(|(_, key)| key).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl ExamCatalog for MemoryStore {
    async fn find_exam(&self, exam_id: &str) -> Result<Option<ExamSnapshot>, StoreError> {
        let exams = self.exams.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(exams.get(exam_id).cloned().map(|mut snapshot| {
            snapshot.questions.retain(|question| !self.is_deleted(&question.id));
            snapshot
        }))
    }

    async fn find_questions(
        &self,
        exam_id: &str,
        question_ids: &[String],
    ) -> Result<HashMap<String, Question>, StoreError> {
        let exams = self.exams.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(snapshot) = exams.get(exam_id) else {
            return Ok(HashMap::new());
        };
        Ok(snapshot
            .questions
            .iter()
            .filter(|question| question_ids.contains(&question.id) && !self.is_deleted(&question.id))
            .map(|question| (question.id.clone(), question.clone()))
            .collect())
    }
}
