use sqlx::PgPool;

use crate::db::models::{Exam, Question};

pub(crate) const COLUMNS: &str = "id, title, instructions, duration_minutes, total_marks, status";

const QUESTION_COLUMNS: &str = "q.id, q.question_type, q.prompt, q.options, q.correct_answer, q.marks";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {COLUMNS} FROM exams WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_questions(
    pool: &PgPool,
    exam_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM exam_questions eq \
         JOIN questions q ON q.id = eq.question_id \
         WHERE eq.exam_id = $1 AND q.deleted_at IS NULL \
         ORDER BY eq.order_index ASC, q.id ASC"
    ))
    .bind(exam_id)
    .fetch_all(pool)
    .await
}

/// Only questions still attached to `exam_id`; ids from other exams are not returned.
pub(crate) async fn find_questions_by_ids(
    pool: &PgPool,
    exam_id: &str,
    question_ids: &[String],
) -> Result<Vec<Question>, sqlx::Error> {
    if question_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions q \
         JOIN exam_questions eq ON eq.question_id = q.id AND eq.exam_id = $2 \
         WHERE q.id = ANY($1) AND q.deleted_at IS NULL"
    ))
    .bind(question_ids)
    .bind(exam_id)
    .fetch_all(pool)
    .await
}
