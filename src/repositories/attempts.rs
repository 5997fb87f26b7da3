use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, student_id, exam_id, status, started_at, submitted_at, graded_at, deadline_at, \
    answers, violations, total_time_spent, score, total_marks, percentage, \
    auto_graded_score, pending_manual_marks, grading_status, \
    ip_address, user_agent, fingerprint_hash, version, created_at, updated_at";

pub(crate) async fn acquire_attempt_lock(
    executor: impl sqlx::PgExecutor<'_>,
    lock_name: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
        .bind(lock_name)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn find_by_key(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts \
         WHERE student_id = $1 AND exam_id = $2 AND deleted_at IS NULL"
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn lock_by_key(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    exam_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts \
         WHERE student_id = $1 AND exam_id = $2 AND deleted_at IS NULL \
         FOR UPDATE"
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn find_by_id(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM exam_attempts WHERE id = $1 AND deleted_at IS NULL"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// Returns false when another live attempt already holds the (student, exam) slot.
pub(crate) async fn insert(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: &Attempt,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO exam_attempts (\
            id, student_id, exam_id, status, started_at, submitted_at, graded_at, deadline_at, \
            answers, violations, total_time_spent, score, total_marks, percentage, \
            auto_graded_score, pending_manual_marks, grading_status, \
            ip_address, user_agent, fingerprint_hash, version, created_at, updated_at\
         ) VALUES (\
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
            $18, $19, $20, $21, $22, $23\
         ) ON CONFLICT (student_id, exam_id) WHERE deleted_at IS NULL DO NOTHING",
    )
    .bind(&attempt.id)
    .bind(&attempt.student_id)
    .bind(&attempt.exam_id)
    .bind(attempt.status)
    .bind(attempt.started_at)
    .bind(attempt.submitted_at)
    .bind(attempt.graded_at)
    .bind(attempt.deadline_at)
    .bind(&attempt.answers)
    .bind(&attempt.violations)
    .bind(attempt.total_time_spent)
    .bind(attempt.score)
    .bind(attempt.total_marks)
    .bind(attempt.percentage)
    .bind(attempt.auto_graded_score)
    .bind(attempt.pending_manual_marks)
    .bind(attempt.grading_status)
    .bind(&attempt.ip_address)
    .bind(&attempt.user_agent)
    .bind(&attempt.fingerprint_hash)
    .bind(attempt.version)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Writes every mutable column, guarded by the version the caller read.
pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: &Attempt,
    expected_version: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE exam_attempts SET \
            status = $1, submitted_at = $2, graded_at = $3, deadline_at = $4, \
            answers = $5, violations = $6, total_time_spent = $7, score = $8, \
            total_marks = $9, percentage = $10, auto_graded_score = $11, \
            pending_manual_marks = $12, grading_status = $13, version = $14, updated_at = $15 \
         WHERE id = $16 AND version = $17",
    )
    .bind(attempt.status)
    .bind(attempt.submitted_at)
    .bind(attempt.graded_at)
    .bind(attempt.deadline_at)
    .bind(&attempt.answers)
    .bind(&attempt.violations)
    .bind(attempt.total_time_spent)
    .bind(attempt.score)
    .bind(attempt.total_marks)
    .bind(attempt.percentage)
    .bind(attempt.auto_graded_score)
    .bind(attempt.pending_manual_marks)
    .bind(attempt.grading_status)
    .bind(attempt.version)
    .bind(attempt.updated_at)
    .bind(&attempt.id)
    .bind(expected_version)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn list_overdue(
    pool: &PgPool,
    cutoff: PrimitiveDateTime,
    limit: i64,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        "SELECT student_id, exam_id FROM exam_attempts \
         WHERE status = $1 AND deadline_at IS NOT NULL AND deadline_at <= $2 \
           AND deleted_at IS NULL \
         ORDER BY deadline_at ASC LIMIT $3",
    )
    .bind(AttemptStatus::InProgress)
    .bind(cutoff)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
