use std::collections::HashMap;

use sqlx::types::Json;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::time::to_primitive_utc;
use crate::db::models::{Answer, Attempt, Exam, Question};
use crate::db::types::AttemptStatus;
use crate::repositories::store::{AttemptKey, StoreError};
use crate::services::answer_ledger::{self, AnswerInput};
use crate::services::attempt_timing::{self, DeadlinePolicy};
use crate::services::grading;
use crate::services::grading_status;
use crate::services::session_metadata::SessionMetadata;
use crate::services::violation_log::{self, ViolationInput};

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("Exam not found")]
    ExamNotFound,
    #[error("Exam is not available")]
    ExamUnavailable,
    #[error("Exam already submitted")]
    AlreadySubmitted,
    #[error("No active exam session")]
    NoActiveSession,
    #[error("Exam already submitted, answers can no longer change")]
    AttemptClosed,
    #[error("Session has expired")]
    AttemptExpired,
    #[error("Attempt not found")]
    AttemptNotFound,
    #[error("Attempt has not been submitted yet")]
    NotSubmitted,
    #[error("No answer recorded for question {0}")]
    AnswerNotFound(String),
    #[error("Question {0} is not awaiting manual grading")]
    NotManuallyGradable(String),
    #[error("Score must be between 0 and {max}")]
    ScoreOutOfRange { max: f64 },
    #[error("Attempt changed while it was being submitted")]
    StaleLedger,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub(crate) struct NewAttempt {
    pub(crate) id: String,
    pub(crate) metadata: SessionMetadata,
}

/// Answers and question snapshots resolved outside the write lock. Applied
/// only if the attempt still has `expected_version`.
#[derive(Debug, Clone)]
pub(crate) struct SubmitPlan {
    pub(crate) expected_version: i64,
    pub(crate) answers: Vec<Answer>,
    pub(crate) questions: HashMap<String, Question>,
}

/// Start and resume are the same call: an in-progress attempt comes back untouched.
pub(crate) fn start(
    current: Option<Attempt>,
    key: &AttemptKey,
    exam: &Exam,
    policy: DeadlinePolicy,
    fresh: NewAttempt,
    now: OffsetDateTime,
) -> Result<Attempt, AttemptError> {
    match current {
        Some(attempt) if attempt.is_completed() => Err(AttemptError::AlreadySubmitted),
        Some(attempt) => Ok(attempt),
        None => {
            let started_at = to_primitive_utc(now);
            Ok(Attempt {
                id: fresh.id,
                student_id: key.student_id.clone(),
                exam_id: key.exam_id.clone(),
                status: AttemptStatus::InProgress,
                started_at,
                submitted_at: None,
                graded_at: None,
                deadline_at: attempt_timing::compute_deadline(
                    policy,
                    started_at,
                    exam.duration_minutes,
                ),
                answers: Json(Vec::new()),
                violations: Json(Vec::new()),
                total_time_spent: 0,
                score: None,
                total_marks: None,
                percentage: None,
                auto_graded_score: None,
                pending_manual_marks: None,
                grading_status: None,
                ip_address: fresh.metadata.ip_address,
                user_agent: fresh.metadata.user_agent,
                fingerprint_hash: fresh.metadata.fingerprint_hash,
                version: 1,
                created_at: started_at,
                updated_at: started_at,
            })
        }
    }
}

pub(crate) fn save_answer(
    current: Option<Attempt>,
    input: AnswerInput,
    policy: DeadlinePolicy,
    now: OffsetDateTime,
) -> Result<Attempt, AttemptError> {
    let mut attempt = current.ok_or(AttemptError::NoActiveSession)?;
    if attempt.is_completed() {
        return Err(AttemptError::AttemptClosed);
    }
    if attempt_timing::is_past_grace(policy, attempt.deadline_at, to_primitive_utc(now)) {
        return Err(AttemptError::AttemptExpired);
    }

    let added = answer_ledger::record(&mut attempt.answers.0, input, now);
    attempt.total_time_spent = attempt.total_time_spent.saturating_add(added);
    attempt.version += 1;
    attempt.updated_at = to_primitive_utc(now);
    Ok(attempt)
}

/// Accepted for in-progress and completed attempts alike.
pub(crate) fn report_violation(
    current: Option<Attempt>,
    input: ViolationInput,
    now: OffsetDateTime,
) -> Result<Attempt, AttemptError> {
    let mut attempt = current.ok_or(AttemptError::NoActiveSession)?;
    violation_log::append(&mut attempt.violations.0, input, now);
    attempt.version += 1;
    attempt.updated_at = to_primitive_utc(now);
    Ok(attempt)
}

/// Chooses what gets graded. Returns the answers and whether an explicit set was dropped
/// because the grace window had already closed.
pub(crate) fn plan_answers(
    attempt: &Attempt,
    explicit: Option<Vec<AnswerInput>>,
    policy: DeadlinePolicy,
    now: OffsetDateTime,
) -> (Vec<Answer>, bool) {
    let has_explicit = explicit.as_ref().is_some_and(|inputs| !inputs.is_empty());
    let expired = attempt_timing::is_past_grace(policy, attempt.deadline_at, to_primitive_utc(now));
    if expired && has_explicit {
        return (answer_ledger::resolve_submission(&attempt.answers, None, now), true);
    }
    (answer_ledger::resolve_submission(&attempt.answers, explicit, now), false)
}

pub(crate) fn submit(
    current: Option<Attempt>,
    plan: SubmitPlan,
    now: OffsetDateTime,
) -> Result<Attempt, AttemptError> {
    let mut attempt = current.ok_or(AttemptError::NoActiveSession)?;
    if attempt.is_completed() {
        return Err(AttemptError::AlreadySubmitted);
    }
    if attempt.version != plan.expected_version {
        return Err(AttemptError::StaleLedger);
    }

    let graded = grading::grade_answers(plan.answers, &plan.questions, now);
    let totals = grading_status::aggregate(&graded);

    attempt.total_time_spent =
        attempt.total_time_spent.max(answer_ledger::total_time_spent(&graded));
    attempt.answers = Json(graded);
    attempt.status = AttemptStatus::Completed;
    attempt.submitted_at = Some(to_primitive_utc(now));
    grading_status::apply_aggregate(&mut attempt, totals, now);
    attempt.version += 1;
    attempt.updated_at = to_primitive_utc(now);
    Ok(attempt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::{ExamStatus, GradingStatus, ViolationSeverity};
    use serde_json::json;
    use time::macros::datetime;

    const POLICY: DeadlinePolicy = DeadlinePolicy { enforce: true, grace_seconds: 300 };

    fn exam(duration_minutes: Option<i32>) -> Exam {
        Exam {
            id: "exam-1".to_string(),
            title: "Algebra".to_string(),
            instructions: None,
            duration_minutes,
            total_marks: 25.0,
            status: ExamStatus::Published,
        }
    }

    fn key() -> AttemptKey {
        AttemptKey::new("student-1", "exam-1")
    }

    fn fresh(id: &str) -> NewAttempt {
        NewAttempt { id: id.to_string(), metadata: SessionMetadata::default() }
    }

    fn started(now: OffsetDateTime) -> Attempt {
        start(None, &key(), &exam(Some(60)), POLICY, fresh("attempt-1"), now).unwrap()
    }

    fn save(question_id: &str, answer: serde_json::Value) -> AnswerInput {
        AnswerInput { question_id: question_id.to_string(), answer, time_spent: Some(30) }
    }

    fn questions() -> HashMap<String, Question> {
        let mut questions = HashMap::new();
        for (id, kind, correct, marks) in
            [("q1", "mcq", json!("B"), 10.0), ("q2", "long", json!(null), 15.0)]
        {
            questions.insert(
                id.to_string(),
                Question {
                    id: id.to_string(),
                    question_type: kind.to_string(),
                    prompt: String::new(),
                    options: None,
                    correct_answer: Json(correct),
                    marks,
                },
            );
        }
        questions
    }

    #[test]
    fn start_is_idempotent_while_in_progress() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let first = started(now);
        assert_eq!(first.deadline_at, Some(datetime!(2026-03-01 11:00:00)));

        let later = datetime!(2026-03-01 10:20:00 UTC);
        let again =
            start(Some(first.clone()), &key(), &exam(Some(60)), POLICY, fresh("other"), later)
                .unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again.started_at, first.started_at);
        assert_eq!(again.version, first.version);
    }

    #[test]
    fn start_after_submit_is_rejected() {
        let mut attempt = started(datetime!(2026-03-01 10:00:00 UTC));
        attempt.status = AttemptStatus::Completed;
        let result = start(
            Some(attempt),
            &key(),
            &exam(None),
            POLICY,
            fresh("attempt-2"),
            datetime!(2026-03-01 12:00:00 UTC),
        );
        assert!(matches!(result, Err(AttemptError::AlreadySubmitted)));
    }

    #[test]
    fn save_requires_open_attempt_within_deadline() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        assert!(matches!(
            save_answer(None, save("q1", json!("A")), POLICY, now),
            Err(AttemptError::NoActiveSession)
        ));

        let attempt = started(now);
        let saved = save_answer(Some(attempt.clone()), save("q1", json!("A")), POLICY, now).unwrap();
        assert_eq!(saved.version, attempt.version + 1);
        assert_eq!(saved.total_time_spent, 30);

        let in_grace = datetime!(2026-03-01 11:04:00 UTC);
        assert!(save_answer(Some(saved.clone()), save("q1", json!("B")), POLICY, in_grace).is_ok());

        let too_late = datetime!(2026-03-01 11:06:00 UTC);
        assert!(matches!(
            save_answer(Some(saved), save("q1", json!("B")), POLICY, too_late),
            Err(AttemptError::AttemptExpired)
        ));
    }

    #[test]
    fn submit_grades_and_closes_the_attempt() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut attempt = started(now);
        attempt = save_answer(Some(attempt), save("q1", json!("B")), POLICY, now).unwrap();
        attempt = save_answer(Some(attempt), save("q2", json!("essay")), POLICY, now).unwrap();

        let (answers, dropped) = plan_answers(&attempt, None, POLICY, now);
        assert!(!dropped);
        let plan = SubmitPlan { expected_version: attempt.version, answers, questions: questions() };
        let submitted = submit(Some(attempt), plan, now).unwrap();

        assert!(submitted.is_completed());
        assert_eq!(submitted.score, Some(10.0));
        assert_eq!(submitted.total_marks, Some(25.0));
        assert_eq!(submitted.percentage, Some(40));
        assert_eq!(submitted.pending_manual_marks, Some(15.0));
        assert_eq!(submitted.grading_status, Some(GradingStatus::Partial));
        assert_eq!(submitted.graded_at, None);

        assert!(matches!(
            save_answer(Some(submitted), save("q1", json!("A")), POLICY, now),
            Err(AttemptError::AttemptClosed)
        ));
    }

    #[test]
    fn submit_refuses_a_moved_ledger() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let attempt = started(now);
        let (answers, _) = plan_answers(&attempt, None, POLICY, now);
        let plan = SubmitPlan { expected_version: attempt.version, answers, questions: questions() };

        let moved = save_answer(Some(attempt), save("q1", json!("B")), POLICY, now).unwrap();
        assert!(matches!(submit(Some(moved), plan, now), Err(AttemptError::StaleLedger)));
    }

    #[test]
    fn explicit_answers_are_ignored_after_grace() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let attempt =
            save_answer(Some(started(now)), save("q1", json!("A")), POLICY, now).unwrap();

        let late = datetime!(2026-03-01 12:00:00 UTC);
        let (answers, dropped) =
            plan_answers(&attempt, Some(vec![save("q1", json!("B"))]), POLICY, late);
        assert!(dropped);
        assert_eq!(answers[0].answer, json!("A"));
    }

    #[test]
    fn violations_are_accepted_after_submission() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut attempt = started(now);
        attempt.status = AttemptStatus::Completed;

        let input = ViolationInput {
            violation_type: "tab-switch".to_string(),
            description: "Left the exam tab".to_string(),
            severity: ViolationSeverity::Low,
            timestamp: None,
        };
        let updated = report_violation(Some(attempt), input.clone(), now).unwrap();
        assert_eq!(updated.violations.len(), 1);
        assert!(matches!(report_violation(None, input, now), Err(AttemptError::NoActiveSession)));
    }
}
