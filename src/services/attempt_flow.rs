use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::metrics as app_metrics;
use crate::core::state::AppState;
use crate::core::time::to_primitive_utc;
use crate::db::models::{Attempt, ExamSnapshot};
use crate::db::types::GradingStatus;
use crate::repositories::store::AttemptKey;
use crate::services::activity::ActivityEvent;
use crate::services::answer_ledger::{self, AnswerInput};
use crate::services::attempt_lifecycle::{self, AttemptError, NewAttempt, SubmitPlan};
use crate::services::attempt_timing::{self, DeadlinePolicy};
use crate::services::grading;
use crate::services::grading_status::{self, AttemptAggregate, ManualGrade};
use crate::services::session_metadata::SessionMetadata;
use crate::services::violation_log::ViolationInput;

const SUBMIT_MAX_TRIES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubmitTrigger {
    Student,
    Deadline,
}

impl SubmitTrigger {
    fn as_str(self) -> &'static str {
        match self {
            SubmitTrigger::Student => "student",
            SubmitTrigger::Deadline => "deadline",
        }
    }
}

#[derive(Debug)]
pub(crate) struct StartOutcome {
    pub(crate) attempt: Attempt,
    pub(crate) exam: ExamSnapshot,
    pub(crate) resumed: bool,
}

#[derive(Debug)]
pub(crate) struct SubmitOutcome {
    pub(crate) attempt: Attempt,
    pub(crate) totals: AttemptAggregate,
    pub(crate) already_submitted: bool,
    pub(crate) explicit_answers_ignored: bool,
}

fn deadline_policy(state: &AppState) -> DeadlinePolicy {
    DeadlinePolicy::from_settings(state.settings().attempt())
}

fn exam_cache_key(exam_id: &str) -> String {
    format!("exam_snapshot:{exam_id}")
}

/// Exam plus questions for display. Served from Redis when the cache is enabled.
pub(crate) async fn load_exam_snapshot(
    state: &AppState,
    exam_id: &str,
) -> Result<Option<ExamSnapshot>, AttemptError> {
    let ttl = state.settings().redis().exam_cache_ttl_seconds;
    let cache_key = exam_cache_key(exam_id);

    if ttl > 0 {
        match state.redis().get_json::<ExamSnapshot>(&cache_key).await {
            Ok(Some(snapshot)) => return Ok(Some(snapshot)),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(exam_id, error = %err, "Exam snapshot cache read failed");
            }
        }
    }

    let snapshot = state.catalog().find_exam(exam_id).await?;
    if let (Some(snapshot), true) = (&snapshot, ttl > 0) {
        if let Err(err) = state.redis().set_json(&cache_key, snapshot, ttl).await {
            tracing::warn!(exam_id, error = %err, "Exam snapshot cache write failed");
        }
    }
    Ok(snapshot)
}

pub(crate) async fn start_attempt(
    state: &AppState,
    key: &AttemptKey,
    metadata: SessionMetadata,
) -> Result<StartOutcome, AttemptError> {
    let exam = load_exam_snapshot(state, &key.exam_id)
        .await?
        .ok_or(AttemptError::ExamNotFound)?;
    if !exam.exam.status.accepts_attempts() {
        return Err(AttemptError::ExamUnavailable);
    }

    let fresh_id = Uuid::new_v4().to_string();
    let policy = deadline_policy(state);
    let now = OffsetDateTime::now_utc();
    let transition_key = key.clone();
    let exam_row = exam.exam.clone();
    let fresh = NewAttempt { id: fresh_id.clone(), metadata };

    let attempt = state
        .attempts()
        .mutate(
            key,
            Box::new(move |current| {
                attempt_lifecycle::start(current, &transition_key, &exam_row, policy, fresh, now)
            }),
        )
        .await?;

    let resumed = attempt.id != fresh_id;
    if resumed {
        tracing::info!(attempt_id = %attempt.id, student_id = %key.student_id, exam_id = %key.exam_id, "Attempt resumed");
    } else {
        metrics::counter!(app_metrics::ATTEMPTS_STARTED).increment(1);
        tracing::info!(attempt_id = %attempt.id, student_id = %key.student_id, exam_id = %key.exam_id, "Attempt started");
        state.activity().emit(ActivityEvent::AttemptStarted {
            attempt_id: attempt.id.clone(),
            student_id: key.student_id.clone(),
            exam_id: key.exam_id.clone(),
        });
    }

    Ok(StartOutcome { attempt, exam, resumed })
}

pub(crate) async fn get_session(
    state: &AppState,
    key: &AttemptKey,
) -> Result<(Attempt, ExamSnapshot), AttemptError> {
    let attempt = state.attempts().find(key).await?.ok_or(AttemptError::NoActiveSession)?;
    if attempt.is_completed() {
        return Err(AttemptError::AlreadySubmitted);
    }
    let exam = load_exam_snapshot(state, &key.exam_id)
        .await?
        .ok_or(AttemptError::ExamNotFound)?;
    Ok((attempt, exam))
}

pub(crate) async fn save_answer(
    state: &AppState,
    key: &AttemptKey,
    input: AnswerInput,
) -> Result<Attempt, AttemptError> {
    let policy = deadline_policy(state);
    let now = OffsetDateTime::now_utc();
    let question_id = input.question_id.clone();

    let attempt = state
        .attempts()
        .mutate(
            key,
            Box::new(move |current| attempt_lifecycle::save_answer(current, input, policy, now)),
        )
        .await?;

    metrics::counter!(app_metrics::ANSWERS_SAVED).increment(1);
    tracing::debug!(attempt_id = %attempt.id, question_id = %question_id, "Answer saved");
    Ok(attempt)
}

pub(crate) async fn report_violation(
    state: &AppState,
    key: &AttemptKey,
    input: ViolationInput,
) -> Result<Attempt, AttemptError> {
    let now = OffsetDateTime::now_utc();
    let violation_type = input.violation_type.clone();
    let severity = input.severity;

    let attempt = state
        .attempts()
        .mutate(key, Box::new(move |current| attempt_lifecycle::report_violation(current, input, now)))
        .await?;

    metrics::counter!(app_metrics::VIOLATIONS_REPORTED, "severity" => severity.as_str())
        .increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        violation_type = %violation_type,
        severity = severity.as_str(),
        total = attempt.violations.len(),
        "Violation recorded"
    );
    state.activity().emit(ActivityEvent::ViolationReported {
        attempt_id: attempt.id.clone(),
        violation_type,
        severity: severity.as_str(),
    });
    Ok(attempt)
}

/// Grades and closes the attempt. A repeat call recomputes the summary from
/// the stored ledger without writing.
pub(crate) async fn submit_attempt(
    state: &AppState,
    key: &AttemptKey,
    explicit: Option<Vec<AnswerInput>>,
    trigger: SubmitTrigger,
) -> Result<SubmitOutcome, AttemptError> {
    let policy = deadline_policy(state);
    let has_explicit = explicit.as_ref().is_some_and(|inputs| !inputs.is_empty());

    for try_number in 1..=SUBMIT_MAX_TRIES {
        let current = state.attempts().find(key).await?.ok_or(AttemptError::NoActiveSession)?;
        if current.is_completed() {
            return Ok(resubmission(current, has_explicit));
        }

        let now = OffsetDateTime::now_utc();
        let (answers, explicit_answers_ignored) =
            attempt_lifecycle::plan_answers(&current, explicit.clone(), policy, now);
        if explicit_answers_ignored {
            tracing::warn!(attempt_id = %current.id, "Explicit answers arrived after the grace window; grading the saved ledger");
        }
        let questions = state
            .catalog()
            .find_questions(&key.exam_id, &answer_ledger::question_ids(&answers))
            .await?;
        let plan = SubmitPlan { expected_version: current.version, answers, questions };

        let result = state
            .attempts()
            .mutate(key, Box::new(move |current| attempt_lifecycle::submit(current, plan, now)))
            .await;

        match result {
            Ok(attempt) => {
                let totals = grading_status::aggregate(&attempt.answers);
                record_submission(state, &attempt, totals, trigger);
                return Ok(SubmitOutcome {
                    attempt,
                    totals,
                    already_submitted: false,
                    explicit_answers_ignored,
                });
            }
            Err(AttemptError::StaleLedger) => {
                tracing::debug!(attempt_id = %current.id, try_number, "Ledger moved during submit; retrying");
            }
            Err(AttemptError::AlreadySubmitted) => {
                let attempt =
                    state.attempts().find(key).await?.ok_or(AttemptError::NoActiveSession)?;
                return Ok(resubmission(attempt, has_explicit));
            }
            Err(err) => return Err(err),
        }
    }

    tracing::warn!(student_id = %key.student_id, exam_id = %key.exam_id, "Submit gave up after repeated ledger changes");
    Err(AttemptError::StaleLedger)
}

/// Explicit answers sent with a repeat submit never reach the frozen ledger.
fn resubmission(attempt: Attempt, explicit_sent: bool) -> SubmitOutcome {
    let totals = grading_status::aggregate(&attempt.answers);
    SubmitOutcome {
        attempt,
        totals,
        already_submitted: true,
        explicit_answers_ignored: explicit_sent,
    }
}

fn record_submission(
    state: &AppState,
    attempt: &Attempt,
    totals: AttemptAggregate,
    trigger: SubmitTrigger,
) {
    for question_id in grading::unresolved_question_ids(&attempt.answers) {
        tracing::warn!(attempt_id = %attempt.id, question_id, "Question unresolvable at submission; excluded from scoring");
    }

    metrics::counter!(
        app_metrics::ATTEMPTS_SUBMITTED,
        "grading_status" => totals.grading_status.as_str()
    )
    .increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        trigger = trigger.as_str(),
        score = totals.score,
        total_marks = totals.total_marks,
        percentage = totals.percentage,
        grading_status = totals.grading_status.as_str(),
        "Attempt submitted"
    );
    state.activity().emit(ActivityEvent::AttemptSubmitted {
        attempt_id: attempt.id.clone(),
        student_id: attempt.student_id.clone(),
        exam_id: attempt.exam_id.clone(),
        trigger: trigger.as_str(),
        score: totals.score,
        total_marks: totals.total_marks,
        percentage: totals.percentage,
        grading_status: totals.grading_status.as_str(),
    });
}

pub(crate) async fn find_attempt(state: &AppState, attempt_id: &str) -> Result<Attempt, AttemptError> {
    state.attempts().find_by_id(attempt_id).await?.ok_or(AttemptError::AttemptNotFound)
}

pub(crate) async fn grade_answer(
    state: &AppState,
    attempt_id: &str,
    grade: ManualGrade,
) -> Result<Attempt, AttemptError> {
    let existing = find_attempt(state, attempt_id).await?;
    let was_complete = existing.grading_status == Some(GradingStatus::Complete);
    let key = AttemptKey::of(&existing);
    let expected_id = existing.id.clone();
    let question_id = grade.question_id.clone();
    let grader_id = grade.grader_id.clone();
    let now = OffsetDateTime::now_utc();

    let attempt = state
        .attempts()
        .mutate(
            &key,
            Box::new(move |current| {
                let current = current.filter(|attempt| attempt.id == expected_id);
                grading_status::apply_manual_grade(current, grade, now)
            }),
        )
        .await?;

    metrics::counter!(app_metrics::MANUAL_GRADES).increment(1);
    tracing::info!(
        attempt_id = %attempt.id,
        question_id = %question_id,
        grader_id = %grader_id,
        "Answer graded manually"
    );

    if !was_complete && attempt.grading_status == Some(GradingStatus::Complete) {
        state.activity().emit(ActivityEvent::AttemptGraded {
            attempt_id: attempt.id.clone(),
            student_id: attempt.student_id.clone(),
            exam_id: attempt.exam_id.clone(),
            score: attempt.score.unwrap_or(0.0),
            percentage: attempt.percentage.unwrap_or(0),
        });
    }
    Ok(attempt)
}

/// Auto-submits in-progress attempts whose grace window has closed.
pub(crate) async fn finalize_overdue(state: &AppState) -> Result<usize, AttemptError> {
    let policy = deadline_policy(state);
    if !policy.enforce {
        return Ok(0);
    }

    let cutoff = attempt_timing::overdue_cutoff(policy, to_primitive_utc(OffsetDateTime::now_utc()));
    let batch = state.settings().attempt().overdue_batch_size;
    let overdue = state.attempts().list_overdue(cutoff, batch).await?;

    let mut finalized = 0;
    for key in overdue {
        match submit_attempt(state, &key, None, SubmitTrigger::Deadline).await {
            Ok(outcome) if !outcome.already_submitted => finalized += 1,
            Ok(_) => {}
            Err(err) => {
                tracing::error!(
                    student_id = %key.student_id,
                    exam_id = %key.exam_id,
                    error = %err,
                    "Failed to finalize overdue attempt"
                );
            }
        }
    }
    Ok(finalized)
}
