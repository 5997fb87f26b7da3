use axum::http::HeaderMap;
use time::OffsetDateTime;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::core::time::{format_offset, format_primitive, to_primitive_utc};
use crate::db::models::{Attempt, ExamSnapshot};
use crate::schemas::attempt::{
    AttemptDetailResponse, AttemptSessionResponse, ExamSnapshotResponse, GradingStatusResponse,
    SavedAnswerResponse, StudentQuestionResponse, SubmitSummaryResponse, ViolationListResponse,
};
use crate::services::attempt_flow::SubmitOutcome;
use crate::services::attempt_timing;
use crate::services::grading;
use crate::services::grading_status;
use crate::services::violation_log;

pub(crate) fn validate_payload(payload: &impl Validate) -> Result<(), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// First hop of `x-forwarded-for`, then `x-real-ip`.
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };
    forwarded.or_else(real_ip).map(str::to_string)
}

pub(crate) fn user_agent(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::USER_AGENT).and_then(|value| value.to_str().ok())
}

pub(crate) fn student_exam_view(snapshot: &ExamSnapshot) -> ExamSnapshotResponse {
    let exam = &snapshot.exam;
    ExamSnapshotResponse {
        id: exam.id.clone(),
        title: exam.title.clone(),
        instructions: exam.instructions.clone(),
        duration_minutes: exam.duration_minutes,
        total_marks: exam.total_marks,
        status: exam.status,
        questions: snapshot
            .questions
            .iter()
            .map(|question| StudentQuestionResponse {
                id: question.id.clone(),
                question_type: question.question_type.clone(),
                prompt: question.prompt.clone(),
                options: question.options.as_ref().map(|options| options.0.clone()),
                marks: question.marks,
            })
            .collect(),
    }
}

pub(crate) fn session_view(attempt: &Attempt, now: OffsetDateTime) -> AttemptSessionResponse {
    AttemptSessionResponse {
        id: attempt.id.clone(),
        exam_id: attempt.exam_id.clone(),
        status: attempt.status,
        started_at: format_primitive(attempt.started_at),
        deadline_at: attempt.deadline_at.map(format_primitive),
        remaining_seconds: attempt_timing::remaining_seconds(
            attempt.deadline_at,
            to_primitive_utc(now),
        ),
        total_time_spent: attempt.total_time_spent,
        answers: attempt
            .answers
            .iter()
            .map(|answer| SavedAnswerResponse {
                question_id: answer.question_id.clone(),
                answer: answer.answer.clone(),
                time_spent: answer.time_spent,
                answered_at: format_offset(answer.answered_at),
            })
            .collect(),
        violation_count: attempt.violations.len(),
    }
}

pub(crate) fn submit_summary(outcome: &SubmitOutcome) -> SubmitSummaryResponse {
    let attempt = &outcome.attempt;
    let totals = outcome.totals;
    SubmitSummaryResponse {
        attempt_id: attempt.id.clone(),
        status: attempt.status,
        submitted_at: attempt.submitted_at.map(format_primitive),
        score: totals.score,
        total_marks: totals.total_marks,
        percentage: totals.percentage,
        auto_graded_score: totals.auto_graded_score,
        pending_manual_marks: totals.pending_manual_marks,
        grading_status: totals.grading_status,
        violation_count: attempt.violations.len(),
        answer_counts: grading_status::answer_counts_by_type(&attempt.answers),
        grading: grading_status::breakdown(&attempt.answers),
        unresolved_questions: grading::unresolved_question_ids(&attempt.answers).len(),
        already_submitted: outcome.already_submitted,
        explicit_answers_ignored: outcome.explicit_answers_ignored,
    }
}

pub(crate) fn attempt_detail(attempt: Attempt) -> AttemptDetailResponse {
    AttemptDetailResponse {
        id: attempt.id,
        student_id: attempt.student_id,
        exam_id: attempt.exam_id,
        status: attempt.status,
        started_at: format_primitive(attempt.started_at),
        submitted_at: attempt.submitted_at.map(format_primitive),
        graded_at: attempt.graded_at.map(format_primitive),
        deadline_at: attempt.deadline_at.map(format_primitive),
        total_time_spent: attempt.total_time_spent,
        score: attempt.score,
        total_marks: attempt.total_marks,
        percentage: attempt.percentage,
        auto_graded_score: attempt.auto_graded_score,
        pending_manual_marks: attempt.pending_manual_marks,
        grading_status: attempt.grading_status,
        answers: attempt.answers.0,
        violations: attempt.violations.0,
        ip_address: attempt.ip_address,
        user_agent: attempt.user_agent,
        fingerprint_hash: attempt.fingerprint_hash,
    }
}

pub(crate) fn grading_status_view(attempt: &Attempt) -> GradingStatusResponse {
    GradingStatusResponse {
        attempt_id: attempt.id.clone(),
        status: attempt.status,
        grading_status: attempt.grading_status,
        breakdown: grading_status::breakdown(&attempt.answers),
        score: attempt.score,
        total_marks: attempt.total_marks,
        percentage: attempt.percentage,
        auto_graded_score: attempt.auto_graded_score,
        pending_manual_marks: attempt.pending_manual_marks,
    }
}

pub(crate) fn violation_list(attempt: &Attempt) -> ViolationListResponse {
    ViolationListResponse {
        attempt_id: attempt.id.clone(),
        total: attempt.violations.len(),
        by_severity: violation_log::count_by_severity(&attempt.violations),
        violations: violation_log::ordered(&attempt.violations).into_iter().cloned().collect(),
    }
}
