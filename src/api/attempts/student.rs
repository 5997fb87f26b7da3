use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use time::OffsetDateTime;

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::state::AppState;
use crate::repositories::store::AttemptKey;
use crate::schemas::attempt::{
    ReportViolationRequest, SaveAnswerRequest, SaveAnswerResponse, SessionResponse,
    StartAttemptRequest, StartAttemptResponse, SubmitAttemptRequest, SubmitSummaryResponse,
    ViolationAckResponse,
};
use crate::services::answer_ledger::AnswerInput;
use crate::services::attempt_flow::{self, SubmitTrigger};
use crate::services::session_metadata::SessionMetadata;
use crate::services::violation_log::ViolationInput;

pub(super) async fn start_attempt(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Option<Json<StartAttemptRequest>>,
) -> Result<Json<StartAttemptResponse>, ApiError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    helpers::validate_payload(&payload)?;

    let ip = helpers::client_ip(&headers);
    let metadata = SessionMetadata::capture(
        ip.as_deref(),
        helpers::user_agent(&headers),
        payload.client_fingerprint.as_deref(),
    );
    let key = AttemptKey::new(student.id, exam_id);
    let outcome = attempt_flow::start_attempt(&state, &key, metadata).await?;

    Ok(Json(StartAttemptResponse {
        resumed: outcome.resumed,
        attempt: helpers::session_view(&outcome.attempt, OffsetDateTime::now_utc()),
        exam: helpers::student_exam_view(&outcome.exam),
    }))
}

pub(super) async fn get_session(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let key = AttemptKey::new(student.id, exam_id);
    let (attempt, exam) = attempt_flow::get_session(&state, &key).await?;

    Ok(Json(SessionResponse {
        attempt: helpers::session_view(&attempt, OffsetDateTime::now_utc()),
        exam: helpers::student_exam_view(&exam),
    }))
}

pub(super) async fn save_answer(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswerRequest>,
) -> Result<Json<SaveAnswerResponse>, ApiError> {
    helpers::validate_payload(&payload)?;

    let key = AttemptKey::new(student.id, exam_id);
    let question_id = payload.question_id.clone();
    let attempt = attempt_flow::save_answer(
        &state,
        &key,
        AnswerInput {
            question_id: payload.question_id,
            answer: payload.answer,
            time_spent: payload.time_spent,
        },
    )
    .await?;

    Ok(Json(SaveAnswerResponse {
        saved: true,
        question_id,
        answered_count: attempt.answers.len(),
        total_time_spent: attempt.total_time_spent,
    }))
}

pub(super) async fn submit_attempt(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    payload: Option<Json<SubmitAttemptRequest>>,
) -> Result<Json<SubmitSummaryResponse>, ApiError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    helpers::validate_payload(&payload)?;

    let explicit = (!payload.answers.is_empty()).then(|| {
        payload
            .answers
            .into_iter()
            .map(|answer| AnswerInput {
                question_id: answer.question_id,
                answer: answer.answer,
                time_spent: answer.time_spent,
            })
            .collect()
    });

    let key = AttemptKey::new(student.id, exam_id);
    let outcome =
        attempt_flow::submit_attempt(&state, &key, explicit, SubmitTrigger::Student).await?;

    Ok(Json(helpers::submit_summary(&outcome)))
}

pub(super) async fn report_violation(
    Path(exam_id): Path<String>,
    CurrentStudent(student): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<ReportViolationRequest>,
) -> Result<Json<ViolationAckResponse>, ApiError> {
    helpers::validate_payload(&payload)?;

    let key = AttemptKey::new(student.id, exam_id);
    let attempt = attempt_flow::report_violation(
        &state,
        &key,
        ViolationInput {
            violation_type: payload.violation_type,
            description: payload.description,
            severity: payload.severity,
            timestamp: payload.timestamp,
        },
    )
    .await?;

    Ok(Json(ViolationAckResponse { recorded: true, violation_count: attempt.violations.len() }))
}
