use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::attempts::helpers;
use crate::api::errors::ApiError;
use crate::api::guards::CurrentGrader;
use crate::core::state::AppState;
use crate::schemas::attempt::{
    AttemptDetailResponse, GradingStatusResponse, ManualGradeRequest, ViolationListResponse,
};
use crate::services::attempt_flow;
use crate::services::grading_status::ManualGrade;

pub(super) async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentGrader(_grader): CurrentGrader,
    State(state): State<AppState>,
) -> Result<Json<AttemptDetailResponse>, ApiError> {
    let attempt = attempt_flow::find_attempt(&state, &attempt_id).await?;
    Ok(Json(helpers::attempt_detail(attempt)))
}

pub(super) async fn grading_status(
    Path(attempt_id): Path<String>,
    CurrentGrader(_grader): CurrentGrader,
    State(state): State<AppState>,
) -> Result<Json<GradingStatusResponse>, ApiError> {
    let attempt = attempt_flow::find_attempt(&state, &attempt_id).await?;
    Ok(Json(helpers::grading_status_view(&attempt)))
}

pub(super) async fn grade_answer(
    Path((attempt_id, question_id)): Path<(String, String)>,
    CurrentGrader(grader): CurrentGrader,
    State(state): State<AppState>,
    Json(payload): Json<ManualGradeRequest>,
) -> Result<Json<GradingStatusResponse>, ApiError> {
    helpers::validate_payload(&payload)?;

    let attempt = attempt_flow::grade_answer(
        &state,
        &attempt_id,
        ManualGrade {
            question_id,
            score: payload.score,
            feedback: payload.feedback,
            grader_id: grader.id,
        },
    )
    .await?;

    Ok(Json(helpers::grading_status_view(&attempt)))
}

pub(super) async fn list_violations(
    Path(attempt_id): Path<String>,
    CurrentGrader(_grader): CurrentGrader,
    State(state): State<AppState>,
) -> Result<Json<ViolationListResponse>, ApiError> {
    let attempt = attempt_flow::find_attempt(&state, &attempt_id).await?;
    Ok(Json(helpers::violation_list(&attempt)))
}
