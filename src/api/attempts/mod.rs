pub(crate) mod helpers;
mod instructor;
mod student;

use axum::{routing::get, routing::patch, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        // Student endpoints, keyed by (caller, exam)
        .route("/exams/:exam_id/attempt/start", post(student::start_attempt))
        .route("/exams/:exam_id/attempt/session", get(student::get_session))
        .route("/exams/:exam_id/attempt/answer", patch(student::save_answer))
        .route("/exams/:exam_id/attempt/submit", post(student::submit_attempt))
        .route("/exams/:exam_id/attempt/violations", post(student::report_violation))
        // Instructor endpoints
        .route("/attempts/:attempt_id", get(instructor::get_attempt))
        .route("/attempts/:attempt_id/grading-status", get(instructor::grading_status))
        .route(
            "/attempts/:attempt_id/answers/:question_id/grade",
            post(instructor::grade_answer),
        )
        .route("/attempts/:attempt_id/violations", get(instructor::list_violations))
}

#[cfg(test)]
mod tests;
