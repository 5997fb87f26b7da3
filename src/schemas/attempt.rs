use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::db::models::{Answer, Violation};
use crate::db::types::{AttemptStatus, ExamStatus, GradingStatus, ViolationSeverity};
use crate::services::grading_status::GradingBreakdown;
use crate::services::violation_log::SeverityCounts;

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct StartAttemptRequest {
    #[serde(default)]
    #[validate(length(max = 1024, message = "client_fingerprint is too long"))]
    pub(crate) client_fingerprint: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SaveAnswerRequest {
    #[validate(length(min = 1, max = 128, message = "question_id is required"))]
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent must be non-negative"))]
    pub(crate) time_spent: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct SubmittedAnswer {
    #[validate(length(min = 1, max = 128, message = "question_id is required"))]
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
    #[serde(default)]
    #[validate(range(min = 0, message = "time_spent must be non-negative"))]
    pub(crate) time_spent: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub(crate) struct SubmitAttemptRequest {
    #[serde(default)]
    #[validate(nested)]
    pub(crate) answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ReportViolationRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 64, message = "type is required"))]
    pub(crate) violation_type: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "description is too long"))]
    pub(crate) description: String,
    pub(crate) severity: ViolationSeverity,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub(crate) timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ManualGradeRequest {
    #[validate(range(min = 0.0, message = "score must be non-negative"))]
    pub(crate) score: f64,
    #[serde(default)]
    #[validate(length(max = 4000, message = "feedback is too long"))]
    pub(crate) feedback: Option<String>,
}

/// Question as shown to a student: no correct answer.
#[derive(Debug, Serialize)]
pub(crate) struct StudentQuestionResponse {
    pub(crate) id: String,
    pub(crate) question_type: String,
    pub(crate) prompt: String,
    pub(crate) options: Option<serde_json::Value>,
    pub(crate) marks: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ExamSnapshotResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) instructions: Option<String>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_marks: f64,
    pub(crate) status: ExamStatus,
    pub(crate) questions: Vec<StudentQuestionResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedAnswerResponse {
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
    pub(crate) time_spent: i64,
    pub(crate) answered_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSessionResponse {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) deadline_at: Option<String>,
    pub(crate) remaining_seconds: Option<i64>,
    pub(crate) total_time_spent: i64,
    pub(crate) answers: Vec<SavedAnswerResponse>,
    pub(crate) violation_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct StartAttemptResponse {
    pub(crate) resumed: bool,
    pub(crate) attempt: AttemptSessionResponse,
    pub(crate) exam: ExamSnapshotResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) attempt: AttemptSessionResponse,
    pub(crate) exam: ExamSnapshotResponse,
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveAnswerResponse {
    pub(crate) saved: bool,
    pub(crate) question_id: String,
    pub(crate) answered_count: usize,
    pub(crate) total_time_spent: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViolationAckResponse {
    pub(crate) recorded: bool,
    pub(crate) violation_count: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitSummaryResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: i32,
    pub(crate) auto_graded_score: f64,
    pub(crate) pending_manual_marks: f64,
    pub(crate) grading_status: GradingStatus,
    pub(crate) violation_count: usize,
    pub(crate) answer_counts: BTreeMap<String, usize>,
    pub(crate) grading: GradingBreakdown,
    pub(crate) unresolved_questions: usize,
    pub(crate) already_submitted: bool,
    pub(crate) explicit_answers_ignored: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptDetailResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) graded_at: Option<String>,
    pub(crate) deadline_at: Option<String>,
    pub(crate) total_time_spent: i64,
    pub(crate) score: Option<f64>,
    pub(crate) total_marks: Option<f64>,
    pub(crate) percentage: Option<i32>,
    pub(crate) auto_graded_score: Option<f64>,
    pub(crate) pending_manual_marks: Option<f64>,
    pub(crate) grading_status: Option<GradingStatus>,
    pub(crate) answers: Vec<Answer>,
    pub(crate) violations: Vec<Violation>,
    pub(crate) ip_address: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) fingerprint_hash: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GradingStatusResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) grading_status: Option<GradingStatus>,
    #[serde(flatten)]
    pub(crate) breakdown: GradingBreakdown,
    pub(crate) score: Option<f64>,
    pub(crate) total_marks: Option<f64>,
    pub(crate) percentage: Option<i32>,
    pub(crate) auto_graded_score: Option<f64>,
    pub(crate) pending_manual_marks: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ViolationListResponse {
    pub(crate) attempt_id: String,
    pub(crate) total: usize,
    pub(crate) by_severity: SeverityCounts,
    pub(crate) violations: Vec<Violation>,
}
