use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::db::types::{
    AnswerGradingStatus, AttemptStatus, ExamStatus, GradingStatus, ViolationSeverity,
};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) instructions: Option<String>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) total_marks: f64,
    pub(crate) status: ExamStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) question_type: String,
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Option<Json<serde_json::Value>>,
    pub(crate) correct_answer: Json<serde_json::Value>,
    pub(crate) marks: f64,
}

/// Exam plus its ordered question list, as read from the exam catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ExamSnapshot {
    pub(crate) exam: Exam,
    pub(crate) questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Answer {
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
    pub(crate) time_spent: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) answered_at: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) question_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) correct_answer: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) grading_status: Option<AnswerGradingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) graded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
    pub(crate) graded_at: Option<OffsetDateTime>,
}

impl Answer {
    pub(crate) fn raw(
        question_id: String,
        answer: serde_json::Value,
        time_spent: i64,
        answered_at: OffsetDateTime,
    ) -> Self {
        Self {
            question_id,
            answer,
            time_spent,
            answered_at,
            question_type: None,
            correct_answer: None,
            score: None,
            max_score: None,
            grading_status: None,
            feedback: None,
            graded_by: None,
            graded_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Violation {
    #[serde(rename = "type")]
    pub(crate) violation_type: String,
    pub(crate) description: String,
    pub(crate) severity: ViolationSeverity,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) timestamp: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) recorded_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Attempt {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) exam_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
    pub(crate) deadline_at: Option<PrimitiveDateTime>,
    pub(crate) answers: Json<Vec<Answer>>,
    pub(crate) violations: Json<Vec<Violation>>,
    pub(crate) total_time_spent: i64,
    pub(crate) score: Option<f64>,
    pub(crate) total_marks: Option<f64>,
    pub(crate) percentage: Option<i32>,
    pub(crate) auto_graded_score: Option<f64>,
    pub(crate) pending_manual_marks: Option<f64>,
    pub(crate) grading_status: Option<GradingStatus>,
    pub(crate) ip_address: Option<String>,
    pub(crate) user_agent: Option<String>,
    pub(crate) fingerprint_hash: Option<String>,
    pub(crate) version: i64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl Attempt {
    pub(crate) fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }
}
