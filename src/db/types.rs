use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "examstatus", rename_all = "lowercase")]
pub(crate) enum ExamStatus {
    Draft,
    Published,
    Active,
    Completed,
    Archived,
}

impl ExamStatus {
    pub(crate) fn accepts_attempts(self) -> bool {
        matches!(self, ExamStatus::Published | ExamStatus::Active)
    }
}

/// `not_started` is never stored: it is the absence of an attempt row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "attemptstatus", rename_all = "snake_case")]
pub(crate) enum AttemptStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "gradingstatus", rename_all = "lowercase")]
pub(crate) enum GradingStatus {
    Complete,
    Partial,
}

impl GradingStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GradingStatus::Complete => "complete",
            GradingStatus::Partial => "partial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum AnswerGradingStatus {
    AutoGraded,
    PendingManualGrading,
    ManuallyGraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ViolationSeverity {
    Low,
    Medium,
    High,
}

impl ViolationSeverity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ViolationSeverity::Low => "low",
            ViolationSeverity::Medium => "medium",
            ViolationSeverity::High => "high",
        }
    }
}

/// Question kinds the grading engine knows. Stored as free text; anything
/// unrecognised lands in `Other` and is routed to a human grader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QuestionType {
    Mcq,
    TrueFalse,
    Short,
    Long,
    Other,
}

impl QuestionType {
    pub(crate) fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "mcq" => QuestionType::Mcq,
            "truefalse" => QuestionType::TrueFalse,
            "short" => QuestionType::Short,
            "long" => QuestionType::Long,
            _ => QuestionType::Other,
        }
    }

    pub(crate) fn is_auto_gradable(self) -> bool {
        matches!(self, QuestionType::Mcq | QuestionType::TrueFalse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_type_labels_are_case_insensitive() {
        assert_eq!(QuestionType::from_label("MCQ"), QuestionType::Mcq);
        assert_eq!(QuestionType::from_label(" truefalse "), QuestionType::TrueFalse);
        assert_eq!(QuestionType::from_label("essay"), QuestionType::Other);
        assert!(!QuestionType::from_label("essay").is_auto_gradable());
    }

    #[test]
    fn only_published_or_active_exams_accept_attempts() {
        assert!(ExamStatus::Published.accepts_attempts());
        assert!(ExamStatus::Active.accepts_attempts());
        assert!(!ExamStatus::Draft.accepts_attempts());
        assert!(!ExamStatus::Archived.accepts_attempts());
    }

    #[test]
    fn statuses_serialize_snake_case() {
        assert_eq!(serde_json::to_value(AttemptStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(
            serde_json::to_value(AnswerGradingStatus::PendingManualGrading).unwrap(),
            "pending_manual_grading"
        );
    }
}
