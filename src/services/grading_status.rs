use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::core::time::to_primitive_utc;
use crate::db::models::{Answer, Attempt};
use crate::db::types::{AnswerGradingStatus, GradingStatus};
use crate::services::attempt_lifecycle::AttemptError;

pub(crate) const FEEDBACK_MANUAL_DEFAULT: &str = "Graded manually";

/// Attempt-level totals. Submit and manual grading both derive them here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct AttemptAggregate {
    pub(crate) score: f64,
    pub(crate) total_marks: f64,
    pub(crate) percentage: i32,
    pub(crate) auto_graded_score: f64,
    pub(crate) pending_manual_marks: f64,
    pub(crate) grading_status: GradingStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct GradingBreakdown {
    pub(crate) auto_graded: usize,
    pub(crate) manually_graded: usize,
    pub(crate) pending_manual_grading: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct ManualGrade {
    pub(crate) question_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) grader_id: String,
}

pub(crate) fn aggregate(answers: &[Answer]) -> AttemptAggregate {
    let mut total_marks = 0.0;
    let mut score = 0.0;
    let mut auto_graded_score = 0.0;
    let mut pending_manual_marks = 0.0;
    let mut pending = false;

    for answer in answers {
        let (Some(status), Some(max_score)) = (answer.grading_status, answer.max_score) else {
            continue;
        };
        total_marks += max_score;
        let earned = answer.score.unwrap_or(0.0);
        match status {
            AnswerGradingStatus::AutoGraded => {
                score += earned;
                auto_graded_score += earned;
            }
            AnswerGradingStatus::ManuallyGraded => score += earned,
            AnswerGradingStatus::PendingManualGrading => {
                pending = true;
                pending_manual_marks += max_score;
            }
        }
    }

    AttemptAggregate {
        score,
        total_marks,
        percentage: percentage(score, total_marks),
        auto_graded_score,
        pending_manual_marks,
        grading_status: if pending { GradingStatus::Partial } else { GradingStatus::Complete },
    }
}

pub(crate) fn percentage(score: f64, total_marks: f64) -> i32 {
    if total_marks <= 0.0 {
        return 0;
    }
    (score / total_marks * 100.0).round() as i32
}

pub(crate) fn breakdown(answers: &[Answer]) -> GradingBreakdown {
    answers.iter().fold(GradingBreakdown::default(), |mut counts, answer| {
        match answer.grading_status {
            Some(AnswerGradingStatus::AutoGraded) => counts.auto_graded += 1,
            Some(AnswerGradingStatus::ManuallyGraded) => counts.manually_graded += 1,
            Some(AnswerGradingStatus::PendingManualGrading) => counts.pending_manual_grading += 1,
            None => {}
        }
        counts
    })
}

/// Answer counts keyed by question type; unresolved answers count under `unresolved`.
pub(crate) fn answer_counts_by_type(answers: &[Answer]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for answer in answers {
        let label = answer
            .question_type
            .as_deref()
            .map(|label| label.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "unresolved".to_string());
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Copies the aggregate onto the attempt. `graded_at` is stamped the first
/// time the attempt is fully graded.
pub(crate) fn apply_aggregate(attempt: &mut Attempt, totals: AttemptAggregate, now: OffsetDateTime) {
    attempt.score = Some(totals.score);
    attempt.total_marks = Some(totals.total_marks);
    attempt.percentage = Some(totals.percentage);
    attempt.auto_graded_score = Some(totals.auto_graded_score);
    attempt.pending_manual_marks = Some(totals.pending_manual_marks);
    attempt.grading_status = Some(totals.grading_status);
    attempt.graded_at = match totals.grading_status {
        GradingStatus::Complete => attempt.graded_at.or(Some(to_primitive_utc(now))),
        GradingStatus::Partial => None,
    };
}

pub(crate) fn apply_manual_grade(
    current: Option<Attempt>,
    grade: ManualGrade,
    now: OffsetDateTime,
) -> Result<Attempt, AttemptError> {
    let mut attempt = current.ok_or(AttemptError::AttemptNotFound)?;
    if !attempt.is_completed() {
        return Err(AttemptError::NotSubmitted);
    }

    let answer = attempt
        .answers
        .0
        .iter_mut()
        .find(|answer| answer.question_id == grade.question_id)
        .ok_or_else(|| AttemptError::AnswerNotFound(grade.question_id.clone()))?;

    let max_score = match (answer.grading_status, answer.max_score) {
        (
            Some(AnswerGradingStatus::PendingManualGrading | AnswerGradingStatus::ManuallyGraded),
            Some(max_score),
        ) => max_score,
        _ => return Err(AttemptError::NotManuallyGradable(grade.question_id)),
    };
    if !grade.score.is_finite() || grade.score < 0.0 || grade.score > max_score {
        return Err(AttemptError::ScoreOutOfRange { max: max_score });
    }

    answer.score = Some(grade.score);
    answer.grading_status = Some(AnswerGradingStatus::ManuallyGraded);
    answer.feedback = Some(grade.feedback.unwrap_or_else(|| FEEDBACK_MANUAL_DEFAULT.to_string()));
    answer.graded_by = Some(grade.grader_id);
    answer.graded_at = Some(now);

    let totals = aggregate(&attempt.answers);
    apply_aggregate(&mut attempt, totals, now);
    attempt.version += 1;
    attempt.updated_at = to_primitive_utc(now);
    Ok(attempt)
}
