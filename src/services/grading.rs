use std::collections::HashMap;

use time::OffsetDateTime;

use crate::db::models::{Answer, Question};
use crate::db::types::{AnswerGradingStatus, QuestionType};

pub(crate) const FEEDBACK_CORRECT: &str = "Correct answer";
pub(crate) const FEEDBACK_INCORRECT: &str = "Incorrect answer";
pub(crate) const FEEDBACK_PENDING: &str = "Awaiting manual grading";

/// Decorates every answer whose question still resolves. Answers whose
/// question is gone stay undecorated and are left out of every total.
pub(crate) fn grade_answers(
    answers: Vec<Answer>,
    questions: &HashMap<String, Question>,
    now: OffsetDateTime,
) -> Vec<Answer> {
    answers
        .into_iter()
        .map(|answer| match questions.get(&answer.question_id) {
            Some(question) => grade_answer(answer, question, now),
            None => answer,
        })
        .collect()
}

pub(crate) fn grade_answer(mut answer: Answer, question: &Question, now: OffsetDateTime) -> Answer {
    let max_score = question.marks.max(0.0);
    answer.question_type = Some(question.question_type.clone());
    answer.correct_answer = Some(question.correct_answer.0.clone());
    answer.max_score = Some(max_score);
    answer.graded_by = None;

    if QuestionType::from_label(&question.question_type).is_auto_gradable() {
        // Exact JSON equality: "B" != "b", true != "true".
        let correct = answer.answer == question.correct_answer.0;
        answer.score = Some(if correct { max_score } else { 0.0 });
        answer.grading_status = Some(AnswerGradingStatus::AutoGraded);
        answer.feedback =
            Some(if correct { FEEDBACK_CORRECT } else { FEEDBACK_INCORRECT }.to_string());
        answer.graded_at = Some(now);
    } else {
        answer.score = Some(0.0);
        answer.grading_status = Some(AnswerGradingStatus::PendingManualGrading);
        answer.feedback = Some(FEEDBACK_PENDING.to_string());
        answer.graded_at = None;
    }
    answer
}

/// Answers the engine could not resolve at submission time.
pub(crate) fn unresolved_question_ids(answers: &[Answer]) -> Vec<&str> {
    answers
        .iter()
        .filter(|answer| answer.grading_status.is_none())
        .map(|answer| answer.question_id.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::types::Json;
    use time::macros::datetime;

    fn question(id: &str, kind: &str, correct: serde_json::Value, marks: f64) -> Question {
        Question {
            id: id.to_string(),
            question_type: kind.to_string(),
            prompt: format!("prompt {id}"),
            options: None,
            correct_answer: Json(correct),
            marks,
        }
    }

    fn answer(id: &str, value: serde_json::Value) -> Answer {
        Answer::raw(id.to_string(), value, 10, datetime!(2026-03-01 10:00:00 UTC))
    }

    #[test]
    fn objective_questions_score_on_exact_match() {
        let now = datetime!(2026-03-01 11:00:00 UTC);
        let mcq = question("q1", "mcq", json!("B"), 10.0);

        let right = grade_answer(answer("q1", json!("B")), &mcq, now);
        assert_eq!(right.score, Some(10.0));
        assert_eq!(right.grading_status, Some(AnswerGradingStatus::AutoGraded));
        assert_eq!(right.feedback.as_deref(), Some(FEEDBACK_CORRECT));
        assert_eq!(right.correct_answer, Some(json!("B")));

        let wrong = grade_answer(answer("q1", json!("b")), &mcq, now);
        assert_eq!(wrong.score, Some(0.0));
        assert_eq!(wrong.feedback.as_deref(), Some(FEEDBACK_INCORRECT));

        let truefalse = question("q2", "truefalse", json!(true), 2.0);
        assert_eq!(grade_answer(answer("q2", json!("true")), &truefalse, now).score, Some(0.0));
        assert_eq!(grade_answer(answer("q2", json!(true)), &truefalse, now).score, Some(2.0));
    }

    #[test]
    fn free_text_and_unknown_types_wait_for_a_human() {
        let now = datetime!(2026-03-01 11:00:00 UTC);
        for kind in ["short", "long", "essay"] {
            let graded =
                grade_answer(answer("q1", json!("text")), &question("q1", kind, json!(null), 5.0), now);
            assert_eq!(graded.score, Some(0.0));
            assert_eq!(graded.max_score, Some(5.0));
            assert_eq!(graded.grading_status, Some(AnswerGradingStatus::PendingManualGrading));
            assert_eq!(graded.graded_at, None);
        }
    }

    #[test]
    fn missing_questions_stay_undecorated() {
        let now = datetime!(2026-03-01 11:00:00 UTC);
        let mut questions = HashMap::new();
        questions.insert("q1".to_string(), question("q1", "mcq", json!("A"), 1.0));

        let graded =
            grade_answers(vec![answer("q1", json!("A")), answer("gone", json!("A"))], &questions, now);
        assert_eq!(graded.len(), 2);
        assert_eq!(graded[1], answer("gone", json!("A")));
        assert_eq!(unresolved_question_ids(&graded), vec!["gone"]);
    }
}
