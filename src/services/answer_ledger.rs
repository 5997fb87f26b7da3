use time::OffsetDateTime;

use crate::db::models::Answer;

/// One answer as sent by the client, before it touches the ledger.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AnswerInput {
    pub(crate) question_id: String,
    pub(crate) answer: serde_json::Value,
    pub(crate) time_spent: Option<i64>,
}

/// Upserts by `question_id`. Returns the seconds added to the attempt total.
///
/// A later save overwrites the value in place and accumulates time, so the
/// ledger keeps first-answered order and never holds two entries for one question.
pub(crate) fn record(ledger: &mut Vec<Answer>, input: AnswerInput, now: OffsetDateTime) -> i64 {
    let delta = input.time_spent.unwrap_or(0).max(0);

    match ledger.iter_mut().find(|entry| entry.question_id == input.question_id) {
        Some(entry) => {
            entry.answer = input.answer;
            entry.time_spent = entry.time_spent.saturating_add(delta);
            entry.answered_at = now;
        }
        None => ledger.push(Answer::raw(input.question_id, input.answer, delta, now)),
    }
    delta
}

/// Picks the answer set to grade: a non-empty explicit set replaces the ledger,
/// anything else falls back to what is already recorded.
pub(crate) fn resolve_submission(
    ledger: &[Answer],
    explicit: Option<Vec<AnswerInput>>,
    now: OffsetDateTime,
) -> Vec<Answer> {
    let explicit = match explicit {
        Some(inputs) if !inputs.is_empty() => inputs,
        _ => return ledger.iter().cloned().map(strip_grading).collect(),
    };

    let mut resolved: Vec<Answer> = Vec::with_capacity(explicit.len());
    for input in explicit {
        let recorded = ledger.iter().find(|entry| entry.question_id == input.question_id);
        let time_spent = input
            .time_spent
            .map(|seconds| seconds.max(0))
            .or_else(|| recorded.map(|entry| entry.time_spent))
            .unwrap_or(0);
        let answered_at = match recorded {
            Some(entry) if entry.answer == input.answer => entry.answered_at,
            _ => now,
        };

        let answer = Answer::raw(input.question_id, input.answer, time_spent, answered_at);
        match resolved.iter_mut().find(|entry| entry.question_id == answer.question_id) {
            Some(slot) => *slot = answer,
            None => resolved.push(answer),
        }
    }
    resolved
}

pub(crate) fn question_ids(answers: &[Answer]) -> Vec<String> {
    answers.iter().map(|answer| answer.question_id.clone()).collect()
}

pub(crate) fn total_time_spent(answers: &[Answer]) -> i64 {
    answers.iter().fold(0_i64, |total, answer| total.saturating_add(answer.time_spent))
}

fn strip_grading(answer: Answer) -> Answer {
    Answer::raw(answer.question_id, answer.answer, answer.time_spent, answer.answered_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn input(question_id: &str, answer: serde_json::Value, time_spent: Option<i64>) -> AnswerInput {
        AnswerInput { question_id: question_id.to_string(), answer, time_spent }
    }

    #[test]
    fn later_save_overwrites_in_place() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut ledger = Vec::new();

        record(&mut ledger, input("q1", json!("A"), Some(20)), now);
        record(&mut ledger, input("q2", json!(true), Some(5)), now);
        let added = record(&mut ledger, input("q1", json!("B"), Some(15)), now);

        assert_eq!(added, 15);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].question_id, "q1");
        assert_eq!(ledger[0].answer, json!("B"));
        assert_eq!(ledger[0].time_spent, 35);
        assert_eq!(total_time_spent(&ledger), 40);
    }

    #[test]
    fn saves_for_different_questions_commute() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut forward = Vec::new();
        record(&mut forward, input("q1", json!("A"), Some(1)), now);
        record(&mut forward, input("q2", json!("B"), Some(2)), now);

        let mut backward = Vec::new();
        record(&mut backward, input("q2", json!("B"), Some(2)), now);
        record(&mut backward, input("q1", json!("A"), Some(1)), now);

        let find = |ledger: &[Answer], id: &str| {
            ledger.iter().find(|entry| entry.question_id == id).cloned()
        };
        assert_eq!(find(&forward, "q1"), find(&backward, "q1"));
        assert_eq!(find(&forward, "q2"), find(&backward, "q2"));
    }

    #[test]
    fn negative_time_is_ignored() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut ledger = Vec::new();
        assert_eq!(record(&mut ledger, input("q1", json!("A"), Some(-30)), now), 0);
        assert_eq!(ledger[0].time_spent, 0);
    }

    #[test]
    fn empty_explicit_set_falls_back_to_ledger() {
        let now = datetime!(2026-03-01 10:00:00 UTC);
        let mut ledger = Vec::new();
        record(&mut ledger, input("q1", json!("A"), Some(10)), now);

        assert_eq!(resolve_submission(&ledger, None, now), ledger);
        assert_eq!(resolve_submission(&ledger, Some(Vec::new()), now), ledger);
    }

    #[test]
    fn explicit_set_replaces_ledger_and_collapses_duplicates() {
        let earlier = datetime!(2026-03-01 10:00:00 UTC);
        let now = datetime!(2026-03-01 10:30:00 UTC);
        let mut ledger = Vec::new();
        record(&mut ledger, input("q1", json!("A"), Some(40)), earlier);
        record(&mut ledger, input("q3", json!("C"), Some(10)), earlier);

        let resolved = resolve_submission(
            &ledger,
            Some(vec![
                input("q1", json!("B"), None),
                input("q2", json!(false), Some(7)),
                input("q1", json!("A"), None),
            ]),
            now,
        );

        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].question_id, "q1");
        assert_eq!(resolved[0].answer, json!("A"));
        assert_eq!(resolved[0].time_spent, 40);
        assert_eq!(resolved[0].answered_at, earlier);
        assert_eq!(resolved[1].question_id, "q2");
        assert_eq!(resolved[1].time_spent, 7);
        assert_eq!(resolved[1].answered_at, now);
    }
}
