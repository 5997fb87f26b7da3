use serde::Serialize;
use time::OffsetDateTime;

use crate::db::models::Violation;
use crate::db::types::ViolationSeverity;

#[derive(Debug, Clone)]
pub(crate) struct ViolationInput {
    pub(crate) violation_type: String,
    pub(crate) description: String,
    pub(crate) severity: ViolationSeverity,
    /// Detector time; defaults to arrival time when the client omits it.
    pub(crate) timestamp: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct SeverityCounts {
    pub(crate) low: usize,
    pub(crate) medium: usize,
    pub(crate) high: usize,
}

/// Appends and returns the running count. Entries are never edited afterwards.
pub(crate) fn append(log: &mut Vec<Violation>, input: ViolationInput, now: OffsetDateTime) -> usize {
    log.push(Violation {
        violation_type: input.violation_type,
        description: input.description,
        severity: input.severity,
        timestamp: input.timestamp.unwrap_or(now),
        recorded_at: now,
    });
    log.len()
}

/// Display order: by timestamp, ties keep arrival order.
pub(crate) fn ordered(log: &[Violation]) -> Vec<&Violation> {
    let mut view: Vec<&Violation> = log.iter().collect();
    view.sort_by_key(|violation| violation.timestamp);
    view
}

pub(crate) fn count_by_severity(log: &[Violation]) -> SeverityCounts {
    log.iter().fold(SeverityCounts::default(), |mut counts, violation| {
        match violation.severity {
            ViolationSeverity::Low => counts.low += 1,
            ViolationSeverity::Medium => counts.medium += 1,
            ViolationSeverity::High => counts.high += 1,
        }
        counts
    })
}
