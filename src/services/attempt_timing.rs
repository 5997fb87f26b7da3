use time::{Duration, PrimitiveDateTime};

use crate::core::config::AttemptSettings;

/// Deadline enforcement knobs, lifted out of settings so the lifecycle stays pure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeadlinePolicy {
    pub(crate) enforce: bool,
    pub(crate) grace_seconds: i64,
}

impl DeadlinePolicy {
    pub(crate) fn from_settings(settings: &AttemptSettings) -> Self {
        Self {
            enforce: settings.enforce_deadline,
            grace_seconds: i64::try_from(settings.submit_grace_seconds).unwrap_or(i64::MAX),
        }
    }

    #[cfg(test)]
    pub(crate) fn disabled() -> Self {
        Self { enforce: false, grace_seconds: 0 }
    }
}

pub(crate) fn compute_deadline(
    policy: DeadlinePolicy,
    started_at: PrimitiveDateTime,
    duration_minutes: Option<i32>,
) -> Option<PrimitiveDateTime> {
    if !policy.enforce {
        return None;
    }
    let minutes = duration_minutes.filter(|minutes| *minutes > 0)?;
    Some(started_at + Duration::minutes(i64::from(minutes)))
}

/// True once `now` is beyond deadline + grace. Attempts without a deadline never expire.
pub(crate) fn is_past_grace(
    policy: DeadlinePolicy,
    deadline_at: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> bool {
    if !policy.enforce {
        return false;
    }
    match deadline_at {
        Some(deadline) => now > deadline + Duration::seconds(policy.grace_seconds),
        None => false,
    }
}

/// Deadlines at or before this instant are past their grace window.
pub(crate) fn overdue_cutoff(policy: DeadlinePolicy, now: PrimitiveDateTime) -> PrimitiveDateTime {
    now - Duration::seconds(policy.grace_seconds)
}

pub(crate) fn remaining_seconds(
    deadline_at: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> Option<i64> {
    deadline_at.map(|deadline| (deadline - now).whole_seconds().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const ENFORCED: DeadlinePolicy = DeadlinePolicy { enforce: true, grace_seconds: 300 };

    #[test]
    fn deadline_is_start_plus_duration() {
        let started = datetime!(2026-03-01 10:00:00);
        assert_eq!(
            compute_deadline(ENFORCED, started, Some(90)),
            Some(datetime!(2026-03-01 11:30:00))
        );
        assert_eq!(compute_deadline(ENFORCED, started, None), None);
        assert_eq!(compute_deadline(ENFORCED, started, Some(0)), None);
        assert_eq!(compute_deadline(DeadlinePolicy::disabled(), started, Some(90)), None);
    }

    #[test]
    fn grace_window_keeps_attempt_open() {
        let deadline = Some(datetime!(2026-03-01 11:00:00));
        assert!(!is_past_grace(ENFORCED, deadline, datetime!(2026-03-01 11:04:59)));
        assert!(!is_past_grace(ENFORCED, deadline, datetime!(2026-03-01 11:05:00)));
        assert!(is_past_grace(ENFORCED, deadline, datetime!(2026-03-01 11:05:01)));
        assert!(!is_past_grace(ENFORCED, None, datetime!(2030-01-01 00:00:00)));
        assert!(!is_past_grace(
            DeadlinePolicy::disabled(),
            deadline,
            datetime!(2030-01-01 00:00:00)
        ));
    }

    #[test]
    fn remaining_time_never_negative() {
        let now = datetime!(2026-03-01 11:00:00);
        assert_eq!(remaining_seconds(Some(datetime!(2026-03-01 11:01:00)), now), Some(60));
        assert_eq!(remaining_seconds(Some(datetime!(2026-03-01 10:00:00)), now), Some(0));
        assert_eq!(remaining_seconds(None, now), None);
        assert_eq!(overdue_cutoff(ENFORCED, now), datetime!(2026-03-01 10:55:00));
    }
}
