use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::services::attempt_flow;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![tokio::spawn(finalize_overdue_loop(state.clone(), shutdown_rx))];

    crate::core::shutdown::shutdown_signal("worker").await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn finalize_overdue_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = Duration::from_secs(state.settings().attempt().overdue_sweep_interval_seconds);
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                sweep_overdue(&state).await;
            }
        }
    }
}

/// One pass over overdue attempts. Failures are logged and retried next tick.
pub(crate) async fn sweep_overdue(state: &AppState) -> usize {
    match attempt_flow::finalize_overdue(state).await {
        Ok(0) => 0,
        Ok(count) => {
            tracing::info!(count, "Finalized overdue attempts");
            count
        }
        Err(err) => {
            tracing::error!(error = %err, "finalize_overdue failed");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::sweep_overdue;
    use crate::core::time::primitive_now_utc;
    use crate::db::types::{AttemptStatus, GradingStatus};
    use crate::repositories::store::AttemptKey;
    use crate::test_support;
    use serde_json::json;
    use sqlx::types::Json;
    use time::Duration;

    #[tokio::test]
    async fn overdue_attempts_are_finalized_from_the_ledger() {
        let ctx = test_support::setup_test_context().await;
        ctx.store.insert_exam(test_support::sample_exam("exam-late"));

        let now = primitive_now_utc();
        let mut late = test_support::blank_attempt("attempt-late", "student-1", "exam-late");
        late.started_at = now - Duration::hours(3);
        late.deadline_at = Some(now - Duration::hours(2));
        late.answers = Json(vec![test_support::raw_answer("q-mcq", json!("B"))]);
        test_support::seed_attempt(&ctx, late).await;

        let mut on_time = test_support::blank_attempt("attempt-open", "student-2", "exam-late");
        on_time.deadline_at = Some(now + Duration::hours(1));
        test_support::seed_attempt(&ctx, on_time).await;

        assert_eq!(sweep_overdue(&ctx.state).await, 1);
        assert_eq!(sweep_overdue(&ctx.state).await, 0);

        let finalized = ctx
            .state
            .attempts()
            .find(&AttemptKey::new("student-1", "exam-late"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finalized.status, AttemptStatus::Completed);
        assert_eq!(finalized.score, Some(10.0));
        assert_eq!(finalized.grading_status, Some(GradingStatus::Complete));

        let untouched = ctx
            .state
            .attempts()
            .find(&AttemptKey::new("student-2", "exam-late"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(untouched.status, AttemptStatus::InProgress);
    }
}
