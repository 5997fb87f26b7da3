use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::config::Settings;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum ActivityEvent {
    AttemptStarted {
        attempt_id: String,
        student_id: String,
        exam_id: String,
    },
    AttemptSubmitted {
        attempt_id: String,
        student_id: String,
        exam_id: String,
        trigger: &'static str,
        score: f64,
        total_marks: f64,
        percentage: i32,
        grading_status: &'static str,
    },
    AttemptGraded {
        attempt_id: String,
        student_id: String,
        exam_id: String,
        score: f64,
        percentage: i32,
    },
    ViolationReported {
        attempt_id: String,
        violation_type: String,
        severity: &'static str,
    },
}

impl ActivityEvent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            ActivityEvent::AttemptStarted { .. } => "attempt_started",
            ActivityEvent::AttemptSubmitted { .. } => "attempt_submitted",
            ActivityEvent::AttemptGraded { .. } => "attempt_graded",
            ActivityEvent::ViolationReported { .. } => "violation_reported",
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivityEnvelope<'a> {
    #[serde(flatten)]
    event: &'a ActivityEvent,
    #[serde(with = "time::serde::rfc3339")]
    occurred_at: OffsetDateTime,
}

/// Fire-and-forget activity log. Delivery failures are logged and dropped.
#[derive(Debug, Clone)]
pub(crate) struct ActivitySink {
    webhook: Option<(Client, String)>,
}

impl ActivitySink {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let Some(url) = settings.activity().webhook_url.clone() else {
            return Ok(Self::disabled());
        };
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(settings.activity().request_timeout_seconds))
            .build()
            .context("Failed to build activity HTTP client")?;
        Ok(Self { webhook: Some((client, url)) })
    }

    pub(crate) fn disabled() -> Self {
        Self { webhook: None }
    }

    pub(crate) fn emit(&self, event: ActivityEvent) {
        tracing::info!(event = event.name(), payload = ?event, "Attempt activity");

        let Some((client, url)) = self.webhook.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(event = event.name(), "No runtime available for activity delivery");
            return;
        };

        runtime.spawn(async move {
            let envelope = ActivityEnvelope { event: &event, occurred_at: OffsetDateTime::now_utc() };
            let result = client
                .post(&url)
                .json(&envelope)
                .send()
                .await
                .and_then(|response| response.error_for_status());
            if let Err(err) = result {
                tracing::warn!(event = event.name(), error = %err, "Activity delivery failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = ActivityEvent::ViolationReported {
            attempt_id: "attempt-1".to_string(),
            violation_type: "tab-switch".to_string(),
            severity: "low",
        };
        let envelope = ActivityEnvelope {
            event: &event,
            occurred_at: time::macros::datetime!(2026-03-01 10:00:00 UTC),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["event"], "violation_reported");
        assert_eq!(value["attempt_id"], "attempt-1");
        assert_eq!(value["occurred_at"], "2026-03-01T10:00:00Z");
        assert_eq!(event.name(), "violation_reported");
    }

    #[test]
    fn disabled_sink_only_logs() {
        ActivitySink::disabled().emit(ActivityEvent::AttemptStarted {
            attempt_id: "a".to_string(),
            student_id: "s".to_string(),
            exam_id: "e".to_string(),
        });
    }
}
