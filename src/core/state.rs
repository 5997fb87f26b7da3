use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::repositories::store::{AttemptStore, ExamCatalog};
use crate::services::activity::ActivitySink;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    attempts: Arc<dyn AttemptStore>,
    catalog: Arc<dyn ExamCatalog>,
    redis: RedisHandle,
    activity: ActivitySink,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        attempts: Arc<dyn AttemptStore>,
        catalog: Arc<dyn ExamCatalog>,
        redis: RedisHandle,
        activity: ActivitySink,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, attempts, catalog, redis, activity }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn attempts(&self) -> &dyn AttemptStore {
        self.inner.attempts.as_ref()
    }

    pub(crate) fn catalog(&self) -> &dyn ExamCatalog {
        self.inner.catalog.as_ref()
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn activity(&self) -> &ActivitySink {
        &self.inner.activity
    }
}
