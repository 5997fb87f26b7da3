use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use serde_json::json;
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::api;
use crate::core::security::{self, CallerRole};
use crate::core::{config::Settings, redis::RedisHandle, state::AppState, time::primitive_now_utc};
use crate::db::models::{Answer, Attempt, Exam, ExamSnapshot, Question};
use crate::db::types::{AttemptStatus, ExamStatus};
use crate::repositories::memory::MemoryStore;
use crate::repositories::store::{AttemptKey, AttemptStore};
use crate::services::activity::ActivitySink;

const TEST_SECRET_KEY: &str = "test-secret";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    pub(crate) store: Arc<MemoryStore>,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    std::env::set_var("EXAMINER_ENV", "test");
    std::env::set_var("EXAMINER_STRICT_CONFIG", "0");
    std::env::set_var("SECRET_KEY", TEST_SECRET_KEY);
    std::env::set_var("ALGORITHM", "HS256");
    std::env::set_var("STORAGE_BACKEND", "memory");
    std::env::set_var("EXAM_CACHE_TTL_SECONDS", "0");
    std::env::set_var("ATTEMPT_ENFORCE_DEADLINE", "1");
    std::env::set_var("ATTEMPT_SUBMIT_GRACE_SECONDS", "300");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
    std::env::remove_var("EXAM_FIXTURES_PATH");
    std::env::remove_var("ACTIVITY_WEBHOOK_URL");
    std::env::remove_var("API_V1_STR");
    std::env::remove_var("PROJECT_NAME");
}

pub(crate) async fn setup_test_context() -> TestContext {
    setup_test_context_with(|| {}).await
}

/// Like `setup_test_context`, with extra env tweaks applied under the env lock.
pub(crate) async fn setup_test_context_with(configure: impl FnOnce()) -> TestContext {
    let guard = env_lock().await;
    set_test_env();
    configure();

    let settings = Settings::load().expect("settings");
    let store = Arc::new(MemoryStore::new());
    // Never connected: cache calls degrade to misses.
    let redis = RedisHandle::new(settings.redis().redis_url());

    let state =
        AppState::new(settings, store.clone(), store.clone(), redis, ActivitySink::disabled());
    let app = api::router::router(state.clone());

    TestContext { state, app, store, _guard: guard }
}

pub(crate) fn question(id: &str, kind: &str, correct: serde_json::Value, marks: f64) -> Question {
    Question {
        id: id.to_string(),
        question_type: kind.to_string(),
        prompt: format!("Prompt for {id}"),
        options: None,
        correct_answer: Json(correct),
        marks,
    }
}

pub(crate) fn exam_snapshot(
    id: &str,
    status: ExamStatus,
    duration_minutes: Option<i32>,
    questions: Vec<Question>,
) -> ExamSnapshot {
    ExamSnapshot {
        exam: Exam {
            id: id.to_string(),
            title: format!("Exam {id}"),
            instructions: Some("Answer every question".to_string()),
            duration_minutes,
            total_marks: questions.iter().map(|question| question.marks).sum(),
            status,
        },
        questions,
    }
}

/// Published, 60 minutes: mcq (10, "B"), truefalse (5, true), short (5), long (15).
pub(crate) fn sample_exam(id: &str) -> ExamSnapshot {
    let mut mcq = question("q-mcq", "mcq", json!("B"), 10.0);
    mcq.options = Some(Json(json!(["A", "B", "C", "D"])));
    exam_snapshot(
        id,
        ExamStatus::Published,
        Some(60),
        vec![
            mcq,
            question("q-tf", "truefalse", json!(true), 5.0),
            question("q-short", "short", json!("photosynthesis"), 5.0),
            question("q-long", "long", json!(null), 15.0),
        ],
    )
}

pub(crate) fn raw_answer(question_id: &str, answer: serde_json::Value) -> Answer {
    Answer::raw(question_id.to_string(), answer, 0, time::OffsetDateTime::now_utc())
}

pub(crate) fn blank_attempt(id: &str, student_id: &str, exam_id: &str) -> Attempt {
    let now = primitive_now_utc();
    Attempt {
        id: id.to_string(),
        student_id: student_id.to_string(),
        exam_id: exam_id.to_string(),
        status: AttemptStatus::InProgress,
        started_at: now,
        submitted_at: None,
        graded_at: None,
        deadline_at: None,
        answers: Json(Vec::new()),
        violations: Json(Vec::new()),
        total_time_spent: 0,
        score: None,
        total_marks: None,
        percentage: None,
        auto_graded_score: None,
        pending_manual_marks: None,
        grading_status: None,
        ip_address: None,
        user_agent: None,
        fingerprint_hash: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

/// Writes an attempt straight into the store, bypassing the lifecycle.
pub(crate) async fn seed_attempt(ctx: &TestContext, attempt: Attempt) {
    let key = AttemptKey::of(&attempt);
    ctx.store.mutate(&key, Box::new(move |_| Ok(attempt))).await.expect("seed attempt");
}

pub(crate) fn bearer_token(user_id: &str, role: CallerRole, settings: &Settings) -> String {
    security::create_access_token(user_id, role, settings, time::Duration::hours(1)).expect("token")
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
