
use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use crate::core::security::CallerRole;
use crate::test_support::{self, TestContext};

pub(super) fn student_token(ctx: &TestContext, student_id: &str) -> String {
    test_support::bearer_token(student_id, CallerRole::Student, ctx.state.settings())
}

pub(super) fn instructor_token(ctx: &TestContext) -> String {
    test_support::bearer_token("instructor-1", CallerRole::Instructor, ctx.state.settings())
}

pub(super) async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

pub(super) async fn start(app: &Router, token: &str, exam_id: &str) -> Value {
    let (status, body) = call(
        app,
        Method::POST,
        &format!("/api/v1/exams/{exam_id}/attempt/start"),
        token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    body
}

pub(super) async fn save(
    app: &Router,
    token: &str,
    exam_id: &str,
    question_id: &str,
    answer: Value,
) -> (StatusCode, Value) {
    call(
        app,
        Method::PATCH,
        &format!("/api/v1/exams/{exam_id}/attempt/answer"),
        token,
        Some(serde_json::json!({ "question_id": question_id, "answer": answer, "time_spent": 30 })),
    )
    .await
}

pub(super) async fn submit(
    app: &Router,
    token: &str,
    exam_id: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    call(app, Method::POST, &format!("/api/v1/exams/{exam_id}/attempt/submit"), token, body).await
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/exams/exam-1/attempt/start",
            None,
            None,
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = test_support::read_json(response).await;
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn roles_are_enforced_per_endpoint() {
    let ctx = test_support::setup_test_context().await;
    let instructor = instructor_token(&ctx);
    let student = student_token(&ctx, "student-1");

    let (status, _) =
        call(&ctx.app, Method::POST, "/api/v1/exams/exam-1/attempt/start", &instructor, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        call(&ctx.app, Method::GET, "/api/v1/attempts/attempt-1", &student, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
