//! HTTP-level integration tests for the resource CRUD surface and the job
//! endpoints, run against the in-memory store — no database required.

use std::sync::Arc;

use axum::body::Body;
use http_body_util::BodyExt;
use hyper::{Request, StatusCode};
use jsonwebtoken::{encode, EncodingKey, Header};
use orgtree_core::events::ADMIN_CHANNEL;
use orgtree_core::memory::MemoryStore;
use orgtree_core::queue::{PropagationTask, TaskQueue};
use orgtree_server::middleware::jwt::JwtConfig;
use orgtree_server::router::build_router;
use orgtree_server::state::AppState;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

// ── Test JWT helpers ───────────────────────────────────────────

const TEST_JWT_SECRET: &[u8] = b"test-secret-for-integration-tests";

#[derive(Debug, Serialize)]
struct TestClaims {
    sub: String,
    roles: Vec<String>,
    exp: usize,
}

fn make_jwt(actor_id: &str, roles: &[&str]) -> String {
    let claims = TestClaims {
        sub: actor_id.into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: 4102444800, // 2100-01-01
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .expect("failed to encode test JWT")
}

fn admin_jwt() -> String {
    make_jwt("test-admin", &["admin"])
}

// ── Test app builder ───────────────────────────────────────────

struct TestApp {
    app: axum::Router,
    state: AppState,
    /// Worker side of the propagation queue; receives one task per
    /// committed mutation.
    tasks: UnboundedReceiver<PropagationTask>,
}

fn build_test_app() -> TestApp {
    let store = MemoryStore::new();
    let (queue, tasks) = TaskQueue::new();
    let state = AppState::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(queue),
        30,
    );
    let app = build_router(state.clone(), JwtConfig::from_secret(TEST_JWT_SECRET));
    TestApp { app, state, tasks }
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn ou_body(name: &str, path: &str) -> Value {
    json!({ "type": "ou", "name": name, "path": path })
}

// ── Auth boundary ──────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let t = build_test_app();
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let t = build_test_app();
    let (status, _) = send(&t.app, "GET", "/api/ous", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn protected_routes_reject_garbage_token() {
    let t = build_test_app();
    let (status, _) = send(&t.app, "GET", "/api/ous", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── CRUD ───────────────────────────────────────────────────────

#[tokio::test]
async fn create_get_delete_round_trip() {
    let t = build_test_app();
    let jwt = admin_jwt();

    let (status, created) = send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{created}");
    let oid = created["_id"].as_str().expect("server-assigned id").to_string();

    let (status, fetched) = send(&t.app, "GET", &format!("/api/ous/{oid}"), Some(&jwt), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Lab");

    let (status, receipt) = send(
        &t.app,
        "DELETE",
        &format!("/api/ous/{oid}"),
        Some(&jwt),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["ok"], 1);

    let (status, _) = send(&t.app, "GET", &format!("/api/ous/{oid}"), Some(&jwt), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_with_fabricated_parent_is_unprocessable() {
    let t = build_test_app();
    let jwt = admin_jwt();
    let fake_parent = uuid::Uuid::new_v4();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("orphan", &format!("root,{fake_parent}"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let message = body["errors"][0]["message"].as_str().unwrap();
    assert!(message.contains("parent doesn't exist"), "{body}");
}

#[tokio::test]
async fn child_under_real_parent_succeeds() {
    let t = build_test_app();
    let jwt = admin_jwt();

    let (_, parent) = send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    let parent_id = parent["_id"].as_str().unwrap();

    let (status, child) = send(
        &t.app,
        "POST",
        "/api/computers",
        Some(&jwt),
        Some(json!({
            "type": "computer",
            "name": "pc-1",
            "path": format!("root,{parent_id}")
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{child}");
    assert_eq!(child["path"], format!("root,{parent_id}"));
}

#[tokio::test]
async fn replace_with_mismatched_body_id_is_bad_request() {
    let t = build_test_app();
    let jwt = admin_jwt();

    let (_, created) = send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    let oid = created["_id"].as_str().unwrap();

    let mut update = created.clone();
    update["_id"] = json!(uuid::Uuid::new_v4().to_string());
    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/ous/{oid}"),
        Some(&jwt),
        Some(update),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn kinds_do_not_leak_across_surfaces() {
    let t = build_test_app();
    let jwt = admin_jwt();

    let (_, group) = send(
        &t.app,
        "POST",
        "/api/groups",
        Some(&jwt),
        Some(json!({ "type": "group", "name": "teachers", "path": "root" })),
    )
    .await;
    let gid = group["_id"].as_str().unwrap();

    // A group is not visible through the OU surface.
    let (status, _) = send(&t.app, "GET", &format!("/api/ous/{gid}"), Some(&jwt), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Membership over HTTP ───────────────────────────────────────

#[tokio::test]
async fn membership_follows_the_node_through_its_lifecycle() {
    let t = build_test_app();
    let jwt = admin_jwt();

    let (_, group) = send(
        &t.app,
        "POST",
        "/api/groups",
        Some(&jwt),
        Some(json!({ "type": "group", "name": "A", "path": "root" })),
    )
    .await;
    let gid = group["_id"].as_str().unwrap().to_string();

    let (status, user) = send(
        &t.app,
        "POST",
        "/api/users",
        Some(&jwt),
        Some(json!({
            "type": "user", "name": "B", "path": "root", "memberof": [gid]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{user}");
    let uid = user["_id"].as_str().unwrap().to_string();

    let (_, stored_group) =
        send(&t.app, "GET", &format!("/api/groups/{gid}"), Some(&jwt), None).await;
    assert_eq!(stored_group["members"], json!([uid]));

    // Replace with empty memberof clears the reverse side.
    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/users/{uid}"),
        Some(&jwt),
        Some(json!({
            "_id": uid, "type": "user", "name": "B", "path": "root", "memberof": []
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored_group) =
        send(&t.app, "GET", &format!("/api/groups/{gid}"), Some(&jwt), None).await;
    assert_eq!(stored_group["members"], json!([]));
}

#[tokio::test]
async fn user_referencing_missing_group_is_unprocessable() {
    let t = build_test_app();
    let jwt = admin_jwt();
    let ghost = uuid::Uuid::new_v4();

    let (status, body) = send(
        &t.app,
        "POST",
        "/api/users",
        Some(&jwt),
        Some(json!({
            "type": "user", "name": "B", "path": "root", "memberof": [ghost.to_string()]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"][0]["field"], "memberof");
}

// ── Pagination envelope ────────────────────────────────────────

#[tokio::test]
async fn pagination_envelope_matches_the_documented_formula() {
    let t = build_test_app();
    let jwt = admin_jwt();
    for i in 0..10 {
        let (status, _) = send(
            &t.app,
            "POST",
            "/api/ous",
            Some(&jwt),
            Some(ou_body(&format!("ou-{i:02}"), "root")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, page) = send(
        &t.app,
        "GET",
        "/api/ous?page=0&pagesize=4",
        Some(&jwt),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["nodes"].as_array().unwrap().len(), 4);
    assert_eq!(page["page"], 0);
    assert_eq!(page["pagesize"], 4);
    // floor(10/4): the documented formula, asserted as-is.
    assert_eq!(page["pages"], 2);

    // iname is a case-insensitive substring match
    let (_, filtered) = send(&t.app, "GET", "/api/ous?iname=OU-03", Some(&jwt), None).await;
    assert_eq!(filtered["nodes"].as_array().unwrap().len(), 1);
    assert_eq!(filtered["nodes"][0]["name"], "ou-03");
}

// ── Jobs ───────────────────────────────────────────────────────

#[tokio::test]
async fn every_mutation_enqueues_a_task_and_records_a_job() {
    let mut t = build_test_app();
    let jwt = admin_jwt();

    let (_, created) = send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    let oid = created["_id"].as_str().unwrap();

    let task = t.tasks.recv().await.expect("one task per mutation");
    assert_eq!(task.new.id.unwrap().to_string(), oid);

    let (status, job) = send(
        &t.app,
        "GET",
        &format!("/api/jobs/{}", task.task_id),
        Some(&jwt),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "created");
    assert_eq!(job["objid"], oid);
    assert_eq!(job["userid"], "test-admin");
}

#[tokio::test]
async fn job_status_update_broadcasts_to_the_admin_channel() {
    let mut t = build_test_app();
    let jwt = admin_jwt();

    send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    let task = t.tasks.recv().await.unwrap();

    let (_sub, mut events) = t.state.events.subscribe(ADMIN_CHANNEL);

    let (status, job) = send(
        &t.app,
        "PUT",
        &format!("/api/jobs/{}", task.task_id),
        Some(&jwt),
        Some(json!({ "status": "succeeded" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "succeeded");

    let event = events.recv().await.unwrap();
    assert_eq!(event.job_id, task.task_id);
    assert_eq!(event.status.as_str(), "succeeded");
}

#[tokio::test]
async fn unrecognized_job_status_is_rejected() {
    let mut t = build_test_app();
    let jwt = admin_jwt();

    send(
        &t.app,
        "POST",
        "/api/ous",
        Some(&jwt),
        Some(ou_body("Lab", "root")),
    )
    .await;
    let task = t.tasks.recv().await.unwrap();

    let (status, _) = send(
        &t.app,
        "PUT",
        &format!("/api/jobs/{}", task.task_id),
        Some(&jwt),
        Some(json!({ "status": "exploded" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, job) = send(
        &t.app,
        "GET",
        &format!("/api/jobs/{}", task.task_id),
        Some(&jwt),
        None,
    )
    .await;
    assert_eq!(job["status"], "created");
}

#[tokio::test]
async fn missing_job_is_not_found() {
    let t = build_test_app();
    let jwt = admin_jwt();
    let (status, _) = send(&t.app, "GET", "/api/jobs/task-404", Some(&jwt), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
