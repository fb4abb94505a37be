use axum::http::StatusCode;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ACCOUNTS: &str = "\
- id: 1
  name: Payments
- id: 2
  name: Logistics
";

const USERS: &str = "\
- ntid: root
  email: root@example.com
  role: ADMIN
  account_id: 1
- ntid: sam
  email: sam@example.com
  role: SCRUM_MASTER
  account_id: 1
- ntid: jdoe
  email: jdoe@example.com
  role: DEVELOPER
  account_id: 1
- ntid: alice
  email: alice@example.com
  role: USER
  account_id: 1
- ntid: bob
  email: bob@example.com
  role: USER
  account_id: 2
";

/// Bootstrap a project with two accounts and one user per role.
fn init_project(dir: &TempDir) -> axum::Router {
    let config = reqflow_core::config::Config::new("test-project");
    config.save(dir.path()).unwrap();
    std::fs::write(dir.path().join(".reqflow/accounts.yaml"), ACCOUNTS).unwrap();
    std::fs::write(dir.path().join(".reqflow/users.yaml"), USERS).unwrap();
    let state = reqflow_server::AppState::open(dir.path()).unwrap();
    reqflow_server::build_router(state)
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    who: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(ntid) = who {
        builder = builder.header("X-User-NTID", ntid);
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: &axum::Router, uri: &str, who: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, Some(who), None).await
}

async fn post_json(
    app: &axum::Router,
    uri: &str,
    who: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, Some(who), Some(body)).await
}

async fn put_json(
    app: &axum::Router,
    uri: &str,
    who: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, "PUT", uri, Some(who), Some(body)).await
}

async fn create(app: &axum::Router, who: &str, title: &str, account: u64) -> u64 {
    let (status, body) = post_json(
        app,
        "/api/requests",
        who,
        json!({
            "title": title,
            "requestType": "BUG_FIX",
            "priority": "HIGH",
            "accountId": account,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_u64().unwrap()
}

fn eta_in(days: i64) -> String {
    (Utc::now() + Duration::days(days)).to_rfc3339()
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_needs_no_identity() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_identity_is_401() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let (status, body) = send(&app, "GET", "/api/requests", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["kind"], "authorization");
}

#[tokio::test]
async fn unknown_identity_is_401() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let (status, _) = get(&app, "/api/requests", "ghost").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_open_ticket() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let (status, body) = post_json(
        &app,
        "/api/requests",
        "alice",
        json!({
            "title": "  Refund export broken  ",
            "description": "CSV has no header",
            "requestType": "BUG_FIX",
            "priority": "HIGH",
            "accountId": 1,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], 1);
    assert_eq!(body["title"], "Refund export broken");
    assert_eq!(body["status"], "OPEN");
    assert_eq!(body["createdBy"], "alice");
    assert!(body.get("assignedTo").map_or(true, |v| v.is_null()));
}

#[tokio::test]
async fn create_rejects_bad_input() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);

    let (status, body) = post_json(
        &app,
        "/api/requests",
        "alice",
        json!({ "title": "", "requestType": "BUG_FIX", "priority": "LOW", "accountId": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, _) = post_json(
        &app,
        "/api/requests",
        "alice",
        json!({ "title": "No account", "requestType": "BUG_FIX", "priority": "LOW" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app,
        "/api/requests",
        "alice",
        json!({ "title": "Ghost account", "requestType": "BUG_FIX", "priority": "LOW", "accountId": 99 }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Refund export broken", 1).await;

    // A developer cannot assign.
    let (status, body) = post_json(
        &app,
        &format!("/api/requests/{id}/assign"),
        "jdoe",
        json!({ "assignee": "jdoe", "eta": eta_in(2) }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["kind"], "authorization");

    let (status, body) = post_json(
        &app,
        &format!("/api/requests/{id}/assign"),
        "sam",
        json!({ "assignedTo": "jdoe", "eta": eta_in(2) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ASSIGNED");
    assert_eq!(body["assignedTo"], "jdoe");
    assert_eq!(body["assignedBy"], "sam");

    // Already assigned.
    let (status, body) = post_json(
        &app,
        &format!("/api/requests/{id}/assign"),
        "sam",
        json!({ "assignee": "jdoe", "eta": eta_in(3) }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, body) = put_json(
        &app,
        &format!("/api/requests/{id}/status"),
        "jdoe",
        json!({ "status": "IN_PROGRESS" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_PROGRESS");

    // ETA revision needs a reason.
    let (status, _) = put_json(
        &app,
        &format!("/api/requests/{id}/eta"),
        "jdoe",
        json!({ "eta": eta_in(4) }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = put_json(
        &app,
        &format!("/api/requests/{id}/eta"),
        "jdoe",
        json!({ "eta": eta_in(4), "reason": "waiting on bank API" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_PROGRESS");

    let (status, history) = get(&app, &format!("/api/requests/{id}/eta-history"), "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["reason"], "waiting on bank API");

    let (status, comments) = get(&app, &format!("/api/requests/{id}/comments"), "alice").await;
    assert_eq!(status, StatusCode::OK);
    let comments = comments.as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["etaChange"]["reason"], "waiting on bank API");

    let (status, body) = put_json(
        &app,
        &format!("/api/requests/{id}/status"),
        "jdoe",
        json!({ "status": "COMPLETED", "comment": "shipped in 2.4.1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");

    // Terminal: no further transitions or comments.
    let (status, body) = put_json(
        &app,
        &format!("/api/requests/{id}/status"),
        "jdoe",
        json!({ "status": "IN_PROGRESS" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "invalid_transition");

    let (status, _) = post_json(
        &app,
        &format!("/api/requests/{id}/comments"),
        "alice",
        json!({ "text": "thanks!" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn status_change_on_open_ticket_is_forbidden() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Unassigned", 1).await;
    let (status, _) = put_json(
        &app,
        &format!("/api/requests/{id}/status"),
        "root",
        json!({ "status": "IN_PROGRESS" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_status_is_400() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Typo", 1).await;
    let (status, body) = put_json(
        &app,
        &format!("/api/requests/{id}/status"),
        "root",
        json!({ "status": "FINISHED" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn unknown_ticket_is_404() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let (status, body) = get(&app, "/api/requests/999", "root").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = get(&app, "/api/requests/not-a-number", "root").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listing_respects_visibility_and_filters() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    create(&app, "alice", "Alice one", 1).await;
    create(&app, "alice", "Alice two", 1).await;
    create(&app, "bob", "Bob one", 2).await;

    let (_, mine) = get(&app, "/api/requests", "alice").await;
    assert_eq!(mine.as_array().unwrap().len(), 2);
    assert_eq!(mine[0]["title"], "Alice two");

    let (_, all) = get(&app, "/api/requests", "root").await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (_, filtered) = get(&app, "/api/requests?accountId=2", "root").await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    let (status, _) = get(&app, "/api/requests?status=bogus", "root").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn creator_deletes_ticket() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Duplicate", 1).await;

    let (status, _) = send(&app, "DELETE", &format!("/api/requests/{id}"), Some("bob"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "DELETE", &format!("/api/requests/{id}"), Some("alice"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&app, &format!("/api/requests/{id}"), "alice").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn timers_report_open_queue() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Timed", 1).await;
    let (status, body) = get(&app, &format!("/api/requests/{id}/timers"), "alice").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticketId"], id);
    assert_eq!(body["etaExceeded"], false);
    assert!(body.get("developerQueueMinutes").is_none());
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn statistics_endpoints() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let first = create(&app, "alice", "First", 1).await;
    create(&app, "alice", "Second", 1).await;
    post_json(
        &app,
        &format!("/api/requests/{first}/assign"),
        "sam",
        json!({ "assignee": "jdoe", "eta": eta_in(1) }),
    )
    .await;

    let (status, rows) = get(&app, "/api/requests/account-statistics", "root").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["accountId"], 1);
    assert_eq!(rows[0]["totalTickets"], 2);
    assert_eq!(rows[0]["openTickets"], 1);
    assert_eq!(rows[1]["totalTickets"], 0);

    let (status, users) = get(&app, "/api/requests/user-statistics-by-account/1", "root").await;
    assert_eq!(status, StatusCode::OK);
    let jdoe = users
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["ntid"] == "jdoe")
        .unwrap();
    assert_eq!(jdoe["totalTickets"], 1);
    assert_eq!(jdoe["pendingTickets"], 1);

    let (status, tickets) = get(
        &app,
        "/api/requests/user-statistics-by-account/1/tickets?filter=open",
        "root",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets.as_array().unwrap().len(), 1);
    assert_eq!(tickets[0]["title"], "Second");

    let (status, tickets) = get(
        &app,
        "/api/requests/user-statistics-by-account/1/tickets?filter=pending&assignee=jdoe",
        "root",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tickets[0]["id"], first);

    let (status, _) = get(&app, "/api/requests/user-statistics-by-account/42", "root").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_and_all_user_statistics() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let first = create(&app, "alice", "First", 1).await;
    create(&app, "alice", "Second", 1).await;
    create(&app, "bob", "Elsewhere", 2).await;
    post_json(
        &app,
        &format!("/api/requests/{first}/assign"),
        "sam",
        json!({ "assignee": "jdoe", "eta": eta_in(1) }),
    )
    .await;

    let (status, admin) = get(&app, "/api/requests/stats", "root").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admin["role"], "ADMIN");
    assert_eq!(admin["totalRequests"], 3);
    assert_eq!(admin["openRequests"], 2);
    assert_eq!(admin["assignedRequests"], 1);

    let (_, sm) = get(&app, "/api/requests/stats", "sam").await;
    assert_eq!(sm["totalRequests"], 2);

    let (_, dev) = get(&app, "/api/requests/stats", "jdoe").await;
    assert_eq!(dev, json!({ "role": "DEVELOPER", "assignedToMe": 1 }));

    let (_, user) = get(&app, "/api/requests/stats", "alice").await;
    assert_eq!(user, json!({ "role": "USER", "myRequests": 2 }));

    let (status, rows) = get(&app, "/api/requests/user-statistics", "bob").await;
    assert_eq!(status, StatusCode::OK);
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    let jdoe = rows.iter().find(|u| u["ntid"] == "jdoe").unwrap();
    assert_eq!(jdoe["totalTickets"], 1);

    let (status, _) = get(&app, "/api/requests/stats", "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn eta_alerts_use_threshold() {
    let dir = TempDir::new().unwrap();
    let app = init_project(&dir);
    let id = create(&app, "alice", "Soon", 1).await;
    let eta = (Utc::now() + Duration::minutes(20)).to_rfc3339();
    post_json(
        &app,
        &format!("/api/requests/{id}/assign"),
        "sam",
        json!({ "assignee": "jdoe", "eta": eta }),
    )
    .await;

    let (status, alerts) = get(&app, "/api/requests/eta-alerts", "jdoe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    assert_eq!(alerts[0]["kind"], "APPROACHING");

    let (_, alerts) = get(&app, "/api/requests/eta-alerts?thresholdMinutes=5", "jdoe").await;
    assert!(alerts.as_array().unwrap().is_empty());
}
