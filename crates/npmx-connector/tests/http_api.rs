//! HTTP API tests
//!
//! Drives the router in-process with a scripted executor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use npmx_connector::executor::{CommandExecutor, ReadQuery};
use npmx_connector::{server, ConnectorState};
use npmx_core::auth::Session;
use npmx_core::config::ConnectorConfig;
use npmx_core::{ExecutionResult, NpmCommand, QueryError};

const TOKEN: &str = "test-token";

/// Executor answering by command line, success unless scripted otherwise
#[derive(Default)]
struct MockExecutor {
    results: Mutex<HashMap<String, ExecutionResult>>,
    queries: Mutex<HashMap<Vec<String>, Result<String, QueryError>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl MockExecutor {
    fn respond(&self, command_line: &str, result: ExecutionResult) {
        self.results
            .lock()
            .insert(command_line.to_string(), result);
    }

    fn answer(&self, query: ReadQuery, output: Result<String, QueryError>) {
        self.queries.lock().insert(query.args(), output);
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(&self, command: &NpmCommand, otp: Option<&str>) -> ExecutionResult {
        let line = command.args().join(" ");
        self.calls
            .lock()
            .push((line.clone(), otp.map(str::to_string)));
        self.results.lock().get(&line).cloned().unwrap_or_default()
    }

    async fn whoami(&self) -> Option<String> {
        Some("alice".to_string())
    }

    async fn query(&self, query: &ReadQuery) -> Result<String, QueryError> {
        self.queries
            .lock()
            .get(&query.args())
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

struct TestApp {
    router: Router,
    state: Arc<ConnectorState>,
    executor: Arc<MockExecutor>,
}

impl TestApp {
    fn new() -> Self {
        let executor = Arc::new(MockExecutor::default());
        let state = Arc::new(ConnectorState::with_session(
            ConnectorConfig::default(),
            executor.clone(),
            Session::with_token(TOKEN),
        ));
        Self {
            router: server::router(Arc::clone(&state)),
            state,
            executor,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router failed");
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read body");
        let value = serde_json::from_slice(&bytes).expect("body is not JSON");
        (status, value)
    }

    async fn call(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call_with_token(method, uri, body, Some(TOKEN)).await
    }

    async fn call_with_token(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("failed to build request");
        self.send(request).await
    }

    /// Queue an operation and return its id
    async fn create(&self, body: Value) -> String {
        let (status, value) = self.call("POST", "/operations", Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{}", value);
        value["data"]["id"].as_str().unwrap().to_string()
    }

    async fn status_of(&self, id: &str) -> String {
        let (_, value) = self.call("GET", "/state", None).await;
        value["data"]["operations"]
            .as_array()
            .unwrap()
            .iter()
            .find(|op| op["id"] == id)
            .map(|op| op["status"].as_str().unwrap().to_string())
            .unwrap_or_else(|| panic!("operation {} not in state", id))
    }
}

fn team_create(team: &str) -> Value {
    json!({
        "kind": "team:create",
        "params": { "scopeTeam": team },
        "description": format!("Create team {}", team),
        "command": format!("npm team create {}", team),
    })
}

fn team_add(team: &str, user: &str, depends_on: &str) -> Value {
    json!({
        "kind": "team:add-user",
        "params": { "scopeTeam": team, "user": user },
        "description": format!("Add {} to {}", user, team),
        "command": format!("npm team add {} {}", team, user),
        "dependsOn": depends_on,
    })
}

#[tokio::test]
async fn test_connect_with_token() {
    let app = TestApp::new();

    let (status, value) = app
        .call_with_token("POST", "/connect", Some(json!({"token": TOKEN})), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["identity"], "alice");
    assert!(value["data"]["connectedAt"].is_u64());

    let (_, state) = app.call("GET", "/state", None).await;
    assert_eq!(state["data"]["identity"], "alice");
}

#[tokio::test]
async fn test_connect_with_wrong_token() {
    let app = TestApp::new();

    let (status, value) = app
        .call_with_token("POST", "/connect", Some(json!({"token": "nope"})), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(value, json!({"success": false, "error": "Unauthorized"}));
    assert_eq!(app.state.session_info().connected_at, None);
}

#[tokio::test]
async fn test_protected_endpoints_require_token() {
    let app = TestApp::new();
    let id = app.create(team_create("acme:devs")).await;

    let requests: Vec<(&str, String, Option<Value>)> = vec![
        ("GET", "/state".to_string(), None),
        ("POST", "/operations".to_string(), Some(team_create("acme:x"))),
        (
            "POST",
            "/operations/batch".to_string(),
            Some(json!([team_create("acme:y")])),
        ),
        ("POST", format!("/approve?id={}", id), None),
        ("POST", "/approve-all".to_string(), None),
        ("POST", format!("/retry?id={}", id), None),
        ("POST", "/execute".to_string(), Some(json!({}))),
        ("DELETE", format!("/operations?id={}", id), None),
        ("DELETE", "/operations/all".to_string(), None),
        ("GET", "/org/acme/users".to_string(), None),
        ("GET", "/org/acme/teams".to_string(), None),
        ("GET", "/team/acme:devs/users".to_string(), None),
        ("GET", "/package/widget/collaborators".to_string(), None),
    ];

    let before = app.state.operations.list();
    for token in [None, Some("wrong-token")] {
        for (method, uri, body) in &requests {
            let (status, value) = app
                .call_with_token(method, uri, body.clone(), token)
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
            assert_eq!(value["success"], false);
        }
    }

    assert_eq!(app.state.operations.list(), before);
    assert!(app.executor.calls().is_empty());
}

#[tokio::test]
async fn test_bearer_scheme_is_case_insensitive() {
    let app = TestApp::new();
    let request = Request::builder()
        .method("GET")
        .uri("/state")
        .header("authorization", format!("bearer {}", TOKEN))
        .body(Body::empty())
        .expect("failed to build request");

    let (status, value) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["success"], true);
}

#[tokio::test]
async fn test_create_rejects_invalid_params() {
    let app = TestApp::new();

    let (status, value) = app
        .call(
            "POST",
            "/operations",
            Some(json!({
                "kind": "owner:add",
                "params": { "user": "--registry=http://evil", "pkg": "widget" },
                "description": "",
                "command": "",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["success"], false);

    let (status, _) = app
        .call("POST", "/operations", Some(json!({"kind": "team:explode"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.state.operations.is_empty());
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let app = TestApp::new();

    let (status, value) = app
        .call(
            "POST",
            "/operations/batch",
            Some(json!([team_create("acme:a"), team_create("acme:b")])),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let created = value["data"].as_array().unwrap();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|op| op["status"] == "pending"));

    let (_, state) = app.call("GET", "/state", None).await;
    let teams: Vec<_> = state["data"]["operations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["params"]["scopeTeam"].clone())
        .collect();
    assert_eq!(teams, vec![json!("acme:a"), json!("acme:b")]);
}

#[tokio::test]
async fn test_approve_errors() {
    let app = TestApp::new();
    let id = app.create(team_create("acme:devs")).await;

    let (status, _) = app.call("POST", "/approve?id=missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, value) = app.call("POST", &format!("/approve?id={}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["status"], "approved");

    let (status, value) = app.call("POST", &format!("/approve?id={}", id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["success"], false);

    let (status, _) = app.call("POST", "/approve", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dependency_chain_succeeds_in_order() {
    let app = TestApp::new();
    let a = app.create(team_create("acme:devs")).await;
    let b = app.create(team_add("acme:devs", "bob", &a)).await;

    let (_, value) = app.call("POST", "/approve-all", None).await;
    assert_eq!(value["data"]["count"], 2);

    let (status, value) = app.call("POST", "/execute", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["otpRequired"], false);
    assert_eq!(value["data"]["authFailure"], false);
    assert_eq!(value["data"]["results"].as_array().unwrap().len(), 2);

    assert_eq!(app.status_of(&a).await, "completed");
    assert_eq!(app.status_of(&b).await, "completed");
    let calls: Vec<_> = app.executor.calls().into_iter().map(|(c, _)| c).collect();
    assert_eq!(calls, vec!["team create acme:devs", "team add acme:devs bob"]);
}

#[tokio::test]
async fn test_failed_dependency_skips_dependent() {
    let app = TestApp::new();
    app.executor.respond(
        "team create acme:devs",
        ExecutionResult::failure("npm ERR! 409 Conflict - team already exists"),
    );
    let a = app.create(team_create("acme:devs")).await;
    let b = app.create(team_add("acme:devs", "bob", &a)).await;
    app.call("POST", "/approve-all", None).await;

    let (_, value) = app.call("POST", "/execute", None).await;
    assert_eq!(value["data"]["otpRequired"], false);

    let (_, state) = app.call("GET", "/state", None).await;
    let ops = state["data"]["operations"].as_array().unwrap();
    assert_eq!(ops[0]["status"], "failed");
    assert_eq!(
        ops[0]["result"]["stderr"],
        "npm ERR! 409 Conflict - team already exists"
    );
    assert_eq!(ops[1]["id"], b);
    assert_eq!(ops[1]["status"], "failed");
    assert_eq!(ops[1]["result"]["stderr"], "Skipped: dependency failed");
    assert_eq!(ops[1]["result"]["exitCode"], 1);
    assert_eq!(app.executor.calls().len(), 1);
}

#[tokio::test]
async fn test_otp_challenge_then_retry() {
    let app = TestApp::new();
    app.executor.respond(
        "team create acme:devs",
        ExecutionResult {
            requires_otp: true,
            ..ExecutionResult::failure("This operation requires a one-time password (OTP).")
        },
    );
    let c = app.create(team_create("acme:devs")).await;
    app.call("POST", &format!("/approve?id={}", c), None).await;

    let (_, value) = app.call("POST", "/execute", None).await;
    assert_eq!(value["data"]["otpRequired"], true);
    assert_eq!(app.status_of(&c).await, "failed");

    // Retrying something that is not failed is rejected
    let other = app.create(team_create("acme:web")).await;
    let (status, _) = app.call("POST", &format!("/retry?id={}", other), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, value) = app.call("POST", &format!("/retry?id={}", c), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["status"], "approved");
    assert!(value["data"].get("result").is_none());

    app.executor
        .respond("team create acme:devs", ExecutionResult::default());
    let (_, value) = app
        .call("POST", "/execute", Some(json!({"otp": "123456"})))
        .await;
    assert_eq!(value["data"]["otpRequired"], false);
    assert_eq!(app.status_of(&c).await, "completed");

    let calls = app.executor.calls();
    assert_eq!(calls.last().unwrap().1.as_deref(), Some("123456"));
}

#[tokio::test]
async fn test_execute_rejects_malformed_otp() {
    let app = TestApp::new();
    let (status, value) = app
        .call("POST", "/execute", Some(json!({"otp": "12ab"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(value["error"], "OTP must be 6 to 8 digits");
}

#[tokio::test]
async fn test_delete_operations() {
    let app = TestApp::new();
    let a = app.create(team_create("acme:a")).await;
    app.create(team_create("acme:b")).await;

    let (status, _) = app.call("DELETE", "/operations?id=missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, value) = app
        .call("DELETE", &format!("/operations?id={}", a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["data"]["id"], a);

    let (_, value) = app.call("DELETE", "/operations/all", None).await;
    assert_eq!(value["data"]["removed"], 1);
    assert!(app.state.operations.is_empty());
}

#[tokio::test]
async fn test_org_users_query() {
    let app = TestApp::new();
    app.executor.answer(
        ReadQuery::OrgUsers {
            org: "acme".to_string(),
        },
        Ok(r#"{"alice":"owner","bob":"developer"}"#.to_string()),
    );

    let (status, value) = app.call("GET", "/org/acme/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        value["data"],
        json!({"alice": "owner", "bob": "developer"})
    );
}

#[tokio::test]
async fn test_team_and_package_queries() {
    let app = TestApp::new();
    app.executor.answer(
        ReadQuery::OrgTeams {
            org: "acme".to_string(),
        },
        Ok(r#"["acme:web","acme:devs"]"#.to_string()),
    );
    app.executor.answer(
        ReadQuery::TeamUsers {
            scope_team: "acme:devs".to_string(),
        },
        Ok(r#"["bob","alice"]"#.to_string()),
    );
    app.executor.answer(
        ReadQuery::PackageCollaborators {
            package: "@acme/widget".to_string(),
        },
        Ok(r#"{"alice":"read-write"}"#.to_string()),
    );

    let (_, value) = app.call("GET", "/org/acme/teams", None).await;
    assert_eq!(value["data"], json!(["acme:devs", "acme:web"]));

    let (_, value) = app.call("GET", "/team/acme:devs/users", None).await;
    assert_eq!(value["data"], json!(["alice", "bob"]));

    let (_, value) = app
        .call("GET", "/package/@acme%2Fwidget/collaborators", None)
        .await;
    assert_eq!(value["data"], json!({"alice": "read-write"}));
}

#[tokio::test]
async fn test_malformed_query_output_is_parse_error() {
    let app = TestApp::new();
    app.executor.answer(
        ReadQuery::OrgUsers {
            org: "acme".to_string(),
        },
        Ok("this is not json".to_string()),
    );

    let (status, value) = app.call("GET", "/org/acme/users", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(value["success"], false);
    assert!(value["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to parse npm output"));
}

#[tokio::test]
async fn test_query_rejects_invalid_names() {
    let app = TestApp::new();
    let (status, _) = app.call("GET", "/org/-acme/users", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
