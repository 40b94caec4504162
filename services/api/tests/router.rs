//! End-to-end checks of the console router with demo sessions and mock data.

use api_lib::adapters::{HttpUserDirectory, MockCatalog, OktaIdentityAdapter};
use api_lib::config::Config;
use api_lib::web::{self, state::AppState};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use doc_review_core::persistence::{MemoryKeyValueStore, SNAPSHOT_KEY};
use doc_review_core::ports::KeyValueStore;
use doc_review_core::SessionStorage;
use rstest::{fixture, rstest};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    state: Arc<AppState>,
    backend: Arc<MemoryKeyValueStore>,
}

impl TestApp {
    fn router(&self) -> Router {
        web::router(self.state.clone())
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, location, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Option<String>, Value) {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str) -> (StatusCode, Option<String>, Value) {
        self.send(Method::POST, uri, None).await
    }

    async fn first_page_id(&self) -> String {
        self.state.store.read().await.pages()[0].id.clone()
    }
}

fn build_app(demo_enabled: bool) -> TestApp {
    let vars: HashMap<&str, String> = HashMap::from([
        ("OKTA_ISSUER", "https://example.okta.com/oauth2/default".to_string()),
        ("OKTA_CLIENT_ID", "client-123".to_string()),
        ("USER_DIRECTORY_URL", "http://127.0.0.1:9".to_string()),
        ("DEMO_LOGIN_ENABLED", demo_enabled.to_string()),
        ("MOCK_DELAY_MS", "0".to_string()),
    ]);
    let config = Arc::new(Config::from_lookup(|key| vars.get(key).cloned()).unwrap());

    let http = reqwest::Client::new();
    let okta = Arc::new(OktaIdentityAdapter::new(
        http.clone(),
        config.okta_issuer.clone(),
        config.okta_client_id.clone(),
        config.okta_redirect_uri.clone(),
    ));
    let directory = Arc::new(HttpUserDirectory::new(http, config.user_directory_url.clone()));
    let backend = Arc::new(MemoryKeyValueStore::new());
    let storage = SessionStorage::new(backend.clone());
    let state = Arc::new(AppState::new(
        config,
        okta,
        directory,
        Arc::new(MockCatalog::new(Duration::ZERO)),
        storage,
    ));
    TestApp { state, backend }
}

#[fixture]
fn app() -> TestApp {
    build_app(true)
}

#[rstest]
#[case("/", "/login?return_to=%2F")]
#[case("/states/Texas", "/login?return_to=%2Fstates%2FTexas")]
#[case("/pages/p-1/editor", "/login?return_to=%2Fpages%2Fp-1%2Feditor")]
#[case("/admin", "/login?return_to=%2Fadmin")]
#[tokio::test]
async fn signed_out_requests_go_to_login(app: TestApp, #[case] path: &str, #[case] expected: &str) {
    let (status, location, _) = app.get(path).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some(expected));
}

#[rstest]
#[tokio::test]
async fn unknown_paths_are_not_found(app: TestApp) {
    let (status, _, body) = app.get("/nowhere/at/all").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}

#[rstest]
#[tokio::test]
async fn login_redirects_to_the_provider(app: TestApp) {
    let (status, location, _) = app.get("/login?return_to=%2Fadmin").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = location.unwrap();
    assert!(location.starts_with("https://example.okta.com/oauth2/default/v1/authorize?"));
    assert!(location.contains("code_challenge_method=S256"));
}

#[rstest]
#[case("/login/callback?code=abc&state=never-issued", StatusCode::BAD_REQUEST)]
#[case("/login/callback?state=only-state", StatusCode::BAD_REQUEST)]
#[case("/login/callback?error=access_denied", StatusCode::UNAUTHORIZED)]
#[tokio::test]
async fn bad_callbacks_are_rejected(app: TestApp, #[case] uri: &str, #[case] expected: StatusCode) {
    let (status, _, _) = app.get(uri).await;
    assert_eq!(status, expected);
}

#[rstest]
#[tokio::test]
async fn demo_cca_can_browse_and_edit(app: TestApp) {
    let (status, _, session) = app.post("/login/demo/cca").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "ready");
    assert_eq!(session["user"]["role"], "cca");
    assert_eq!(session["authenticated"], true);

    let (status, _, states) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(states["states"].as_array().unwrap().len(), 5);
    assert_eq!(states["states"][0]["documentCount"], 3);

    let (status, _, docs) = app.get("/states/Texas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs["documents"].as_array().unwrap().len(), 3);
    assert_eq!(docs["breadcrumbs"][1]["label"], "Texas");
    assert_eq!(app.state.store.read().await.current_state(), Some("Texas"));

    let page_id = app.first_page_id().await;
    let (status, _, editor) = app.get(&format!("/pages/{page_id}/editor")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(editor["permissions"]["canEdit"], true);
    assert_eq!(editor["permissions"]["canApprove"], false);

    let edits = json!({ "edits": [
        { "op": "setJson", "text": "{\"fields\":[]}" },
        { "op": "addRule" },
        { "op": "updateRule", "index": 0, "field": "rule", "value": "required" }
    ]});
    let (status, _, saved) = app
        .send(Method::PUT, &format!("/pages/{page_id}/editor"), Some(edits))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["json"], json!({ "fields": [] }));
    assert_eq!(saved["validationRules"][0]["rule"], "required");

    let (status, _, _) = app.post(&format!("/pages/{page_id}/approve")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, location, _) = app.get("/admin").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
}

#[rstest]
#[tokio::test]
async fn invalid_editor_json_is_rejected(app: TestApp) {
    app.post("/login/demo/cca").await;
    let page_id = app.first_page_id().await;
    let before = app.state.store.read().await.page(&page_id).cloned();

    let edits = json!({ "edits": [{ "op": "setJson", "text": "{ nope" }] });
    let (status, _, _) = app
        .send(Method::PUT, &format!("/pages/{page_id}/editor"), Some(edits))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.state.store.read().await.page(&page_id).cloned(), before);
}

#[rstest]
#[tokio::test]
async fn demo_dev_reviews_but_cannot_edit(app: TestApp) {
    app.post("/login/demo/dev").await;
    let page_id = app.first_page_id().await;

    let (status, _, decision) = app.post(&format!("/pages/{page_id}/reject")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["verdict"], "rejected");
    assert_eq!(decision["reviewer"], "dev@example.com");

    let edits = json!({ "edits": [{ "op": "addRule" }] });
    let (status, _, _) = app
        .send(Method::PUT, &format!("/pages/{page_id}/editor"), Some(edits))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[rstest]
#[tokio::test]
async fn demo_admin_reaches_the_admin_page(app: TestApp) {
    app.post("/login/demo/admin").await;
    let (status, _, body) = app.get("/admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");
    assert_eq!(body["documentCount"], 15);
    assert_eq!(body["selectionIssues"], json!([]));

    let emails: Vec<&str> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["email"].as_str().unwrap())
        .collect();
    assert_eq!(emails, ["cca@example.com", "dev@example.com", "admin@example.com"]);
    assert_eq!(body["users"][1]["role"], "dev");

    let access = body["stateAccess"].as_array().unwrap();
    assert_eq!(access.len(), 5);
    assert_eq!(access[0], json!({ "state": "California", "userCount": 3 }));
    assert!(access.iter().all(|entry| entry["userCount"] == 3));
}

#[rstest]
#[tokio::test]
async fn default_demo_login_signs_in_the_default_user(app: TestApp) {
    let (status, _, session) = app.post("/login/demo").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "ready");
    assert_eq!(session["isLoading"], false);
    assert_eq!(session["user"]["email"], "user@example.com");
    assert_eq!(session["user"]["role"], "cca");

    let (status, _, _) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[tokio::test]
async fn navigation_is_saved_and_logout_clears_it(app: TestApp) {
    app.post("/login/demo/cca").await;
    app.get("/states/Florida").await;
    let saved = app.backend.get(SNAPSHOT_KEY).unwrap().unwrap();
    assert!(saved.contains("\"currentState\":\"Florida\""));

    let (status, _, session) = app.post("/logout").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["phase"], "signedOut");
    assert_eq!(session["user"], Value::Null);
    let saved = app.backend.get(SNAPSHOT_KEY).unwrap().unwrap_or_default();
    assert!(!saved.contains("Florida"));
    assert_eq!(app.backend.get("user_role").unwrap(), None);

    let (status, location, _) = app.get("/states/Florida").await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/login?return_to=%2Fstates%2FFlorida"));
}

#[rstest]
#[tokio::test]
async fn unknown_entities_are_not_found(app: TestApp) {
    app.post("/login/demo/cca").await;
    assert_eq!(app.get("/states/Atlantis").await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/documents/doc-missing").await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/versions/v-missing/pages").await.0, StatusCode::NOT_FOUND);
}

#[rstest]
#[tokio::test]
async fn guard_endpoint_reports_decisions(app: TestApp) {
    let (_, _, before) = app.get("/session/guard?path=%2Fadmin").await;
    assert_eq!(before["allowed"], false);
    assert_eq!(before["redirectTo"], "/login?return_to=%2Fadmin");

    app.post("/login/demo/dev").await;
    let (_, _, after) = app.get("/session/guard?path=%2Fadmin").await;
    assert_eq!(after["redirectTo"], "/");
    let (_, _, docs) = app.get("/session/guard?path=%2Fstates%2FTexas").await;
    assert_eq!(docs["allowed"], true);
}

#[tokio::test]
async fn demo_login_is_off_unless_enabled() {
    let app = build_app(false);
    let (status, _, _) = app.post("/login/demo/admin").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _, _) = app.post("/login/demo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[rstest]
#[case("unassigned")]
#[case("root")]
#[tokio::test]
async fn demo_login_rejects_non_console_roles(app: TestApp, #[case] role: &str) {
    let (status, _, _) = app.post(&format!("/login/demo/{role}")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[rstest]
#[tokio::test]
async fn retry_without_a_provider_session_is_unauthorized(app: TestApp) {
    let (status, _, _) = app.post("/session/retry").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
