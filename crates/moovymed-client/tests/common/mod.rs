// ABOUTME: Axum mock of the MoovyMed API used by the client integration tests.
// ABOUTME: Tracks the headers, queries and bodies it sees and how often the refresh endpoint is called.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Multipart, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use moovymed_client::{ApiClient, ClientConfig, SessionExpiredHook};
use moovymed_session::{MemorySessionStore, Session, SessionStore};
use serde_json::{Value, json};

/// How the mock answers `/user/refresh`.
#[derive(Debug, Clone)]
pub enum RefreshMode {
    /// Accept `expected_refresh` and issue this access token.
    Issue(String),
    /// Reject every refresh with the given status.
    Fail(StatusCode),
    /// Answer 200 with an empty JSON object.
    Empty,
}

/// What `/echo` saw on one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoSeen {
    pub authorization: Option<String>,
    pub trace: Option<String>,
    pub content_type: Option<String>,
    pub query: Option<String>,
}

pub struct MockBackend {
    pub valid_token: Mutex<String>,
    pub expected_refresh: String,
    pub refresh_mode: Mutex<RefreshMode>,
    pub refresh_delay: Duration,
    pub refresh_calls: AtomicUsize,
    pub refresh_bodies: Mutex<Vec<Value>>,
    /// (path, authorization, x-locale) per request hitting a data route.
    pub seen: Mutex<Vec<(String, Option<String>, Option<String>)>>,
    pub logout_status: StatusCode,
    pub echoes: Mutex<Vec<EchoSeen>>,
    /// Field names of every multipart upload received, authorized or not.
    pub uploads: Mutex<Vec<Vec<String>>>,
    /// (path, JSON or form body) of the account endpoints.
    pub account_bodies: Mutex<Vec<(String, Value)>>,
}

impl MockBackend {
    pub fn new(valid_token: &str, expected_refresh: &str, mode: RefreshMode) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            expected_refresh: expected_refresh.to_string(),
            refresh_mode: Mutex::new(mode),
            refresh_delay: Duration::ZERO,
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            seen: Mutex::new(Vec::new()),
            logout_status: StatusCode::OK,
            echoes: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            account_bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.seen.lock().unwrap().clone()
    }

    pub fn echoes(&self) -> Vec<EchoSeen> {
        self.echoes.lock().unwrap().clone()
    }

    pub fn account_bodies(&self) -> Vec<(String, Value)> {
        self.account_bodies.lock().unwrap().clone()
    }

    fn record_account(&self, path: &str, body: Value) {
        self.account_bodies.lock().unwrap().push((path.to_string(), body));
    }

    fn record(&self, path: &str, headers: &HeaderMap) -> Option<String> {
        let auth = header(headers, "authorization");
        let locale = header(headers, "x-locale");
        self.seen
            .lock()
            .unwrap()
            .push((path.to_string(), auth.clone(), locale));
        auth
    }

    fn authorized(&self, auth: Option<&str>) -> bool {
        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        auth == Some(expected.as_str())
    }
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn items(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    let auth = mock.record("/items", &headers);
    if mock.authorized(auth.as_deref()) {
        Json(json!({ "items": ["a", "b"] })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "token expired").into_response()
    }
}

async fn always_unauthorized(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    mock.record("/locked", &headers);
    (StatusCode::UNAUTHORIZED, "never").into_response()
}

async fn broken(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    mock.record("/broken", &headers);
    (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
}

async fn refresh(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    mock.refresh_bodies.lock().unwrap().push(body.clone());

    if !mock.refresh_delay.is_zero() {
        tokio::time::sleep(mock.refresh_delay).await;
    }

    let mode = mock.refresh_mode.lock().unwrap().clone();
    match mode {
        RefreshMode::Issue(new_token)
            if body["token"].as_str() == Some(mock.expected_refresh.as_str()) =>
        {
            *mock.valid_token.lock().unwrap() = new_token.clone();
            Json(json!({ "accessToken": new_token })).into_response()
        }
        RefreshMode::Issue(_) => (StatusCode::UNAUTHORIZED, "bad refresh token").into_response(),
        RefreshMode::Fail(status) => (status, "refresh unavailable").into_response(),
        RefreshMode::Empty => Json(json!({})).into_response(),
    }
}

async fn fast(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    mock.record("/fast", &headers);
    (StatusCode::UNAUTHORIZED, "token expired").into_response()
}

/// A 401 that arrives well after `/fast` has already been answered.
async fn slow(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    tokio::time::sleep(Duration::from_millis(300)).await;
    mock.record("/slow", &headers);
    (StatusCode::UNAUTHORIZED, "token expired").into_response()
}

async fn echo(
    State(mock): State<Arc<MockBackend>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let auth = mock.record("/echo", &headers);
    mock.echoes.lock().unwrap().push(EchoSeen {
        authorization: auth.clone(),
        trace: header(&headers, "x-trace"),
        content_type: header(&headers, "content-type"),
        query,
    });
    if mock.authorized(auth.as_deref()) {
        Json(json!({ "echo": serde_json::from_str::<Value>(&body).unwrap_or(Value::Null) })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "token expired").into_response()
    }
}

async fn create_content(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let auth = mock.record("/category-content/create", &headers);

    // Drain the whole body before answering, even for a 401.
    let mut names = Vec::new();
    let mut file_size = 0;
    let mut file_type = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            file_type = field.content_type().map(String::from);
            file_size = field.bytes().await.unwrap().len();
        } else {
            field.text().await.unwrap();
        }
        names.push(name);
    }
    mock.uploads.lock().unwrap().push(names.clone());

    if mock.authorized(auth.as_deref()) {
        (
            StatusCode::CREATED,
            Json(json!({ "fields": names, "file_size": file_size, "file_type": file_type })),
        )
            .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "token expired").into_response()
    }
}

async fn register(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    mock.record_account("/user/register", body.clone());
    if body["password"] == body["password_confirmation"] {
        Json(json!({ "status": "success", "message": "registered" })).into_response()
    } else {
        Json(json!({ "status": "error", "message": "passwords do not match" })).into_response()
    }
}

async fn forget_password(
    State(mock): State<Arc<MockBackend>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    mock.record_account("/user/forget-password", json!(form));
    if form.get("email").map(String::as_str) == Some("ada@example.com") {
        Json(json!({ "user_id": 42, "message": "OTP sent to your email" })).into_response()
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "message": "unknown email" }))).into_response()
    }
}

fn is_reset_user(id: &Value) -> bool {
    id == &json!("42") || id == &json!(42)
}

async fn verify_otp(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    mock.record_account("/user/forget-password/verify-otp", body.clone());
    if is_reset_user(&body["id"]) && body["otp"] == "123456" {
        Json(json!({ "status": "success" })).into_response()
    } else {
        Json(json!({ "status": "error", "message": "Invalid OTP" })).into_response()
    }
}

async fn reset_password(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Response {
    mock.record_account("/user/reset-password", body.clone());
    if is_reset_user(&body["id"]) && body["password"] == body["password_confirmation"] {
        Json(json!({ "status": "success" })).into_response()
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "message": "reset failed" }))).into_response()
    }
}

async fn update_profile(
    State(mock): State<Arc<MockBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = mock.record("/user/profile", &headers);
    if !mock.authorized(auth.as_deref()) {
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }
    mock.record_account("/user/profile", body.clone());
    Json(json!({ "username": "ada", "email": body["email"], "name": body["name"] })).into_response()
}

async fn login(Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("username").map(String::as_str) == Some("ada")
        && form.get("password").map(String::as_str) == Some("lovelace")
    {
        Json(json!({
            "access_token": "login-access",
            "expires_in": 3600,
            "token_type": "bearer"
        }))
        .into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "invalid credentials").into_response()
    }
}

async fn logout(State(mock): State<Arc<MockBackend>>) -> Response {
    (mock.logout_status, "bye").into_response()
}

async fn profile(State(mock): State<Arc<MockBackend>>, headers: HeaderMap) -> Response {
    let auth = mock.record("/user/profile", &headers);
    if mock.authorized(auth.as_deref()) {
        Json(json!({ "username": "ada", "email": "ada@example.com" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "token expired").into_response()
    }
}

/// Serve `mock` on an ephemeral loopback port and return the API base URL.
pub async fn spawn(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/v1/items", get(items))
        .route("/api/v1/locked", get(always_unauthorized))
        .route("/api/v1/broken", get(broken))
        .route("/api/v1/user/refresh", post(refresh))
        .route("/api/v1/user/login", post(login))
        .route("/api/v1/user/logout", get(logout))
        .route("/api/v1/user/profile", get(profile).post(update_profile))
        .route("/api/v1/fast", get(fast))
        .route("/api/v1/slow", get(slow))
        .route("/api/v1/echo", get(echo).post(echo))
        .route("/api/v1/category-content/create", post(create_content))
        .route("/api/v1/user/register", post(register))
        .route("/api/v1/user/forget-password", post(forget_password))
        .route("/api/v1/user/forget-password/verify-otp", post(verify_otp))
        .route("/api/v1/user/reset-password", post(reset_password))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/v1", addr)
}

/// Hook that counts invocations and records whether the store was already
/// empty when it ran.
pub struct RecordingHook {
    pub store: Arc<dyn SessionStore>,
    pub calls: AtomicUsize,
    pub saw_empty_store: Mutex<Vec<bool>>,
}

impl RecordingHook {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            calls: AtomicUsize::new(0),
            saw_empty_store: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionExpiredHook for RecordingHook {
    async fn session_expired(&self, _reason: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_empty_store
            .lock()
            .unwrap()
            .push(self.store.load().is_empty());
    }
}

/// A client against `base_url` whose store starts as `session`.
pub fn client_with(base_url: &str, session: Session) -> (ApiClient, Arc<dyn SessionStore>, Arc<RecordingHook>) {
    client_with_config(ClientConfig::new(base_url).unwrap(), session)
}

pub fn client_with_config(
    config: ClientConfig,
    session: Session,
) -> (ApiClient, Arc<dyn SessionStore>, Arc<RecordingHook>) {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::with_session(session));
    let hook = Arc::new(RecordingHook::new(Arc::clone(&store)));
    let client = ApiClient::builder(config, Arc::clone(&store))
        .hook(hook.clone())
        .build()
        .unwrap();
    (client, store, hook)
}

pub fn session(access: Option<&str>, refresh: Option<&str>, locale: Option<&str>) -> Session {
    Session {
        access_token: access.map(String::from),
        refresh_token: refresh.map(String::from),
        locale: locale.map(String::from),
        ..Session::default()
    }
}
