//! In-process mock of the travel backends for facade tests
//!
//! One axum server plays every service (as behind a single gateway):
//! `/login`, `/register` and `/refresh-token` are real handlers, everything
//! else goes through a recording fallback that enforces the access token on
//! protected paths and answers with canned responses keyed by
//! `"METHOD /path"`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use auth_store::{CredentialStore, MemoryCredentialStore};
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use crate::{ApiSettings, TravelApi};

pub const EMAIL: &str = "a@b.com";
pub const PASSWORD: &str = "secret123";
pub const REFRESH_TOKEN: &str = "rt_1";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: Value,
    pub body_len: usize,
}

#[derive(Clone)]
enum Canned {
    Json(Value),
    Text(&'static str),
}

pub struct MockBackend {
    valid_access: Mutex<String>,
    refresh_ok: AtomicBool,
    refresh_delay: Duration,
    refresh_calls: AtomicUsize,
    responses: Mutex<HashMap<String, (StatusCode, Canned)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockBackend {
    /// Backend that accepts `valid_access` and refreshes to `at_fresh`.
    pub fn new(valid_access: &str) -> Arc<Self> {
        Arc::new(Self {
            valid_access: Mutex::new(valid_access.to_string()),
            refresh_ok: AtomicBool::new(true),
            refresh_delay: Duration::from_millis(50),
            refresh_calls: AtomicUsize::new(0),
            responses: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn reject_refresh(&self) {
        self.refresh_ok.store(false, Ordering::SeqCst);
    }

    pub fn respond(&self, route: &str, status: StatusCode, body: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(route.to_string(), (status, Canned::Json(body)));
    }

    /// Answer `route` with a plain-text body.
    pub fn respond_text(&self, route: &str, status: StatusCode, body: &'static str) {
        self.responses
            .lock()
            .unwrap()
            .insert(route.to_string(), (status, Canned::Text(body)));
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests that reached `route` (`"METHOD /path"`).
    pub fn hits(&self, route: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| format!("{} {}", r.method, r.path) == route)
            .collect()
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let valid = self.valid_access.lock().unwrap().clone();
        let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        header("authorization") == Some(format!("Bearer {valid}").as_str())
            || header("cookie") == Some(format!("auth_token={valid}").as_str())
    }
}

fn is_protected(path: &str) -> bool {
    path.starts_with("/api/")
        || matches!(
            path,
            "/profile" | "/logout" | "/validate-token" | "/update-password"
        )
}

async fn login(State(backend): State<Arc<MockBackend>>, Json(req): Json<Value>) -> Response {
    if req["email"] != EMAIL || req["password"] != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "invalid email or password"})),
        )
            .into_response();
    }
    let token = backend.valid_access.lock().unwrap().clone();
    Json(json!({
        "token": token,
        "refreshToken": REFRESH_TOKEN,
        "user": {"id": 42, "email": EMAIL}
    }))
    .into_response()
}

async fn register(Json(req): Json<Value>) -> Response {
    if req["email"] == EMAIL {
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": "email already registered"})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"user": {"id": 43, "email": req["email"]}})),
    )
        .into_response()
}

async fn refresh(State(backend): State<Arc<MockBackend>>, Json(req): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(backend.refresh_delay).await;
    if !backend.refresh_ok.load(Ordering::SeqCst) || req["refreshToken"] != REFRESH_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "refresh token expired"})),
        )
            .into_response();
    }
    *backend.valid_access.lock().unwrap() = "at_fresh".into();
    Json(json!({"token": "at_fresh"})).into_response()
}

async fn fallback(
    State(backend): State<Arc<MockBackend>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    backend.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
        body_len: body.len(),
    });

    if is_protected(&path) && !backend.authorized(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "token expired"})),
        )
            .into_response();
    }

    let canned = backend
        .responses
        .lock()
        .unwrap()
        .get(&format!("{method} {path}"))
        .cloned();
    match canned {
        Some((status, Canned::Json(body))) => (status, Json(body)).into_response(),
        Some((status, Canned::Text(body))) => (status, body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": format!("no route for {method} {path}")})),
        )
            .into_response(),
    }
}

/// Serve `backend` on an ephemeral port and return its base URL.
pub async fn start(backend: Arc<MockBackend>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh-token", post(refresh))
        .fallback(fallback)
        .with_state(backend);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

/// Facade bundle pointed at `base` for every service.
pub fn api(base: &str, store: Arc<dyn CredentialStore>) -> TravelApi {
    TravelApi::new(&ApiSettings::with_base_url(base), store).unwrap()
}

/// Memory store holding `access` and the mock's refresh token.
pub async fn session(access: &str) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    auth_store::Credential::new(access, Some(REFRESH_TOKEN.into()))
        .save(store.as_ref())
        .await
        .unwrap();
    store
}

/// Backend accepting `at_1`, a logged-in store, and the facades.
pub async fn logged_in() -> (Arc<MockBackend>, Arc<MemoryCredentialStore>, TravelApi) {
    let backend = MockBackend::new("at_1");
    let base = start(backend.clone()).await;
    let store = session("at_1").await;
    let api = api(&base, store.clone());
    (backend, store, api)
}
