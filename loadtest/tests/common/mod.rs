//! Common Test Utilities for Integration Tests
//!
//! An in-process authentication API with the same contract as the system
//! under test: unique-email registration, credential login issuing bearer
//! tokens, and logout revoking every token of the caller.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const SEED_EMAIL: &str = "user_test@example.com";
pub const SEED_PASSWORD: &str = "password123";

/// Which field the login response carries the token in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStyle {
    /// `{"access_token": ..., "token_type": "Bearer"}`
    AccessToken,
    /// `{"token": ...}`
    Token,
    /// Neither field
    Missing,
}

#[derive(Debug, Clone)]
struct User {
    name: String,
    password: String,
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<String, User>,
    /// token -> email
    tokens: HashMap<String, String>,
    next_token: u64,
    requests: HashMap<&'static str, u64>,
}

impl Store {
    fn issue_token(&mut self, email: &str) -> String {
        self.next_token += 1;
        let token = format!("{}|tok{:06}", self.next_token, self.next_token);
        self.tokens.insert(token.clone(), email.to_string());
        token
    }

    fn count(&mut self, endpoint: &'static str) {
        *self.requests.entry(endpoint).or_default() += 1;
    }
}

/// Shared state of the mock API, also used by tests to inspect it
#[derive(Clone)]
pub struct MockAuthState {
    store: Arc<Mutex<Store>>,
    token_style: TokenStyle,
}

impl MockAuthState {
    pub fn new(token_style: TokenStyle) -> Self {
        let state = Self {
            store: Arc::new(Mutex::new(Store::default())),
            token_style,
        };
        state.seed_user("Seed User", SEED_EMAIL, SEED_PASSWORD);
        state
    }

    pub fn seed_user(&self, name: &str, email: &str, password: &str) {
        self.store.lock().unwrap().users.insert(
            email.to_string(),
            User {
                name: name.to_string(),
                password: password.to_string(),
            },
        );
    }

    pub fn has_user(&self, email: &str) -> bool {
        self.store.lock().unwrap().users.contains_key(email)
    }

    pub fn active_tokens(&self) -> usize {
        self.store.lock().unwrap().tokens.len()
    }

    /// Revoke every token, as if the server restarted its token store
    pub fn revoke_all(&self) {
        self.store.lock().unwrap().tokens.clear();
    }

    pub fn requests(&self, endpoint: &'static str) -> u64 {
        self.store
            .lock()
            .unwrap()
            .requests
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

fn validation_error(message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": message })),
    )
        .into_response()
}

async fn register(State(state): State<MockAuthState>, Json(req): Json<RegisterRequest>) -> Response {
    let mut store = state.store.lock().unwrap();
    store.count("register");

    if req.name.is_empty() || req.name.len() > 255 {
        return validation_error("The name field is required.");
    }
    if !req.email.contains('@') {
        return validation_error("The email field must be a valid email address.");
    }
    if req.password.len() < 8 {
        return validation_error("The password field must be at least 8 characters.");
    }
    if store.users.contains_key(&req.email) {
        return validation_error("The email has already been taken.");
    }

    store.users.insert(
        req.email.clone(),
        User {
            name: req.name,
            password: req.password,
        },
    );
    let token = store.issue_token(&req.email);

    Json(json!({ "access_token": token, "token_type": "Bearer" })).into_response()
}

async fn login(State(state): State<MockAuthState>, Json(req): Json<LoginRequest>) -> Response {
    let mut store = state.store.lock().unwrap();
    store.count("login");

    let user = match store.users.get(&req.email) {
        Some(user) if user.password == req.password => user.clone(),
        _ => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "credenciales invalidas" })),
            )
                .into_response();
        }
    };
    let token = store.issue_token(&req.email);

    let body: Value = match state.token_style {
        TokenStyle::AccessToken => json!({
            "access_token": token,
            "user_name": user.name,
            "token_type": "Bearer",
        }),
        TokenStyle::Token => json!({ "token": token }),
        TokenStyle::Missing => json!({ "user_name": user.name }),
    };
    Json(body).into_response()
}

async fn logout(State(state): State<MockAuthState>, headers: HeaderMap) -> Response {
    let mut store = state.store.lock().unwrap();
    store.count("logout");

    let email = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| store.tokens.get(token).cloned());

    match email {
        Some(email) => {
            store.tokens.retain(|_, owner| *owner != email);
            Json(json!({ "message": "Sesión cerrada" })).into_response()
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Unauthenticated." })),
        )
            .into_response(),
    }
}

/// Router exposing both the plain and the `/api/test` endpoint families
pub fn create_mock_api(state: MockAuthState) -> Router {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/test/register", post(register))
        .route("/api/test/login", post(login))
        .route("/api/logout", post(logout))
        .with_state(state)
}

/// Serve the mock API on an ephemeral port, returning its base URL
pub async fn spawn_mock_api(token_style: TokenStyle) -> (String, MockAuthState) {
    let state = MockAuthState::new(token_style);
    let app = create_mock_api(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock API");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock API crashed");
    });

    (format!("http://{}", addr), state)
}
