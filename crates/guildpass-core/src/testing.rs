//! In-memory stand-in for the platform backend, used by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::api::{ApiRequest, ApiResponse, HttpTransport, TransportError};

pub const LOGIN_PATH: &str = "/api/token/";
pub const REFRESH_PATH: &str = "/api/token/refresh/";
pub const PROFILE_PATH: &str = "/api/users/me/";
pub const QUESTS_PATH: &str = "/api/quests/";
pub const MISSING_PATH: &str = "/api/quests/404/";

pub const TEST_USERNAME: &str = "aria";
pub const TEST_PASSWORD: &str = "hunter2";

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// Issue this access token; the backend accepts it from then on
    Issue(String),
    /// Issue and rotate the refresh token too
    Rotate { access: String, refresh: String },
    /// Issue a token the protected endpoints still reject
    IssueUnaccepted(String),
    Reject,
    NetworkDown,
    Garbled,
}

pub struct FakeBackend {
    accepted_access: Mutex<String>,
    refresh_outcome: Mutex<RefreshOutcome>,
    refresh_delay: Duration,
    refresh_calls: AtomicUsize,
    refresh_bodies: Mutex<Vec<serde_json::Value>>,
    log: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeBackend {
    /// Protected endpoints accept `accepted`; refresh issues `accepted` too.
    pub fn new(accepted: &str) -> Self {
        Self {
            accepted_access: Mutex::new(accepted.to_string()),
            refresh_outcome: Mutex::new(RefreshOutcome::Issue(accepted.to_string())),
            refresh_delay: Duration::ZERO,
            refresh_calls: AtomicUsize::new(0),
            refresh_bodies: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn set_refresh_outcome(&self, outcome: RefreshOutcome) {
        *self.refresh_outcome.lock().unwrap() = outcome;
    }

    /// Start rejecting every access token except `access`
    pub fn set_accepted_access(&self, access: &str) {
        *self.accepted_access.lock().unwrap() = access.to_string();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn last_refresh_body(&self) -> Option<serde_json::Value> {
        self.refresh_bodies.lock().unwrap().last().cloned()
    }

    /// Bearer tokens seen on `path`, in order
    pub fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }

    async fn refresh(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref body) = request.body {
            self.refresh_bodies.lock().unwrap().push(body.clone());
        }
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }

        let outcome = self.refresh_outcome.lock().unwrap().clone();
        match outcome {
            RefreshOutcome::Issue(access) => {
                *self.accepted_access.lock().unwrap() = access.clone();
                Ok(json(StatusCode::OK, serde_json::json!({ "access": access })))
            }
            RefreshOutcome::Rotate { access, refresh } => {
                *self.accepted_access.lock().unwrap() = access.clone();
                Ok(json(StatusCode::OK, serde_json::json!({ "access": access, "refresh": refresh })))
            }
            RefreshOutcome::IssueUnaccepted(access) => {
                Ok(json(StatusCode::OK, serde_json::json!({ "access": access })))
            }
            RefreshOutcome::Reject => Ok(json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" }),
            )),
            RefreshOutcome::NetworkDown => Err(TransportError("connection refused".to_string())),
            RefreshOutcome::Garbled => Ok(ApiResponse::new(StatusCode::OK, "<html>gateway</html>")),
        }
    }

    fn login(&self, request: &ApiRequest) -> ApiResponse {
        let body = request.body.clone().unwrap_or_default();
        if body["username"] == TEST_USERNAME && body["password"] == TEST_PASSWORD {
            let access = self.accepted_access.lock().unwrap().clone();
            json(StatusCode::OK, serde_json::json!({ "access": access, "refresh": "R1" }))
        } else {
            json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "detail": "No active account found with the given credentials" }),
            )
        }
    }

    fn protected(&self, path: &str, bearer: Option<&str>) -> ApiResponse {
        let accepted = self.accepted_access.lock().unwrap().clone();
        if bearer != Some(accepted.as_str()) {
            return json(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "detail": "Given token not valid for any token type" }),
            );
        }
        match path {
            QUESTS_PATH => json(
                StatusCode::OK,
                serde_json::json!([{ "id": 1, "title": "Slay the cave troll" }]),
            ),
            PROFILE_PATH => json(
                StatusCode::OK,
                serde_json::json!({ "id": 7, "username": TEST_USERNAME, "gold": 120, "guild": "Lanterns" }),
            ),
            _ => ApiResponse::new(StatusCode::NOT_FOUND, r#"{"detail":"Not found."}"#),
        }
    }
}

fn json(status: StatusCode, value: serde_json::Value) -> ApiResponse {
    ApiResponse::new(status, value.to_string())
}

#[async_trait]
impl HttpTransport for FakeBackend {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, TransportError> {
        self.log
            .lock()
            .unwrap()
            .push((request.path.clone(), bearer.map(str::to_string)));

        match request.path.as_str() {
            REFRESH_PATH => self.refresh(request).await,
            LOGIN_PATH => Ok(self.login(request)),
            path => Ok(self.protected(path, bearer)),
        }
    }
}
