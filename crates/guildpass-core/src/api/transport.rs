//! HTTP transport seam.
//!
//! The request wrapper and the token refresher only ever talk to an
//! `HttpTransport`; `ReqwestTransport` is the real one.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode, Url};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

/// A request relative to the API base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> serde_json::Result<Self> {
        Ok(Self::new(Method::POST, path).with_body(serde_json::to_value(body)?))
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// The request never produced an HTTP response (DNS, connect, TLS, timeout...)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request`, attaching `bearer` as the Authorization header when given.
    /// Any HTTP status is a successful send; only transport failures are errors.
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, TransportError>;
}

/// Transport over a shared `reqwest::Client`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    /// Parsed base URL; absolute request URLs must share its origin
    base: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("Invalid API base URL: {}", base_url))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            base,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs are accepted only
    /// on the backend's own origin so the bearer token never leaves it.
    fn url(&self, path: &str) -> Result<String, TransportError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            let target = Url::parse(path).map_err(|e| TransportError(format!("Invalid URL {}: {}", path, e)))?;
            if target.origin() != self.base.origin() {
                return Err(TransportError(format!(
                    "Refusing to send request to {}: not the API host",
                    target.origin().ascii_serialization()
                )));
            }
            Ok(path.to_string())
        } else if path.starts_with('/') {
            Ok(format!("{}{}", self.base_url, path))
        } else {
            Ok(format!("{}/{}", self.base_url, path))
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path)?;

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("Failed to send {} request to {}: {}", request.method, url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("Failed to read response body from {}: {}", url, e)))?;

        debug!(method = %request.method, url = %url, status = status.as_u16(), "API response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let transport = ReqwestTransport::new("https://quests.example.com/", Duration::from_secs(5)).unwrap();
        assert_eq!(transport.base_url(), "https://quests.example.com");
        assert_eq!(transport.url("/api/quests/").unwrap(), "https://quests.example.com/api/quests/");
        assert_eq!(transport.url("api/guilds/").unwrap(), "https://quests.example.com/api/guilds/");
        assert_eq!(
            transport.url("https://quests.example.com/api/quests/").unwrap(),
            "https://quests.example.com/api/quests/"
        );
    }

    #[test]
    fn test_foreign_origins_rejected() {
        let transport = ReqwestTransport::new("https://quests.example.com", Duration::from_secs(5)).unwrap();
        assert!(transport.url("https://other.example.com/steal").is_err());
        assert!(transport.url("http://quests.example.com/api/").is_err());
        assert!(transport.url("https://quests.example.com:8443/api/").is_err());
    }

    #[tokio::test]
    async fn test_bearer_never_sent_off_host() {
        let transport = ReqwestTransport::new("https://quests.example.com", Duration::from_secs(5)).unwrap();
        let err = transport
            .send(&ApiRequest::get("https://other.example.com/collect"), Some("A1"))
            .await
            .unwrap_err();
        assert!(err.0.contains("other.example.com"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ReqwestTransport::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_post_request_body() {
        let req = ApiRequest::post("/api/token/refresh/", &serde_json::json!({"refresh": "R1"})).unwrap();
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body, Some(serde_json::json!({"refresh": "R1"})));
    }

    #[test]
    fn test_response_helpers() {
        let ok = ApiResponse::new(StatusCode::OK, r#"{"id": 1}"#);
        assert!(ok.is_success());
        let value: serde_json::Value = ok.json().unwrap();
        assert_eq!(value["id"], 1);

        assert!(ApiResponse::new(StatusCode::UNAUTHORIZED, "").is_unauthorized());
    }
}
