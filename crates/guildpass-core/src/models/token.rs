use serde::{Deserialize, Serialize};

/// Credentials for one signed-in session.
///
/// Token values are opaque; nothing here inspects them. `Debug` redacts both
/// tokens so they never end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub remember_me: bool,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            remember_me: false,
        }
    }

    pub fn has_access(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn has_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Only a refresh credential is left (the access token was dropped or expired)
    pub fn refresh_only(&self) -> bool {
        !self.has_access() && self.has_refresh()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_access() && !self.has_refresh()
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("remember_me", &self.remember_me)
            .finish()
    }
}

/// Body of the login call
#[derive(Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Token pair issued on login
#[derive(Clone, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Body of the refresh call
#[derive(Clone, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response of the refresh call. `refresh` is only present when the backend rotates it.
#[derive(Clone, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let creds = SessionCredentials::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_refresh_only() {
        let mut creds = SessionCredentials::new("A1", "R1");
        assert!(!creds.refresh_only());

        creds.access_token = None;
        assert!(creds.refresh_only());

        creds.refresh_token = None;
        assert!(creds.is_empty());
    }

    #[test]
    fn test_parse_refresh_response() {
        let plain: RefreshResponse = serde_json::from_str(r#"{"access": "A2"}"#).unwrap();
        assert_eq!(plain.access, "A2");
        assert!(plain.refresh.is_none());

        let rotated: RefreshResponse =
            serde_json::from_str(r#"{"access": "A2", "refresh": "R2"}"#).unwrap();
        assert_eq!(rotated.refresh.as_deref(), Some("R2"));
    }

    #[test]
    fn test_serialize_refresh_request() {
        let body = serde_json::to_value(RefreshRequest { refresh: "R1" }).unwrap();
        assert_eq!(body, serde_json::json!({"refresh": "R1"}));
    }
}
