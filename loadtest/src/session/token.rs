//! Bearer tokens and login-response token extraction

use serde_json::Value;
use std::fmt;

/// Opaque bearer credential. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(<{} chars>)", self.0.len())
    }
}

/// Return the first field in `fields` that holds a non-empty string.
///
/// Fields are tried in order, so `["access_token", "token"]` prefers
/// `access_token` when both are present.
pub fn extract_token<S: AsRef<str>>(body: &Value, fields: &[S]) -> Option<AuthToken> {
    fields.iter().find_map(|field| {
        body.get(field.as_ref())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(AuthToken::new)
    })
}
