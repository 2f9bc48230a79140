//! SASL-PLAIN credential material.

use base64::{prelude::BASE64_STANDARD, Engine};

/// Environment variable consulted when no username is configured.
pub const ENV_GREMLIN_USER: &str = "GREMLIN_USER";
/// Environment variable consulted when no password is configured.
pub const ENV_GREMLIN_PASS: &str = "GREMLIN_PASS";

/// Username/password pair used to answer a 407 AUTHENTICATE challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Credentials from explicit values.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials from `GREMLIN_USER`/`GREMLIN_PASS`, empty when unset.
    pub fn from_env() -> Self {
        Self {
            username: std::env::var(ENV_GREMLIN_USER).unwrap_or_default(),
            password: std::env::var(ENV_GREMLIN_PASS).unwrap_or_default(),
        }
    }

    /// Base64-encoded SASL-PLAIN token: `base64(0x00 || user || 0x00 || pass)`.
    pub fn sasl_token(&self) -> String {
        let mut raw = Vec::with_capacity(2 + self.username.len() + self.password.len());
        raw.push(0);
        raw.extend_from_slice(self.username.as_bytes());
        raw.push(0);
        raw.extend_from_slice(self.password.as_bytes());
        BASE64_STANDARD.encode(raw)
    }
}
