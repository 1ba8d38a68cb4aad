use std::fmt;

use chrono::TimeDelta;

/// Storage key of the persisted session.
pub const SESSION_KEY: &str = "crm_session";

#[derive(Clone)]
pub struct SessionConfig {
    pub ttl: TimeDelta,
    pub storage_key: String,
    secret: Vec<u8>,
}

impl SessionConfig {
    /// `secret` signs session tokens.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            ttl: TimeDelta::hours(24),
            storage_key: SESSION_KEY.to_string(),
            secret: secret.into(),
        }
    }

    /// Configuration with a random signing secret. Tokens from a previous
    /// process will no longer verify, stored sessions still restore.
    pub fn ephemeral() -> Self {
        Self::new(rand::random::<[u8; 32]>().to_vec())
    }

    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("ttl", &self.ttl)
            .field("storage_key", &self.storage_key)
            .field("secret", &"<redacted>")
            .finish()
    }
}
