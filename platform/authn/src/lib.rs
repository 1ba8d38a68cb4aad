//! Platform authentication: turns credentials into a time-bounded session
//! and exposes the signed-in principal to the policy engine.

mod clock;
mod config;
mod manager;
mod token;

use std::sync::Arc;

use entity::User;
use platform_db::StoreError;
use platform_directory::{CredentialError, DirectoryError};
use serde::Serialize;
use thiserror::Error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SESSION_KEY, SessionConfig};
pub use manager::{SessionListener, SessionManager, SubscriptionId};
pub use token::SessionClaims;

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session token has expired")]
    TokenExpired,
    #[error("invalid session token: {0}")]
    TokenInvalid(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("unexpected failure: {0}")]
    Unexpected(Arc<anyhow::Error>),
}

impl AuthnError {
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(Arc::new(err.into()))
    }
}

/// Result of a login attempt, ready for display.
#[derive(Clone, Debug, Serialize)]
pub struct AuthPayload {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl AuthPayload {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            user: None,
        }
    }
}
