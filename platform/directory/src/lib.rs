//! The user directory: account records, their credentials and the
//! administrative operations on them.
//!
//! Administrative operations are gated by `platform_authz::PolicyEngine`; the
//! directory never decides access on its own.

mod credentials;
mod directory;
mod seed;

use entity::{User, UserId};
use platform_authz::AuthzError;
use platform_db::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

pub use argon2::Params as HashParams;
pub use credentials::{CredentialError, CredentialStore, HashedCredentials};
pub use directory::{NewUser, UserDirectory, UserUpdate};
pub use seed::{DEMO_CREDENTIALS, DemoCredential};

pub const USERS_KEY: &str = "crm_users";
pub const CREDENTIALS_KEY: &str = "crm_credentials";

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error(transparent)]
    Denied(#[from] AuthzError),
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl DirectoryError {
    /// Failures a caller can act on, as opposed to storage or hashing faults.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            DirectoryError::Denied(_) | DirectoryError::NotFound(_) | DirectoryError::InvalidInput(_)
        )
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Outcome of an administrative operation, ready for display.
#[derive(Clone, Debug, Serialize)]
pub struct UserPayload {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl UserPayload {
    pub(crate) fn from_result(result: DirectoryResult<User>, done: &str) -> Self {
        match result {
            Ok(user) => Self {
                success: true,
                message: done.to_string(),
                user: Some(user),
            },
            Err(err) if err.is_expected() => Self {
                success: false,
                message: err.to_string(),
                user: None,
            },
            Err(err) => {
                error!(error = %err, "directory operation failed");
                Self {
                    success: false,
                    message: "Unexpected error, please try again".into(),
                    user: None,
                }
            }
        }
    }
}
