use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::User;

/// The authenticated principal plus its bearer token. Timestamps serialise
/// as RFC 3339 strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub login_time: DateTime<Utc>,
}

impl UserSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
