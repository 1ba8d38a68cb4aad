use chrono::{DateTime, Utc};
use entity::UserId;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{AuthnError, SessionConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,
    /// Session id, fresh for every login.
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
}

pub(crate) fn issue_token(
    user_id: &UserId,
    sid: &str,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    config: &SessionConfig,
) -> Result<String, AuthnError> {
    let claims = SessionClaims {
        sub: user_id.clone(),
        sid: sid.to_string(),
        iat: issued_at.timestamp(),
        exp: expires_at.timestamp(),
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret()),
    )
    .map_err(AuthnError::unexpected)
}

/// Check the signature, then expiry against `now` rather than the system
/// time so an injected clock governs both sessions and tokens.
pub(crate) fn decode_token(
    token: &str,
    config: &SessionConfig,
    now: DateTime<Utc>,
) -> Result<SessionClaims, AuthnError> {
    let mut validation = Validation::default();
    validation.validate_exp = false;
    let claims = jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(config.secret()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|err| AuthnError::TokenInvalid(err.to_string()))?;
    if now.timestamp() >= claims.exp {
        return Err(AuthnError::TokenExpired);
    }
    Ok(claims)
}
