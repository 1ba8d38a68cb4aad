use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::TimeDelta;
use platform_authn::SessionConfig;
use platform_db::StoreSettings;
use tracing::warn;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let store_path = StoreSettings::default().path();

        let ttl_hours = match std::env::var("SESSION_TTL_HOURS") {
            Ok(raw) => raw
                .trim()
                .parse::<i64>()
                .context("invalid SESSION_TTL_HOURS")?,
            Err(_) => 24,
        };
        if ttl_hours <= 0 {
            return Err(anyhow!("SESSION_TTL_HOURS must be positive"));
        }

        let session = match std::env::var("SESSION_SECRET_BASE64") {
            Ok(encoded) => SessionConfig::new(decode_secret(&encoded)?),
            Err(_) => {
                warn!("SESSION_SECRET_BASE64 not set; using a random secret for this process");
                SessionConfig::ephemeral()
            }
        }
        .with_ttl(TimeDelta::hours(ttl_hours));

        Ok(Self {
            store_path,
            session,
        })
    }
}

fn decode_secret(encoded: &str) -> Result<Vec<u8>> {
    let secret = STANDARD
        .decode(encoded.trim())
        .context("invalid SESSION_SECRET_BASE64")?;
    if secret.len() < MIN_SECRET_BYTES {
        return Err(anyhow!(
            "SESSION_SECRET_BASE64 must decode to at least {MIN_SECRET_BYTES} bytes"
        ));
    }
    Ok(secret)
}
