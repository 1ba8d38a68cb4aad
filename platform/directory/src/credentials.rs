use std::collections::BTreeMap;
use std::sync::Arc;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use entity::UserId;
use parking_lot::Mutex;
use platform_db::{KvStore, StoreError, load_json, save_json};
use platform_obs::{LogRecovery, Recovered, RecoveryObserver};
use rand_core::OsRng;
use thiserror::Error;

use crate::CREDENTIALS_KEY;
use crate::seed::DEMO_CREDENTIALS;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Verifies and stores account passwords.
pub trait CredentialStore: Send + Sync {
    /// `Ok(false)` for a wrong password or an account without credentials.
    fn verify(&self, user_id: &UserId, password: &str) -> Result<bool, CredentialError>;

    fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), CredentialError>;
}

/// Argon2id PHC strings keyed by user id, persisted as one record.
pub struct HashedCredentials {
    store: Arc<dyn KvStore>,
    params: Params,
    observer: Arc<dyn RecoveryObserver>,
    writer: Mutex<()>,
}

type PhcRecords = BTreeMap<UserId, String>;

impl HashedCredentials {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_params(store, Params::default())
    }

    pub fn with_params(store: Arc<dyn KvStore>, params: Params) -> Self {
        Self {
            store,
            params,
            observer: Arc::new(LogRecovery),
            writer: Mutex::new(()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RecoveryObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| CredentialError::Hash(err.to_string()))
    }

    /// A corrupt record is rebuilt from the demo credentials; every other
    /// account loses its password and has to be reset by an administrator.
    fn load(&self) -> Result<PhcRecords, CredentialError> {
        match load_json::<PhcRecords>(self.store.as_ref(), CREDENTIALS_KEY) {
            Ok(found) => Ok(found.unwrap_or_default()),
            Err(StoreError::Corrupt { reason, .. }) => {
                self.observer
                    .recovered(&Recovered::CredentialsReset { reason });
                let mut rebuilt = PhcRecords::new();
                for demo in DEMO_CREDENTIALS {
                    rebuilt.insert(UserId::new(demo.user_id), self.hash(demo.password)?);
                }
                save_json(self.store.as_ref(), CREDENTIALS_KEY, &rebuilt)?;
                Ok(rebuilt)
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl CredentialStore for HashedCredentials {
    fn verify(&self, user_id: &UserId, password: &str) -> Result<bool, CredentialError> {
        let stored = {
            let _guard = self.writer.lock();
            self.load()?
        };
        let Some(phc) = stored.get(user_id) else {
            return Ok(false);
        };
        let parsed = PasswordHash::new(phc).map_err(|err| CredentialError::Hash(err.to_string()))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(CredentialError::Hash(err.to_string())),
        }
    }

    fn set_password(&self, user_id: &UserId, password: &str) -> Result<(), CredentialError> {
        let phc = self.hash(password)?;
        let _guard = self.writer.lock();
        let mut stored = self.load()?;
        stored.insert(user_id.clone(), phc);
        save_json(self.store.as_ref(), CREDENTIALS_KEY, &stored)?;
        Ok(())
    }
}
