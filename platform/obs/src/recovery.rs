//! Signals for data the core replaced or dropped on its own.
//!
//! Corrupt session or user records are recovered automatically (the session
//! is discarded, the user list reseeded). Those recoveries can silently
//! replace real data with demo data, so every one of them is reported here.

use std::fmt;

use parking_lot::Mutex;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recovered {
    /// A persisted session could not be decoded and was removed.
    SessionDiscarded { reason: String },
    /// The persisted user list could not be decoded and was replaced by the
    /// demo accounts.
    UserListReseeded { reason: String },
    /// The credential record could not be decoded and was rebuilt from the
    /// demo credentials.
    CredentialsReset { reason: String },
}

impl Recovered {
    pub fn reason(&self) -> &str {
        match self {
            Recovered::SessionDiscarded { reason }
            | Recovered::UserListReseeded { reason }
            | Recovered::CredentialsReset { reason } => reason,
        }
    }
}

impl fmt::Display for Recovered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recovered::SessionDiscarded { reason } => {
                write!(f, "stored session discarded: {reason}")
            }
            Recovered::UserListReseeded { reason } => {
                write!(f, "user list reseeded with demo accounts: {reason}")
            }
            Recovered::CredentialsReset { reason } => {
                write!(f, "credentials reset to demo credentials: {reason}")
            }
        }
    }
}

pub trait RecoveryObserver: Send + Sync {
    fn recovered(&self, event: &Recovered);
}

/// Default observer: one `warn!` per recovery.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRecovery;

impl RecoveryObserver for LogRecovery {
    fn recovered(&self, event: &Recovered) {
        warn!(reason = event.reason(), "{event}");
    }
}

/// Keeps every event it sees. Useful in tests and for surfacing recoveries
/// to an operator after start-up.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Recovered>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Recovered> {
        self.events.lock().clone()
    }
}

impl RecoveryObserver for RecordingObserver {
    fn recovered(&self, event: &Recovered) {
        LogRecovery.recovered(event);
        self.events.lock().push(event.clone());
    }
}
