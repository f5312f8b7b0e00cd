//! Session lifecycle against the record store
//!
//! A [`SessionController`] owns the connection context for one run:
//! `Unstarted -> Active -> Ended`. Ending is safe from any state and only
//! reaches the store once.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::{CompanyIdentifier, RecordStore, SessionToken, StoreError};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstarted => "unstarted",
            Self::Active => "active",
            Self::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Owns the single store session of a run
pub struct SessionController {
    store: Arc<dyn RecordStore>,
    credential: Option<String>,
    state: SessionState,
    token: Option<SessionToken>,
}

impl SessionController {
    /// Create a controller; `credential` comes from configuration
    pub fn new(store: Arc<dyn RecordStore>, credential: Option<String>) -> Self {
        Self {
            store,
            credential,
            state: SessionState::Unstarted,
            token: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Token of the active session
    pub fn token(&self) -> Result<&SessionToken> {
        match (&self.state, &self.token) {
            (SessionState::Active, Some(token)) => Ok(token),
            _ => Err(Error::InvalidState(self.state.as_str())),
        }
    }

    /// Establish the session
    pub async fn begin(&mut self) -> Result<()> {
        if self.state != SessionState::Unstarted {
            return Err(Error::InvalidState(self.state.as_str()));
        }

        let credential = self
            .credential
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| Error::InvalidCredential("no application identifier configured".to_string()))?;

        let token = self.store.begin(credential).await.map_err(|e| match e {
            StoreError::Unauthorized(msg) => Error::InvalidCredential(msg),
            other => Error::Store(other),
        })?;

        info!(session = %token, "session started");
        self.token = Some(token);
        self.state = SessionState::Active;
        Ok(())
    }

    /// Companies visible to this session
    pub async fn company_list(&self) -> Result<Vec<CompanyIdentifier>> {
        let token = self.token()?;
        Ok(self.store.company_list(token).await?)
    }

    /// Release the session
    ///
    /// Callable in any state; only an active session reaches the store.
    pub async fn end(&mut self) -> Result<()> {
        let previous = self.state;
        self.state = SessionState::Ended;

        match (previous, self.token.take()) {
            (SessionState::Active, Some(token)) => {
                self.store.end(&token).await.map_err(|e| {
                    warn!(session = %token, error = %e, "session end failed");
                    Error::Store(e)
                })?;
                info!(session = %token, "session ended");
            }
            _ => debug!(state = %previous, "session end without active session"),
        }
        Ok(())
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
