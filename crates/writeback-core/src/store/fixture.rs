//! In-memory record store seeded from a JSON fixture
//!
//! Used for offline runs (`writeback --fixture <file>`) and as the fake store
//! in tests. Every remote call is counted so callers can check that opens and
//! closes pair up and that gated calls never happened.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::{
    AuthorizationResult, CompanyIdentifier, CompanyToken, FilterPredicate, Record, RecordStore,
    SessionToken, StoreError, StoreResult,
};
use crate::error::{Error, Result};

/// On-disk fixture layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Credentials accepted by `begin`
    #[serde(default)]
    pub application_identifiers: Vec<String>,

    #[serde(default)]
    pub companies: Vec<FixtureCompany>,

    /// Artificial latency added to every save
    #[serde(default)]
    pub save_delay_ms: u64,

    /// When set, every save is rejected with this reason
    #[serde(default)]
    pub reject_saves: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCompany {
    pub name: String,
    pub path: String,

    /// Raw authorization outcome returned by `request_access`
    #[serde(default = "default_authorization")]
    pub authorization: String,

    /// Access is withdrawn between grant and open
    #[serde(default)]
    pub revoke_on_open: bool,

    /// Queryable field names; derived from the records when empty
    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default)]
    pub records: Vec<Record>,
}

fn default_authorization() -> String {
    "Granted".to_string()
}

impl FixtureCompany {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            authorization: default_authorization(),
            revoke_on_open: false,
            fields: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn with_authorization(mut self, raw: impl Into<String>) -> Self {
        self.authorization = raw.into();
        self
    }

    pub fn with_records(mut self, records: Vec<Record>) -> Self {
        self.records = records;
        self
    }

    pub fn revoked_on_open(mut self) -> Self {
        self.revoke_on_open = true;
        self
    }

    fn knows_field(&self, field: &str) -> bool {
        if self.fields.is_empty() {
            self.records.iter().any(|r| r.fields.contains_key(field))
        } else {
            self.fields.iter().any(|f| f == field)
        }
    }
}

/// Snapshot of how often each store call was made
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub begin: usize,
    pub end: usize,
    pub company_list: usize,
    pub request_access: usize,
    pub open: usize,
    pub close: usize,
    pub load: usize,
    pub save: usize,
}

#[derive(Debug, Default)]
struct Counters {
    begin: AtomicUsize,
    end: AtomicUsize,
    company_list: AtomicUsize,
    request_access: AtomicUsize,
    open: AtomicUsize,
    close: AtomicUsize,
    load: AtomicUsize,
    save: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            begin: self.begin.load(Ordering::SeqCst),
            end: self.end.load(Ordering::SeqCst),
            company_list: self.company_list.load(Ordering::SeqCst),
            request_access: self.request_access.load(Ordering::SeqCst),
            open: self.open.load(Ordering::SeqCst),
            close: self.close.load(Ordering::SeqCst),
            load: self.load.load(Ordering::SeqCst),
            save: self.save.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    fixture: Fixture,
    sessions: BTreeSet<String>,
    /// company token -> company path
    open_companies: HashMap<String, String>,
}

/// Record store backed by an in-memory [`Fixture`]
#[derive(Debug, Default)]
pub struct FixtureStore {
    state: Mutex<State>,
    counters: Counters,
}

impl FixtureStore {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            state: Mutex::new(State {
                fixture,
                ..State::default()
            }),
            counters: Counters::default(),
        }
    }

    /// Load a fixture from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read fixture {}: {}", path.display(), e))
        })?;
        let fixture: Fixture = serde_json::from_str(&contents).map_err(|e| {
            Error::ConfigError(format!("Failed to parse fixture {}: {}", path.display(), e))
        })?;
        Ok(Self::new(fixture))
    }

    pub fn calls(&self) -> CallCounts {
        self.counters.snapshot()
    }

    /// Number of sessions begun and not yet ended
    pub async fn active_sessions(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Number of companies opened and not yet closed
    pub async fn open_companies(&self) -> usize {
        self.state.lock().await.open_companies.len()
    }

    /// Current stored copy of a record
    pub async fn record(&self, company_path: &str, record_id: &str) -> Option<Record> {
        let state = self.state.lock().await;
        state
            .fixture
            .companies
            .iter()
            .find(|c| c.path == company_path)
            .and_then(|c| c.records.iter().find(|r| r.id == record_id))
            .cloned()
    }

    fn check_session(state: &State, session: &SessionToken) -> StoreResult<()> {
        if state.sessions.contains(&session.0) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized(format!("unknown session {}", session)))
        }
    }

    fn company_for_token<'a>(
        state: &'a mut State,
        token: &CompanyToken,
    ) -> StoreResult<&'a mut FixtureCompany> {
        let path = state
            .open_companies
            .get(&token.0)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("company handle {}", token)))?;
        state
            .fixture
            .companies
            .iter_mut()
            .find(|c| c.path == path)
            .ok_or_else(|| StoreError::NotFound(format!("company at {}", path)))
    }
}

#[async_trait]
impl RecordStore for FixtureStore {
    async fn begin(&self, credential: &str) -> StoreResult<SessionToken> {
        Counters::bump(&self.counters.begin);
        let mut state = self.state.lock().await;
        if !state
            .fixture
            .application_identifiers
            .iter()
            .any(|id| id == credential)
        {
            return Err(StoreError::Unauthorized(
                "application identifier not recognized".to_string(),
            ));
        }
        let token = Uuid::new_v4().to_string();
        state.sessions.insert(token.clone());
        debug!(session = %token, "fixture session started");
        Ok(SessionToken(token))
    }

    async fn end(&self, session: &SessionToken) -> StoreResult<()> {
        Counters::bump(&self.counters.end);
        let mut state = self.state.lock().await;
        if state.sessions.remove(&session.0) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("session {}", session)))
        }
    }

    async fn company_list(&self, session: &SessionToken) -> StoreResult<Vec<CompanyIdentifier>> {
        Counters::bump(&self.counters.company_list);
        let state = self.state.lock().await;
        Self::check_session(&state, session)?;
        Ok(state
            .fixture
            .companies
            .iter()
            .map(|c| CompanyIdentifier::new(c.name.clone(), c.path.clone()))
            .collect())
    }

    async fn request_access(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<AuthorizationResult> {
        Counters::bump(&self.counters.request_access);
        let state = self.state.lock().await;
        Self::check_session(&state, session)?;
        state
            .fixture
            .companies
            .iter()
            .find(|c| c.path == company.path)
            .map(|c| AuthorizationResult::from_raw(&c.authorization))
            .ok_or_else(|| StoreError::NotFound(format!("company at {}", company.path)))
    }

    async fn open(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<CompanyToken> {
        Counters::bump(&self.counters.open);
        let mut state = self.state.lock().await;
        Self::check_session(&state, session)?;
        let entry = state
            .fixture
            .companies
            .iter()
            .find(|c| c.path == company.path)
            .ok_or_else(|| StoreError::NotFound(format!("company at {}", company.path)))?;
        if entry.revoke_on_open
            || AuthorizationResult::from_raw(&entry.authorization) != AuthorizationResult::Granted
        {
            return Err(StoreError::Unauthorized(format!(
                "access to {} is not granted",
                company.name
            )));
        }
        let token = Uuid::new_v4().to_string();
        state
            .open_companies
            .insert(token.clone(), company.path.clone());
        Ok(CompanyToken(token))
    }

    async fn close(&self, company: &CompanyToken) -> StoreResult<()> {
        Counters::bump(&self.counters.close);
        let mut state = self.state.lock().await;
        state
            .open_companies
            .remove(&company.0)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("company handle {}", company)))
    }

    async fn load(
        &self,
        company: &CompanyToken,
        predicate: &FilterPredicate,
    ) -> StoreResult<Vec<Record>> {
        Counters::bump(&self.counters.load);
        let mut state = self.state.lock().await;
        let entry = Self::company_for_token(&mut state, company)?;
        if !entry.knows_field(&predicate.field) {
            return Err(StoreError::Rejected(format!(
                "unknown field '{}'",
                predicate.field
            )));
        }
        Ok(entry
            .records
            .iter()
            .filter(|r| predicate.matches(r))
            .cloned()
            .collect())
    }

    async fn save(&self, company: &CompanyToken, record: &Record) -> StoreResult<()> {
        Counters::bump(&self.counters.save);
        let (delay, rejection) = {
            let state = self.state.lock().await;
            (
                state.fixture.save_delay_ms,
                state.fixture.reject_saves.clone(),
            )
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(reason) = rejection {
            return Err(StoreError::Rejected(reason));
        }

        let mut state = self.state.lock().await;
        let entry = Self::company_for_token(&mut state, company)?;
        let stored = entry
            .records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StoreError::NotFound(format!("record {}", record.id)))?;
        for (name, value) in record.staged_changes() {
            stored.fields.insert(name.to_string(), value.clone());
        }
        Ok(())
    }
}
