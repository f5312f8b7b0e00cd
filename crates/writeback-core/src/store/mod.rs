//! Record store seam
//!
//! The accounting record store is a remote system this crate only talks to.
//! Everything the workflow needs from it goes through [`RecordStore`]; the
//! concrete backends are:
//!
//! - [`HttpRecordStore`]: JSON gateway reached over HTTP(S)
//! - [`FixtureStore`]: in-memory store seeded from a JSON file, with call
//!   counters for diagnostics and tests

pub mod fixture;
pub mod http;
pub mod record;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use fixture::{CallCounts, Fixture, FixtureCompany, FixtureStore};
pub use http::HttpRecordStore;
pub use record::{FieldValue, FilterPredicate, Record, RecordCursor, RecordSet};

/// Failure reported by a record store call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Credential or access grant refused
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request understood but refused (validation, unknown field, conflict)
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The call never produced a response
    #[error("transport failure: {0}")]
    Transport(String),

    /// A response arrived but could not be understood
    #[error("protocol error: {0}")]
    Protocol(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Opaque token for an active store session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

/// Opaque token for an open company context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyToken(pub String);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CompanyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a company's record store as published by the company listing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompanyIdentifier {
    /// Display name shown to the operator
    pub name: String,
    /// Storage location of the company data
    pub path: String,
}

impl CompanyIdentifier {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for CompanyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.path)
    }
}

/// Outcome of an access request for a company
///
/// Closed set: anything the store reports besides granted/pending is kept
/// verbatim in `Other` so it can be shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    Granted,
    Pending,
    Other(String),
}

impl AuthorizationResult {
    /// Parse the store's raw result string
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "granted" => Self::Granted,
            "pending" => Self::Pending,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Granted => "Granted",
            Self::Pending => "Pending",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for AuthorizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote accounting record store
///
/// Every call may fail; none is retried by the caller.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Establish a session with an application credential
    async fn begin(&self, credential: &str) -> StoreResult<SessionToken>;

    /// Terminate a session
    async fn end(&self, session: &SessionToken) -> StoreResult<()>;

    /// Companies visible to the session, in store order
    async fn company_list(&self, session: &SessionToken) -> StoreResult<Vec<CompanyIdentifier>>;

    /// Ask for access rights to a company
    async fn request_access(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<AuthorizationResult>;

    /// Open a company for record access
    async fn open(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<CompanyToken>;

    /// Release an open company
    async fn close(&self, company: &CompanyToken) -> StoreResult<()>;

    /// Records matching the predicate
    async fn load(
        &self,
        company: &CompanyToken,
        predicate: &FilterPredicate,
    ) -> StoreResult<Vec<Record>>;

    /// Persist staged field changes of a record
    async fn save(&self, company: &CompanyToken, record: &Record) -> StoreResult<()>;
}
