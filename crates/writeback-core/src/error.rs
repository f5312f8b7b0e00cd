//! Error types for writeback

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using writeback's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Writeback error types with operator-facing messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Session errors (E001-E099)
    #[error("Invalid application identifier: {0}. Put a valid application identifier into WRITEBACK_APPLICATION_ID.")]
    InvalidCredential(String),

    #[error("Session is {0}; operation not allowed.")]
    InvalidState(&'static str),

    // Company errors (E100-E199)
    #[error("Company '{0}' not found - no company was selected.")]
    CompanyNotFound(String),

    // Authorization errors (E200-E299)
    #[error("Authorization result for '{0}': Pending - cannot continue. Reopen the company to enable access to this application.")]
    AuthorizationPending(String),

    #[error("Authorization result for '{company}': {result} - cannot continue.")]
    AuthorizationDenied { company: String, result: String },

    #[error("Access to '{0}' is no longer authorized. Reopen the company to enable access to this application.")]
    AuthorizationStale(String),

    // Record errors (E300-E399)
    #[error("Query rejected by the record store: {0}")]
    QueryError(String),

    #[error("No record matches {field} = '{key}'.")]
    EmptyResult { field: String, key: String },

    #[error("Persist failed after {elapsed_ms:.3} ms: {cause}")]
    PersistError { elapsed_ms: f64, cause: String },

    // Store errors (E400-E499)
    #[error("Record store error: {0}")]
    Store(#[from] StoreError),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // User errors (E700-E799)
    #[error("Operator cancelled input")]
    UserCancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential(_) => "E001",
            Self::InvalidState(_) => "E002",
            Self::CompanyNotFound(_) => "E100",
            Self::AuthorizationPending(_) => "E200",
            Self::AuthorizationDenied { .. } => "E201",
            Self::AuthorizationStale(_) => "E202",
            Self::QueryError(_) => "E300",
            Self::EmptyResult { .. } => "E301",
            Self::PersistError { .. } => "E302",
            Self::Store(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::UserCancelled => "E700",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidCredential(_) => {
                Some("export WRITEBACK_APPLICATION_ID=<identifier>".to_string())
            }
            Self::CompanyNotFound(_) => {
                Some("Enter a company name exactly as listed".to_string())
            }
            Self::AuthorizationPending(_) | Self::AuthorizationStale(_) => {
                Some("Reopen the company in the accounting application and approve access".to_string())
            }
            Self::ConfigError(_) => Some("writeback config list".to_string()),
            _ => None,
        }
    }
}
