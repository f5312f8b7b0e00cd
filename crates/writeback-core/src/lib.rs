//! Writeback Core Library
//!
//! This crate measures how long an accounting record store takes to persist
//! an edited record. It provides:
//! - Session lifecycle against the record store
//! - Company selection and the one-shot authorization gate
//! - Scoped company handles that are always closed
//! - The record workflow (query, mutate, timed persist)
//! - Store backends (HTTP gateway, JSON fixture)
//! - Configuration and error types

pub mod authorization;
pub mod company;
pub mod config;
pub mod error;
pub mod report;
pub mod run;
pub mod session;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};
pub use run::{RunSummary, run};
