//! Record workflow: query, mutate, timed persist
//!
//! Runs inside an open company. The record is located by an equality filter
//! on the configured reference field, the first match is edited in memory,
//! and the save call is timed with a monotonic clock. The elapsed time is
//! reported whether or not the save succeeds.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::company::CompanyHandle;
use crate::config::WorkflowConfig;
use crate::error::{Error, Result};
use crate::report::{Prompter, Reporter};
use crate::store::{FieldValue, FilterPredicate, Record, RecordSet, StoreError};

pub const RECORD_KEY_PROMPT: &str = "Enter invoice number:";

pub const FREIGHT_PROMPT: &str = "Editing the freight (Y[y]/N[n], Y if empty)?";

/// Wall-clock duration of one persist call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl Measurement {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// What the workflow did to the record
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub record_id: String,
    pub matched: usize,
    pub freight_edited: bool,
    pub measurement: Measurement,
}

/// Interpret a yes/no answer; blank means yes
pub fn is_affirmative(answer: &str, token: &str) -> bool {
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case(token.trim())
}

/// Stage the configured edits on a record
pub fn apply_edits(config: &WorkflowConfig, record: &mut Record, edit_freight: bool) {
    record.set(
        config.customer_note_field.clone(),
        FieldValue::Text(config.customer_note.clone()),
    );
    record.set(
        config.internal_note_field.clone(),
        FieldValue::Text(config.internal_note.clone()),
    );
    if edit_freight {
        record.set(
            config.freight_field.clone(),
            FieldValue::Amount(config.freight_amount),
        );
    }
}

/// Query, edit and persist a single record of an open company
pub struct RecordWorkflow<'a> {
    config: &'a WorkflowConfig,
    reporter: &'a dyn Reporter,
}

impl<'a> RecordWorkflow<'a> {
    pub fn new(config: &'a WorkflowConfig, reporter: &'a dyn Reporter) -> Self {
        Self { config, reporter }
    }

    /// Run all steps in order against `handle`
    pub async fn run(
        &self,
        handle: &CompanyHandle,
        prompter: &mut dyn Prompter,
    ) -> Result<WorkflowOutcome> {
        let key = prompter.ask(RECORD_KEY_PROMPT)?;
        let key = key.trim();

        let records = self.query(handle, key).await?;
        let matched = records.count();
        self.reporter.info(&format!("Invoices selected: {}", matched));

        self.reporter.info("Moving to the next record");
        let mut cursor = records.cursor();
        let mut record = cursor.advance().ok_or_else(|| Error::EmptyResult {
            field: self.config.reference_field.clone(),
            key: key.to_string(),
        })?;

        let answer = prompter.ask(FREIGHT_PROMPT)?;
        let freight_edited = is_affirmative(&answer, &self.config.affirmative_token);
        self.reporter
            .info(&format!("Editing freight: {}", freight_edited));
        apply_edits(self.config, &mut record, freight_edited);
        debug!(
            record = %record.id,
            fields = ?record.staged_fields().collect::<Vec<_>>(),
            "edits staged"
        );

        self.reporter.info("Starting performance counter");
        let measurement = self.timed_persist(handle, &mut record).await?;

        Ok(WorkflowOutcome {
            record_id: record.id,
            matched,
            freight_edited,
            measurement,
        })
    }

    /// Load records whose reference field equals `key`
    pub async fn query(&self, handle: &CompanyHandle, key: &str) -> Result<RecordSet> {
        let predicate = FilterPredicate::equal(self.config.reference_field.clone(), key);
        let records = handle
            .store()
            .load(handle.token(), &predicate)
            .await
            .map_err(|e| match e {
                StoreError::Rejected(msg) => Error::QueryError(msg),
                other => Error::Store(other),
            })?;
        info!(filter = %predicate, matched = records.len(), "records loaded");
        Ok(RecordSet::new(records))
    }

    /// Save the record, timing only the save call
    pub async fn timed_persist(
        &self,
        handle: &CompanyHandle,
        record: &mut Record,
    ) -> Result<Measurement> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let result = handle.store().save(handle.token(), record).await;
        let measurement = Measurement {
            started_at,
            elapsed: timer.elapsed(),
        };

        let line = format!("Elapsed msec: {}", measurement.elapsed_ms());
        match result {
            Ok(()) => {
                self.reporter.success(&line);
                info!(record = %record.id, elapsed_ms = measurement.elapsed_ms(), "record persisted");
                record.mark_clean();
                Ok(measurement)
            }
            Err(e) => {
                self.reporter.info(&line);
                warn!(record = %record.id, elapsed_ms = measurement.elapsed_ms(), error = %e, "persist failed");
                Err(Error::PersistError {
                    elapsed_ms: measurement.elapsed_ms(),
                    cause: e.to_string(),
                })
            }
        }
    }
}
