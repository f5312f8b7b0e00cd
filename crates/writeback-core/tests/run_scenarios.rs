//! Writeback Core Integration Tests
//!
//! Full runs against a fixture store, checking operator output and that
//! every opened company and begun session is released.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use writeback_core::{
    Error,
    config::WorkflowConfig,
    report::{MemoryReporter, ReportLevel, ScriptedPrompter},
    run,
    store::{
        AuthorizationResult, CompanyIdentifier, CompanyToken, FieldValue, FilterPredicate,
        Fixture, FixtureCompany, FixtureStore, Record, RecordStore, SessionToken, StoreError,
        StoreResult,
    },
};

const APP_ID: &str = "app-id";

fn invoice(id: &str, number: &str) -> Record {
    Record::new(id)
        .with_field("SalesInvoice.ReferenceNumber", FieldValue::Text(number.to_string()))
        .with_field("CustomerNote", FieldValue::Null)
        .with_field("InternalNote", FieldValue::Null)
        .with_field("FreightAmount", FieldValue::Amount(Decimal::new(1250, 2)))
}

fn acme_store(company: FixtureCompany, save_delay_ms: u64) -> Arc<FixtureStore> {
    Arc::new(FixtureStore::new(Fixture {
        application_identifiers: vec![APP_ID.to_string()],
        companies: vec![company],
        save_delay_ms,
        reject_saves: None,
    }))
}

fn acme() -> FixtureCompany {
    FixtureCompany::new("Acme", "p1").with_records(vec![invoice("r1", "INV-100")])
}

/// Fixture store whose `end` and `close` still release but report a failure
struct FailingReleaseStore {
    inner: Arc<FixtureStore>,
    fail_end: bool,
    fail_close: bool,
}

#[async_trait]
impl RecordStore for FailingReleaseStore {
    async fn begin(&self, credential: &str) -> StoreResult<SessionToken> {
        self.inner.begin(credential).await
    }

    async fn end(&self, session: &SessionToken) -> StoreResult<()> {
        self.inner.end(session).await?;
        if self.fail_end {
            return Err(StoreError::Transport("connection reset during end".to_string()));
        }
        Ok(())
    }

    async fn company_list(&self, session: &SessionToken) -> StoreResult<Vec<CompanyIdentifier>> {
        self.inner.company_list(session).await
    }

    async fn request_access(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<AuthorizationResult> {
        self.inner.request_access(session, company).await
    }

    async fn open(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<CompanyToken> {
        self.inner.open(session, company).await
    }

    async fn close(&self, company: &CompanyToken) -> StoreResult<()> {
        self.inner.close(company).await?;
        if self.fail_close {
            return Err(StoreError::Transport("connection reset during close".to_string()));
        }
        Ok(())
    }

    async fn load(
        &self,
        company: &CompanyToken,
        predicate: &FilterPredicate,
    ) -> StoreResult<Vec<Record>> {
        self.inner.load(company, predicate).await
    }

    async fn save(&self, company: &CompanyToken, record: &Record) -> StoreResult<()> {
        self.inner.save(company, record).await
    }
}

fn failing_release(
    inner: &Arc<FixtureStore>,
    fail_end: bool,
    fail_close: bool,
) -> Arc<dyn RecordStore> {
    Arc::new(FailingReleaseStore {
        inner: inner.clone(),
        fail_end,
        fail_close,
    })
}

async fn assert_released(store: &FixtureStore) {
    let calls = store.calls();
    assert_eq!(calls.open, calls.close, "every open must be closed");
    assert_eq!(store.open_companies().await, 0);
    assert_eq!(store.active_sessions().await, 0);
}

#[tokio::test(start_paused = true)]
async fn scenario_a_successful_measured_persist() {
    let store = acme_store(acme(), 5);
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", ""]);

    let summary = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap();

    assert_eq!(summary.company.path, "p1");
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.record_id, "r1");
    assert!(summary.freight_edited);
    assert!(summary.measurement.elapsed_ms() >= 5.0);
    assert!(summary.measurement.elapsed_ms() < 50.0);

    let messages = reporter.messages();
    let count_at = messages.iter().position(|m| m == "Invoices selected: 1").unwrap();
    let elapsed_at = messages.iter().position(|m| m.starts_with("Elapsed msec: ")).unwrap();
    assert!(count_at < elapsed_at);
    assert!(
        reporter
            .lines()
            .iter()
            .any(|(level, m)| *level == ReportLevel::Success && m.starts_with("Elapsed msec: "))
    );

    let stored = store.record("p1", "r1").await.unwrap();
    assert_eq!(
        stored.get("CustomerNote").and_then(FieldValue::as_text),
        Some("Test Customer Note")
    );
    assert_eq!(
        stored.get("InternalNote").and_then(FieldValue::as_text),
        Some("Test Internal Note")
    );
    assert_eq!(
        stored.get("FreightAmount").and_then(FieldValue::as_amount),
        Some(Decimal::new(19999, 2))
    );

    assert_eq!(store.calls().save, 1);
    assert_eq!(store.calls().end, 1);
    assert_released(&store).await;
}

#[tokio::test]
async fn scenario_b_no_matching_record() {
    let store = acme_store(acme(), 0);
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-999"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::EmptyResult { ref key, .. } if key == "INV-999"));
    assert!(reporter.contains("Invoices selected: 0"));
    assert_eq!(store.calls().open, 1);
    assert_eq!(store.calls().close, 1);
    assert_eq!(store.calls().save, 0);
    assert_eq!(store.calls().end, 1);
    assert_released(&store).await;
}

#[tokio::test]
async fn scenario_c_pending_authorization_never_opens() {
    let store = acme_store(acme().with_authorization("Pending"), 0);
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Acme"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::AuthorizationPending(_)));
    assert!(err.to_string().contains("Pending"));
    assert_eq!(store.calls().request_access, 1);
    assert_eq!(store.calls().open, 0);
    assert_eq!(store.calls().end, 1);
    assert_released(&store).await;
}

#[tokio::test]
async fn scenario_d_freight_answer_controls_amount() {
    for (answer, expected) in [
        ("", Decimal::new(19999, 2)),
        ("y", Decimal::new(19999, 2)),
        ("n", Decimal::new(1250, 2)),
    ] {
        let store = acme_store(acme(), 0);
        let reporter = MemoryReporter::new();
        let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", answer]);

        let summary = run(
            store.clone(),
            Some(APP_ID.to_string()),
            &WorkflowConfig::default(),
            &mut prompter,
            &reporter,
        )
        .await
        .unwrap();

        assert_eq!(summary.freight_edited, expected != Decimal::new(1250, 2));
        let stored = store.record("p1", "r1").await.unwrap();
        assert_eq!(
            stored.get("FreightAmount").and_then(FieldValue::as_amount),
            Some(expected),
            "answer {:?}",
            answer
        );
        assert!(reporter.contains(&format!("Editing freight: {}", summary.freight_edited)));
    }
}

#[tokio::test]
async fn other_authorization_result_is_reported_verbatim() {
    let store = acme_store(acme().with_authorization("NoAccess"), 0);
    let mut prompter = ScriptedPrompter::new(["Acme"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::AuthorizationDenied { ref result, .. } if result == "NoAccess"));
    assert_eq!(store.calls().open, 0);
    assert_released(&store).await;
}

#[tokio::test]
async fn invalid_credential_ends_without_store_session() {
    let store = acme_store(acme(), 0);
    let mut prompter = ScriptedPrompter::new(["Acme"]);

    let err = run(
        store.clone(),
        Some("not-registered".to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::InvalidCredential(_)));
    assert!(prompter.prompts().is_empty());
    assert_eq!(store.calls().company_list, 0);
    assert_eq!(store.calls().end, 0);
    assert_released(&store).await;
}

#[tokio::test]
async fn missing_credential_is_invalid() {
    let store = acme_store(acme(), 0);
    let mut prompter = ScriptedPrompter::new(Vec::<String>::new());

    let err = run(
        store.clone(),
        None,
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::InvalidCredential(_)));
    assert_eq!(store.calls().begin, 0);
}

#[tokio::test]
async fn unknown_company_name_terminates() {
    let store = acme_store(acme(), 0);
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["acme"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::CompanyNotFound(ref name) if name == "acme"));
    assert!(reporter.contains("Acme p1"));
    assert_eq!(store.calls().request_access, 0);
    assert_released(&store).await;
}

#[tokio::test]
async fn duplicate_names_select_first_listed() {
    let store = Arc::new(FixtureStore::new(Fixture {
        application_identifiers: vec![APP_ID.to_string()],
        companies: vec![
            FixtureCompany::new("Acme", "p1").with_records(vec![invoice("r1", "INV-100")]),
            FixtureCompany::new("Acme", "p2").with_records(vec![invoice("r2", "INV-100")]),
        ],
        ..Fixture::default()
    }));
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", "n"]);

    let summary = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.company.path, "p1");
    assert_eq!(summary.record_id, "r1");
}

#[tokio::test]
async fn stale_grant_releases_session() {
    let store = acme_store(acme().revoked_on_open(), 0);
    let mut prompter = ScriptedPrompter::new(["Acme"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::AuthorizationStale(_)));
    assert_eq!(store.calls().open, 1);
    assert_eq!(store.calls().close, 0);
    assert_eq!(store.calls().end, 1);
    assert_eq!(store.active_sessions().await, 0);
}

#[tokio::test]
async fn query_error_closes_company() {
    let store = acme_store(acme(), 0);
    let config = WorkflowConfig {
        reference_field: "SalesInvoice.NoSuchField".to_string(),
        ..WorkflowConfig::default()
    };
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &config,
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::QueryError(_)));
    assert_released(&store).await;
}

#[tokio::test(start_paused = true)]
async fn persist_failure_reports_elapsed_and_closes() {
    let store = Arc::new(FixtureStore::new(Fixture {
        application_identifiers: vec![APP_ID.to_string()],
        companies: vec![acme()],
        save_delay_ms: 7,
        reject_saves: Some("validation failed".to_string()),
    }));
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", "y"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap_err();

    match err {
        Error::PersistError { elapsed_ms, cause } => {
            assert!(elapsed_ms >= 7.0);
            assert!(cause.contains("validation failed"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(reporter.contains("Elapsed msec: "));
    assert_released(&store).await;
}

#[tokio::test]
async fn operator_cancel_mid_workflow_closes_company() {
    let store = acme_store(acme(), 0);
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100"]);

    let err = run(
        store.clone(),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::UserCancelled));
    assert_eq!(store.calls().save, 0);
    assert_released(&store).await;
}

#[tokio::test(start_paused = true)]
async fn bundled_demo_fixture_runs() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures/demo.json");
    let store = Arc::new(FixtureStore::from_file(path).unwrap());
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Bellwether Garden Supply", "10301", "Y"]);

    let summary = run(
        store.clone(),
        Some("demo-application-id".to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap();

    assert_eq!(summary.record_id, "si-10301");
    assert!(summary.measurement.elapsed_ms() >= 25.0);
    assert!(reporter.contains("Stone Arbor Landscaping"));
    assert_released(&store).await;
}

#[tokio::test]
async fn end_failure_after_success_keeps_outcome() {
    let inner = acme_store(acme(), 0);
    let reporter = MemoryReporter::new();
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", "y"]);

    let summary = run(
        failing_release(&inner, true, false),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &reporter,
    )
    .await
    .unwrap();

    assert_eq!(summary.record_id, "r1");
    assert_eq!(inner.calls().save, 1);
    assert_eq!(inner.calls().end, 1);
    assert_released(&inner).await;
}

#[tokio::test]
async fn close_failure_after_success_fails_run() {
    let inner = acme_store(acme(), 0);
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-100", "y"]);

    let err = run(
        failing_release(&inner, false, true),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Store(StoreError::Transport(ref m)) if m.contains("close")));
    assert_eq!(inner.calls().save, 1);
    assert_eq!(inner.calls().end, 1);
    assert_released(&inner).await;
}

#[tokio::test]
async fn close_failure_after_workflow_error_keeps_workflow_error() {
    let inner = acme_store(acme(), 0);
    let mut prompter = ScriptedPrompter::new(["Acme", "INV-999"]);

    let err = run(
        failing_release(&inner, true, true),
        Some(APP_ID.to_string()),
        &WorkflowConfig::default(),
        &mut prompter,
        &MemoryReporter::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::EmptyResult { ref key, .. } if key == "INV-999"));
    assert_eq!(inner.calls().close, 1);
    assert_eq!(inner.calls().end, 1);
    assert_released(&inner).await;
}
