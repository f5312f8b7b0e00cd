//! End-to-end write-back run
//!
//! `begin -> resolve company -> authorize -> open -> workflow -> close -> end`.
//! Once a company is open it is closed before any result leaves [`run`], and
//! the session is ended on every path, including a failed `begin`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::authorization::AuthorizationGate;
use crate::company::{CompanyHandle, CompanyResolver};
use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::report::{Prompter, Reporter};
use crate::session::SessionController;
use crate::store::{CompanyIdentifier, RecordStore};
use crate::workflow::{Measurement, RecordWorkflow};

pub const COMPANY_PROMPT: &str =
    "Enter company name. The first will be selected if more than one with the same name.";

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub company: CompanyIdentifier,
    pub record_id: String,
    pub matched: usize,
    pub freight_edited: bool,
    pub measurement: Measurement,
}

/// Perform one measured write-back against `store`
///
/// `credential` is the application identifier handed to the session.
pub async fn run(
    store: Arc<dyn RecordStore>,
    credential: Option<String>,
    config: &WorkflowConfig,
    prompter: &mut dyn Prompter,
    reporter: &dyn Reporter,
) -> Result<RunSummary> {
    let mut session = SessionController::new(store, credential);

    let outcome = within_session(&mut session, config, prompter, reporter).await;

    if let Err(e) = session.end().await {
        warn!(error = %e, "session did not end cleanly");
    }
    outcome
}

async fn within_session(
    session: &mut SessionController,
    config: &WorkflowConfig,
    prompter: &mut dyn Prompter,
    reporter: &dyn Reporter,
) -> Result<RunSummary> {
    session.begin().await?;

    let companies = session.company_list().await?;
    for company in &companies {
        reporter.info(&company.to_string());
    }

    let name = prompter.ask(COMPANY_PROMPT)?;
    let company = CompanyResolver::new(&companies).require(&name)?;
    info!(company = %company.name, path = %company.path, "company selected");

    let grant = AuthorizationGate::new(session).authorize(company).await?;
    let handle = CompanyHandle::open(session, grant).await?;
    let company = handle.company().clone();

    let result = RecordWorkflow::new(config, reporter)
        .run(&handle, prompter)
        .await;
    let closed = handle.close().await;

    let outcome = match (result, closed) {
        (Ok(outcome), Ok(())) => outcome,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                warn!(error = %close_err, "company close failed after workflow error");
            }
            return Err(e);
        }
    };

    Ok(RunSummary {
        company,
        record_id: outcome.record_id,
        matched: outcome.matched,
        freight_edited: outcome.freight_edited,
        measurement: outcome.measurement,
    })
}
