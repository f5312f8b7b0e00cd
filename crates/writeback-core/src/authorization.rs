//! One-shot authorization gate
//!
//! Access is requested exactly once per run. Only a granted result yields a
//! [`Grant`], and a `Grant` is the only way to open a company.

use tracing::info;

use crate::error::{Error, Result};
use crate::session::SessionController;
use crate::store::{AuthorizationResult, CompanyIdentifier};

/// Proof that access to a company was granted in this session
#[derive(Debug)]
pub struct Grant {
    company: CompanyIdentifier,
}

impl Grant {
    pub fn company(&self) -> &CompanyIdentifier {
        &self.company
    }
}

/// Requests and interprets access rights for a company
#[derive(Debug)]
pub struct AuthorizationGate<'a> {
    session: &'a SessionController,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(session: &'a SessionController) -> Self {
        Self { session }
    }

    /// Ask the store for access; no retry, no polling
    pub async fn request(&self, company: &CompanyIdentifier) -> Result<AuthorizationResult> {
        let token = self.session.token()?;
        let result = self
            .session
            .store()
            .request_access(token, company)
            .await?;
        info!(company = %company.name, result = %result, "authorization requested");
        Ok(result)
    }

    /// Request access and turn anything but `Granted` into a terminal error
    pub async fn authorize(&self, company: CompanyIdentifier) -> Result<Grant> {
        let result = self.request(&company).await?;
        decide(result, company)
    }
}

/// Map an authorization result onto the run's next step
pub fn decide(result: AuthorizationResult, company: CompanyIdentifier) -> Result<Grant> {
    match result {
        AuthorizationResult::Granted => Ok(Grant { company }),
        AuthorizationResult::Pending => Err(Error::AuthorizationPending(company.name)),
        AuthorizationResult::Other(raw) => Err(Error::AuthorizationDenied {
            company: company.name,
            result: raw,
        }),
    }
}
