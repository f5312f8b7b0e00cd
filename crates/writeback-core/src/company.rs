//! Company selection and open-company handles

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::authorization::Grant;
use crate::error::{Error, Result};
use crate::session::SessionController;
use crate::store::{CompanyIdentifier, CompanyToken, RecordStore, StoreError};

/// Maps an operator-entered company name onto the company listing
#[derive(Debug, Clone, Copy)]
pub struct CompanyResolver<'a> {
    companies: &'a [CompanyIdentifier],
}

impl<'a> CompanyResolver<'a> {
    pub fn new(companies: &'a [CompanyIdentifier]) -> Self {
        Self { companies }
    }

    /// First company whose display name equals `name` exactly
    ///
    /// Duplicate names are not disambiguated: the earliest listing entry wins.
    pub fn resolve(&self, name: &str) -> Option<&'a CompanyIdentifier> {
        self.companies.iter().find(|c| c.name == name)
    }

    /// Like [`resolve`](Self::resolve), failing with `CompanyNotFound`
    pub fn require(&self, name: &str) -> Result<CompanyIdentifier> {
        self.resolve(name)
            .cloned()
            .ok_or_else(|| Error::CompanyNotFound(name.to_string()))
    }
}

/// An open company context
///
/// Close it with [`close`](Self::close). A handle dropped while still open
/// hands the close to the running tokio runtime so the company is never
/// left open.
pub struct CompanyHandle {
    store: Arc<dyn RecordStore>,
    company: CompanyIdentifier,
    token: CompanyToken,
    closed: bool,
}

impl CompanyHandle {
    /// Open the granted company
    pub async fn open(session: &SessionController, grant: Grant) -> Result<Self> {
        let session_token = session.token()?;
        let company = grant.company().clone();

        let token = session
            .store()
            .open(session_token, &company)
            .await
            .map_err(|e| match e {
                StoreError::Unauthorized(_) => Error::AuthorizationStale(company.name.clone()),
                other => Error::Store(other),
            })?;

        info!(company = %company.name, handle = %token, "company opened");
        Ok(Self {
            store: session.store().clone(),
            company,
            token,
            closed: false,
        })
    }

    pub fn company(&self) -> &CompanyIdentifier {
        &self.company
    }

    pub fn token(&self) -> &CompanyToken {
        &self.token
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Release the company
    pub async fn close(mut self) -> Result<()> {
        self.closed = true;
        self.store.close(&self.token).await?;
        info!(company = %self.company.name, "company closed");
        Ok(())
    }
}

impl Drop for CompanyHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        warn!(company = %self.company.name, "company handle dropped while open");

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let store = self.store.clone();
                let token = self.token.clone();
                runtime.spawn(async move {
                    if let Err(e) = store.close(&token).await {
                        warn!(handle = %token, error = %e, "deferred company close failed");
                    }
                });
            }
            Err(_) => debug!(handle = %self.token, "no runtime for deferred company close"),
        }
    }
}

impl fmt::Debug for CompanyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompanyHandle")
            .field("company", &self.company)
            .field("token", &self.token)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CompanyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Company[{}]", self.company.name)
    }
}
