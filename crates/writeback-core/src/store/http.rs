//! HTTP gateway backend for the record store
//!
//! Speaks JSON to a record-store gateway running next to the accounting
//! application. No request timeout is configured: each call waits for the
//! gateway to answer or fail.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::{
    AuthorizationResult, CompanyIdentifier, CompanyToken, FieldValue, FilterPredicate, Record,
    RecordStore, SessionToken, StoreError, StoreResult,
};
use crate::config::StoreConfig;

#[derive(Debug, Serialize)]
struct BeginRequest<'a> {
    application_identifier: &'a str,
}

#[derive(Debug, Deserialize)]
struct BeginResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct CompanyRequest<'a> {
    name: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
    company_id: String,
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    fields: BTreeMap<&'a str, &'a FieldValue>,
}

/// Record store reached through the HTTP gateway
#[derive(Debug, Clone)]
pub struct HttpRecordStore {
    client: Client,
    base_url: String,
}

impl HttpRecordStore {
    /// Create a store for the gateway on `server`
    pub fn new(config: &StoreConfig, server: &str) -> StoreResult<Self> {
        if server.trim().is_empty() {
            return Err(StoreError::Transport("server name is empty".to_string()));
        }
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url(server),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> StoreResult<T> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| StoreError::Protocol(e.to_string()))
    }
}

/// Translate a non-success gateway status into a store error
fn error_for_status(status: StatusCode, body: String) -> StoreError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        body.trim().to_string()
    };
    match status.as_u16() {
        401 | 403 => StoreError::Unauthorized(detail),
        400 | 409 | 422 => StoreError::Rejected(detail),
        404 => StoreError::NotFound(detail),
        _ => StoreError::Transport(format!("HTTP {}: {}", status.as_u16(), detail)),
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn begin(&self, credential: &str) -> StoreResult<SessionToken> {
        debug!(url = %self.base_url, "opening gateway session");
        let response: BeginResponse = self
            .send_json(self.client.post(self.url("/sessions")).json(&BeginRequest {
                application_identifier: credential,
            }))
            .await?;
        Ok(SessionToken(response.session_id))
    }

    async fn end(&self, session: &SessionToken) -> StoreResult<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/sessions/{}", session))),
        )
        .await
        .map(|_| ())
    }

    async fn company_list(&self, session: &SessionToken) -> StoreResult<Vec<CompanyIdentifier>> {
        self.send_json(
            self.client
                .get(self.url(&format!("/sessions/{}/companies", session))),
        )
        .await
    }

    async fn request_access(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<AuthorizationResult> {
        let response: AuthorizationResponse = self
            .send_json(
                self.client
                    .post(self.url(&format!("/sessions/{}/authorizations", session)))
                    .json(&CompanyRequest {
                        name: &company.name,
                        path: &company.path,
                    }),
            )
            .await?;
        Ok(AuthorizationResult::from_raw(&response.result))
    }

    async fn open(
        &self,
        session: &SessionToken,
        company: &CompanyIdentifier,
    ) -> StoreResult<CompanyToken> {
        let response: OpenResponse = self
            .send_json(
                self.client
                    .post(self.url(&format!("/sessions/{}/companies", session)))
                    .json(&CompanyRequest {
                        name: &company.name,
                        path: &company.path,
                    }),
            )
            .await?;
        Ok(CompanyToken(response.company_id))
    }

    async fn close(&self, company: &CompanyToken) -> StoreResult<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/companies/{}", company))),
        )
        .await
        .map(|_| ())
    }

    async fn load(
        &self,
        company: &CompanyToken,
        predicate: &FilterPredicate,
    ) -> StoreResult<Vec<Record>> {
        self.send_json(
            self.client
                .post(self.url(&format!("/companies/{}/records/query", company)))
                .json(predicate),
        )
        .await
    }

    async fn save(&self, company: &CompanyToken, record: &Record) -> StoreResult<()> {
        self.send(
            self.client
                .put(self.url(&format!("/companies/{}/records/{}", company, record.id)))
                .json(&SaveRequest {
                    fields: record.staged_changes(),
                }),
        )
        .await
        .map(|_| ())
    }
}
