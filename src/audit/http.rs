// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit sink posting JSON records to the wallet backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::{AuditError, AuditSink, ReauthorizationRecord, TransactionAuditEntry};

const REAUTHORIZATIONS_PATH: &str = "/v1/audit/reauthorizations";
const TRANSACTIONS_PATH: &str = "/v1/audit/transactions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpAuditSink {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpAuditSink {
    pub fn new(base_url: &Url, token: Option<String>) -> Result<Self, AuditError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuditError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), AuditError> {
        let mut request = self.http.post(self.endpoint(path)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuditError::Request(format!("POST {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AuditError::Rejected { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn record_reauthorization(
        &self,
        record: &ReauthorizationRecord,
    ) -> Result<(), AuditError> {
        self.post(REAUTHORIZATIONS_PATH, record).await
    }

    async fn record_transaction(&self, entry: &TransactionAuditEntry) -> Result<(), AuditError> {
        self.post(TRANSACTIONS_PATH, entry).await
    }
}
