// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit records for reauthorizations and transaction submissions.
//!
//! Recording is fire-and-forget: [`AuditRecorder`] spawns one task per
//! record and logs sink failures. Callers of primary operations never await
//! the sink.

pub mod http;
pub mod journal;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::accounts::auth_token_hint;
use crate::config::SessionConfig;
use crate::models::{AuthorizationMethod, CapabilityReport};

pub use http::HttpAuditSink;
pub use journal::JsonlAuditSink;

/// Outcome of one wallet reauthorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReauthorizationRecord {
    pub id: String,
    pub wallet_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_name: Option<String>,
    /// Token hint only, never the token itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub method: AuthorizationMethod,
    pub capabilities: CapabilityReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ReauthorizationRecord {
    pub fn new(
        wallet_address: impl Into<String>,
        method: AuthorizationMethod,
        capabilities: CapabilityReport,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_address: wallet_address.into(),
            wallet_app_id: None,
            wallet_name: None,
            auth_token: None,
            method,
            capabilities,
            error: None,
            recorded_at,
        }
    }

    pub fn with_wallet(mut self, app_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.wallet_app_id = Some(app_id.into());
        self.wallet_name = Some(name.into());
        self
    }

    /// Attach a hint of the auth token.
    pub fn with_auth_token(mut self, token: &str) -> Self {
        if !token.is_empty() {
            self.auth_token = Some(auth_token_hint(token));
        }
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Signing path used for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationPrimitive {
    /// Wallet signed and submitted in one call.
    SignAndSendTransactions,
    /// Wallet signed, then the transaction was broadcast over RPC.
    SignTransactions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    Failed,
}

/// One submission attempt of a native transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionAuditEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub source_wallet_address: String,
    pub destination_address: String,
    pub amount_lamports: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_primitive: Option<AuthorizationPrimitive>,
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionAuditEntry {
    pub fn submitted(
        signature: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        amount_lamports: u64,
        primitive: AuthorizationPrimitive,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            signature: Some(signature.into()),
            source_wallet_address: source.into(),
            destination_address: destination.into(),
            amount_lamports,
            authorization_primitive: Some(primitive),
            status: SubmissionStatus::Submitted,
            failure_reason: None,
            metadata: serde_json::Value::Null,
            recorded_at,
        }
    }

    pub fn failed(
        source: impl Into<String>,
        destination: impl Into<String>,
        amount_lamports: u64,
        primitive: Option<AuthorizationPrimitive>,
        reason: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            signature: None,
            source_wallet_address: source.into(),
            destination_address: destination.into(),
            amount_lamports,
            authorization_primitive: primitive,
            status: SubmissionStatus::Failed,
            failure_reason: Some(reason.into()),
            metadata: serde_json::Value::Null,
            recorded_at,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuditError {
    #[error("Audit request failed: {0}")]
    Request(String),

    #[error("Audit backend returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Audit journal error: {0}")]
    Io(String),

    #[error("Audit serialization error: {0}")]
    Serialization(String),
}

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_reauthorization(&self, record: &ReauthorizationRecord)
        -> Result<(), AuditError>;

    async fn record_transaction(&self, entry: &TransactionAuditEntry) -> Result<(), AuditError>;
}

/// Writes every record to each inner sink. All sinks are attempted; the
/// first error is returned.
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanoutAuditSink {
    async fn record_reauthorization(
        &self,
        record: &ReauthorizationRecord,
    ) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_reauthorization(record).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn record_transaction(&self, entry: &TransactionAuditEntry) -> Result<(), AuditError> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record_transaction(entry).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Sink that drops every record. Used when no audit backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardAuditSink;

#[async_trait]
impl AuditSink for DiscardAuditSink {
    async fn record_reauthorization(&self, _: &ReauthorizationRecord) -> Result<(), AuditError> {
        Ok(())
    }

    async fn record_transaction(&self, _: &TransactionAuditEntry) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Build the configured sink: HTTP backend, local journal, both, or none.
pub fn sink_from_config(config: &SessionConfig) -> Result<Arc<dyn AuditSink>, AuditError> {
    let mut sinks: Vec<Arc<dyn AuditSink>> = Vec::new();
    if let Some(base_url) = &config.audit_base_url {
        sinks.push(Arc::new(HttpAuditSink::new(
            base_url,
            config.audit_token.clone(),
        )?));
    }
    if let Some(dir) = &config.audit_journal_dir {
        sinks.push(Arc::new(JsonlAuditSink::new(dir.clone())));
    }

    Ok(match sinks.len() {
        0 => Arc::new(DiscardAuditSink),
        1 => sinks.remove(0),
        _ => Arc::new(FanoutAuditSink::new(sinks)),
    })
}

/// Spawns audit writes in the background and logs their failures.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    tracker: TaskTracker,
    /// Held for the close, wait, reopen sequence of a flush.
    flushing: Arc<Mutex<()>>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            tracker: TaskTracker::new(),
            flushing: Arc::new(Mutex::new(())),
        }
    }

    pub fn record_reauthorization(&self, record: ReauthorizationRecord) {
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            if let Err(e) = sink.record_reauthorization(&record).await {
                warn!(
                    address = %record.wallet_address,
                    method = record.method.as_str(),
                    error = %e,
                    "Failed to record reauthorization"
                );
            }
        });
    }

    pub fn record_transaction(&self, entry: TransactionAuditEntry) {
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            if let Err(e) = sink.record_transaction(&entry).await {
                warn!(
                    source = %entry.source_wallet_address,
                    signature = entry.signature.as_deref().unwrap_or("-"),
                    error = %e,
                    "Failed to record transaction audit entry"
                );
            }
        });
    }

    /// Wait for every record spawned so far to reach the sink. Concurrent
    /// flushes run one after another.
    pub async fn flush(&self) {
        let _flushing = self.flushing.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
