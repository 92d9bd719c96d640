// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local append-only audit journal.
//!
//! Records are appended to a daily file `{dir}/{YYYY-MM-DD}.jsonl`, one JSON
//! object per line, dated by the record's own timestamp.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{AuditError, AuditSink, ReauthorizationRecord, TransactionAuditEntry};

/// One journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEvent {
    Reauthorization(ReauthorizationRecord),
    Transaction(TransactionAuditEntry),
}

pub struct JsonlAuditSink {
    dir: PathBuf,
    /// Serializes appends so lines never interleave.
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{date}.jsonl"))
    }

    async fn append(&self, at: DateTime<Utc>, event: &JournalEvent) -> Result<(), AuditError> {
        let mut line = serde_json::to_string(event).map_err(|e| {
            AuditError::Serialization(format!("Failed to serialize audit event: {e}"))
        })?;
        line.push('\n');

        let path = self.file_for(&at.format("%Y-%m-%d").to_string());
        let _guard = self.write_lock.lock().await;

        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AuditError::Io(format!("{}: {e}", self.dir.display())))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))?;
        file.flush()
            .await
            .map_err(|e| AuditError::Io(format!("{}: {e}", path.display())))
    }

    /// Read all events journaled on `date` (`YYYY-MM-DD`). A day without a
    /// journal file yields no events.
    pub async fn read_events(&self, date: &str) -> Result<Vec<JournalEvent>, AuditError> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| AuditError::Io(format!("Invalid journal date `{date}`: {e}")))?;

        let path = self.file_for(date);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AuditError::Io(format!("{}: {e}", path.display()))),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| {
                    AuditError::Serialization(format!("Failed to deserialize audit event: {e}"))
                })
            })
            .collect()
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record_reauthorization(
        &self,
        record: &ReauthorizationRecord,
    ) -> Result<(), AuditError> {
        self.append(
            record.recorded_at,
            &JournalEvent::Reauthorization(record.clone()),
        )
        .await
    }

    async fn record_transaction(&self, entry: &TransactionAuditEntry) -> Result<(), AuditError> {
        self.append(entry.recorded_at, &JournalEvent::Transaction(entry.clone()))
            .await
    }
}
