// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Interactive approval gate (biometric prompt on mobile hosts).
//!
//! Only the contract lives here: a send must pass the gate before any
//! wallet contact. A second request while one is pending is the caller's
//! problem.

use async_trait::async_trait;

#[async_trait]
pub trait ApprovalGate: Send + Sync {
    /// Block until the user approves, or fail.
    async fn require_approval(&self, reason: &str) -> Result<(), ApprovalError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApprovalError {
    #[error("Approval rejected: {0}")]
    Rejected(String),
}

/// Gate for hosts without an approval prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysApprove;

#[async_trait]
impl ApprovalGate for AlwaysApprove {
    async fn require_approval(&self, _reason: &str) -> Result<(), ApprovalError> {
        Ok(())
    }
}
