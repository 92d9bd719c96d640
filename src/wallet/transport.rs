// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transport adapter contract for the Mobile Wallet Adapter transact protocol.
//!
//! Platform bindings (Android intent bridge, test doubles) implement
//! [`WalletAdapter`] and [`WalletSession`]. Everything above this module only
//! sees these types, never a platform error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identity this app asserts to the wallet on every (re)authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub name: String,
    pub uri: String,
    /// Relative to `uri`.
    pub icon: String,
}

/// Which wallet app sits on the other end of the channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub app_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Parameters of a full, user-facing `authorize` call.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub identity: AppIdentity,
    /// e.g. `solana:devnet`
    pub chain: String,
    pub features: Vec<String>,
}

/// Account as returned on the wire. `address` is base64 of the 32 key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAccount {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Result of `authorize` / `reauthorize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResult {
    pub accounts: Vec<WireAccount>,
    pub auth_token: String,
}

/// Capability payload as the wallet reports it. Every field is optional
/// because older wallets omit most of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapabilities {
    pub supports_sign_and_send_transactions: Option<bool>,
    pub supports_sign_transactions: Option<bool>,
    pub supports_sign_messages: Option<bool>,
    pub supports_clone_authorization: Option<bool>,
    pub max_transactions_per_request: Option<u32>,
    pub max_messages_per_request: Option<u32>,
    #[serde(default)]
    pub supported_transaction_versions: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Structured category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// No compatible wallet app is installed or reachable.
    WalletNotFound,
    Timeout,
    /// The transport refused to run outside a secure context.
    InsecureContext,
    /// The user or the wallet declined the request.
    Declined,
    ChainNotSupported,
    /// Third-party transport that only exposes a message.
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wrap a bare message from a transport that has no structured kinds.
    pub fn unclassified(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Unclassified, message)
    }
}

/// One open channel to the counterpart wallet app.
#[async_trait]
pub trait WalletSession: Send {
    async fn authorize(
        &mut self,
        request: AuthorizeRequest,
    ) -> Result<AuthorizationResult, TransportError>;

    async fn reauthorize(
        &mut self,
        identity: &AppIdentity,
        auth_token: &str,
    ) -> Result<AuthorizationResult, TransportError>;

    async fn deauthorize(&mut self, auth_token: &str) -> Result<(), TransportError>;

    /// `Ok(None)` means the wallet does not implement the query.
    async fn get_capabilities(&mut self) -> Result<Option<RawCapabilities>, TransportError>;

    /// Returns one raw 64-byte signature per submitted transaction.
    async fn sign_and_send_transactions(
        &mut self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, TransportError>;

    /// Returns the signed, wire-serialized transactions without submitting them.
    async fn sign_transactions(
        &mut self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, TransportError>;

    /// Release the underlying channel. Called exactly once by the session guard.
    fn close(&mut self);
}

/// Factory for wallet sessions.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    fn wallet_info(&self) -> WalletInfo;

    async fn open_session(&self) -> Result<Box<dyn WalletSession>, TransportError>;
}
