// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy of the session core.
//!
//! Transport failures enter through [`map_transport_error`] and nowhere else.

use crate::wallet::{TransportError, TransportErrorKind};

/// Every public operation rejects with exactly one of these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("No compatible wallet app found: {0}")]
    WalletUnavailable(String),

    #[error("Wallet request timed out: {0}")]
    Timeout(String),

    #[error("Wallet transport requires a secure context: {0}")]
    InsecureContext(String),

    #[error("Request denied: {0}")]
    Denied(String),

    #[error("Chain not supported by wallet: {0}")]
    UnsupportedChain(String),

    #[error("Wallet {0} is not linked")]
    WalletNotLinked(String),

    #[error("Wallet supports neither sign-and-send nor sign-only transactions")]
    WalletCannotSign,

    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient balance: requested {requested} lamports, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("Wallet transport failed: {0}")]
    TransportFailed(String),

    #[error("RPC error: {0}")]
    RpcFailed(String),
}

impl SessionError {
    /// Stable code for this error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::WalletUnavailable(_) => "wallet_unavailable",
            SessionError::Timeout(_) => "timeout",
            SessionError::InsecureContext(_) => "insecure_context",
            SessionError::Denied(_) => "denied",
            SessionError::UnsupportedChain(_) => "unsupported_chain",
            SessionError::WalletNotLinked(_) => "wallet_not_linked",
            SessionError::WalletCannotSign => "wallet_cannot_sign",
            SessionError::BroadcastFailed(_) => "broadcast_failed",
            SessionError::InvalidInput(_) => "invalid_input",
            SessionError::InsufficientBalance { .. } => "insufficient_balance",
            SessionError::TransportFailed(_) => "transport_failed",
            SessionError::RpcFailed(_) => "rpc_failed",
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        SessionError::InvalidInput(message.into())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Message fragments emitted by known wallet apps and the MWA client
/// libraries. Reverse-engineered and possibly incomplete; anything that does
/// not match becomes `TransportFailed`.
const WALLET_UNAVAILABLE_HINTS: &[&str] = &[
    "no installed wallet",
    "error_wallet_not_found",
    "wallet not found",
    "no wallet",
    "activity not found",
];
const TIMEOUT_HINTS: &[&str] = &["timed out", "timeout", "error_session_timeout"];
const INSECURE_CONTEXT_HINTS: &[&str] = &["secure context", "securecontext", "insecure"];
const DENIED_HINTS: &[&str] = &[
    "declined",
    "rejected",
    "denied",
    "cancelled",
    "canceled",
    "error_authorization_failed",
    "not authorized",
];
const UNSUPPORTED_CHAIN_HINTS: &[&str] = &[
    "chain not supported",
    "cluster not supported",
    "error_chain_not_supported",
    "unsupported chain",
];

/// Map a transport failure onto the session taxonomy.
pub fn map_transport_error(error: TransportError) -> SessionError {
    let TransportError { kind, message } = error;
    match kind {
        TransportErrorKind::WalletNotFound => SessionError::WalletUnavailable(message),
        TransportErrorKind::Timeout => SessionError::Timeout(message),
        TransportErrorKind::InsecureContext => SessionError::InsecureContext(message),
        TransportErrorKind::Declined => SessionError::Denied(message),
        TransportErrorKind::ChainNotSupported => SessionError::UnsupportedChain(message),
        TransportErrorKind::Unclassified => classify_message(message),
    }
}

fn classify_message(message: String) -> SessionError {
    let lowered = message.to_ascii_lowercase();
    let matches = |hints: &[&str]| hints.iter().any(|hint| lowered.contains(hint));

    // Order matters: "authorization request timed out" is a timeout, not a denial.
    if matches(WALLET_UNAVAILABLE_HINTS) {
        SessionError::WalletUnavailable(message)
    } else if matches(TIMEOUT_HINTS) {
        SessionError::Timeout(message)
    } else if matches(INSECURE_CONTEXT_HINTS) {
        SessionError::InsecureContext(message)
    } else if matches(UNSUPPORTED_CHAIN_HINTS) {
        SessionError::UnsupportedChain(message)
    } else if matches(DENIED_HINTS) {
        SessionError::Denied(message)
    } else {
        SessionError::TransportFailed(message)
    }
}
