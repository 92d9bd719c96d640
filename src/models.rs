// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Data Models
//!
//! Linked accounts, capability snapshots and balance records shared by the
//! session core and its host. All types serialize as camelCase JSON so the
//! host UI can consume them directly.
//!
//! ## Ownership
//!
//! - A [`LinkedAccount`] exclusively holds its `auth_token`; accounts
//!   authorized together share the same token.
//! - A [`WalletBalance`] is replaced wholesale on every refresh, never merged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Accounts
// =============================================================================

/// One authorized on-chain address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    /// Base58 public key.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Wallet-issued credential. Never logged or serialized to the host.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub auth_token: String,
    pub wallet_app_id: String,
    pub wallet_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilityReport>,
    /// First time this address was linked.
    pub linked_at: DateTime<Utc>,
    /// Most recent successful (re)authorization.
    pub authorized_at: DateTime<Utc>,
}

// =============================================================================
// Capabilities
// =============================================================================

/// Immutable snapshot of what the counterpart wallet supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    pub supports_sign_and_send_transactions: bool,
    pub supports_sign_transactions: bool,
    pub supports_sign_messages: bool,
    pub supports_clone_authorization: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_transactions_per_request: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_messages_per_request: Option<u32>,
    pub supported_transaction_versions: Vec<String>,
    pub feature_flags: Vec<String>,
}

// =============================================================================
// Authorization
// =============================================================================

/// How a (re)authorization was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationMethod {
    /// Stored auth token accepted without a consent prompt.
    Silent,
    /// Fell back to a full interactive `authorize`.
    Prompted,
}

impl AuthorizationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationMethod::Silent => "silent",
            AuthorizationMethod::Prompted => "prompted",
        }
    }
}

// =============================================================================
// Balances
// =============================================================================

/// SPL token position inside a [`WalletBalance`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenHolding {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub balance: f64,
    pub usd_value: f64,
    pub decimals: u8,
}

/// Valued snapshot of one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    /// Native balance in SOL.
    pub balance: f64,
    /// Native plus token value in USD.
    pub usd_value: f64,
    pub last_updated: DateTime<Utc>,
    pub tokens: Vec<TokenHolding>,
    /// Mints held without a resolvable price.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_prices: Vec<String>,
}

/// Point in the per-address balance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub usd_value: f64,
    pub native_balance: f64,
}
