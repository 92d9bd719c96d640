// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Pricing and token-metadata collaborators.
//!
//! Lookup internals live outside this crate; the reconciler only sees these
//! traits.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
}

/// Token entry reported by a portfolio indexer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioToken {
    pub mint: String,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub balance: f64,
    pub decimals: u8,
    #[serde(default)]
    pub usd_value: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("Price source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid price response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price of one SOL.
    async fn native_price_usd(&self) -> Result<f64, OracleError>;

    /// USD prices keyed by mint. Mints without a price are simply absent.
    async fn token_prices_usd(&self, mints: &[String])
        -> Result<HashMap<String, f64>, OracleError>;

    async fn metadata_for_wallet(
        &self,
        address: &str,
        mints: &[String],
    ) -> Result<HashMap<String, TokenMetadata>, OracleError>;
}

/// Optional secondary source of token balances (portfolio indexer).
#[async_trait]
pub trait TokenBalanceSource: Send + Sync {
    async fn tokens_for_wallet(&self, address: &str) -> Result<Vec<PortfolioToken>, OracleError>;
}
