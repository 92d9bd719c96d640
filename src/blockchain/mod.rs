// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration module for Solana.
//!
//! This module provides functionality for:
//! - Querying native SOL and SPL token balances
//! - Building native transfer transactions
//! - Broadcasting and confirming signed transactions

pub mod client;
pub mod transactions;
pub mod types;

pub use client::{ChainRpc, ChainRpcError, SolanaRpcClient};
pub use transactions::*;
pub use types::*;
