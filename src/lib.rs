// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relational Wallet - Wallet Session Core
//!
//! Links Solana accounts held by an external wallet app over the Mobile
//! Wallet Adapter protocol, signs and submits native SOL transfers through
//! it, and keeps per-account USD balances current. Private keys never enter
//! this crate.
//!
//! ## Modules
//!
//! - `session` - [`SessionManager`], the entry point for hosts
//! - `wallet` - wallet-app transport seam and the scoped session broker
//! - `capabilities` - wallet feature probing and normalization
//! - `accounts` - wire address decoding and account merging
//! - `balance` - native and token balance reconciliation
//! - `blockchain` - Solana RPC client and transfer building
//! - `audit` - reauthorization and transaction audit sinks
//! - `store` / `state` - in-memory linked-account state

pub mod accounts;
pub mod approval;
pub mod audit;
pub mod balance;
pub mod blockchain;
pub mod capabilities;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod oracle;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use session::{AuthorizationPreview, Collaborators, SessionManager};
