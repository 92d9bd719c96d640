// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Mobile Wallet Adapter integration.
//!
//! - `transport` - adapter traits and wire types
//! - `session` - serialized, scoped session acquisition

pub mod session;
pub mod transport;

pub use session::{SessionBroker, SessionGuard};
pub use transport::{
    AppIdentity, AuthorizationResult, AuthorizeRequest, RawCapabilities, TransportError,
    TransportErrorKind, WalletAdapter, WalletInfo, WalletSession, WireAccount,
};
