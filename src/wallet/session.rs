// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scoped acquisition of wallet sessions.
//!
//! The transport is a single bidirectional channel to the wallet app, so the
//! broker hands out one session at a time. The session is released by a drop
//! guard, which also covers early returns and panics inside the operation.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::debug;

use super::transport::{WalletAdapter, WalletInfo, WalletSession};
use crate::error::{map_transport_error, SessionError};

/// Owns an open session and closes it when dropped.
pub struct SessionGuard {
    inner: Box<dyn WalletSession>,
}

impl SessionGuard {
    fn new(inner: Box<dyn WalletSession>) -> Self {
        Self { inner }
    }

    pub fn session(&mut self) -> &mut dyn WalletSession {
        self.inner.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.close();
        debug!("Wallet session closed");
    }
}

/// Serializes `transact`-style handshakes over one wallet adapter.
pub struct SessionBroker {
    adapter: Arc<dyn WalletAdapter>,
    turn: Mutex<()>,
}

impl SessionBroker {
    pub fn new(adapter: Arc<dyn WalletAdapter>) -> Self {
        Self {
            adapter,
            turn: Mutex::new(()),
        }
    }

    pub fn wallet_info(&self) -> WalletInfo {
        self.adapter.wallet_info()
    }

    /// Open a session, run `operation` inside it, and release it on every
    /// exit path. Concurrent callers wait for their turn.
    ///
    /// ```rust,ignore
    /// let caps = broker
    ///     .with_session(|session| Box::pin(async move { Ok(probe(session).await) }))
    ///     .await?;
    /// ```
    pub async fn with_session<T, F>(&self, operation: F) -> Result<T, SessionError>
    where
        T: Send,
        F: for<'s> FnOnce(&'s mut dyn WalletSession) -> BoxFuture<'s, Result<T, SessionError>>
            + Send,
    {
        let _turn = self.turn.lock().await;

        let session = self
            .adapter
            .open_session()
            .await
            .map_err(map_transport_error)?;
        let mut guard = SessionGuard::new(session);
        debug!(wallet = %self.adapter.wallet_info().name, "Wallet session opened");

        operation(guard.session()).await
    }
}
