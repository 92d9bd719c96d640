// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::store::SessionStore;

/// Shared handle to the session store. Locks are never held across a
/// wallet, RPC or oracle call.
#[derive(Clone)]
pub struct SessionState {
    pub store: Arc<RwLock<SessionStore>>,
}

impl SessionState {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(SessionStore::new())
    }
}
