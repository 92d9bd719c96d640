// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet session manager
//!
//! [`SessionManager`] owns the linked-account state and drives every
//! operation that talks to the external wallet app:
//!
//! - connect: [`SessionManager::start_authorization`] then
//!   [`SessionManager::finalize_authorization`]
//! - token refresh: [`SessionManager::silent_refresh_authorization`]
//! - transfers: [`SessionManager::send_native`]
//! - [`SessionManager::disconnect`] and balance refreshes
//!
//! Wallet contact always goes through one scoped [`SessionBroker`] turn.
//! Store locks are never held across a wallet, RPC or oracle await.

mod authorization;
mod signer;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::accounts::auth_token_hint;
use crate::approval::ApprovalGate;
use crate::audit::{AuditRecorder, AuditSink};
use crate::balance::BalanceReconciler;
use crate::blockchain::ChainRpc;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::models::{BalancePoint, LinkedAccount, WalletBalance};
use crate::oracle::{PriceOracle, TokenBalanceSource};
use crate::state::SessionState;
use crate::wallet::{SessionBroker, WalletAdapter};

pub use authorization::AuthorizationPreview;

/// External collaborators injected into the manager.
pub struct Collaborators {
    pub wallet: Arc<dyn WalletAdapter>,
    pub rpc: Arc<dyn ChainRpc>,
    pub oracle: Arc<dyn PriceOracle>,
    pub token_source: Option<Arc<dyn TokenBalanceSource>>,
    pub approval: Arc<dyn ApprovalGate>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct SessionManager {
    config: SessionConfig,
    state: SessionState,
    broker: SessionBroker,
    rpc: Arc<dyn ChainRpc>,
    approval: Arc<dyn ApprovalGate>,
    clock: Arc<dyn Clock>,
    reconciler: BalanceReconciler,
    audit: AuditRecorder,
}

impl SessionManager {
    pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
        let state = SessionState::default();
        let reconciler = BalanceReconciler::new(
            state.clone(),
            Arc::clone(&collaborators.rpc),
            collaborators.oracle,
            collaborators.token_source,
            Arc::clone(&collaborators.clock),
            config.balance_history_limit,
        );

        Self {
            state,
            broker: SessionBroker::new(collaborators.wallet),
            rpc: collaborators.rpc,
            approval: collaborators.approval,
            clock: collaborators.clock,
            reconciler,
            audit: AuditRecorder::new(collaborators.audit),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Wait for pending audit writes. Hosts call this before exiting.
    pub async fn shutdown(&self) {
        self.audit.flush().await;
        info!("Session manager shut down");
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub async fn linked_accounts(&self) -> Vec<LinkedAccount> {
        self.state.store.read().await.accounts().to_vec()
    }

    /// The primary account, which is also the active one.
    pub async fn primary_address(&self) -> Option<String> {
        self.state
            .store
            .read()
            .await
            .primary_address()
            .map(str::to_string)
    }

    pub async fn set_primary_address(&self, address: &str) -> SessionResult<()> {
        if self.state.store.write().await.set_primary(address) {
            Ok(())
        } else {
            Err(SessionError::WalletNotLinked(address.to_string()))
        }
    }

    /// Raw lamport balances keyed by address.
    pub async fn balances(&self) -> HashMap<String, u64> {
        self.state.store.read().await.native_balances().clone()
    }

    pub async fn wallet_balances(&self) -> HashMap<String, WalletBalance> {
        self.state.store.read().await.wallet_balances().clone()
    }

    pub async fn wallet_balance(&self, address: &str) -> Option<WalletBalance> {
        self.state.store.read().await.wallet_balance(address).cloned()
    }

    pub async fn balance_history(&self, address: &str) -> Vec<BalancePoint> {
        self.state.store.read().await.history(address)
    }

    /// Resolve an explicit address, or fall back to the primary account.
    async fn resolve_target(&self, address: Option<&str>) -> Option<String> {
        match address {
            Some(address) => Some(address.trim().to_string()),
            None => self.primary_address().await,
        }
    }

    async fn linked_account(&self, address: &str) -> SessionResult<LinkedAccount> {
        self.state
            .store
            .read()
            .await
            .account(address)
            .cloned()
            .ok_or_else(|| SessionError::WalletNotLinked(address.to_string()))
    }

    // =========================================================================
    // Disconnect
    // =========================================================================

    /// Unlink an account. The wallet is asked to deauthorize the token only
    /// when no other linked account still uses it.
    pub async fn disconnect(&self, address: Option<&str>) -> SessionResult<()> {
        let Some(target) = self.resolve_target(address).await else {
            return Ok(());
        };
        let account = self.linked_account(&target).await?;
        let shared = self
            .state
            .store
            .read()
            .await
            .token_shared_with_others(&target);

        if shared {
            info!(address = %target, "Auth token still in use by sibling accounts, skipping deauthorize");
        } else {
            let token = account.auth_token.clone();
            let deauthorized = self
                .broker
                .with_session(move |session| {
                    Box::pin(async move {
                        session
                            .deauthorize(&token)
                            .await
                            .map_err(crate::error::map_transport_error)
                    })
                })
                .await;
            if let Err(e) = deauthorized {
                warn!(
                    address = %target,
                    token = %auth_token_hint(&account.auth_token),
                    error = %e,
                    "Wallet deauthorize failed, removing account locally"
                );
            }
        }

        self.state.store.write().await.remove_account(&target);
        info!(address = %target, "Wallet disconnected");
        Ok(())
    }

    // =========================================================================
    // Balances
    // =========================================================================

    /// Refresh one linked account (or the primary one). `None` when there is
    /// nothing to refresh.
    pub async fn refresh_balance(&self, address: Option<&str>) -> SessionResult<Option<u64>> {
        let Some(target) = self.resolve_target(address).await else {
            return Ok(None);
        };
        self.linked_account(&target).await?;
        self.reconciler.refresh(&target).await.map(Some)
    }

    /// Refresh every linked account concurrently.
    pub async fn refresh_all_balances(&self) -> Vec<(String, SessionResult<u64>)> {
        let addresses: Vec<String> = self
            .linked_accounts()
            .await
            .into_iter()
            .map(|account| account.address)
            .collect();
        self.reconciler.refresh_many(addresses).await
    }

    /// Best-effort refresh used after authorization and sends.
    async fn refresh_quietly(&self, addresses: Vec<String>) {
        for (address, result) in self.reconciler.refresh_many(addresses).await {
            if let Err(e) = result {
                warn!(address = %address, error = %e, "Balance refresh failed");
            }
        }
    }
}
