// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Connect and reauthorization flows.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::SessionManager;
use crate::accounts::{accounts_from_authorization, decode_wire_address};
use crate::audit::ReauthorizationRecord;
use crate::capabilities::{default_capabilities, probe, REQUESTED_FEATURES};
use crate::error::{map_transport_error, SessionError, SessionResult};
use crate::models::{AuthorizationMethod, CapabilityReport, LinkedAccount};
use crate::state::SessionState;
use crate::wallet::{
    AppIdentity, AuthorizationResult, AuthorizeRequest, WalletInfo, WalletSession,
};

/// Result of a fresh `authorize` handshake, committed by
/// [`SessionManager::finalize_authorization`].
#[derive(Debug, Clone)]
pub struct AuthorizationPreview {
    result: AuthorizationResult,
    wallet: WalletInfo,
    capabilities: CapabilityReport,
}

impl AuthorizationPreview {
    pub fn wallet(&self) -> &WalletInfo {
        &self.wallet
    }

    pub fn capabilities(&self) -> &CapabilityReport {
        &self.capabilities
    }

    /// Base58 addresses offered by the wallet, for account selection.
    /// Undecodable entries are skipped here and rejected at finalize.
    pub fn addresses(&self) -> Vec<String> {
        self.result
            .accounts
            .iter()
            .filter_map(|wire| decode_wire_address(&wire.address).ok())
            .collect()
    }
}

/// Reauthorization accounts merged into the store.
pub(super) struct Committed {
    pub result: AuthorizationResult,
    /// Address identifying the refreshed slot.
    pub identity: String,
    /// Returned addresses that were not linked before.
    pub added: Vec<String>,
}

/// Outcome of the two-tier reauthorization inside one wallet session.
/// `method` is the tier that ran last, whether or not it succeeded.
pub(super) struct Reauthorization {
    pub method: AuthorizationMethod,
    pub committed: SessionResult<Committed>,
}

/// Owned inputs for reauthorizing inside a session closure.
#[derive(Clone)]
pub(super) struct ReauthContext {
    pub state: SessionState,
    pub identity: AppIdentity,
    pub request: AuthorizeRequest,
    pub wallet: WalletInfo,
    pub now: DateTime<Utc>,
}

impl ReauthContext {
    /// Try `reauthorize` with the stored token, falling back to a prompted
    /// `authorize`, then merge the result for the account at `slot`. A
    /// failed silent attempt alone is not an error.
    pub async fn reauthorize(
        &self,
        session: &mut dyn WalletSession,
        slot: &str,
        auth_token: &str,
        capabilities: &CapabilityReport,
    ) -> Reauthorization {
        let (method, result) = match session.reauthorize(&self.identity, auth_token).await {
            Ok(result) => (AuthorizationMethod::Silent, Ok(result)),
            Err(e) => {
                info!(error = %e, "Silent reauthorization failed, prompting for authorization");
                let result = session
                    .authorize(self.request.clone())
                    .await
                    .map_err(map_transport_error);
                (AuthorizationMethod::Prompted, result)
            }
        };
        let committed = match result {
            Ok(result) => self.commit(slot, result, capabilities).await,
            Err(e) => Err(e),
        };
        Reauthorization { method, committed }
    }

    /// Merge a reauthorization result into the store. The slot's identity
    /// is `slot` itself if the wallet returned it, else the first returned
    /// account.
    async fn commit(
        &self,
        slot: &str,
        result: AuthorizationResult,
        capabilities: &CapabilityReport,
    ) -> SessionResult<Committed> {
        let accounts = accounts_from_authorization(&result, &self.wallet, capabilities, self.now)?;
        let identity = if accounts.iter().any(|a| a.address == slot) {
            slot.to_string()
        } else {
            accounts
                .first()
                .map(|a| a.address.clone())
                .unwrap_or_else(|| slot.to_string())
        };

        let mut store = self.state.store.write().await;
        let added = accounts
            .iter()
            .filter(|a| store.account(&a.address).is_none())
            .map(|a| a.address.clone())
            .collect();
        store.merge_accounts(accounts);
        store.retoken(slot, &result.auth_token);
        Ok(Committed {
            result,
            identity,
            added,
        })
    }
}

/// Session closure result of a silent refresh.
struct RefreshAttempt {
    capabilities: CapabilityReport,
    reauthorization: Reauthorization,
}

impl SessionManager {
    pub(super) fn authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            identity: self.config.identity.clone(),
            chain: self.config.chain().to_string(),
            features: REQUESTED_FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub(super) fn reauth_context(&self) -> ReauthContext {
        ReauthContext {
            state: self.state.clone(),
            identity: self.config.identity.clone(),
            request: self.authorize_request(),
            wallet: self.broker.wallet_info(),
            now: self.clock.now(),
        }
    }

    /// Run a fresh `authorize` handshake and probe capabilities.
    pub async fn start_authorization(&self) -> SessionResult<AuthorizationPreview> {
        let request = self.authorize_request();
        let (result, capabilities) = self
            .broker
            .with_session(move |session| {
                Box::pin(async move {
                    let result = session
                        .authorize(request)
                        .await
                        .map_err(map_transport_error)?;
                    let capabilities = probe(session).await;
                    Ok((result, capabilities))
                })
            })
            .await?;

        info!(
            accounts = result.accounts.len(),
            chain = self.config.chain(),
            "Wallet authorization started"
        );
        Ok(AuthorizationPreview {
            result,
            wallet: self.broker.wallet_info(),
            capabilities,
        })
    }

    /// Commit a preview: merge its accounts into the linked set, designate
    /// a primary if none exists, then refresh the new accounts' balances.
    ///
    /// `selected` limits the commit to a subset of the preview's addresses.
    pub async fn finalize_authorization(
        &self,
        preview: AuthorizationPreview,
        selected: Option<&[String]>,
    ) -> SessionResult<Vec<LinkedAccount>> {
        let mut accounts = accounts_from_authorization(
            &preview.result,
            &preview.wallet,
            &preview.capabilities,
            self.clock.now(),
        )?;
        if let Some(selected) = selected {
            accounts.retain(|account| selected.iter().any(|s| s.trim() == account.address));
        }
        if accounts.is_empty() {
            return Err(SessionError::invalid_input(
                "Authorization returned none of the requested accounts",
            ));
        }

        let merged = {
            let mut store = self.state.store.write().await;
            let merged = store.merge_accounts(accounts);
            if let Some(first) = merged.first() {
                if store.designate_primary_if_unset(&first.address) {
                    info!(address = %first.address, "Primary wallet designated");
                }
            }
            merged
        };

        info!(
            accounts = merged.len(),
            wallet = %preview.wallet.name,
            "Wallet authorization finalized"
        );
        self.refresh_quietly(merged.iter().map(|a| a.address.clone()).collect())
            .await;
        Ok(merged)
    }

    /// Renew the auth token of a linked account (or the primary one),
    /// prompting only if the wallet rejects the stored token. `None` when
    /// no account is targeted.
    ///
    /// Every attempt is audited, including failed ones.
    pub async fn silent_refresh_authorization(
        &self,
        address: Option<&str>,
    ) -> SessionResult<Option<ReauthorizationRecord>> {
        let Some(target) = self.resolve_target(address).await else {
            return Ok(None);
        };
        let account = self.linked_account(&target).await?;

        let context = self.reauth_context();
        let token = account.auth_token.clone();
        let slot = account.address.clone();
        let attempt = self
            .broker
            .with_session(move |session| {
                Box::pin(async move {
                    let capabilities = probe(session).await;
                    let reauthorization = context
                        .reauthorize(session, &slot, &token, &capabilities)
                        .await;
                    Ok(RefreshAttempt {
                        capabilities,
                        reauthorization,
                    })
                })
            })
            .await;

        // A session that never opened made no attempt past the silent tier.
        let (capabilities, method, committed) = match attempt {
            Ok(RefreshAttempt {
                capabilities,
                reauthorization,
            }) => (
                capabilities,
                reauthorization.method,
                reauthorization.committed,
            ),
            Err(e) => (default_capabilities(), AuthorizationMethod::Silent, Err(e)),
        };

        match committed {
            Ok(committed) => {
                let wallet = self.broker.wallet_info();
                let record = ReauthorizationRecord::new(
                    committed.identity,
                    method,
                    capabilities,
                    self.clock.now(),
                )
                .with_wallet(wallet.app_id, wallet.name)
                .with_auth_token(&committed.result.auth_token);

                info!(
                    address = %record.wallet_address,
                    method = method.as_str(),
                    added = committed.added.len(),
                    "Wallet reauthorized"
                );
                self.audit.record_reauthorization(record.clone());
                self.refresh_quietly(committed.added).await;
                Ok(Some(record))
            }
            Err(e) => {
                warn!(address = %account.address, error = %e, "Wallet reauthorization failed");
                self.audit.record_reauthorization(failed_record(
                    &account,
                    method,
                    capabilities,
                    self.clock.now(),
                    &e,
                ));
                Err(e)
            }
        }
    }
}

/// Audit record for a failed attempt, built from what was known before it.
pub(super) fn failed_record(
    account: &LinkedAccount,
    method: AuthorizationMethod,
    capabilities: CapabilityReport,
    now: DateTime<Utc>,
    error: &SessionError,
) -> ReauthorizationRecord {
    ReauthorizationRecord::new(account.address.clone(), method, capabilities, now)
        .with_wallet(account.wallet_app_id.clone(), account.wallet_name.clone())
        .with_auth_token(&account.auth_token)
        .failed(format!("{}: {error}", error.error_code()))
}
