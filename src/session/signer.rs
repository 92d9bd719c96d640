// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Native SOL transfers signed by the external wallet.
//!
//! The wallet either signs and submits in one call, or returns a signed
//! transaction that is broadcast here over RPC after the session closed.

use serde_json::json;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use tracing::{debug, info, warn};

use super::authorization::{failed_record, Reauthorization};
use super::SessionManager;
use crate::accounts::parse_address;
use crate::audit::{AuthorizationPrimitive, ReauthorizationRecord, TransactionAuditEntry};
use crate::blockchain::{
    build_native_transfer, format_sol, serialize_transaction, sol_to_lamports, LatestBlockhash,
};
use crate::capabilities::{default_capabilities, probe};
use crate::error::{map_transport_error, SessionError, SessionResult};
use crate::models::{AuthorizationMethod, CapabilityReport, LinkedAccount};
use crate::wallet::WalletSession;

/// What the wallet handed back for the transfer.
enum Signed {
    /// Signature of a transaction the wallet already submitted.
    Submitted(Signature),
    /// Signed wire transaction still to be broadcast.
    Unsubmitted(Vec<u8>),
}

impl Signed {
    fn primitive(&self) -> AuthorizationPrimitive {
        match self {
            Signed::Submitted(_) => AuthorizationPrimitive::SignAndSendTransactions,
            Signed::Unsubmitted(_) => AuthorizationPrimitive::SignTransactions,
        }
    }
}

/// Session closure result. Reauthorization bookkeeping survives a signing
/// failure so it can still be audited.
struct SendAttempt {
    capabilities: CapabilityReport,
    reauthorization: Reauthorization,
    signing: Option<SessionResult<Signed>>,
}

/// Validated transfer inputs.
struct Transfer {
    source: LinkedAccount,
    recipient: String,
    lamports: u64,
}

fn primitive_for(capabilities: &CapabilityReport) -> Option<AuthorizationPrimitive> {
    if capabilities.supports_sign_and_send_transactions {
        Some(AuthorizationPrimitive::SignAndSendTransactions)
    } else if capabilities.supports_sign_transactions {
        Some(AuthorizationPrimitive::SignTransactions)
    } else {
        None
    }
}

async fn sign(
    session: &mut dyn WalletSession,
    capabilities: &CapabilityReport,
    transaction: Vec<u8>,
) -> SessionResult<Signed> {
    match primitive_for(capabilities) {
        Some(AuthorizationPrimitive::SignAndSendTransactions) => {
            let signatures = session
                .sign_and_send_transactions(vec![transaction])
                .await
                .map_err(map_transport_error)?;
            let raw = signatures.into_iter().next().ok_or_else(|| {
                SessionError::TransportFailed("Wallet returned no signature".to_string())
            })?;
            let signature = Signature::try_from(raw.as_slice()).map_err(|_| {
                SessionError::TransportFailed(format!(
                    "Wallet returned a {}-byte signature",
                    raw.len()
                ))
            })?;
            Ok(Signed::Submitted(signature))
        }
        Some(AuthorizationPrimitive::SignTransactions) => {
            let signed = session
                .sign_transactions(vec![transaction])
                .await
                .map_err(map_transport_error)?;
            signed
                .into_iter()
                .next()
                .map(Signed::Unsubmitted)
                .ok_or_else(|| {
                    SessionError::TransportFailed("Wallet returned no signed transaction".to_string())
                })
        }
        None => Err(SessionError::WalletCannotSign),
    }
}

impl SessionManager {
    /// Send `amount` SOL from a linked account (the primary one by default)
    /// to `recipient`. Returns the base58 transaction signature.
    ///
    /// Confirmation is awaited for at most the configured timeout; a
    /// submitted signature is returned even if it could not be confirmed.
    pub async fn send_native(
        &self,
        recipient: &str,
        amount: f64,
        source: Option<&str>,
    ) -> SessionResult<String> {
        let transfer = self.validate_transfer(recipient, amount, source).await?;
        let Transfer {
            source,
            recipient,
            lamports,
        } = transfer;

        self.approval
            .require_approval(&format!("Send {} SOL to {recipient}", format_sol(lamports)))
            .await
            .map_err(|e| SessionError::Denied(e.to_string()))?;

        let (blockhash, payload) = self
            .prepare_transfer(&source.address, &recipient, lamports)
            .await
            .map_err(|e| self.fail_send(&source, &recipient, lamports, None, e))?;

        let context = self.reauth_context();
        let token = source.auth_token.clone();
        let slot = source.address.clone();
        let attempt = self
            .broker
            .with_session(move |session| {
                Box::pin(async move {
                    let capabilities = probe(session).await;
                    let reauthorization = context
                        .reauthorize(session, &slot, &token, &capabilities)
                        .await;
                    let signing = if reauthorization.committed.is_ok() {
                        Some(sign(session, &capabilities, payload).await)
                    } else {
                        None
                    };
                    Ok(SendAttempt {
                        capabilities,
                        reauthorization,
                        signing,
                    })
                })
            })
            .await;

        let attempt = match attempt {
            Ok(attempt) => attempt,
            Err(e) => {
                self.audit.record_reauthorization(failed_record(
                    &source,
                    AuthorizationMethod::Silent,
                    default_capabilities(),
                    self.clock.now(),
                    &e,
                ));
                return Err(self.fail_send(&source, &recipient, lamports, None, e));
            }
        };

        let SendAttempt {
            capabilities,
            reauthorization,
            signing,
        } = attempt;
        let primitive = primitive_for(&capabilities);

        let method = reauthorization.method;
        let committed = match reauthorization.committed {
            Ok(committed) => committed,
            Err(e) => {
                self.audit.record_reauthorization(failed_record(
                    &source,
                    method,
                    capabilities,
                    self.clock.now(),
                    &e,
                ));
                return Err(self.fail_send(&source, &recipient, lamports, primitive, e));
            }
        };

        let wallet = self.broker.wallet_info();
        let reauth_record = ReauthorizationRecord::new(
            committed.identity,
            method,
            capabilities.clone(),
            self.clock.now(),
        )
        .with_wallet(wallet.app_id, wallet.name)
        .with_auth_token(&committed.result.auth_token);
        let added = committed.added;

        let signing = signing.unwrap_or(Err(SessionError::WalletCannotSign));
        let signed = match signing {
            Ok(signed) => signed,
            Err(e) => {
                self.audit.record_reauthorization(reauth_record);
                self.refresh_quietly(added).await;
                return Err(self.fail_send(&source, &recipient, lamports, primitive, e));
            }
        };

        let primitive = signed.primitive();
        let signature = match signed {
            Signed::Submitted(signature) => signature,
            Signed::Unsubmitted(wire) => match self.rpc.send_raw_transaction(&wire).await {
                Ok(signature) => signature,
                Err(e) => {
                    self.audit.record_reauthorization(reauth_record);
                    self.refresh_quietly(added).await;
                    return Err(self.fail_send(
                        &source,
                        &recipient,
                        lamports,
                        Some(primitive),
                        SessionError::BroadcastFailed(e.to_string()),
                    ));
                }
            },
        };

        info!(
            signature = %signature,
            source = %source.address,
            destination = %recipient,
            lamports,
            primitive = ?primitive,
            "Transfer submitted"
        );

        self.confirm(&signature, &blockhash).await;
        let mut refresh = vec![source.address.clone()];
        refresh.extend(added);
        self.refresh_quietly(refresh).await;

        let entry = TransactionAuditEntry::submitted(
            signature.to_string(),
            source.address.clone(),
            recipient,
            lamports,
            primitive,
            self.clock.now(),
        )
        .with_metadata(json!({
            "reauthorizationMethod": method,
            "featureFlags": capabilities.feature_flags,
            "chain": self.config.chain(),
        }));
        self.audit.record_transaction(entry);
        self.audit.record_reauthorization(reauth_record);

        Ok(signature.to_string())
    }

    /// Checks run before any approval, wallet or RPC contact, in order.
    async fn validate_transfer(
        &self,
        recipient: &str,
        amount: f64,
        source: Option<&str>,
    ) -> SessionResult<Transfer> {
        let recipient = recipient.trim();
        if recipient.is_empty() {
            return Err(SessionError::invalid_input("Recipient address is required"));
        }

        if !amount.is_finite() || amount <= 0.0 || amount > self.config.max_send_sol {
            return Err(SessionError::invalid_input(format!(
                "Amount must be greater than 0 and at most {} SOL",
                self.config.max_send_sol
            )));
        }
        let lamports = sol_to_lamports(amount)
            .ok_or_else(|| SessionError::invalid_input("Amount is below one lamport"))?;

        let source_address = self
            .resolve_target(source)
            .await
            .ok_or_else(|| SessionError::WalletNotLinked("no primary wallet".to_string()))?;
        let account = self.linked_account(&source_address).await?;

        if account.address == recipient {
            return Err(SessionError::invalid_input("Cannot send to the source wallet"));
        }
        let to = parse_address(recipient)?;
        let from = parse_address(&account.address)?;
        if from == to {
            return Err(SessionError::invalid_input("Cannot send to the source wallet"));
        }

        let cached = self.state.store.read().await.native_balance(&account.address);
        if let Some(available) = cached {
            if available < lamports {
                return Err(SessionError::InsufficientBalance {
                    requested: lamports,
                    available,
                });
            }
        }

        Ok(Transfer {
            source: account,
            recipient: to.to_string(),
            lamports,
        })
    }

    /// Fetch a blockhash and encode the unsigned transfer against it.
    async fn prepare_transfer(
        &self,
        source: &str,
        recipient: &str,
        lamports: u64,
    ) -> SessionResult<(LatestBlockhash, Vec<u8>)> {
        let blockhash = self
            .rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| SessionError::RpcFailed(e.to_string()))?;

        let from = parse_address(source)?;
        let to = parse_address(recipient)?;
        let transaction = build_native_transfer(&from, &to, lamports, blockhash.blockhash);
        let payload = serialize_transaction(&transaction).map_err(|e| {
            SessionError::invalid_input(format!("Failed to encode transfer: {e}"))
        })?;
        Ok((blockhash, payload))
    }

    /// Wait for confirmation within the configured timeout. Never fails.
    async fn confirm(&self, signature: &Signature, blockhash: &LatestBlockhash) {
        let confirmation = self.rpc.confirm_transaction(
            signature,
            &blockhash.blockhash,
            blockhash.last_valid_block_height,
            CommitmentConfig::confirmed(),
        );
        match tokio::time::timeout(self.config.confirmation_timeout, confirmation).await {
            Ok(Ok(())) => debug!(signature = %signature, "Transfer confirmed"),
            Ok(Err(e)) => {
                warn!(signature = %signature, error = %e, "Transfer confirmation failed")
            }
            Err(_) => warn!(
                signature = %signature,
                timeout_secs = self.config.confirmation_timeout.as_secs(),
                "Transfer not confirmed before timeout"
            ),
        }
    }

    /// Audit a failed submission and hand the error back.
    fn fail_send(
        &self,
        source: &LinkedAccount,
        recipient: &str,
        lamports: u64,
        primitive: Option<AuthorizationPrimitive>,
        error: SessionError,
    ) -> SessionError {
        warn!(
            source = %source.address,
            destination = %recipient,
            error = %error,
            "Transfer failed"
        );
        self.audit.record_transaction(TransactionAuditEntry::failed(
            source.address.clone(),
            recipient,
            lamports,
            primitive,
            format!("{}: {error}", error.error_code()),
            self.clock.now(),
        ));
        error
    }
}
