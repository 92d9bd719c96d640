// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Capability negotiation with the counterpart wallet.
//!
//! Probing is best-effort: a wallet that fails or ignores the query gets the
//! [`default_capabilities`] baseline, and higher-level operations proceed.

use tracing::warn;

use crate::models::CapabilityReport;
use crate::wallet::{RawCapabilities, WalletSession};

pub const FEATURE_SIGN_AND_SEND: &str = "solana:signAndSendTransaction";
pub const FEATURE_SIGN_TRANSACTIONS: &str = "solana:signTransactions";
pub const FEATURE_SIGN_MESSAGES: &str = "solana:signMessages";
pub const FEATURE_CLONE_AUTHORIZATION: &str = "solana:cloneAuthorization";

/// Features requested on a full `authorize`.
pub const REQUESTED_FEATURES: &[&str] = &[
    FEATURE_SIGN_AND_SEND,
    FEATURE_SIGN_TRANSACTIONS,
    FEATURE_SIGN_MESSAGES,
];

/// Baseline used when the wallet cannot describe itself.
pub fn default_capabilities() -> CapabilityReport {
    CapabilityReport {
        supports_sign_and_send_transactions: true,
        supports_sign_transactions: true,
        supports_sign_messages: false,
        supports_clone_authorization: false,
        max_transactions_per_request: None,
        max_messages_per_request: None,
        supported_transaction_versions: vec!["legacy".to_string()],
        feature_flags: Vec::new(),
    }
}

/// A feature string counts whether the wallet uses the singular or plural
/// spelling, e.g. `solana:signAndSendTransaction(s)`.
fn has_feature(features: &[String], feature: &str) -> bool {
    features.iter().any(|f| {
        let f = f.trim();
        f.eq_ignore_ascii_case(feature)
            || f.strip_suffix('s')
                .is_some_and(|singular| singular.eq_ignore_ascii_case(feature))
    })
}

/// Fold a raw report onto the baseline. Explicit booleans and feature
/// strings are both sources: either one present means supported. With
/// neither, the baseline applies, even when other features are listed.
pub fn normalize(raw: Option<RawCapabilities>) -> CapabilityReport {
    let baseline = default_capabilities();
    let Some(raw) = raw else {
        return baseline;
    };

    let features = raw.features;
    let resolve = |explicit: Option<bool>, feature: &str, fallback: bool| -> bool {
        let advertised = has_feature(&features, feature);
        match explicit {
            Some(flag) => flag || advertised,
            None if advertised => true,
            None => fallback,
        }
    };

    let supports_sign_and_send_transactions = resolve(
        raw.supports_sign_and_send_transactions,
        FEATURE_SIGN_AND_SEND,
        baseline.supports_sign_and_send_transactions,
    );
    let supports_sign_transactions = resolve(
        raw.supports_sign_transactions,
        FEATURE_SIGN_TRANSACTIONS,
        baseline.supports_sign_transactions,
    );
    let supports_sign_messages = resolve(
        raw.supports_sign_messages,
        FEATURE_SIGN_MESSAGES,
        baseline.supports_sign_messages,
    );
    let supports_clone_authorization = resolve(
        raw.supports_clone_authorization,
        FEATURE_CLONE_AUTHORIZATION,
        baseline.supports_clone_authorization,
    );

    CapabilityReport {
        supports_sign_and_send_transactions,
        supports_sign_transactions,
        supports_sign_messages,
        supports_clone_authorization,
        max_transactions_per_request: raw.max_transactions_per_request,
        max_messages_per_request: raw.max_messages_per_request,
        supported_transaction_versions: if raw.supported_transaction_versions.is_empty() {
            baseline.supported_transaction_versions
        } else {
            raw.supported_transaction_versions
        },
        feature_flags: features,
    }
}

/// Query the wallet for its capabilities. Never fails.
pub async fn probe(session: &mut dyn WalletSession) -> CapabilityReport {
    match session.get_capabilities().await {
        Ok(raw) => normalize(raw),
        Err(e) => {
            warn!(error = %e, "Capability probe failed, using defaults");
            default_capabilities()
        }
    }
}
