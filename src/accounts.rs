// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Linked-account normalization and merging.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use solana_sdk::pubkey::Pubkey;

use crate::error::SessionError;
use crate::models::{CapabilityReport, LinkedAccount};
use crate::wallet::{AuthorizationResult, WalletInfo};

/// Decode a wire-format account address into base58.
///
/// Wallets send base64 of the 32 key bytes; some older wallets send base58
/// directly, which is accepted as-is after validation.
pub fn decode_wire_address(raw: &str) -> Result<String, SessionError> {
    let raw = raw.trim();
    if let Ok(bytes) = STANDARD.decode(raw) {
        if let Ok(key) = <[u8; 32]>::try_from(bytes.as_slice()) {
            return Ok(Pubkey::new_from_array(key).to_string());
        }
    }
    Pubkey::from_str(raw)
        .map(|key| key.to_string())
        .map_err(|_| SessionError::invalid_input(format!("Malformed wallet address `{raw}`")))
}

/// Parse a base58 public key, rejecting malformed input as `InvalidInput`.
pub fn parse_address(address: &str) -> Result<Pubkey, SessionError> {
    Pubkey::from_str(address.trim())
        .map_err(|_| SessionError::invalid_input(format!("Malformed address `{address}`")))
}

/// Merge a freshly authorized account into its existing record.
///
/// Precedence:
/// - `address`, `linked_at`: existing (stable identity)
/// - `auth_token`, `wallet_app_id`, `wallet_name`, `authorized_at`: incoming
/// - `label`, `icon`, `capabilities`: incoming when present, else existing
pub fn merge_account(existing: &LinkedAccount, incoming: LinkedAccount) -> LinkedAccount {
    LinkedAccount {
        address: existing.address.clone(),
        label: incoming.label.or_else(|| existing.label.clone()),
        auth_token: incoming.auth_token,
        wallet_app_id: incoming.wallet_app_id,
        wallet_name: incoming.wallet_name,
        icon: incoming.icon.or_else(|| existing.icon.clone()),
        capabilities: incoming
            .capabilities
            .or_else(|| existing.capabilities.clone()),
        linked_at: existing.linked_at,
        authorized_at: incoming.authorized_at,
    }
}

/// Build linked accounts from an authorization result. Duplicate addresses
/// collapse onto their first occurrence.
pub fn accounts_from_authorization(
    result: &AuthorizationResult,
    wallet: &WalletInfo,
    capabilities: &CapabilityReport,
    now: DateTime<Utc>,
) -> Result<Vec<LinkedAccount>, SessionError> {
    let mut accounts: Vec<LinkedAccount> = Vec::with_capacity(result.accounts.len());
    for wire in &result.accounts {
        let address = decode_wire_address(&wire.address)?;
        if accounts.iter().any(|a| a.address == address) {
            continue;
        }
        accounts.push(LinkedAccount {
            address,
            label: wire.label.clone(),
            auth_token: result.auth_token.clone(),
            wallet_app_id: wallet.app_id.clone(),
            wallet_name: wallet.name.clone(),
            icon: wire.icon.clone().or_else(|| wallet.icon.clone()),
            capabilities: Some(capabilities.clone()),
            linked_at: now,
            authorized_at: now,
        });
    }
    Ok(accounts)
}

/// Short, non-reversible hint of an auth token for logs and audit records.
pub fn auth_token_hint(token: &str) -> String {
    let prefix: String = token.chars().take(6).collect();
    format!("{prefix}…")
}
