// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory session store: linked accounts, primary designation and
//! balance maps.
//!
//! Every mutation replaces whole records, so concurrent writers resolve as
//! last-writer-wins without field-level interleaving.

use std::collections::{HashMap, VecDeque};

use crate::accounts::merge_account;
use crate::models::{BalancePoint, LinkedAccount, WalletBalance};

#[derive(Debug, Default)]
pub struct SessionStore {
    accounts: Vec<LinkedAccount>,
    primary: Option<String>,
    native_balances: HashMap<String, u64>,
    wallet_balances: HashMap<String, WalletBalance>,
    history: HashMap<String, VecDeque<BalancePoint>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accounts(&self) -> &[LinkedAccount] {
        &self.accounts
    }

    pub fn account(&self, address: &str) -> Option<&LinkedAccount> {
        self.accounts.iter().find(|a| a.address == address)
    }

    pub fn primary_address(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Merge incoming accounts: existing addresses are updated in place, new
    /// ones appended. Unrelated accounts are untouched. Returns the merged
    /// records in incoming order.
    pub fn merge_accounts(&mut self, incoming: Vec<LinkedAccount>) -> Vec<LinkedAccount> {
        let mut merged = Vec::with_capacity(incoming.len());
        for account in incoming {
            match self
                .accounts
                .iter_mut()
                .find(|existing| existing.address == account.address)
            {
                Some(existing) => {
                    *existing = merge_account(existing, account);
                    merged.push(existing.clone());
                }
                None => {
                    merged.push(account.clone());
                    self.accounts.push(account);
                }
            }
        }
        merged
    }

    /// Replace the auth token of one account, keeping everything else.
    pub fn retoken(&mut self, address: &str, auth_token: &str) {
        if let Some(account) = self.accounts.iter_mut().find(|a| a.address == address) {
            account.auth_token = auth_token.to_string();
        }
    }

    /// Designate `address` as primary if nothing is designated yet.
    pub fn designate_primary_if_unset(&mut self, address: &str) -> bool {
        if self.primary.is_some() || self.account(address).is_none() {
            return false;
        }
        self.primary = Some(address.to_string());
        true
    }

    /// Make a linked account the primary one.
    pub fn set_primary(&mut self, address: &str) -> bool {
        if self.account(address).is_none() {
            return false;
        }
        self.primary = Some(address.to_string());
        true
    }

    /// Whether any other linked account still holds the same auth token.
    pub fn token_shared_with_others(&self, address: &str) -> bool {
        let Some(target) = self.account(address) else {
            return false;
        };
        self.accounts
            .iter()
            .any(|a| a.address != address && a.auth_token == target.auth_token)
    }

    /// Remove an account and everything keyed by it. Promotes the next
    /// remaining account if the removed one was primary.
    pub fn remove_account(&mut self, address: &str) -> Option<LinkedAccount> {
        let index = self.accounts.iter().position(|a| a.address == address)?;
        let removed = self.accounts.remove(index);

        self.native_balances.remove(address);
        self.wallet_balances.remove(address);
        self.history.remove(address);

        if self.primary.as_deref() == Some(address) {
            self.primary = self.accounts.first().map(|a| a.address.clone());
        }
        Some(removed)
    }

    pub fn native_balance(&self, address: &str) -> Option<u64> {
        self.native_balances.get(address).copied()
    }

    pub fn native_balances(&self) -> &HashMap<String, u64> {
        &self.native_balances
    }

    pub fn wallet_balance(&self, address: &str) -> Option<&WalletBalance> {
        self.wallet_balances.get(address)
    }

    pub fn wallet_balances(&self) -> &HashMap<String, WalletBalance> {
        &self.wallet_balances
    }

    pub fn history(&self, address: &str) -> Vec<BalancePoint> {
        self.history
            .get(address)
            .map(|points| points.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Store a fresh balance snapshot and append one history point, keeping
    /// at most `history_limit` points. Ignored for addresses that are no
    /// longer linked. Returns whether the snapshot was stored.
    pub fn record_balance(
        &mut self,
        address: &str,
        lamports: u64,
        balance: WalletBalance,
        history_limit: usize,
    ) -> bool {
        if self.account(address).is_none() {
            return false;
        }

        let point = BalancePoint {
            timestamp: balance.last_updated,
            usd_value: balance.usd_value,
            native_balance: balance.balance,
        };
        let history = self.history.entry(address.to_string()).or_default();
        history.push_back(point);
        while history.len() > history_limit.max(1) {
            history.pop_front();
        }

        self.native_balances.insert(address.to_string(), lamports);
        self.wallet_balances.insert(address.to_string(), balance);
        true
    }

    /// Drop cached balances for `address` after a failed refresh.
    pub fn evict_balance(&mut self, address: &str) {
        self.native_balances.remove(address);
        self.wallet_balances.remove(address);
    }
}
