// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Balance reconciliation
//!
//! Refreshes the native balance of a linked account and values it, together
//! with its SPL token holdings, in USD.
//!
//! ## Sources
//!
//! - Native lamports come from `getBalance` and are authoritative. A failed
//!   fetch evicts the cached snapshot for the address.
//! - Token holdings come from jsonParsed token accounts, optionally enriched
//!   by a [`TokenBalanceSource`]. Entries from that source labelled SOL or
//!   WSOL are dropped so native value is counted once.
//! - Prices and metadata come from the [`PriceOracle`]. Metadata is cached
//!   per mint in [`MetadataCache`].
//!
//! If token aggregation fails the snapshot degrades to native value only.

pub mod metadata_cache;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::accounts::parse_address;
use crate::blockchain::{lamports_to_sol, ChainRpc, WRAPPED_SOL_MINT};
use crate::clock::Clock;
use crate::error::SessionError;
use crate::models::{TokenHolding, WalletBalance};
use crate::oracle::{OracleError, PortfolioToken, PriceOracle, TokenBalanceSource};
use crate::state::SessionState;

pub use metadata_cache::MetadataCache;

/// Whether a secondary-source entry stands for native or wrapped SOL.
pub fn is_native_sol_entry(token: &PortfolioToken) -> bool {
    if token.mint == WRAPPED_SOL_MINT.to_string() {
        return true;
    }
    token
        .symbol
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("SOL") || s.eq_ignore_ascii_case("WSOL"))
        .unwrap_or(false)
}

/// A token holding before pricing.
#[derive(Debug, Clone)]
struct TokenCandidate {
    mint: String,
    balance: f64,
    decimals: u8,
    symbol: Option<String>,
    name: Option<String>,
    /// USD value reported by the secondary source, used when unpriced.
    fallback_usd: f64,
}

pub struct BalanceReconciler {
    state: SessionState,
    rpc: Arc<dyn ChainRpc>,
    oracle: Arc<dyn PriceOracle>,
    token_source: Option<Arc<dyn TokenBalanceSource>>,
    clock: Arc<dyn Clock>,
    metadata: MetadataCache,
    history_limit: usize,
}

impl BalanceReconciler {
    pub fn new(
        state: SessionState,
        rpc: Arc<dyn ChainRpc>,
        oracle: Arc<dyn PriceOracle>,
        token_source: Option<Arc<dyn TokenBalanceSource>>,
        clock: Arc<dyn Clock>,
        history_limit: usize,
    ) -> Self {
        Self {
            state,
            rpc,
            oracle,
            token_source,
            clock,
            metadata: MetadataCache::default(),
            history_limit,
        }
    }

    /// Refresh one address and return its raw lamport balance.
    pub async fn refresh(&self, address: &str) -> Result<u64, SessionError> {
        let owner = parse_address(address)?;

        let lamports = match self.rpc.get_balance(&owner).await {
            Ok(lamports) => lamports,
            Err(e) => {
                warn!(address = %address, error = %e, "Balance fetch failed, evicting cached balance");
                self.state.store.write().await.evict_balance(address);
                return Err(SessionError::RpcFailed(e.to_string()));
            }
        };

        let native = lamports_to_sol(lamports);
        let (price, tokens) = tokio::join!(
            self.oracle.native_price_usd(),
            self.collect_tokens(address, &owner)
        );

        let native_price = match price {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(address = %address, error = %e, "Native price unavailable");
                None
            }
        };

        let balance = match tokens {
            Ok(candidates) => match self.value_tokens(address, candidates, native_price).await {
                Ok((holdings, missing)) => self.snapshot(native, native_price, holdings, missing),
                Err(e) => {
                    warn!(address = %address, error = %e, "Token valuation failed, using native value only");
                    self.snapshot(native, native_price, Vec::new(), Vec::new())
                }
            },
            Err(e) => {
                warn!(address = %address, error = %e, "Token aggregation failed, using native value only");
                self.snapshot(native, native_price, Vec::new(), Vec::new())
            }
        };

        let stored = self.state.store.write().await.record_balance(
            address,
            lamports,
            balance,
            self.history_limit,
        );
        if !stored {
            debug!(address = %address, "Account unlinked during refresh, snapshot dropped");
        }

        Ok(lamports)
    }

    /// Refresh every address concurrently.
    pub async fn refresh_many(
        &self,
        addresses: Vec<String>,
    ) -> Vec<(String, Result<u64, SessionError>)> {
        let refreshes = addresses.iter().map(|address| self.refresh(address));
        let results = join_all(refreshes).await;
        addresses.into_iter().zip(results).collect()
    }

    fn snapshot(
        &self,
        native: f64,
        native_price: Option<f64>,
        tokens: Vec<TokenHolding>,
        missing_prices: Vec<String>,
    ) -> WalletBalance {
        let native_usd = native * native_price.unwrap_or(0.0);
        let token_usd: f64 = tokens.iter().map(|t| t.usd_value).sum();
        WalletBalance {
            balance: native,
            usd_value: native_usd + token_usd,
            last_updated: self.clock.now(),
            tokens,
            missing_prices,
        }
    }

    /// Gather token holdings from parsed token accounts and the optional
    /// secondary source. Fails only when the token-account RPC fails.
    async fn collect_tokens(
        &self,
        address: &str,
        owner: &Pubkey,
    ) -> Result<Vec<TokenCandidate>, SessionError> {
        let secondary = async {
            match &self.token_source {
                Some(source) => source.tokens_for_wallet(address).await,
                None => Ok(Vec::new()),
            }
        };
        let (parsed, secondary) = tokio::join!(
            self.rpc.get_parsed_token_accounts_by_owner(owner),
            secondary
        );

        let parsed = parsed.map_err(|e| SessionError::RpcFailed(e.to_string()))?;
        let secondary = secondary.unwrap_or_else(|e| {
            warn!(address = %address, error = %e, "Secondary token source failed");
            Vec::new()
        });

        let mut candidates: Vec<TokenCandidate> = parsed
            .into_iter()
            .filter(|account| account.ui_amount > 0.0)
            .map(|account| TokenCandidate {
                mint: account.mint,
                balance: account.ui_amount,
                decimals: account.decimals,
                symbol: None,
                name: None,
                fallback_usd: 0.0,
            })
            .collect();

        for token in secondary {
            if is_native_sol_entry(&token) {
                continue;
            }
            match candidates.iter_mut().find(|c| c.mint == token.mint) {
                Some(existing) => {
                    existing.symbol = existing.symbol.take().or(token.symbol);
                    existing.name = existing.name.take().or(token.name);
                    existing.fallback_usd = token.usd_value;
                }
                None if token.balance > 0.0 => candidates.push(TokenCandidate {
                    mint: token.mint,
                    balance: token.balance,
                    decimals: token.decimals,
                    symbol: token.symbol,
                    name: token.name,
                    fallback_usd: token.usd_value,
                }),
                None => {}
            }
        }

        Ok(candidates)
    }

    /// Price candidates and resolve their metadata. Returns the holdings and
    /// the mints that had no resolvable value.
    async fn value_tokens(
        &self,
        address: &str,
        candidates: Vec<TokenCandidate>,
        native_price: Option<f64>,
    ) -> Result<(Vec<TokenHolding>, Vec<String>), OracleError> {
        if candidates.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let wsol = WRAPPED_SOL_MINT.to_string();
        let priced_mints: Vec<String> = candidates
            .iter()
            .filter(|c| c.mint != wsol)
            .map(|c| c.mint.clone())
            .collect();
        let all_mints: Vec<String> = candidates.iter().map(|c| c.mint.clone()).collect();

        let prices = async {
            if priced_mints.is_empty() {
                Ok(HashMap::new())
            } else {
                self.oracle.token_prices_usd(&priced_mints).await
            }
        };
        let (prices, metadata) = tokio::join!(prices, self.metadata_for(address, &all_mints));
        let prices = prices?;

        let mut holdings = Vec::with_capacity(candidates.len());
        let mut missing = Vec::new();
        for candidate in candidates {
            let price = if candidate.mint == wsol {
                native_price
            } else {
                prices.get(&candidate.mint).copied()
            };

            let usd_value = match price {
                Some(price) => candidate.balance * price,
                None if candidate.fallback_usd > 0.0 => candidate.fallback_usd,
                None => {
                    warn!(address = %address, mint = %candidate.mint, "No price for token");
                    missing.push(candidate.mint.clone());
                    0.0
                }
            };

            let (symbol, name) = display_names(&candidate, metadata.get(&candidate.mint), &wsol);
            holdings.push(TokenHolding {
                mint: candidate.mint,
                symbol,
                name,
                balance: candidate.balance,
                usd_value,
                decimals: candidate.decimals,
            });
        }

        Ok((holdings, missing))
    }

    /// Cached metadata lookup. Oracle failures degrade to whatever is cached.
    async fn metadata_for(
        &self,
        address: &str,
        mints: &[String],
    ) -> HashMap<String, crate::oracle::TokenMetadata> {
        let (mut known, misses) = self.metadata.partition(mints);
        if misses.is_empty() {
            return known;
        }

        match self.oracle.metadata_for_wallet(address, &misses).await {
            Ok(fetched) => {
                self.metadata.put_all(&fetched);
                known.extend(fetched);
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Token metadata lookup failed");
            }
        }
        known
    }
}

fn display_names(
    candidate: &TokenCandidate,
    metadata: Option<&crate::oracle::TokenMetadata>,
    wsol: &str,
) -> (String, String) {
    if let Some(meta) = metadata {
        return (meta.symbol.clone(), meta.name.clone());
    }
    if candidate.mint == wsol {
        return ("WSOL".to_string(), "Wrapped SOL".to_string());
    }
    let short: String = candidate.mint.chars().take(4).collect();
    let symbol = candidate.symbol.clone().unwrap_or_else(|| short.clone());
    let name = candidate.name.clone().unwrap_or(short);
    (symbol, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{ParsedTokenAccount, LAMPORTS_PER_SOL};
    use crate::models::LinkedAccount;
    use crate::store::SessionStore;
    use crate::testing::{FixedClock, MockOracle, MockRpc, MockTokenSource};
    use chrono::Utc;

    fn linked(address: &str) -> LinkedAccount {
        let now = Utc::now();
        LinkedAccount {
            address: address.to_string(),
            label: None,
            auth_token: "tok".to_string(),
            wallet_app_id: "app".to_string(),
            wallet_name: "Wallet".to_string(),
            icon: None,
            capabilities: None,
            linked_at: now,
            authorized_at: now,
        }
    }

    struct Fixture {
        state: SessionState,
        rpc: MockRpc,
        oracle: MockOracle,
        address: String,
    }

    impl Fixture {
        fn new() -> Self {
            let address = Pubkey::new_unique().to_string();
            let mut store = SessionStore::new();
            store.merge_accounts(vec![linked(&address)]);
            Self {
                state: SessionState::new(store),
                rpc: MockRpc::new(),
                oracle: MockOracle::new(100.0),
                address,
            }
        }

        fn reconciler(&self, source: Option<MockTokenSource>) -> BalanceReconciler {
            BalanceReconciler::new(
                self.state.clone(),
                Arc::new(self.rpc.clone()),
                Arc::new(self.oracle.clone()),
                source.map(|s| Arc::new(s) as Arc<dyn TokenBalanceSource>),
                Arc::new(FixedClock::default()),
                10,
            )
        }
    }

    #[tokio::test]
    async fn native_only_refresh_writes_snapshot_and_history() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, 2 * LAMPORTS_PER_SOL);

        let lamports = fx.reconciler(None).refresh(&fx.address).await.unwrap();
        assert_eq!(lamports, 2 * LAMPORTS_PER_SOL);

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        assert_eq!(balance.balance, 2.0);
        assert_eq!(balance.usd_value, 200.0);
        assert_eq!(store.native_balance(&fx.address), Some(2 * LAMPORTS_PER_SOL));
        assert_eq!(store.history(&fx.address).len(), 1);
    }

    #[tokio::test]
    async fn failed_balance_fetch_evicts_previous_snapshot() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, LAMPORTS_PER_SOL);
        let reconciler = fx.reconciler(None);
        reconciler.refresh(&fx.address).await.unwrap();

        fx.rpc.fail_balance("node is behind");
        let err = reconciler.refresh(&fx.address).await.unwrap_err();
        assert_eq!(err.error_code(), "rpc_failed");

        let store = fx.state.store.read().await;
        assert!(store.wallet_balance(&fx.address).is_none());
        assert!(store.native_balance(&fx.address).is_none());
    }

    #[tokio::test]
    async fn native_value_counted_once_with_wrapped_sol_sources() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, LAMPORTS_PER_SOL);
        let wsol = WRAPPED_SOL_MINT.to_string();
        fx.rpc.set_token_accounts(vec![ParsedTokenAccount {
            mint: wsol.clone(),
            ui_amount: 0.5,
            decimals: 9,
        }]);
        let source = MockTokenSource::new(vec![
            PortfolioToken {
                mint: "native".to_string(),
                symbol: Some("SOL".to_string()),
                name: Some("Solana".to_string()),
                balance: 1.0,
                decimals: 9,
                usd_value: 100.0,
            },
            PortfolioToken {
                mint: wsol.clone(),
                symbol: Some("WSOL".to_string()),
                name: None,
                balance: 0.5,
                decimals: 9,
                usd_value: 50.0,
            },
        ]);

        fx.reconciler(Some(source)).refresh(&fx.address).await.unwrap();

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        // 1 SOL native + 0.5 wrapped, each exactly once.
        assert_eq!(balance.usd_value, 150.0);
        assert_eq!(balance.tokens.len(), 1);
        assert_eq!(balance.tokens[0].symbol, "WSOL");
    }

    #[tokio::test]
    async fn unpriced_mint_is_flagged_unless_fallback_value_exists() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, 0);
        fx.rpc.set_token_accounts(vec![
            ParsedTokenAccount {
                mint: "MintPriced".to_string(),
                ui_amount: 2.0,
                decimals: 6,
            },
            ParsedTokenAccount {
                mint: "MintUnknown".to_string(),
                ui_amount: 3.0,
                decimals: 6,
            },
            ParsedTokenAccount {
                mint: "MintFallback".to_string(),
                ui_amount: 4.0,
                decimals: 6,
            },
        ]);
        fx.oracle.set_token_price("MintPriced", 1.5);
        fx.oracle.set_metadata("MintPriced", "PRC", "Priced");
        let source = MockTokenSource::new(vec![PortfolioToken {
            mint: "MintFallback".to_string(),
            symbol: Some("FBK".to_string()),
            name: Some("Fallback".to_string()),
            balance: 4.0,
            decimals: 6,
            usd_value: 8.0,
        }]);

        fx.reconciler(Some(source)).refresh(&fx.address).await.unwrap();

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        assert_eq!(balance.usd_value, 3.0 + 8.0);
        assert_eq!(balance.missing_prices, vec!["MintUnknown".to_string()]);

        let priced = balance.tokens.iter().find(|t| t.mint == "MintPriced").unwrap();
        assert_eq!(priced.symbol, "PRC");
        let fallback = balance.tokens.iter().find(|t| t.mint == "MintFallback").unwrap();
        assert_eq!(fallback.symbol, "FBK");
    }

    #[tokio::test]
    async fn token_failure_degrades_to_native_value() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, 3 * LAMPORTS_PER_SOL);
        fx.rpc.fail_token_accounts("token index unavailable");

        fx.reconciler(None).refresh(&fx.address).await.unwrap();

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        assert_eq!(balance.usd_value, 300.0);
        assert!(balance.tokens.is_empty());
    }

    #[tokio::test]
    async fn token_price_failure_degrades_and_secondary_failure_is_ignored() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, LAMPORTS_PER_SOL);
        fx.rpc.set_token_accounts(vec![ParsedTokenAccount {
            mint: "MintA".to_string(),
            ui_amount: 10.0,
            decimals: 6,
        }]);
        fx.oracle.fail_token_prices();
        let source = MockTokenSource::new(Vec::new());
        source.fail();

        fx.reconciler(Some(source)).refresh(&fx.address).await.unwrap();

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        assert_eq!(balance.usd_value, 100.0);
        assert!(balance.tokens.is_empty());
    }

    #[tokio::test]
    async fn missing_native_price_values_native_at_zero() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, LAMPORTS_PER_SOL);
        fx.oracle.fail_native_price();

        fx.reconciler(None).refresh(&fx.address).await.unwrap();

        let store = fx.state.store.read().await;
        let balance = store.wallet_balance(&fx.address).unwrap();
        assert_eq!(balance.balance, 1.0);
        assert_eq!(balance.usd_value, 0.0);
    }

    #[tokio::test]
    async fn metadata_is_cached_between_refreshes() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, 0);
        fx.rpc.set_token_accounts(vec![ParsedTokenAccount {
            mint: "MintA".to_string(),
            ui_amount: 1.0,
            decimals: 6,
        }]);
        fx.oracle.set_token_price("MintA", 1.0);
        fx.oracle.set_metadata("MintA", "AAA", "Token A");

        let reconciler = fx.reconciler(None);
        reconciler.refresh(&fx.address).await.unwrap();
        reconciler.refresh(&fx.address).await.unwrap();

        assert_eq!(fx.oracle.calls().metadata_lookups, 1);
    }

    #[tokio::test]
    async fn refresh_many_reports_per_address() {
        let fx = Fixture::new();
        fx.rpc.set_balance(&fx.address, 7);
        let reconciler = fx.reconciler(None);

        let results = reconciler
            .refresh_many(vec![fx.address.clone(), "not base58!".to_string()])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1, Ok(7));
        assert_eq!(results[1].1.as_ref().unwrap_err().error_code(), "invalid_input");
    }

    #[test]
    fn native_sol_entries_are_recognized() {
        let token = |mint: &str, symbol: Option<&str>| PortfolioToken {
            mint: mint.to_string(),
            symbol: symbol.map(str::to_string),
            name: None,
            balance: 1.0,
            decimals: 9,
            usd_value: 0.0,
        };
        assert!(is_native_sol_entry(&token("x", Some("sol"))));
        assert!(is_native_sol_entry(&token(&WRAPPED_SOL_MINT.to_string(), None)));
        assert!(!is_native_sol_entry(&token("x", Some("USDC"))));
    }
}
