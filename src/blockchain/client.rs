// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solana chain RPC contract and its JSON-RPC implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::TokenAccountsFilter};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
    transaction::VersionedTransaction,
};

use super::types::{ClusterConfig, LatestBlockhash, ParsedTokenAccount, TOKEN_PROGRAM_ID};

/// Interval between signature status polls while confirming.
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Chain RPC operations the session core consumes.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainRpcError>;

    /// Submit an already-signed, wire-serialized transaction.
    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainRpcError>;

    /// Resolve once `signature` reaches `commitment`, or fail once the
    /// blockhash has expired.
    async fn confirm_transaction(
        &self,
        signature: &Signature,
        blockhash: &Hash,
        last_valid_block_height: u64,
        commitment: CommitmentConfig,
    ) -> Result<(), ChainRpcError>;

    /// Native balance in lamports.
    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainRpcError>;

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<ParsedTokenAccount>, ChainRpcError>;
}

/// `ChainRpc` over a Solana JSON-RPC endpoint.
pub struct SolanaRpcClient {
    cluster: ClusterConfig,
    rpc: RpcClient,
}

impl SolanaRpcClient {
    /// Create a client for `cluster`, optionally overriding its RPC URL.
    pub fn new(cluster: ClusterConfig, rpc_url: Option<&str>) -> Result<Self, ChainRpcError> {
        let url = rpc_url.unwrap_or(cluster.rpc_url);
        url::Url::parse(url).map_err(|e| ChainRpcError::InvalidRpcUrl(e.to_string()))?;

        let rpc = RpcClient::new_with_commitment(url.to_string(), CommitmentConfig::confirmed());
        Ok(Self { cluster, rpc })
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }
}

#[async_trait]
impl ChainRpc for SolanaRpcClient {
    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainRpcError> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(self.rpc.commitment())
            .await
            .map_err(|e| ChainRpcError::RpcError(e.to_string()))?;

        Ok(LatestBlockhash {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainRpcError> {
        let transaction: VersionedTransaction = bincode::deserialize(bytes)
            .map_err(|e| ChainRpcError::Serialization(format!("Invalid signed transaction: {e}")))?;

        self.rpc
            .send_transaction(&transaction)
            .await
            .map_err(|e| ChainRpcError::TransactionFailed(e.to_string()))
    }

    async fn confirm_transaction(
        &self,
        signature: &Signature,
        _blockhash: &Hash,
        last_valid_block_height: u64,
        commitment: CommitmentConfig,
    ) -> Result<(), ChainRpcError> {
        loop {
            let statuses = self
                .rpc
                .get_signature_statuses(&[*signature])
                .await
                .map_err(|e| ChainRpcError::RpcError(e.to_string()))?;

            if let Some(Some(status)) = statuses.value.first() {
                if let Some(err) = &status.err {
                    return Err(ChainRpcError::TransactionFailed(err.to_string()));
                }
                if status.satisfies_commitment(commitment) {
                    return Ok(());
                }
            }

            let height = self
                .rpc
                .get_block_height()
                .await
                .map_err(|e| ChainRpcError::RpcError(e.to_string()))?;
            if height > last_valid_block_height {
                return Err(ChainRpcError::BlockhashExpired(last_valid_block_height));
            }

            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainRpcError> {
        self.rpc
            .get_balance(address)
            .await
            .map_err(|e| ChainRpcError::RpcError(e.to_string()))
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        owner: &Pubkey,
    ) -> Result<Vec<ParsedTokenAccount>, ChainRpcError> {
        let accounts = self
            .rpc
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::ProgramId(TOKEN_PROGRAM_ID))
            .await
            .map_err(|e| ChainRpcError::RpcError(e.to_string()))?;

        let mut parsed = Vec::with_capacity(accounts.len());
        for keyed in accounts {
            let data = serde_json::to_value(&keyed.account.data)
                .map_err(|e| ChainRpcError::Serialization(e.to_string()))?;
            match parse_token_account(&data) {
                Some(account) => parsed.push(account),
                None => tracing::warn!(
                    account = %keyed.pubkey,
                    "Skipping token account without jsonParsed data"
                ),
            }
        }
        Ok(parsed)
    }
}

/// Extract mint, UI amount and decimals from a jsonParsed token account.
fn parse_token_account(data: &Value) -> Option<ParsedTokenAccount> {
    let info = data.pointer("/parsed/info")?;
    let mint = info.get("mint")?.as_str()?.to_string();
    let token_amount = info.get("tokenAmount")?;
    let decimals = u8::try_from(token_amount.get("decimals")?.as_u64()?).ok()?;

    let ui_amount = token_amount
        .get("uiAmount")
        .and_then(Value::as_f64)
        .or_else(|| {
            token_amount
                .get("uiAmountString")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Some(ParsedTokenAccount {
        mint,
        ui_amount,
        decimals,
    })
}

/// Errors that can occur during chain RPC operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainRpcError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Blockhash expired after block height {0}")]
    BlockhashExpired(u64),
}
