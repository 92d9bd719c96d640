// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use serde::{Deserialize, Serialize};
use solana_sdk::{hash::Hash, pubkey::Pubkey};

/// Solana cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain identifier sent to the wallet
    pub chain: &'static str,
    /// RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

pub const SOLANA_MAINNET: ClusterConfig = ClusterConfig {
    name: "Solana Mainnet Beta",
    chain: "solana:mainnet",
    rpc_url: "https://api.mainnet-beta.solana.com",
    explorer_url: "https://explorer.solana.com",
};

pub const SOLANA_DEVNET: ClusterConfig = ClusterConfig {
    name: "Solana Devnet",
    chain: "solana:devnet",
    rpc_url: "https://api.devnet.solana.com",
    explorer_url: "https://explorer.solana.com?cluster=devnet",
};

pub const SOLANA_TESTNET: ClusterConfig = ClusterConfig {
    name: "Solana Testnet",
    chain: "solana:testnet",
    rpc_url: "https://api.testnet.solana.com",
    explorer_url: "https://explorer.solana.com?cluster=testnet",
};

/// Resolve a cluster by short name (`mainnet`, `devnet`, `testnet`) or by
/// chain id (`solana:devnet`).
pub fn resolve_cluster(raw: &str) -> Result<ClusterConfig, String> {
    let value = raw.trim().to_ascii_lowercase();
    let value = value.strip_prefix("solana:").unwrap_or(&value);
    match value {
        "mainnet" | "mainnet-beta" => Ok(SOLANA_MAINNET),
        "devnet" => Ok(SOLANA_DEVNET),
        "testnet" => Ok(SOLANA_TESTNET),
        other => Err(format!("Unsupported Solana cluster `{other}`")),
    }
}

/// Lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Decimals of the native asset.
pub const NATIVE_DECIMALS: u8 = 9;

/// Mint of wrapped SOL.
pub const WRAPPED_SOL_MINT: Pubkey = solana_sdk::pubkey!("So11111111111111111111111111111111111111112");

/// SPL Token program.
pub const TOKEN_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

/// Latest blockhash together with the height after which it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// SPL token account, flattened from the jsonParsed RPC encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTokenAccount {
    pub mint: String,
    pub ui_amount: f64,
    pub decimals: u8,
}
