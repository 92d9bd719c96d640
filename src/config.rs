// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! by the session core. Configuration is loaded from the environment once
//! by the host and passed to [`crate::session::SessionManager`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SOLANA_CLUSTER` | `mainnet`, `devnet` or `testnet` | `devnet` |
//! | `SOLANA_RPC_URL` | RPC endpoint override | cluster default |
//! | `APP_IDENTITY_NAME` | App name shown by the wallet | `Relational Wallet` |
//! | `APP_IDENTITY_URI` | App URI asserted to the wallet | `https://relational.network` |
//! | `APP_IDENTITY_ICON` | Icon path relative to the URI | `favicon.ico` |
//! | `AUDIT_API_BASE_URL` | Audit backend base URL | unset (no HTTP sink) |
//! | `AUDIT_API_TOKEN` | Bearer token for the audit backend | unset |
//! | `AUDIT_JOURNAL_DIR` | Directory for the local JSONL audit journal | unset (no journal) |
//! | `CONFIRMATION_TIMEOUT_SECS` | Max wait for confirmation after a send | `30` |
//! | `MAX_SEND_SOL` | Hard ceiling for a single transfer | `1000000` |
//! | `BALANCE_HISTORY_LIMIT` | Historical balance points kept per address | `500` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,relational_wallet_session=debug` |

use std::{env, path::PathBuf, time::Duration};

use url::Url;

use crate::blockchain::{resolve_cluster, ClusterConfig, SOLANA_DEVNET};
use crate::telemetry::LogFormat;
use crate::wallet::AppIdentity;

pub const SOLANA_CLUSTER_ENV: &str = "SOLANA_CLUSTER";
pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";
pub const APP_IDENTITY_NAME_ENV: &str = "APP_IDENTITY_NAME";
pub const APP_IDENTITY_URI_ENV: &str = "APP_IDENTITY_URI";
pub const APP_IDENTITY_ICON_ENV: &str = "APP_IDENTITY_ICON";
pub const AUDIT_API_BASE_URL_ENV: &str = "AUDIT_API_BASE_URL";
pub const AUDIT_API_TOKEN_ENV: &str = "AUDIT_API_TOKEN";
pub const AUDIT_JOURNAL_DIR_ENV: &str = "AUDIT_JOURNAL_DIR";

/// Bounds the confirmation wait inside `send_native`. The signature is
/// returned either way; callers poll for finality themselves.
pub const CONFIRMATION_TIMEOUT_SECS_ENV: &str = "CONFIRMATION_TIMEOUT_SECS";
pub const MAX_SEND_SOL_ENV: &str = "MAX_SEND_SOL";
pub const BALANCE_HISTORY_LIMIT_ENV: &str = "BALANCE_HISTORY_LIMIT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_APP_NAME: &str = "Relational Wallet";
const DEFAULT_APP_URI: &str = "https://relational.network";
const DEFAULT_APP_ICON: &str = "favicon.ico";
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_SEND_SOL: f64 = 1_000_000.0;
const DEFAULT_BALANCE_HISTORY_LIMIT: usize = 500;

/// Session core configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cluster: ClusterConfig,
    pub rpc_url: Option<String>,
    pub identity: AppIdentity,
    pub audit_base_url: Option<Url>,
    pub audit_token: Option<String>,
    pub audit_journal_dir: Option<PathBuf>,
    pub confirmation_timeout: Duration,
    pub max_send_sol: f64,
    pub balance_history_limit: usize,
    pub log_format: LogFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cluster: SOLANA_DEVNET,
            rpc_url: None,
            identity: AppIdentity {
                name: DEFAULT_APP_NAME.to_string(),
                uri: DEFAULT_APP_URI.to_string(),
                icon: DEFAULT_APP_ICON.to_string(),
            },
            audit_base_url: None,
            audit_token: None,
            audit_journal_dir: None,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            max_send_sol: DEFAULT_MAX_SEND_SOL,
            balance_history_limit: DEFAULT_BALANCE_HISTORY_LIMIT,
            log_format: LogFormat::Pretty,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let cluster = match var(SOLANA_CLUSTER_ENV) {
            Some(raw) => resolve_cluster(&raw).map_err(ConfigError::UnsupportedCluster)?,
            None => defaults.cluster,
        };

        let rpc_url = var(SOLANA_RPC_URL_ENV)
            .map(|raw| parse_url(SOLANA_RPC_URL_ENV, &raw).map(String::from))
            .transpose()?;

        let identity = AppIdentity {
            name: var(APP_IDENTITY_NAME_ENV).unwrap_or(defaults.identity.name),
            uri: match var(APP_IDENTITY_URI_ENV) {
                Some(raw) => parse_url(APP_IDENTITY_URI_ENV, &raw)?.to_string(),
                None => defaults.identity.uri,
            },
            icon: var(APP_IDENTITY_ICON_ENV).unwrap_or(defaults.identity.icon),
        };

        let audit_base_url = var(AUDIT_API_BASE_URL_ENV)
            .map(|raw| parse_url(AUDIT_API_BASE_URL_ENV, &raw))
            .transpose()?;

        let confirmation_timeout = match var(CONFIRMATION_TIMEOUT_SECS_ENV) {
            Some(raw) => Duration::from_secs(parse_number(CONFIRMATION_TIMEOUT_SECS_ENV, &raw)?),
            None => defaults.confirmation_timeout,
        };

        let max_send_sol = match var(MAX_SEND_SOL_ENV) {
            Some(raw) => {
                let value: f64 = parse_number(MAX_SEND_SOL_ENV, &raw)?;
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::Invalid {
                        name: MAX_SEND_SOL_ENV,
                        reason: "must be a positive number".to_string(),
                    });
                }
                value
            }
            None => defaults.max_send_sol,
        };

        let balance_history_limit = match var(BALANCE_HISTORY_LIMIT_ENV) {
            Some(raw) => parse_number(BALANCE_HISTORY_LIMIT_ENV, &raw)?,
            None => defaults.balance_history_limit,
        };

        let log_format = match var(LOG_FORMAT_ENV) {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                name: LOG_FORMAT_ENV,
                reason,
            })?,
            None => defaults.log_format,
        };

        Ok(Self {
            cluster,
            rpc_url,
            identity,
            audit_base_url,
            audit_token: var(AUDIT_API_TOKEN_ENV),
            audit_journal_dir: var(AUDIT_JOURNAL_DIR_ENV).map(PathBuf::from),
            confirmation_timeout,
            max_send_sol,
            balance_history_limit,
            log_format,
        })
    }

    /// Chain identifier sent with `authorize`.
    pub fn chain(&self) -> &'static str {
        self.cluster.chain
    }
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

/// Errors raised while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0}")]
    UnsupportedCluster(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
