// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted collaborators for unit tests.
//!
//! Every mock is a cheap `Clone` handle over shared state, so a test keeps
//! one copy for scripting and assertions and hands another to the code
//! under test.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use solana_sdk::{
    commitment_config::CommitmentConfig, hash::Hash, pubkey::Pubkey, signature::Signature,
};

use crate::approval::{ApprovalError, ApprovalGate};
use crate::audit::{AuditError, AuditSink, ReauthorizationRecord, TransactionAuditEntry};
use crate::blockchain::{ChainRpc, ChainRpcError, LatestBlockhash, ParsedTokenAccount};
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::models::LinkedAccount;
use crate::oracle::{OracleError, PortfolioToken, PriceOracle, TokenBalanceSource, TokenMetadata};
use crate::session::{Collaborators, SessionManager};
use crate::wallet::{
    AppIdentity, AuthorizationResult, AuthorizeRequest, RawCapabilities, TransportError,
    WalletAdapter, WalletInfo, WalletSession, WireAccount,
};

/// `N` distinct fresh public keys.
pub fn keys<const N: usize>() -> [Pubkey; N] {
    std::array::from_fn(|_| Pubkey::new_unique())
}

/// Authorization result carrying `keys` in wire (base64) form.
pub fn authorization(keys: &[Pubkey], auth_token: &str) -> AuthorizationResult {
    AuthorizationResult {
        accounts: keys
            .iter()
            .map(|key| WireAccount {
                address: STANDARD.encode(key.to_bytes()),
                label: None,
                icon: None,
            })
            .collect(),
        auth_token: auth_token.to_string(),
    }
}

// =============================================================================
// Wallet
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletCalls {
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    /// Session lifecycle and capability queries, in call order.
    pub timeline: Vec<&'static str>,
    pub authorize: usize,
    pub reauthorize: usize,
    pub deauthorize: usize,
    pub get_capabilities: usize,
    pub sign_and_send: usize,
    pub sign_transactions: usize,
    pub reauthorized_tokens: Vec<String>,
    pub deauthorized_tokens: Vec<String>,
    pub signed_payloads: Vec<Vec<u8>>,
}

#[derive(Default)]
struct WalletScript {
    authorization: Option<AuthorizationResult>,
    open_error: Option<TransportError>,
    authorize_error: Option<TransportError>,
    reauthorize_error: Option<TransportError>,
    deauthorize_error: Option<TransportError>,
    capabilities: Option<RawCapabilities>,
    capabilities_error: Option<TransportError>,
    signing_error: Option<TransportError>,
    signature: Option<[u8; 64]>,
    calls: WalletCalls,
}

#[derive(Clone, Default)]
pub struct MockWallet {
    script: Arc<Mutex<WalletScript>>,
}

impl MockWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> WalletCalls {
        self.script.lock().unwrap().calls.clone()
    }

    /// Result of both `authorize` and `reauthorize`.
    pub fn set_authorization(&self, result: AuthorizationResult) {
        self.script.lock().unwrap().authorization = Some(result);
    }

    pub fn set_capabilities(&self, capabilities: Option<RawCapabilities>) {
        self.script.lock().unwrap().capabilities = capabilities;
    }

    pub fn set_sign_and_send_signature(&self, signature: [u8; 64]) {
        self.script.lock().unwrap().signature = Some(signature);
    }

    pub fn fail_open(&self, error: TransportError) {
        self.script.lock().unwrap().open_error = Some(error);
    }

    pub fn fail_authorize(&self, error: TransportError) {
        self.script.lock().unwrap().authorize_error = Some(error);
    }

    pub fn fail_reauthorize(&self, error: TransportError) {
        self.script.lock().unwrap().reauthorize_error = Some(error);
    }

    pub fn fail_deauthorize(&self, error: TransportError) {
        self.script.lock().unwrap().deauthorize_error = Some(error);
    }

    pub fn fail_capabilities(&self, error: TransportError) {
        self.script.lock().unwrap().capabilities_error = Some(error);
    }

    /// Applies to both signing primitives.
    pub fn fail_signing(&self, error: TransportError) {
        self.script.lock().unwrap().signing_error = Some(error);
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    fn wallet_info(&self) -> WalletInfo {
        WalletInfo {
            app_id: "app.mock.wallet".to_string(),
            name: "Mock Wallet".to_string(),
            icon: None,
        }
    }

    async fn open_session(&self) -> Result<Box<dyn WalletSession>, TransportError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.open_error.clone() {
            return Err(error);
        }
        script.calls.sessions_opened += 1;
        script.calls.timeline.push("open");
        Ok(Box::new(MockSession {
            script: Arc::clone(&self.script),
        }))
    }
}

struct MockSession {
    script: Arc<Mutex<WalletScript>>,
}

impl MockSession {
    fn authorization(script: &WalletScript) -> Result<AuthorizationResult, TransportError> {
        script
            .authorization
            .clone()
            .ok_or_else(|| TransportError::unclassified("no authorization scripted"))
    }
}

#[async_trait]
impl WalletSession for MockSession {
    async fn authorize(
        &mut self,
        _request: AuthorizeRequest,
    ) -> Result<AuthorizationResult, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.authorize += 1;
        if let Some(error) = script.authorize_error.clone() {
            return Err(error);
        }
        Self::authorization(&script)
    }

    async fn reauthorize(
        &mut self,
        _identity: &AppIdentity,
        auth_token: &str,
    ) -> Result<AuthorizationResult, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.reauthorize += 1;
        script.calls.reauthorized_tokens.push(auth_token.to_string());
        if let Some(error) = script.reauthorize_error.clone() {
            return Err(error);
        }
        Self::authorization(&script)
    }

    async fn deauthorize(&mut self, auth_token: &str) -> Result<(), TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.deauthorize += 1;
        script.calls.deauthorized_tokens.push(auth_token.to_string());
        match script.deauthorize_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn get_capabilities(&mut self) -> Result<Option<RawCapabilities>, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.get_capabilities += 1;
        script.calls.timeline.push("capabilities");
        match script.capabilities_error.clone() {
            Some(error) => Err(error),
            None => Ok(script.capabilities.clone()),
        }
    }

    async fn sign_and_send_transactions(
        &mut self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.sign_and_send += 1;
        if let Some(error) = script.signing_error.clone() {
            return Err(error);
        }
        let signature = script.signature.unwrap_or([1u8; 64]);
        script.calls.signed_payloads.extend(transactions.iter().cloned());
        Ok(transactions.iter().map(|_| signature.to_vec()).collect())
    }

    async fn sign_transactions(
        &mut self,
        transactions: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, TransportError> {
        let mut script = self.script.lock().unwrap();
        script.calls.sign_transactions += 1;
        if let Some(error) = script.signing_error.clone() {
            return Err(error);
        }
        script.calls.signed_payloads.extend(transactions.iter().cloned());
        Ok(transactions)
    }

    fn close(&mut self) {
        let mut script = self.script.lock().unwrap();
        script.calls.sessions_closed += 1;
        script.calls.timeline.push("close");
    }
}

// =============================================================================
// Chain RPC
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RpcCalls {
    pub latest_blockhash: usize,
    pub send_raw: usize,
    pub confirm: usize,
    pub get_balance: usize,
    pub token_accounts: usize,
}

#[derive(Default)]
struct RpcScript {
    balances: HashMap<String, u64>,
    balance_error: Option<String>,
    token_accounts: Vec<ParsedTokenAccount>,
    token_accounts_error: Option<String>,
    blockhash_error: Option<String>,
    broadcast_error: Option<String>,
    broadcast_signature: Option<Signature>,
    stall_confirmation: bool,
    sent: Vec<Vec<u8>>,
    calls: RpcCalls,
}

#[derive(Clone, Default)]
pub struct MockRpc {
    script: Arc<Mutex<RpcScript>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> RpcCalls {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn sent_payloads(&self) -> Vec<Vec<u8>> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn set_balance(&self, address: &str, lamports: u64) {
        self.script
            .lock()
            .unwrap()
            .balances
            .insert(address.to_string(), lamports);
    }

    pub fn fail_balance(&self, message: &str) {
        self.script.lock().unwrap().balance_error = Some(message.to_string());
    }

    pub fn set_token_accounts(&self, accounts: Vec<ParsedTokenAccount>) {
        self.script.lock().unwrap().token_accounts = accounts;
    }

    pub fn fail_token_accounts(&self, message: &str) {
        self.script.lock().unwrap().token_accounts_error = Some(message.to_string());
    }

    pub fn fail_blockhash(&self, message: &str) {
        self.script.lock().unwrap().blockhash_error = Some(message.to_string());
    }

    pub fn fail_broadcast(&self, message: &str) {
        self.script.lock().unwrap().broadcast_error = Some(message.to_string());
    }

    pub fn set_broadcast_signature(&self, signature: Signature) {
        self.script.lock().unwrap().broadcast_signature = Some(signature);
    }

    /// Confirmation never resolves.
    pub fn stall_confirmation(&self) {
        self.script.lock().unwrap().stall_confirmation = true;
    }
}

#[async_trait]
impl ChainRpc for MockRpc {
    async fn get_latest_blockhash(&self) -> Result<LatestBlockhash, ChainRpcError> {
        let mut script = self.script.lock().unwrap();
        script.calls.latest_blockhash += 1;
        match script.blockhash_error.clone() {
            Some(message) => Err(ChainRpcError::RpcError(message)),
            None => Ok(LatestBlockhash {
                blockhash: Hash::new_unique(),
                last_valid_block_height: 1_000,
            }),
        }
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<Signature, ChainRpcError> {
        let mut script = self.script.lock().unwrap();
        script.calls.send_raw += 1;
        if let Some(message) = script.broadcast_error.clone() {
            return Err(ChainRpcError::RpcError(message));
        }
        script.sent.push(bytes.to_vec());
        Ok(script
            .broadcast_signature
            .unwrap_or_else(|| Signature::from([2u8; 64])))
    }

    async fn confirm_transaction(
        &self,
        _signature: &Signature,
        _blockhash: &Hash,
        _last_valid_block_height: u64,
        _commitment: CommitmentConfig,
    ) -> Result<(), ChainRpcError> {
        let stall = {
            let mut script = self.script.lock().unwrap();
            script.calls.confirm += 1;
            script.stall_confirmation
        };
        if stall {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ChainRpcError> {
        let mut script = self.script.lock().unwrap();
        script.calls.get_balance += 1;
        match script.balance_error.clone() {
            Some(message) => Err(ChainRpcError::RpcError(message)),
            None => Ok(script
                .balances
                .get(&address.to_string())
                .copied()
                .unwrap_or(0)),
        }
    }

    async fn get_parsed_token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
    ) -> Result<Vec<ParsedTokenAccount>, ChainRpcError> {
        let mut script = self.script.lock().unwrap();
        script.calls.token_accounts += 1;
        match script.token_accounts_error.clone() {
            Some(message) => Err(ChainRpcError::RpcError(message)),
            None => Ok(script.token_accounts.clone()),
        }
    }
}

// =============================================================================
// Oracle and token source
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleCalls {
    pub native_price: usize,
    pub token_prices: usize,
    pub metadata_lookups: usize,
}

struct OracleScript {
    native_price: Result<f64, OracleError>,
    token_prices: HashMap<String, f64>,
    token_prices_error: Option<OracleError>,
    metadata: HashMap<String, TokenMetadata>,
    calls: OracleCalls,
}

#[derive(Clone)]
pub struct MockOracle {
    script: Arc<Mutex<OracleScript>>,
}

impl MockOracle {
    pub fn new(native_price: f64) -> Self {
        Self {
            script: Arc::new(Mutex::new(OracleScript {
                native_price: Ok(native_price),
                token_prices: HashMap::new(),
                token_prices_error: None,
                metadata: HashMap::new(),
                calls: OracleCalls::default(),
            })),
        }
    }

    pub fn calls(&self) -> OracleCalls {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn set_token_price(&self, mint: &str, price: f64) {
        self.script
            .lock()
            .unwrap()
            .token_prices
            .insert(mint.to_string(), price);
    }

    pub fn set_metadata(&self, mint: &str, symbol: &str, name: &str) {
        self.script.lock().unwrap().metadata.insert(
            mint.to_string(),
            TokenMetadata {
                symbol: symbol.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn fail_native_price(&self) {
        self.script.lock().unwrap().native_price =
            Err(OracleError::Unavailable("price feed down".to_string()));
    }

    pub fn fail_token_prices(&self) {
        self.script.lock().unwrap().token_prices_error =
            Some(OracleError::Unavailable("price feed down".to_string()));
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn native_price_usd(&self) -> Result<f64, OracleError> {
        let mut script = self.script.lock().unwrap();
        script.calls.native_price += 1;
        script.native_price.clone()
    }

    async fn token_prices_usd(
        &self,
        mints: &[String],
    ) -> Result<HashMap<String, f64>, OracleError> {
        let mut script = self.script.lock().unwrap();
        script.calls.token_prices += 1;
        if let Some(error) = script.token_prices_error.clone() {
            return Err(error);
        }
        Ok(mints
            .iter()
            .filter_map(|mint| script.token_prices.get(mint).map(|p| (mint.clone(), *p)))
            .collect())
    }

    async fn metadata_for_wallet(
        &self,
        _address: &str,
        mints: &[String],
    ) -> Result<HashMap<String, TokenMetadata>, OracleError> {
        let mut script = self.script.lock().unwrap();
        script.calls.metadata_lookups += 1;
        Ok(mints
            .iter()
            .filter_map(|mint| script.metadata.get(mint).map(|m| (mint.clone(), m.clone())))
            .collect())
    }
}

#[derive(Clone)]
pub struct MockTokenSource {
    tokens: Arc<Mutex<Result<Vec<PortfolioToken>, OracleError>>>,
}

impl MockTokenSource {
    pub fn new(tokens: Vec<PortfolioToken>) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(Ok(tokens))),
        }
    }

    pub fn fail(&self) {
        *self.tokens.lock().unwrap() = Err(OracleError::Unavailable("indexer down".to_string()));
    }
}

#[async_trait]
impl TokenBalanceSource for MockTokenSource {
    async fn tokens_for_wallet(&self, _address: &str) -> Result<Vec<PortfolioToken>, OracleError> {
        self.tokens.lock().unwrap().clone()
    }
}

// =============================================================================
// Approval, audit, clock
// =============================================================================

#[derive(Clone, Default)]
pub struct MockApproval {
    rejected: Arc<Mutex<bool>>,
    calls: Arc<Mutex<usize>>,
}

impl MockApproval {
    pub fn reject(&self) {
        *self.rejected.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ApprovalGate for MockApproval {
    async fn require_approval(&self, _reason: &str) -> Result<(), ApprovalError> {
        *self.calls.lock().unwrap() += 1;
        if *self.rejected.lock().unwrap() {
            Err(ApprovalError::Rejected("biometric check failed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
struct AuditLog {
    reauthorizations: Vec<ReauthorizationRecord>,
    transactions: Vec<TransactionAuditEntry>,
    error: Option<AuditError>,
}

#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    log: Arc<Mutex<AuditLog>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reauthorizations(&self) -> Vec<ReauthorizationRecord> {
        self.log.lock().unwrap().reauthorizations.clone()
    }

    pub fn transactions(&self) -> Vec<TransactionAuditEntry> {
        self.log.lock().unwrap().transactions.clone()
    }

    /// Every write fails with `error` and is not stored.
    pub fn fail_with(&self, error: AuditError) {
        self.log.lock().unwrap().error = Some(error);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record_reauthorization(
        &self,
        record: &ReauthorizationRecord,
    ) -> Result<(), AuditError> {
        let mut log = self.log.lock().unwrap();
        if let Some(error) = log.error.clone() {
            return Err(error);
        }
        log.reauthorizations.push(record.clone());
        Ok(())
    }

    async fn record_transaction(&self, entry: &TransactionAuditEntry) -> Result<(), AuditError> {
        let mut log = self.log.lock().unwrap();
        if let Some(error) = log.error.clone() {
            return Err(error);
        }
        log.transactions.push(entry.clone());
        Ok(())
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// =============================================================================
// Harness
// =============================================================================

/// A manager wired to fresh mocks.
pub struct Harness {
    pub wallet: MockWallet,
    pub rpc: MockRpc,
    pub oracle: MockOracle,
    pub approval: MockApproval,
    pub audit: MemoryAuditSink,
    pub config: SessionConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            wallet: MockWallet::new(),
            rpc: MockRpc::new(),
            oracle: MockOracle::new(100.0),
            approval: MockApproval::default(),
            audit: MemoryAuditSink::new(),
            config: SessionConfig::default(),
        }
    }

    pub fn manager(&self) -> SessionManager {
        SessionManager::new(
            self.config.clone(),
            Collaborators {
                wallet: Arc::new(self.wallet.clone()),
                rpc: Arc::new(self.rpc.clone()),
                oracle: Arc::new(self.oracle.clone()),
                token_source: None,
                approval: Arc::new(self.approval.clone()),
                audit: Arc::new(self.audit.clone()),
                clock: Arc::new(FixedClock::default()),
            },
        )
    }

    /// Script an authorization for `keys` and run connect end to end.
    pub async fn connect(
        &self,
        manager: &SessionManager,
        keys: &[Pubkey],
        auth_token: &str,
    ) -> Vec<LinkedAccount> {
        self.wallet.set_authorization(authorization(keys, auth_token));
        let preview = manager.start_authorization().await.unwrap();
        manager.finalize_authorization(preview, None).await.unwrap()
    }
}
