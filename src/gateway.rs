//! Account discovery, network assertion and transaction submission on top of an
//! injected wallet.
//!
//! The gateway is constructed once per session and shared (through `Rc`) with the
//! repository and the write operations. It keeps the last known account and
//! chain, which are replaced by [`WalletEvent`]s rather than polled.

use crate::config::{NetworkConfig, WallConfig};
use crate::error::{codes, ProviderRpcError, RevertInfo, WallError};
use crate::provider::{methods, WalletEvent, WalletProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy_primitives::{hex, Address, Bytes, TxHash, TxKind, U256, U64};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A signer-bound call: where to send it, what to run and how much native value
/// to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    /// Human-readable label for logs, the Solidity signature for contract calls.
    pub label: &'static str,
}

impl CallSpec {
    pub fn contract<C: SolCall>(to: Address, call: &C) -> Self {
        Self {
            to,
            input: call.abi_encode().into(),
            value: U256::ZERO,
            label: C::SIGNATURE,
        }
    }

    /// A plain native-value transfer with no calldata.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            input: Bytes::new(),
            value,
            label: "native transfer",
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    fn into_request(self, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(self.to)),
            value: (self.value > U256::ZERO).then_some(self.value),
            input: TransactionInput::both(self.input),
            ..Default::default()
        }
    }
}

/// The slice of a transaction receipt the wall cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `0x1` on success, `0x0` when the transaction was mined but reverted.
    #[serde(default)]
    pub status: Option<U64>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |status| status != U64::ZERO)
    }
}

pub struct ChainGateway<P> {
    provider: Option<P>,
    network: NetworkConfig,
    poll_interval: Duration,
    account: RefCell<Option<Address>>,
    chain_id: Cell<Option<u64>>,
}

impl<P: WalletProvider> ChainGateway<P> {
    pub fn new(provider: P, config: &WallConfig) -> Self {
        Self::build(Some(provider), config)
    }

    /// A gateway for a page without any wallet extension. Every wallet-backed
    /// operation fails with `ProviderUnavailable`.
    pub fn detached(config: &WallConfig) -> Self {
        Self::build(None, config)
    }

    fn build(provider: Option<P>, config: &WallConfig) -> Self {
        Self {
            provider,
            network: config.network.clone(),
            poll_interval: config.receipt_poll_interval(),
            account: RefCell::new(None),
            chain_id: Cell::new(None),
        }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// The last account seen, without touching the wallet.
    pub fn current_account(&self) -> Option<Address> {
        *self.account.borrow()
    }

    /// The last chain seen, without touching the wallet.
    pub fn current_chain_id(&self) -> Option<u64> {
        self.chain_id.get()
    }

    async fn raw_request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        let Some(provider) = &self.provider else {
            return Err(ProviderRpcError::new(
                codes::DISCONNECTED,
                "no wallet provider is injected",
            ));
        };
        debug!(method, %params, "wallet request");
        let result = provider.request(method, params).await;
        if let Err(err) = &result {
            debug!(method, code = err.code, message = %err.message, "wallet request failed");
        }
        result
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, WallError> {
        if self.provider.is_none() {
            return Err(WallError::ProviderUnavailable);
        }
        self.raw_request(method, params)
            .await
            .map_err(WallError::from_provider)
    }

    fn remember_account(&self, accounts: Value) -> Result<Option<Address>, WallError> {
        let accounts: Vec<Address> = serde_json::from_value(accounts)
            .map_err(|e| WallError::ReadFailed(format!("malformed account list: {e}")))?;
        let first = accounts.first().copied();
        *self.account.borrow_mut() = first;
        Ok(first)
    }

    /// Already-authorized account, without prompting. `None` when there is no
    /// wallet, no authorization, or the wallet errors.
    pub async fn get_active_account(&self) -> Option<Address> {
        if self.provider.is_none() {
            return None;
        }
        let accounts = match self.request(methods::ETH_ACCOUNTS, json!([])).await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!(%err, "could not read authorized accounts");
                return None;
            }
        };
        self.remember_account(accounts).unwrap_or_else(|err| {
            warn!(%err, "ignoring account list");
            None
        })
    }

    /// Prompts the user to authorize an account.
    pub async fn request_connection(&self) -> Result<Address, WallError> {
        let accounts = self
            .request(methods::ETH_REQUEST_ACCOUNTS, json!([]))
            .await?;
        let account = self
            .remember_account(accounts)?
            .ok_or(WallError::UserRejected)?;
        info!(%account, "wallet connected");
        Ok(account)
    }

    /// The wallet's active chain.
    pub async fn chain_id(&self) -> Result<u64, WallError> {
        let raw = self.request(methods::ETH_CHAIN_ID, json!([])).await?;
        let chain_id = serde_json::from_value::<U64>(raw)
            .map_err(|e| WallError::ReadFailed(format!("malformed chain id: {e}")))?
            .to::<u64>();
        self.chain_id.set(Some(chain_id));
        Ok(chain_id)
    }

    /// Makes sure the wallet is on `expected_chain_id`, switching (and, for the
    /// configured network, adding) it when needed.
    pub async fn ensure_network(&self, expected_chain_id: u64) -> Result<(), WallError> {
        let current = self.chain_id().await?;
        if current == expected_chain_id {
            return Ok(());
        }
        info!(current, expected_chain_id, "switching wallet network");

        match self.switch_chain(expected_chain_id).await {
            Ok(()) => {}
            Err(err) if err.code == codes::UNRECOGNIZED_CHAIN => {
                if self.network.chain_id != expected_chain_id {
                    return Err(WallError::NetworkUnknown {
                        chain_id: expected_chain_id,
                    });
                }
                self.add_chain().await?;
                self.switch_chain(expected_chain_id)
                    .await
                    .map_err(|err| network_error(err, expected_chain_id))?;
            }
            Err(err) => return Err(network_error(err, expected_chain_id)),
        }

        self.chain_id.set(Some(expected_chain_id));
        Ok(())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderRpcError> {
        self.raw_request(
            methods::WALLET_SWITCH_CHAIN,
            json!([{ "chainId": format!("{chain_id:#x}") }]),
        )
        .await
        .map(|_| ())
    }

    async fn add_chain(&self) -> Result<(), WallError> {
        let params = self.network.add_chain_params();
        info!(chain = %params.chain_name, "asking wallet to add network");
        self.raw_request(methods::WALLET_ADD_CHAIN, json!([params]))
            .await
            .map(|_| ())
            .map_err(|err| network_error(err, self.network.chain_id))
    }

    /// The connect-button flow: authorize, move to the wall's network, then read
    /// back the account the wallet settled on.
    pub async fn connect(&self) -> Result<Address, WallError> {
        let requested = self.request_connection().await?;
        self.ensure_network(self.network.chain_id).await?;
        Ok(self.get_active_account().await.unwrap_or(requested))
    }

    pub fn handle_event(&self, event: &WalletEvent) {
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let account = accounts.first().copied();
                debug!(?account, "wallet accounts changed");
                *self.account.borrow_mut() = account;
            }
            WalletEvent::ChainChanged(chain_id) => {
                debug!(chain_id, "wallet chain changed");
                self.chain_id.set(Some(*chain_id));
            }
            WalletEvent::Disconnected => {
                debug!("wallet disconnected");
                *self.account.borrow_mut() = None;
                self.chain_id.set(None);
            }
        }
    }

    /// The account transactions and reads are bound to. Reads require one too,
    /// exactly like a signer-bound contract handle.
    pub async fn signer(&self) -> Result<Address, WallError> {
        if self.provider.is_none() {
            return Err(WallError::ProviderUnavailable);
        }
        if let Some(account) = self.current_account() {
            return Ok(account);
        }
        match self.get_active_account().await {
            Some(account) => Ok(account),
            None => self.request_connection().await,
        }
    }

    /// Runs a view function against the latest block.
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return, WallError> {
        let from = self.signer().await?;
        let request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            input: TransactionInput::both(call.abi_encode().into()),
            ..Default::default()
        };
        let raw = self
            .request(methods::ETH_CALL, json!([request, "latest"]))
            .await
            .map_err(WallError::into_read_failure)?;

        let encoded = raw
            .as_str()
            .ok_or_else(|| WallError::ReadFailed(format!("{} returned {raw}", C::SIGNATURE)))?;
        let bytes = hex::decode(encoded)
            .map_err(|e| WallError::ReadFailed(format!("{} returned bad hex: {e}", C::SIGNATURE)))?;
        if bytes.is_empty() {
            return Err(WallError::ReadFailed(format!(
                "empty result from {}",
                C::SIGNATURE
            )));
        }
        C::abi_decode_returns(&bytes, true).map_err(|e| {
            WallError::ReadFailed(format!("failed to decode {}: {e}", C::SIGNATURE))
        })
    }

    /// Hands the call to the wallet for signing and broadcasting.
    pub async fn send_transaction(&self, spec: CallSpec) -> Result<TxHash, WallError> {
        let from = self.signer().await?;
        let label = spec.label;
        let request = spec.into_request(from);
        let raw = self
            .request(methods::ETH_SEND_TRANSACTION, json!([request]))
            .await?;
        let hash: TxHash = serde_json::from_value(raw)
            .map_err(|e| WallError::WriteFailed(format!("wallet returned no hash: {e}")))?;
        info!(%hash, label, "transaction sent");
        Ok(hash)
    }

    /// Waits, without a timeout, until the transaction has one confirmation.
    pub async fn wait_for_receipt(&self, hash: TxHash) -> Result<TxReceipt, WallError> {
        loop {
            let raw = self
                .request(methods::ETH_GET_TRANSACTION_RECEIPT, json!([hash]))
                .await?;
            if !raw.is_null() {
                let receipt: TxReceipt = serde_json::from_value(raw)
                    .map_err(|e| WallError::WriteFailed(format!("malformed receipt: {e}")))?;
                if receipt.block_number.is_some() {
                    if !receipt.succeeded() {
                        warn!(%hash, "transaction mined but reverted");
                        return Err(WallError::Reverted(RevertInfo {
                            code: None,
                            reason: None,
                            message: format!("transaction {hash} reverted"),
                        }));
                    }
                    info!(%hash, block = ?receipt.block_number, "transaction confirmed");
                    return Ok(receipt);
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Send, then wait for one confirmation.
    pub async fn submit_transaction(&self, spec: CallSpec) -> Result<TxReceipt, WallError> {
        let hash = self.send_transaction(spec).await?;
        self.wait_for_receipt(hash).await
    }
}

fn network_error(err: ProviderRpcError, chain_id: u64) -> WallError {
    match err.code {
        codes::UNRECOGNIZED_CHAIN => WallError::NetworkUnknown { chain_id },
        codes::DISCONNECTED | codes::CHAIN_DISCONNECTED => WallError::ProviderUnavailable,
        _ => WallError::NetworkSwitchRejected { chain_id },
    }
}
