//! The injected wallet, seen from Rust.
//!
//! A browser wallet exposes one `request({ method, params })` entry point
//! (EIP-1193). Front-ends bind it (through `wasm-bindgen` or a native bridge) by
//! implementing [`WalletProvider`]; everything else in the crate only talks to
//! the trait.

use crate::error::ProviderRpcError;
use alloy_primitives::Address;
use async_trait::async_trait;
use serde_json::Value;

/// JSON-RPC methods consumed from the wallet.
pub mod methods {
    pub const ETH_ACCOUNTS: &str = "eth_accounts";
    pub const ETH_REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ETH_CHAIN_ID: &str = "eth_chainId";
    pub const ETH_CALL: &str = "eth_call";
    pub const ETH_SEND_TRANSACTION: &str = "eth_sendTransaction";
    pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
    pub const WALLET_SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    pub const WALLET_ADD_CHAIN: &str = "wallet_addEthereumChain";
}

/// An EIP-1193 provider. Wallet calls run on the UI thread, so futures are not
/// required to be `Send`.
#[async_trait(?Send)]
pub trait WalletProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError>;
}

#[async_trait(?Send)]
impl<P: WalletProvider + ?Sized> WalletProvider for std::rc::Rc<P> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        (**self).request(method, params).await
    }
}

/// Wallet notifications, delivered as discrete events instead of being polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    /// `accountsChanged`; an empty list means every account was disconnected.
    AccountsChanged(Vec<Address>),
    /// `chainChanged`.
    ChainChanged(u64),
    /// `disconnect`.
    Disconnected,
}
