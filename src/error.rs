use crate::contract::{decode_revert_reason, revert_data};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

/// EIP-1193 and JSON-RPC error codes a wallet may hand back.
pub mod codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested account or method has not been authorized by the user.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the requested method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The provider is not connected to the requested chain.
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// `wallet_switchEthereumChain` target is unknown to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// Execution reverted (geth style).
    pub const EXECUTION_REVERTED: i64 = 3;
    /// Generic server error, also used for reverts by some nodes.
    pub const SERVER_ERROR: i64 = -32000;
    /// Internal JSON-RPC error. Injected wallets wrap contract reverts in it.
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// The raw error object thrown by an injected wallet.
///
/// It is converted into [`WallError`] by the gateway as soon as it is caught and
/// never travels further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProviderRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// What the chain said when it refused a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevertInfo {
    /// Provider error code, when the failure came back as an RPC error.
    pub code: Option<i64>,
    /// Decoded `Error(string)` reason, when the wallet forwarded revert data.
    pub reason: Option<String>,
    pub message: String,
}

impl RevertInfo {
    /// Decides whether this revert is the contract's one-like-per-account guard.
    ///
    /// The contract exposes no custom error for it, so after the decoded reason
    /// and the wallet's wrapping code the human-readable message is matched as a
    /// last resort.
    pub fn is_already_liked(&self) -> bool {
        if let Some(reason) = &self.reason {
            return already_liked_pattern().is_match(reason);
        }
        if self.code == Some(codes::INTERNAL_ERROR) {
            return true;
        }
        already_liked_pattern().is_match(&self.message)
    }
}

impl fmt::Display for RevertInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{reason}"),
            None => write!(f, "{}", self.message),
        }
    }
}

fn already_liked_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)already\s+liked").expect("static pattern"))
}

fn user_rejection_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)user (rejected|denied)").expect("static pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WallError {
    #[error("no wallet provider is available")]
    ProviderUnavailable,

    #[error("the request was rejected in the wallet")]
    UserRejected,

    #[error("switching to chain {chain_id} was rejected")]
    NetworkSwitchRejected { chain_id: u64 },

    #[error("chain {chain_id} is unknown to the wallet")]
    NetworkUnknown { chain_id: u64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("this comment has already been liked by the connected account")]
    AlreadyLiked,

    #[error("transaction reverted: {0}")]
    Reverted(RevertInfo),

    #[error("transaction failed: {0}")]
    WriteFailed(String),

    #[error("reading comments failed: {0}")]
    ReadFailed(String),

    #[error("{0} is already in progress")]
    ActionInProgress(String),
}

impl WallError {
    /// The single point where a raw wallet error becomes a [`WallError`].
    pub fn from_provider(err: ProviderRpcError) -> Self {
        match err.code {
            codes::USER_REJECTED => WallError::UserRejected,
            codes::UNAUTHORIZED | codes::DISCONNECTED | codes::CHAIN_DISCONNECTED => {
                WallError::ProviderUnavailable
            }
            _ if user_rejection_pattern().is_match(&err.message) => WallError::UserRejected,
            code => WallError::Reverted(RevertInfo {
                code: Some(code),
                reason: err
                    .data
                    .as_ref()
                    .and_then(revert_data)
                    .and_then(|bytes| decode_revert_reason(&bytes)),
                message: err.message,
            }),
        }
    }

    /// Failure classification for `likeComment`.
    pub fn into_like_failure(self) -> Self {
        match self {
            WallError::Reverted(info) if info.is_already_liked() => WallError::AlreadyLiked,
            other => other.into_write_failure(),
        }
    }

    /// Failure classification shared by every write: anything the chain refused
    /// becomes a generic `WriteFailed`.
    pub fn into_write_failure(self) -> Self {
        match self {
            WallError::Reverted(info) => WallError::WriteFailed(info.to_string()),
            other => other,
        }
    }

    /// Reads surface every chain-side failure as `ReadFailed`.
    pub fn into_read_failure(self) -> Self {
        match self {
            WallError::Reverted(info) => WallError::ReadFailed(info.to_string()),
            WallError::WriteFailed(message) => WallError::ReadFailed(message),
            other => other,
        }
    }

    /// One sentence suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            WallError::ProviderUnavailable => {
                "Please install or unlock a wallet that supports PlatON.".to_string()
            }
            WallError::UserRejected => {
                "The transaction was rejected in your wallet. You can try again.".to_string()
            }
            WallError::NetworkSwitchRejected { .. } => {
                "Please switch your wallet to the PlatON network to continue.".to_string()
            }
            WallError::NetworkUnknown { chain_id } => {
                format!("Your wallet does not know chain {chain_id}. Add it and try again.")
            }
            WallError::InvalidInput(message) => message.clone(),
            WallError::AlreadyLiked => "You have already liked this comment.".to_string(),
            WallError::Reverted(_) | WallError::WriteFailed(_) => {
                "The transaction failed. Please check your balance and network and try again."
                    .to_string()
            }
            WallError::ReadFailed(_) => {
                "Comments could not be loaded. Please check your connection.".to_string()
            }
            WallError::ActionInProgress(action) => {
                format!("Still waiting for the previous {action} to finish.")
            }
        }
    }

    /// Whether re-triggering the same action could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WallError::UserRejected
                | WallError::NetworkSwitchRejected { .. }
                | WallError::Reverted(_)
                | WallError::WriteFailed(_)
                | WallError::ReadFailed(_)
        )
    }
}
