//! An in-memory wallet plus comment wall contract for tests.

use crate::config::WallConfig;
use crate::contract::{ICommentWall, IERC20};
use crate::error::{codes, ProviderRpcError};
use crate::provider::{methods, WalletProvider};
use alloy_primitives::{hex, Address, Bytes, B256, U256};
use alloy_sol_types::{Revert, SolCall, SolError, SolInterface};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

pub const FIRST_TIMESTAMP: u64 = 1_700_000_000;

#[derive(Debug, Clone)]
pub struct StoredComment {
    pub content: String,
    pub timestamp: U256,
    pub likes: U256,
    pub author: Address,
    likers: HashSet<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

pub struct ScriptedWallet {
    authorized: Cell<bool>,
    reject_connection: Cell<bool>,
    chain: Cell<u64>,
    known_chains: RefCell<HashSet<u64>>,
    reject_switch: Cell<bool>,
    comments: RefCell<Vec<StoredComment>>,
    call_error: RefCell<Option<ProviderRpcError>>,
    send_errors: RefCell<VecDeque<ProviderRpcError>>,
    pending_polls: Cell<u32>,
    delayed_polls: Cell<u32>,
    revert_receipts: Cell<bool>,
    stalled_reads: Cell<u32>,
    requests: RefCell<Vec<(String, Value)>>,
    sent: RefCell<Vec<SentTx>>,
}

impl ScriptedWallet {
    pub fn new() -> Self {
        let config = Self::config();
        Self {
            authorized: Cell::new(false),
            reject_connection: Cell::new(false),
            chain: Cell::new(config.network.chain_id),
            known_chains: RefCell::new([1, config.network.chain_id].into_iter().collect()),
            reject_switch: Cell::new(false),
            comments: RefCell::new(Vec::new()),
            call_error: RefCell::new(None),
            send_errors: RefCell::new(VecDeque::new()),
            pending_polls: Cell::new(0),
            delayed_polls: Cell::new(0),
            revert_receipts: Cell::new(false),
            stalled_reads: Cell::new(0),
            requests: RefCell::new(Vec::new()),
            sent: RefCell::new(Vec::new()),
        }
    }

    /// Default config with a fast receipt poll.
    pub fn config() -> WallConfig {
        WallConfig {
            receipt_poll_interval_ms: 1,
            ..WallConfig::default()
        }
    }

    pub fn user() -> Address {
        Address::repeat_byte(0xaa)
    }

    pub fn authorize(&self) {
        self.authorized.set(true);
    }

    pub fn reject_connection(&self) {
        self.reject_connection.set(true);
    }

    pub fn set_chain(&self, chain_id: u64) {
        self.chain.set(chain_id);
    }

    pub fn chain(&self) -> u64 {
        self.chain.get()
    }

    pub fn forget_target_chain(&self) {
        self.known_chains
            .borrow_mut()
            .remove(&Self::config().network.chain_id);
    }

    pub fn reject_switch(&self) {
        self.reject_switch.set(true);
    }

    /// Seeds a comment as if it had been posted by `author`.
    pub fn seed(&self, content: &str, timestamp: u64, likes: u64, author: Address) {
        self.comments.borrow_mut().push(StoredComment {
            content: content.to_string(),
            timestamp: U256::from(timestamp),
            likes: U256::from(likes),
            author,
            likers: HashSet::new(),
        });
    }

    pub fn stored(&self) -> Vec<StoredComment> {
        self.comments.borrow().clone()
    }

    pub fn fail_reads(&self, err: ProviderRpcError) {
        *self.call_error.borrow_mut() = Some(err);
    }

    pub fn heal_reads(&self) {
        *self.call_error.borrow_mut() = None;
    }

    pub fn fail_next_send(&self, err: ProviderRpcError) {
        self.send_errors.borrow_mut().push_back(err);
    }

    /// Every receipt is reported as pending `polls` times before it is mined.
    pub fn delay_receipts(&self, polls: u32) {
        self.delayed_polls.set(polls);
    }

    pub fn revert_receipts(&self) {
        self.revert_receipts.set(true);
    }

    /// The next `eth_call` is answered from the current state but yields
    /// `yields` times before returning, so other tasks can run in between.
    pub fn stall_next_read(&self, yields: u32) {
        self.stalled_reads.set(yields);
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests.borrow().iter().filter(|(m, _)| m == method).count()
    }

    pub fn last_params(&self, method: &str) -> Option<Value> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
    }

    pub fn sent_transactions(&self) -> Vec<SentTx> {
        self.sent.borrow().clone()
    }

    fn accounts(&self) -> Value {
        if self.authorized.get() {
            json!([Self::user()])
        } else {
            json!([])
        }
    }

    fn read(&self, params: &Value) -> Result<Value, ProviderRpcError> {
        if let Some(err) = self.call_error.borrow().clone() {
            return Err(err);
        }
        let input = tx_input(&params[0]);
        let comments = self.comments.borrow();
        let output = match ICommentWall::ICommentWallCalls::abi_decode(&input, true) {
            Ok(ICommentWall::ICommentWallCalls::getNumberOfComments(_)) => {
                ICommentWall::getNumberOfCommentsCall::abi_encode_returns(&(U256::from(
                    comments.len(),
                ),))
            }
            Ok(ICommentWall::ICommentWallCalls::getComment(call)) => {
                let stored = comments
                    .get(call.index.to::<usize>())
                    .ok_or_else(|| revert("index out of bounds"))?;
                ICommentWall::getCommentCall::abi_encode_returns(&(
                    stored.content.clone(),
                    stored.timestamp,
                    stored.likes,
                    stored.author,
                ))
            }
            _ => return Err(ProviderRpcError::new(codes::SERVER_ERROR, "unsupported call")),
        };
        Ok(json!(format!("0x{}", hex::encode(output))))
    }

    fn send(&self, params: &Value) -> Result<Value, ProviderRpcError> {
        if let Some(err) = self.send_errors.borrow_mut().pop_front() {
            return Err(err);
        }
        let tx = &params[0];
        let sent = SentTx {
            from: serde_json::from_value(tx["from"].clone()).unwrap(),
            to: serde_json::from_value(tx["to"].clone()).unwrap(),
            value: serde_json::from_value(tx["value"].clone()).unwrap_or(U256::ZERO),
            input: tx_input(tx).into(),
        };

        if sent.to == Self::config().contract {
            self.apply(&sent)?;
        }

        self.sent.borrow_mut().push(sent);
        self.pending_polls.set(self.delayed_polls.get());
        let hash = B256::left_padding_from(&(self.sent.borrow().len() as u64).to_be_bytes());
        Ok(json!(hash))
    }

    fn apply(&self, tx: &SentTx) -> Result<(), ProviderRpcError> {
        let mut comments = self.comments.borrow_mut();
        match ICommentWall::ICommentWallCalls::abi_decode(&tx.input, true) {
            Ok(ICommentWall::ICommentWallCalls::comment(call)) => {
                let timestamp = FIRST_TIMESTAMP + comments.len() as u64;
                comments.push(StoredComment {
                    content: call.commentString,
                    timestamp: U256::from(timestamp),
                    likes: U256::ZERO,
                    author: tx.from,
                    likers: HashSet::new(),
                });
            }
            Ok(ICommentWall::ICommentWallCalls::likeComment(call)) => {
                let stored = comments
                    .get_mut(call.commentId.to::<usize>())
                    .ok_or_else(|| revert("index out of bounds"))?;
                if !stored.likers.insert(tx.from) {
                    return Err(revert("You have already liked this comment"));
                }
                stored.likes += U256::from(1);
            }
            Ok(_) => {}
            Err(_) => return Err(revert("unknown selector")),
        }
        Ok(())
    }

    fn receipt(&self, params: &Value) -> Value {
        if self.pending_polls.get() > 0 {
            self.pending_polls.set(self.pending_polls.get() - 1);
            return Value::Null;
        }
        let status = if self.revert_receipts.get() { "0x0" } else { "0x1" };
        json!({
            "transactionHash": params[0],
            "blockNumber": "0x10",
            "status": status,
        })
    }
}

/// MetaMask style wrapping of a contract revert.
pub fn revert(reason: &str) -> ProviderRpcError {
    let data = Revert {
        reason: reason.to_string(),
    }
    .abi_encode();
    ProviderRpcError::new(codes::INTERNAL_ERROR, "Internal JSON-RPC error.")
        .with_data(json!({ "code": 3, "data": format!("0x{}", hex::encode(data)) }))
}

fn tx_input(tx: &Value) -> Vec<u8> {
    let raw = tx["input"].as_str().or_else(|| tx["data"].as_str()).unwrap_or("0x");
    hex::decode(raw).unwrap()
}

/// Decodes an ERC-20 transfer out of recorded calldata.
pub fn decode_transfer(input: &[u8]) -> IERC20::transferCall {
    IERC20::transferCall::abi_decode(input, true).unwrap()
}

#[async_trait(?Send)]
impl WalletProvider for ScriptedWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderRpcError> {
        self.requests
            .borrow_mut()
            .push((method.to_string(), params.clone()));
        match method {
            methods::ETH_ACCOUNTS => Ok(self.accounts()),
            methods::ETH_REQUEST_ACCOUNTS => {
                if self.reject_connection.get() {
                    return Err(ProviderRpcError::new(
                        codes::USER_REJECTED,
                        "User rejected the request.",
                    ));
                }
                self.authorize();
                Ok(self.accounts())
            }
            methods::ETH_CHAIN_ID => Ok(json!(format!("{:#x}", self.chain.get()))),
            methods::WALLET_SWITCH_CHAIN => {
                if self.reject_switch.get() {
                    return Err(ProviderRpcError::new(
                        codes::USER_REJECTED,
                        "User rejected the request.",
                    ));
                }
                let requested = params[0]["chainId"].as_str().unwrap_or_default();
                let chain_id = u64::from_str_radix(requested.trim_start_matches("0x"), 16).unwrap();
                if !self.known_chains.borrow().contains(&chain_id) {
                    return Err(ProviderRpcError::new(
                        codes::UNRECOGNIZED_CHAIN,
                        "Unrecognized chain ID",
                    ));
                }
                self.chain.set(chain_id);
                Ok(Value::Null)
            }
            methods::WALLET_ADD_CHAIN => {
                let requested = params[0]["chainId"].as_str().unwrap_or_default();
                let chain_id = u64::from_str_radix(requested.trim_start_matches("0x"), 16).unwrap();
                self.known_chains.borrow_mut().insert(chain_id);
                Ok(Value::Null)
            }
            methods::ETH_CALL => {
                let result = self.read(&params);
                for _ in 0..self.stalled_reads.replace(0) {
                    tokio::task::yield_now().await;
                }
                result
            }
            methods::ETH_SEND_TRANSACTION => self.send(&params),
            methods::ETH_GET_TRANSACTION_RECEIPT => Ok(self.receipt(&params)),
            other => Err(ProviderRpcError::new(
                codes::UNSUPPORTED_METHOD,
                format!("{other} is not supported"),
            )),
        }
    }
}
