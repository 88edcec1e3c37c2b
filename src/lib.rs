//! Client library for an on-chain comment wall.
//!
//! Comments live in a contract on PlatON. This crate reads them through an
//! injected EIP-1193 wallet, submits posts, likes and tips as transactions, and
//! keeps the display state a front-end renders from.
//!
//! Layers, bottom up:
//! - [`provider`]: the wallet seen as a trait
//! - [`gateway`]: typed contract reads and confirmed writes
//! - [`repository`]: the authoritative comment list
//! - [`writes`]: post, like and tip, each guarded against double submission
//! - [`view`]: sort order, tip panels and copy feedback
//! - [`board`]: everything wired together, reporting outcomes as notices
//!
//! Enable the `logging` feature for a ready-made `tracing` subscriber.

pub mod board;
pub mod config;
pub mod contract;
pub mod error;
pub mod gateway;
#[cfg(feature = "logging")]
pub mod logging;
pub mod provider;
pub mod repository;
pub mod units;
pub mod view;
pub mod writes;

#[cfg(test)]
mod mock;

pub use board::{CommentBoard, Notice, NoticeLevel};
pub use config::{TipToken, WallConfig};
pub use error::WallError;
pub use gateway::ChainGateway;
pub use provider::{WalletEvent, WalletProvider};
pub use repository::{Comment, CommentRepository};
pub use view::ViewState;
pub use writes::{TipIntent, WriteOperations};
