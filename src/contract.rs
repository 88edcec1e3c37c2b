//! Sol structures for the comment wall contract and the stablecoins used for tips.

use alloy_primitives::hex;
use alloy_sol_types::{Revert, SolError};
use serde_json::Value;

pub use self::contract::{ICommentWall, IERC20};

pub mod contract {
    use alloy_sol_macro::sol;

    sol! {
        /// The comment wall. Comments are append-only and addressed by their
        /// insertion index.
        interface ICommentWall {
            /// Total number of comments ever posted.
            function getNumberOfComments() external view returns (uint256 count);

            /// Reads one comment by insertion index.
            /// Returns:
            /// - content: the raw comment text, as posted.
            /// - timestamp: block timestamp (seconds) of the posting transaction.
            /// - likes: number of distinct accounts that liked the comment.
            /// - author: the posting account.
            function getComment(
                uint256 index
            ) external view returns (string memory content, uint256 timestamp, uint256 likes, address author);

            /// Posts a new comment from the calling account.
            function comment(string commentString) external returns (int256);

            /// Likes the comment at `commentId`. Reverts when the caller has
            /// already liked it.
            function likeComment(uint256 commentId) external;

            /// Forwards the attached native value to the author of `commentId`.
            function receiveTip(uint256 commentId) external payable;
        }

        interface IERC20 {
            function transfer(address to, uint256 amount) external returns (bool);
        }
    }
}

/// Decodes a standard `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data, true).ok().map(|revert| revert.reason)
}

/// Digs the revert payload out of a provider error's `data` field.
///
/// Wallets disagree on where they put it: some hand back the hex string directly,
/// others nest it under `data` or `originalError.data`.
pub fn revert_data(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) if s.starts_with("0x") => hex::decode(s).ok(),
        Value::Object(map) => map
            .get("data")
            .and_then(revert_data)
            .or_else(|| map.get("originalError").and_then(revert_data)),
        _ => None,
    }
}
