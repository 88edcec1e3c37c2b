//! The three contract-writing actions: post, like and tip.
//!
//! Every action walks `Idle -> Validating -> Submitting -> Confirming ->
//! {Succeeded | Failed}`, tracked per target. While a target is in flight the
//! same action on it is refused with `ActionInProgress` and nothing is sent.

use crate::config::{TipToken, WallConfig};
use crate::contract::{ICommentWall, IERC20};
use crate::error::WallError;
use crate::gateway::{CallSpec, ChainGateway, TxReceipt};
use crate::provider::WalletProvider;
use crate::repository::{Comment, CommentRepository};
use crate::units::{format_units, parse_units};
use alloy_primitives::{Address, U256};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Idle,
    Validating,
    Submitting,
    Confirming,
    Succeeded,
    Failed,
}

impl WriteStage {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WriteStage::Validating | WriteStage::Submitting | WriteStage::Confirming
        )
    }
}

/// The target a write is guarded on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PendingAction {
    Post,
    Like(String),
    /// A direct tip with no comment attached, guarded per recipient.
    Tip { recipient: Address, token: TipToken },
    /// A tip sent from a comment's tip panel. Two comments by the same author
    /// can be tipped at once.
    CommentTip { comment_id: String, token: TipToken },
    ContractTip(String),
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::Post => f.write_str("comment"),
            PendingAction::Like(_) => f.write_str("like"),
            PendingAction::Tip { token, .. } | PendingAction::CommentTip { token, .. } => {
                write!(f, "{token} tip")
            }
            PendingAction::ContractTip(_) => f.write_str("tip"),
        }
    }
}

/// A tip being composed in an open tip panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipIntent {
    /// The comment whose panel the tip was composed in.
    pub comment_id: String,
    pub recipient: Address,
    pub token: TipToken,
    /// Display-unit amount exactly as typed.
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikeOutcome {
    pub index: usize,
    pub timestamp: String,
    pub receipt: TxReceipt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipOutcome {
    pub recipient: Address,
    pub token: TipToken,
    /// Amount in base units.
    pub amount: U256,
    pub receipt: TxReceipt,
}

impl TipOutcome {
    /// `12.5 USDT`
    pub fn display_amount(&self, config: &WallConfig) -> String {
        format!(
            "{} {}",
            format_units(self.amount, config.decimals(self.token)),
            self.token
        )
    }
}

type Stages = RefCell<HashMap<PendingAction, WriteStage>>;

struct StageGuard<'a> {
    stages: &'a Stages,
    action: PendingAction,
    finished: bool,
}

impl StageGuard<'_> {
    fn advance(&self, stage: WriteStage) {
        self.stages.borrow_mut().insert(self.action.clone(), stage);
    }

    fn finish<T>(mut self, result: Result<T, WallError>) -> Result<T, WallError> {
        self.finished = true;
        match &result {
            Ok(_) => self.advance(WriteStage::Succeeded),
            Err(err) => {
                warn!(action = %self.action, %err, "write failed");
                self.advance(WriteStage::Failed);
            }
        }
        result
    }
}

impl Drop for StageGuard<'_> {
    fn drop(&mut self) {
        // a dropped future never resolved
        if !self.finished {
            self.advance(WriteStage::Failed);
        }
    }
}

pub struct WriteOperations<P> {
    gateway: Rc<ChainGateway<P>>,
    repository: Rc<CommentRepository<P>>,
    config: WallConfig,
    stages: Stages,
}

impl<P: WalletProvider> WriteOperations<P> {
    pub fn new(
        gateway: Rc<ChainGateway<P>>,
        repository: Rc<CommentRepository<P>>,
        config: WallConfig,
    ) -> Self {
        Self {
            gateway,
            repository,
            config,
            stages: RefCell::new(HashMap::new()),
        }
    }

    pub fn stage(&self, action: &PendingAction) -> WriteStage {
        self.stages
            .borrow()
            .get(action)
            .copied()
            .unwrap_or(WriteStage::Idle)
    }

    pub fn is_pending(&self, action: &PendingAction) -> bool {
        self.stage(action).is_in_flight()
    }

    fn begin(&self, action: PendingAction) -> Result<StageGuard<'_>, WallError> {
        if self.is_pending(&action) {
            return Err(WallError::ActionInProgress(action.to_string()));
        }
        let guard = StageGuard {
            stages: &self.stages,
            action,
            finished: false,
        };
        guard.advance(WriteStage::Validating);
        Ok(guard)
    }

    async fn send_and_confirm(
        &self,
        guard: &StageGuard<'_>,
        spec: CallSpec,
        classify: fn(WallError) -> WallError,
    ) -> Result<TxReceipt, WallError> {
        guard.advance(WriteStage::Submitting);
        let hash = self.gateway.send_transaction(spec).await.map_err(classify)?;
        guard.advance(WriteStage::Confirming);
        self.gateway.wait_for_receipt(hash).await.map_err(classify)
    }

    /// Posts `text` and resolves with the refreshed wall.
    ///
    /// The text is sent as typed; only its emptiness is judged on the trimmed
    /// form. A `ReadFailed` from here means the comment landed but the refresh
    /// did not.
    pub async fn submit_comment(&self, text: &str) -> Result<Vec<Comment>, WallError> {
        let guard = self.begin(PendingAction::Post)?;
        let result: Result<Vec<Comment>, WallError> = async {
            if text.trim().is_empty() {
                return Err(WallError::InvalidInput(
                    "Please write something before posting.".to_string(),
                ));
            }
            let spec = CallSpec::contract(
                self.config.contract,
                &ICommentWall::commentCall {
                    commentString: text.to_string(),
                },
            );
            let receipt = self
                .send_and_confirm(&guard, spec, WallError::into_write_failure)
                .await?;
            info!(hash = %receipt.transaction_hash, "comment posted");
            self.repository.fetch_all().await
        }
        .await;
        guard.finish(result)
    }

    /// Likes the comment identified by `timestamp` in the last fetched list.
    pub async fn like_comment(&self, timestamp: &str) -> Result<LikeOutcome, WallError> {
        let guard = self.begin(PendingAction::Like(timestamp.to_string()))?;
        let result: Result<LikeOutcome, WallError> = async {
            let index = self.repository.index_of(timestamp)?;
            let spec = CallSpec::contract(
                self.config.contract,
                &ICommentWall::likeCommentCall {
                    commentId: U256::from(index),
                },
            );
            let receipt = self
                .send_and_confirm(&guard, spec, WallError::into_like_failure)
                .await?;
            info!(index, timestamp, "comment liked");
            Ok(LikeOutcome {
                index,
                timestamp: timestamp.to_string(),
                receipt,
            })
        }
        .await;
        guard.finish(result)
    }

    /// Sends `amount` of `token` straight to `recipient`: a value transfer for
    /// the native asset, an ERC-20 `transfer` for stablecoins.
    pub async fn tip_comment(
        &self,
        recipient: Address,
        token: TipToken,
        amount: &str,
    ) -> Result<TipOutcome, WallError> {
        self.send_tip(PendingAction::Tip { recipient, token }, recipient, token, amount)
            .await
    }

    /// Tips the author of the comment the intent was composed for.
    pub async fn tip(&self, intent: &TipIntent) -> Result<TipOutcome, WallError> {
        let action = PendingAction::CommentTip {
            comment_id: intent.comment_id.clone(),
            token: intent.token,
        };
        self.send_tip(action, intent.recipient, intent.token, &intent.amount)
            .await
    }

    async fn send_tip(
        &self,
        action: PendingAction,
        recipient: Address,
        token: TipToken,
        amount: &str,
    ) -> Result<TipOutcome, WallError> {
        let guard = self.begin(action)?;
        let result: Result<TipOutcome, WallError> = async {
            if recipient == Address::ZERO {
                return Err(WallError::InvalidInput(
                    "This comment has no author to tip.".to_string(),
                ));
            }
            let value = self.validate_tip(token, amount)?;
            let spec = match self.config.token_address(token) {
                None => CallSpec::transfer(recipient, value),
                Some(token_address) => CallSpec::contract(
                    token_address,
                    &IERC20::transferCall {
                        to: recipient,
                        amount: value,
                    },
                ),
            };
            let receipt = self
                .send_and_confirm(&guard, spec, WallError::into_write_failure)
                .await?;
            info!(%recipient, %token, %value, "tip sent");
            Ok(TipOutcome {
                recipient,
                token,
                amount: value,
                receipt,
            })
        }
        .await;
        guard.finish(result)
    }

    /// Tips through the wall contract's `receiveTip`, which forwards the native
    /// value to the comment's author.
    pub async fn tip_through_contract(
        &self,
        timestamp: &str,
        amount: &str,
    ) -> Result<TipOutcome, WallError> {
        let guard = self.begin(PendingAction::ContractTip(timestamp.to_string()))?;
        let result: Result<TipOutcome, WallError> = async {
            let value = self.validate_tip(TipToken::Native, amount)?;
            let index = self.repository.index_of(timestamp)?;
            let recipient = self
                .repository
                .get(timestamp)
                .map(|comment| comment.author)
                .unwrap_or(Address::ZERO);
            let spec = CallSpec::contract(
                self.config.contract,
                &ICommentWall::receiveTipCall {
                    commentId: U256::from(index),
                },
            )
            .with_value(value);
            let receipt = self
                .send_and_confirm(&guard, spec, WallError::into_write_failure)
                .await?;
            info!(index, %value, "tip forwarded through the wall");
            Ok(TipOutcome {
                recipient,
                token: TipToken::Native,
                amount: value,
                receipt,
            })
        }
        .await;
        guard.finish(result)
    }

    /// Converts a typed amount into base units, accepting `(0, max_tip]`.
    pub fn validate_tip(&self, token: TipToken, amount: &str) -> Result<U256, WallError> {
        let decimals = self.config.decimals(token);
        let range = format!(
            "Enter an amount greater than 0 and at most {} {token}",
            self.config.max_tip
        );
        let max = parse_units(&self.config.max_tip, decimals)
            .map_err(|e| WallError::InvalidInput(format!("{range} (bad limit: {e}).")))?;
        let value = parse_units(amount, decimals)
            .map_err(|e| WallError::InvalidInput(format!("{range} ({e}).")))?;
        if value == U256::ZERO || value > max {
            return Err(WallError::InvalidInput(format!("{range}.")));
        }
        Ok(value)
    }
}
