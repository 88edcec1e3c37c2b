//! The comment wall as a user sees it.
//!
//! [`CommentBoard`] wires the gateway, repository, write operations and view
//! state together. Each user-triggered operation ends in exactly one
//! [`Notice`]; errors stop here and never reach the caller.

use crate::config::{TipToken, WallConfig};
use crate::error::WallError;
use crate::gateway::ChainGateway;
use crate::provider::{WalletEvent, WalletProvider};
use crate::repository::{Comment, CommentRepository};
use crate::units::short_address;
use crate::view::ViewState;
use crate::writes::{PendingAction, WriteOperations, WriteStage};
use serde::Serialize;
use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A toast for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
    /// Show a retry affordance that re-triggers the same action.
    pub retryable: bool,
}

impl Notice {
    fn new(level: NoticeLevel, title: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.to_string(),
            message: message.into(),
            retryable: false,
        }
    }

    fn failure(title: &str, err: &WallError) -> Self {
        let level = match err {
            WallError::InvalidInput(_)
            | WallError::AlreadyLiked
            | WallError::ActionInProgress(_)
            | WallError::UserRejected => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self {
            level,
            title: title.to_string(),
            message: err.user_message(),
            retryable: err.is_retryable(),
        }
    }
}

pub struct CommentBoard<P> {
    config: WallConfig,
    gateway: Rc<ChainGateway<P>>,
    repository: Rc<CommentRepository<P>>,
    writes: WriteOperations<P>,
    view: RefCell<ViewState>,
    notices: RefCell<Vec<Notice>>,
    loaded: Cell<bool>,
}

impl<P: WalletProvider> CommentBoard<P> {
    pub fn new(provider: P, config: WallConfig) -> Self {
        Self::with_gateway(ChainGateway::new(provider, &config), config)
    }

    /// A board for a page without an injected wallet. Every chain operation
    /// reports `ProviderUnavailable`.
    pub fn without_wallet(config: WallConfig) -> Self {
        Self::with_gateway(ChainGateway::detached(&config), config)
    }

    fn with_gateway(gateway: ChainGateway<P>, config: WallConfig) -> Self {
        let gateway = Rc::new(gateway);
        let repository = Rc::new(CommentRepository::new(gateway.clone(), config.contract));
        let writes = WriteOperations::new(gateway.clone(), repository.clone(), config.clone());
        Self {
            config,
            gateway,
            repository,
            writes,
            view: RefCell::new(ViewState::new()),
            notices: RefCell::new(Vec::new()),
            loaded: Cell::new(false),
        }
    }

    pub fn config(&self) -> &WallConfig {
        &self.config
    }

    pub fn view(&self) -> Ref<'_, ViewState> {
        self.view.borrow()
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.view.borrow().comments().to_vec()
    }

    pub fn stage(&self, action: &PendingAction) -> WriteStage {
        self.writes.stage(action)
    }

    /// Drains the notices raised since the last call, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.borrow_mut())
    }

    fn notify(&self, notice: Notice) {
        debug!(level = ?notice.level, title = %notice.title, "notice");
        self.notices.borrow_mut().push(notice);
    }

    async fn refresh(&self) -> Result<usize, WallError> {
        match self.repository.fetch_all().await {
            Ok(comments) => {
                let count = comments.len();
                self.view.borrow_mut().replace_comments(comments);
                self.loaded.set(true);
                Ok(count)
            }
            Err(err) => {
                if !self.loaded.get() {
                    self.view.borrow_mut().clear_comments();
                }
                Err(err)
            }
        }
    }

    /// Re-reads the wall after a confirmed write. The write already succeeded,
    /// so a failed read only leaves the current view in place.
    async fn refresh_after_write(&self, action: &str) {
        if let Err(err) = self.refresh().await {
            warn!(action, %err, "refresh after write failed");
        }
    }

    /// Picks up an already-authorized account and reads the wall.
    pub async fn load(&self) {
        let account = self.gateway.get_active_account().await;
        self.view.borrow_mut().set_account(account);
        match self.refresh().await {
            Ok(count) => self.notify(Notice::new(
                NoticeLevel::Info,
                "Comments loaded",
                format!("{count} comments on the wall."),
            )),
            Err(err) => self.notify(Notice::failure("Loading comments failed", &err)),
        }
    }

    pub async fn connect(&self) {
        match self.gateway.connect().await {
            Ok(account) => {
                self.view.borrow_mut().set_account(Some(account));
                info!(%account, "wallet connected");
                self.notify(Notice::new(
                    NoticeLevel::Success,
                    "Wallet connected",
                    format!("Connected as {}.", short_address(&account)),
                ));
            }
            Err(err) => self.notify(Notice::failure("Connecting the wallet failed", &err)),
        }
    }

    pub async fn post_comment(&self, text: &str) {
        match self.writes.submit_comment(text).await {
            Ok(comments) => {
                self.view.borrow_mut().replace_comments(comments);
                self.loaded.set(true);
                self.notify(Notice::new(
                    NoticeLevel::Success,
                    "Comment posted",
                    "Your comment is on the wall.",
                ));
            }
            // the transaction landed, only the re-read failed
            Err(WallError::ReadFailed(reason)) => {
                warn!(%reason, "comment posted but refresh failed");
                self.notify(Notice::new(
                    NoticeLevel::Warning,
                    "Comment posted, refresh failed",
                    "Your comment is on the wall, but the list could not be reloaded.",
                ));
            }
            Err(err) => self.notify(Notice::failure("Posting failed", &err)),
        }
    }

    /// Likes a comment and bumps its counter locally, then re-reads the wall
    /// so the chain's count replaces the bumped one.
    pub async fn like_comment(&self, comment_id: &str) {
        match self.writes.like_comment(comment_id).await {
            Ok(outcome) => {
                self.view
                    .borrow_mut()
                    .apply_optimistic_like(&outcome.timestamp);
                self.refresh_after_write("like").await;
                self.notify(Notice::new(
                    NoticeLevel::Success,
                    "Liked",
                    "Your like was recorded.",
                ));
            }
            Err(err) => self.notify(Notice::failure("Like failed", &err)),
        }
    }

    /// Tips the author of the comment whose tip panel is open. That panel closes
    /// once the tip is confirmed, unless another one was opened meanwhile, and
    /// stays open on failure so it can be retried.
    pub async fn tip(&self, token: TipToken, amount: &str) {
        let intent = self.view.borrow().tip_intent(token, amount);
        let Some(intent) = intent else {
            self.notify(Notice::new(
                NoticeLevel::Warning,
                "Tip failed",
                "Open the tip panel of a comment first.",
            ));
            return;
        };
        match self.writes.tip(&intent).await {
            Ok(outcome) => {
                self.view.borrow_mut().consume_tip_intent(&intent);
                self.refresh_after_write("tip").await;
                self.notify(Notice::new(
                    NoticeLevel::Success,
                    "Tip sent",
                    format!(
                        "Sent {} to {}.",
                        outcome.display_amount(&self.config),
                        short_address(&outcome.recipient)
                    ),
                ));
            }
            Err(err) => self.notify(Notice::failure("Tip failed", &err)),
        }
    }

    pub fn sort_by_time(&self) {
        self.view.borrow_mut().sort_by_time();
    }

    pub fn sort_by_likes(&self) {
        self.view.borrow_mut().sort_by_likes();
    }

    pub fn toggle_tip_panel(&self, comment_id: &str) {
        self.view.borrow_mut().toggle_tip_panel(comment_id);
    }

    pub fn click_outside(&self) {
        self.view.borrow_mut().click_outside();
    }

    /// Returns the text to put on the clipboard and starts the "copied"
    /// indicator, which is the feedback for this action.
    pub fn copy_comment(&self, comment_id: &str, now: Instant) -> Option<String> {
        let mut view = self.view.borrow_mut();
        let content = view
            .comments()
            .iter()
            .find(|comment| comment.id() == comment_id)
            .map(|comment| comment.content.clone())?;
        view.show_copied_indicator(comment_id, now);
        Some(content)
    }

    /// Clears the "copied" indicator once its window has passed.
    pub fn tick(&self, now: Instant) -> bool {
        self.view.borrow_mut().expire_indicators(now)
    }

    /// Applies a wallet notification. A switch to another account re-reads the
    /// wall under that account.
    pub async fn on_wallet_event(&self, event: WalletEvent) {
        self.gateway.handle_event(&event);
        match event {
            WalletEvent::AccountsChanged(accounts) => match accounts.first().copied() {
                Some(account) => {
                    self.view.borrow_mut().set_account(Some(account));
                    match self.refresh().await {
                        Ok(_) => self.notify(Notice::new(
                            NoticeLevel::Info,
                            "Account changed",
                            format!("Now using {}.", short_address(&account)),
                        )),
                        Err(err) => {
                            self.notify(Notice::failure("Loading comments failed", &err))
                        }
                    }
                }
                None => self.disconnected(),
            },
            WalletEvent::ChainChanged(chain_id) => {
                if chain_id != self.config.network.chain_id {
                    self.notify(Notice::new(
                        NoticeLevel::Warning,
                        "Wrong network",
                        format!(
                            "Switch your wallet to {} to use the wall.",
                            self.config.network.chain_name
                        ),
                    ));
                }
            }
            WalletEvent::Disconnected => self.disconnected(),
        }
    }

    fn disconnected(&self) {
        self.view.borrow_mut().set_account(None);
        self.notify(Notice::new(
            NoticeLevel::Info,
            "Wallet disconnected",
            "Connect a wallet to post, like or tip.",
        ));
    }
}
