//! Client-side display state: the ordered list on screen, which tip panel is
//! open, which "copied" tooltip is showing and who is connected.
//!
//! This is a derived copy. The repository stays authoritative and every refresh
//! overwrites whatever optimistic values were applied here.

use crate::config::TipToken;
use crate::repository::Comment;
use crate::writes::TipIntent;
use alloy_primitives::Address;
use std::time::{Duration, Instant};

/// How long the "copied" tooltip stays up.
pub const COPIED_INDICATOR_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Insertion order, as read from the contract.
    #[default]
    None,
    /// Newest first.
    ByTime,
    /// Most liked first.
    ByLikes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CopiedIndicator {
    comment_id: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct ViewState {
    comments: Vec<Comment>,
    sort_key: SortKey,
    open_tip_panel: Option<String>,
    copied: Option<CopiedIndicator>,
    account: Option<Address>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn set_account(&mut self, account: Option<Address>) {
        self.account = account;
    }

    /// Takes a fresh list from the repository, keeping the current sort.
    pub fn replace_comments(&mut self, comments: Vec<Comment>) {
        self.comments = comments;
        match self.sort_key {
            SortKey::None => {}
            SortKey::ByTime => self.sort_by_time(),
            SortKey::ByLikes => self.sort_by_likes(),
        }
        if let Some(open) = &self.open_tip_panel {
            if !self.comments.iter().any(|c| c.id() == open) {
                self.open_tip_panel = None;
            }
        }
    }

    pub fn clear_comments(&mut self) {
        self.comments.clear();
        self.open_tip_panel = None;
        self.copied = None;
    }

    /// Newest first, comparing timestamps numerically.
    pub fn sort_by_time(&mut self) {
        self.comments
            .sort_by(|a, b| b.timestamp_value().cmp(&a.timestamp_value()));
        self.sort_key = SortKey::ByTime;
    }

    /// Most liked first; equal counts keep their relative order.
    pub fn sort_by_likes(&mut self) {
        self.comments.sort_by(|a, b| b.likes.cmp(&a.likes));
        self.sort_key = SortKey::ByLikes;
    }

    /// Bumps the like counter before the chain confirms a refresh. Returns
    /// whether a comment matched.
    pub fn apply_optimistic_like(&mut self, comment_id: &str) -> bool {
        match self.comments.iter_mut().find(|c| c.id() == comment_id) {
            Some(comment) => {
                comment.likes = comment.likes.saturating_add(1);
                true
            }
            None => false,
        }
    }

    pub fn tip_panel(&self) -> Option<&str> {
        self.open_tip_panel.as_deref()
    }

    /// Opens the panel for `comment_id`, closing any other. Toggling the open
    /// panel closes it.
    pub fn toggle_tip_panel(&mut self, comment_id: &str) {
        if self.open_tip_panel.as_deref() == Some(comment_id) {
            self.open_tip_panel = None;
        } else {
            self.open_tip_panel = Some(comment_id.to_string());
        }
    }

    /// A click landed outside the open panel.
    pub fn click_outside(&mut self) {
        self.open_tip_panel = None;
    }

    /// The tip the open panel would send, addressed to the comment's author.
    pub fn tip_intent(&self, token: TipToken, amount: &str) -> Option<TipIntent> {
        let open = self.open_tip_panel.as_deref()?;
        let comment = self.comments.iter().find(|c| c.id() == open)?;
        Some(TipIntent {
            comment_id: comment.id().to_string(),
            recipient: comment.author,
            token,
            amount: amount.to_string(),
        })
    }

    /// Closes the panel `intent` was composed in, unless the user has since
    /// moved on to another one. Returns whether it closed.
    pub fn consume_tip_intent(&mut self, intent: &TipIntent) -> bool {
        if self.open_tip_panel.as_deref() == Some(intent.comment_id.as_str()) {
            self.open_tip_panel = None;
            true
        } else {
            false
        }
    }

    /// Shows "copied" on `comment_id` for [`COPIED_INDICATOR_WINDOW`], replacing
    /// any indicator already showing.
    pub fn show_copied_indicator(&mut self, comment_id: &str, now: Instant) {
        self.copied = Some(CopiedIndicator {
            comment_id: comment_id.to_string(),
            expires_at: now + COPIED_INDICATOR_WINDOW,
        });
    }

    pub fn copied_indicator(&self, now: Instant) -> Option<&str> {
        self.copied
            .as_ref()
            .filter(|indicator| now < indicator.expires_at)
            .map(|indicator| indicator.comment_id.as_str())
    }

    /// Drops an expired indicator. Returns whether anything changed.
    pub fn expire_indicators(&mut self, now: Instant) -> bool {
        let expired = self
            .copied
            .as_ref()
            .is_some_and(|indicator| now >= indicator.expires_at);
        if expired {
            self.copied = None;
        }
        expired
    }
}
