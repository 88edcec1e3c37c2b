use crate::contract::ICommentWall;
use crate::error::WallError;
use crate::gateway::ChainGateway;
use crate::provider::WalletProvider;
use crate::units::short_address;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// One comment as displayed on the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub content: String,
    /// Seconds since the epoch as a decimal string. Also the comment's identifier
    /// within a fetch.
    pub timestamp: String,
    pub likes: u64,
    pub author: Address,
}

impl Comment {
    fn from_raw(raw: ICommentWall::getCommentReturn) -> Result<Self, WallError> {
        if raw.likes > U256::from(u64::MAX) {
            return Err(WallError::ReadFailed(format!(
                "like counter {} out of range",
                raw.likes
            )));
        }
        Ok(Self {
            content: raw.content,
            timestamp: raw.timestamp.to_string(),
            likes: raw.likes.to::<u64>(),
            author: raw.author,
        })
    }

    pub fn id(&self) -> &str {
        &self.timestamp
    }

    /// Numeric value of the timestamp; malformed strings sort as zero.
    pub fn timestamp_value(&self) -> U256 {
        U256::from_str_radix(&self.timestamp, 10).unwrap_or_default()
    }

    /// Posting time. Only the first ten digits are read, so a millisecond
    /// timestamp still lands on the right second.
    pub fn posted_at(&self) -> Option<SystemTime> {
        let seconds: u64 = self.timestamp.get(..10).unwrap_or(&self.timestamp).parse().ok()?;
        UNIX_EPOCH.checked_add(Duration::from_secs(seconds))
    }

    pub fn short_author(&self) -> String {
        short_address(&self.author)
    }
}

/// Reads the wall and owns the authoritative copy of it.
pub struct CommentRepository<P> {
    gateway: Rc<ChainGateway<P>>,
    contract: Address,
    cache: RefCell<Vec<Comment>>,
    started: Cell<u64>,
    committed: Cell<u64>,
}

impl<P: WalletProvider> CommentRepository<P> {
    pub fn new(gateway: Rc<ChainGateway<P>>, contract: Address) -> Self {
        Self {
            gateway,
            contract,
            cache: RefCell::new(Vec::new()),
            started: Cell::new(0),
            committed: Cell::new(0),
        }
    }

    /// Reads every comment in insertion order and replaces the cache.
    ///
    /// Fetches may overlap when the UI triggers a refresh while another is in
    /// flight. The cache only ever moves forward: a fetch that started earlier
    /// than the last committed one is discarded and the caller gets the newer
    /// snapshot instead. A failed fetch leaves the cache untouched.
    pub async fn fetch_all(&self) -> Result<Vec<Comment>, WallError> {
        let generation = self.started.get() + 1;
        self.started.set(generation);

        let comments = self.read_all().await.map_err(|err| {
            warn!(%err, generation, "comment fetch failed");
            err
        })?;

        if generation < self.committed.get() {
            debug!(generation, committed = self.committed.get(), "discarding stale fetch");
            return Ok(self.snapshot());
        }
        info!(count = comments.len(), generation, "comments refreshed");
        *self.cache.borrow_mut() = comments.clone();
        self.committed.set(generation);
        Ok(comments)
    }

    async fn read_all(&self) -> Result<Vec<Comment>, WallError> {
        let count = self
            .gateway
            .call(self.contract, &ICommentWall::getNumberOfCommentsCall {})
            .await?
            .count;
        if count > U256::from(u64::MAX) {
            return Err(WallError::ReadFailed(format!(
                "implausible comment count {count}"
            )));
        }
        let count = count.to::<u64>();
        debug!(count, "reading comments");

        let mut comments = Vec::new();
        for index in 0..count {
            let raw = self
                .gateway
                .call(
                    self.contract,
                    &ICommentWall::getCommentCall {
                        index: U256::from(index),
                    },
                )
                .await?;
            comments.push(Comment::from_raw(raw)?);
        }
        Ok(comments)
    }

    /// The last successfully fetched list.
    pub fn snapshot(&self) -> Vec<Comment> {
        self.cache.borrow().clone()
    }

    /// Maps a comment identifier back to its on-chain index.
    ///
    /// Timestamps are not guaranteed unique: two comments mined in the same
    /// block share one. The first match wins and the collision is logged.
    pub fn index_of(&self, timestamp: &str) -> Result<usize, WallError> {
        let cache = self.cache.borrow();
        let mut matches = cache
            .iter()
            .enumerate()
            .filter(|(_, comment)| comment.timestamp == timestamp)
            .map(|(index, _)| index);
        let first = matches.next().ok_or_else(|| {
            WallError::InvalidInput(format!("no comment with id {timestamp} is loaded"))
        })?;
        let others: Vec<usize> = matches.collect();
        if !others.is_empty() {
            warn!(
                timestamp,
                chosen = first,
                ?others,
                "several comments share this timestamp"
            );
        }
        Ok(first)
    }

    pub fn get(&self, timestamp: &str) -> Option<Comment> {
        self.cache
            .borrow()
            .iter()
            .find(|comment| comment.timestamp == timestamp)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{codes, ProviderRpcError};
    use crate::mock::ScriptedWallet;

    fn repository(wallet: &Rc<ScriptedWallet>) -> CommentRepository<Rc<ScriptedWallet>> {
        let config = ScriptedWallet::config();
        let gateway = Rc::new(ChainGateway::new(wallet.clone(), &config));
        CommentRepository::new(gateway, config.contract)
    }

    #[tokio::test]
    async fn empty_wall_is_not_an_error() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        let repository = repository(&wallet);
        assert_eq!(repository.fetch_all().await, Ok(Vec::new()));
        assert!(repository.snapshot().is_empty());
    }

    #[tokio::test]
    async fn preserves_insertion_order() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        let alice = Address::repeat_byte(1);
        wallet.seed("first", 300, 0, alice);
        wallet.seed("second", 100, 5, alice);
        wallet.seed("third", 200, 2, alice);
        let repository = repository(&wallet);

        let comments = repository.fetch_all().await.unwrap();

        let contents: Vec<&str> = comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert_eq!(comments[1].timestamp, "100");
        assert_eq!(comments[1].likes, 5);
        assert_eq!(comments[1].author, alice);
        assert_eq!(repository.snapshot(), comments);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_cache() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        wallet.seed("kept", 1, 0, Address::repeat_byte(1));
        let repository = repository(&wallet);
        repository.fetch_all().await.unwrap();

        wallet.seed("never seen", 2, 0, Address::repeat_byte(1));
        wallet.fail_reads(ProviderRpcError::new(codes::SERVER_ERROR, "header not found"));
        let err = repository.fetch_all().await.unwrap_err();

        assert!(matches!(err, WallError::ReadFailed(_)));
        assert_eq!(repository.snapshot().len(), 1);
        assert_eq!(repository.snapshot()[0].content, "kept");
    }

    #[tokio::test]
    async fn refresh_replaces_cache_wholesale() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        wallet.seed("a", 1, 0, Address::repeat_byte(1));
        let repository = repository(&wallet);
        repository.fetch_all().await.unwrap();

        wallet.seed("b", 2, 0, Address::repeat_byte(2));
        let refreshed = repository.fetch_all().await.unwrap();
        assert_eq!(refreshed.len(), 2);
        assert_eq!(repository.snapshot(), refreshed);
    }

    #[tokio::test]
    async fn older_fetch_cannot_overwrite_newer_one() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        wallet.seed("first", 1, 0, Address::repeat_byte(1));
        let repository = repository(&wallet);
        // the first fetch counts one comment, then stalls until the second is done
        wallet.stall_next_read(8);

        let (older, newer) = tokio::join!(repository.fetch_all(), async {
            wallet.seed("second", 2, 0, Address::repeat_byte(2));
            repository.fetch_all().await
        });

        let newer = newer.unwrap();
        assert_eq!(newer.len(), 2);
        assert_eq!(older.unwrap(), newer);
        assert_eq!(repository.snapshot(), newer);
    }

    #[tokio::test]
    async fn reads_need_a_wallet() {
        let config = ScriptedWallet::config();
        let gateway: Rc<ChainGateway<Rc<ScriptedWallet>>> =
            Rc::new(ChainGateway::detached(&config));
        let repository = CommentRepository::new(gateway, config.contract);
        assert_eq!(
            repository.fetch_all().await,
            Err(WallError::ProviderUnavailable)
        );
    }

    #[tokio::test]
    async fn index_lookup_uses_last_fetch() {
        let wallet = Rc::new(ScriptedWallet::new());
        wallet.authorize();
        let author = Address::repeat_byte(3);
        wallet.seed("x", 10, 0, author);
        wallet.seed("y", 20, 0, author);
        wallet.seed("z", 20, 0, author);
        let repository = repository(&wallet);
        repository.fetch_all().await.unwrap();

        assert_eq!(repository.index_of("10"), Ok(0));
        assert_eq!(repository.index_of("20"), Ok(1));
        assert!(matches!(
            repository.index_of("30"),
            Err(WallError::InvalidInput(_))
        ));
        assert_eq!(repository.get("10").unwrap().content, "x");
    }

    #[test]
    fn comment_display_helpers() {
        let comment = Comment {
            content: "hi".into(),
            timestamp: "1700000000123".into(),
            likes: 0,
            author: Address::repeat_byte(0xab),
        };
        assert_eq!(
            comment.posted_at(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert_eq!(comment.timestamp_value(), U256::from(1_700_000_000_123u64));
        assert_eq!(comment.short_author().to_lowercase(), "0xabab...abab");
    }
}
