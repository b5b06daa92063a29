//! In-memory view of one deployed message board.
//!
//! The store keeps the loaded page of messages, the total count and a status
//! line, and serializes reads and writes against the chain through one
//! in-flight flag per operation kind. Remote failures never escape: they are
//! turned into status text and the store stays usable for a retry.
//!
//! Operations take `&self` so a UI loop can start a refresh while a post is
//! still confirming. The snapshot lock is never held across an await point.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use board_common::address::Address;
use board_common::api::MAX_PAGE;
use board_common::chain::{BoardReader, BoardWriter, ChainError, EncryptedInputBuilder};
use board_common::ciphertext::BitWidth;
use board_common::deployments::BoardInfo;
use board_common::message::{Message, MessageId};

use crate::config::{millis, StoreConfig};

pub const STATUS_LOADING: &str = "Loading messages...";
pub const STATUS_ALL_LOADED: &str = "All messages loaded";
pub const STATUS_POSTING: &str = "Posting message...";
pub const STATUS_POSTED: &str = "Message posted successfully!";
pub const STATUS_RATING: &str = "Rating message...";
pub const STATUS_RATED: &str = "Message rated successfully!";
pub const STATUS_EMPTY_CONTENT: &str = "Message content cannot be empty";
pub const STATUS_BAD_RATING: &str = "Rating must be between 1 and 5";
pub const STATUS_BAD_MESSAGE_ID: &str = "Message ID must be a positive integer";
pub const STATUS_BAD_COUNT: &str = "Count must be a positive integer";

/// Valid plaintext ratings.
pub const RATING_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

/// Everything the store knows about the board at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardSnapshot {
    /// Ascending by id, starting at the offset of the last replacing load.
    pub messages: Vec<Message>,
    /// Zero until a count has been loaded.
    pub total_count: u64,
    pub is_loading_messages: bool,
    pub is_posting_message: bool,
    pub is_rating_message: bool,
    pub status_message: String,
}

/// How an operation ended. Errors themselves are reported through
/// [`BoardSnapshot::status_message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do: already in flight, a capability is missing, or
    /// everything is already loaded.
    Skipped,
    /// Refused before any remote call because an argument was invalid.
    Rejected,
    Completed,
    /// A remote call failed; see the status message.
    Failed,
}

impl Outcome {
    pub fn is_completed(self) -> bool {
        self == Self::Completed
    }
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Load,
    Post,
    Rate,
}

impl Op {
    fn flag(self, snapshot: &mut BoardSnapshot) -> &mut bool {
        match self {
            Self::Load => &mut snapshot.is_loading_messages,
            Self::Post => &mut snapshot.is_posting_message,
            Self::Rate => &mut snapshot.is_rating_message,
        }
    }
}

fn lock(state: &Mutex<BoardSnapshot>) -> MutexGuard<'_, BoardSnapshot> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds an operation's in-flight flag and clears it when dropped, so the flag
/// is released on every exit path, including when the future is cancelled.
struct InFlight<'a> {
    state: &'a Mutex<BoardSnapshot>,
    op: Op,
}

impl<'a> InFlight<'a> {
    fn begin(state: &'a Mutex<BoardSnapshot>, op: Op) -> Option<Self> {
        let mut snapshot = lock(state);
        let flag = op.flag(&mut snapshot);
        if *flag {
            return None;
        }
        *flag = true;
        Some(Self { state, op })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.op.flag(&mut lock(self.state)) = false;
    }
}

async fn with_timeout<T>(
    limit: Option<Duration>,
    call: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, ChainError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ChainError::Timeout(millis(limit)))?,
        None => call.await,
    }
}

/// Reconciles local board state with the chain.
///
/// `R` reads board state, `W` signs and submits transactions for the
/// connected account, `E` builds encrypted rating inputs. Any of them may be
/// absent; the `can_*` predicates report which operations are possible.
pub struct BoardStore<R, W, E> {
    board: BoardInfo,
    reader: Option<R>,
    signer: Option<W>,
    encryptor: Option<E>,
    config: StoreConfig,
    state: Mutex<BoardSnapshot>,
}

impl<R, W, E> BoardStore<R, W, E> {
    pub fn new(board: BoardInfo, config: StoreConfig) -> Self {
        let store = Self {
            board: BoardInfo {
                address: None,
                chain_id: None,
                chain_name: None,
            },
            reader: None,
            signer: None,
            encryptor: None,
            config,
            state: Mutex::new(BoardSnapshot::default()),
        };
        store.with_board(board)
    }

    fn with_board(mut self, board: BoardInfo) -> Self {
        self.set_board(board);
        self
    }

    pub fn with_reader(mut self, reader: R) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_signer(mut self, signer: W) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_encryptor(mut self, encryptor: E) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Connect or disconnect the signing account.
    pub fn set_signer(&mut self, signer: Option<W>) {
        self.signer = signer;
    }

    pub fn set_encryptor(&mut self, encryptor: Option<E>) {
        self.encryptor = encryptor;
    }

    /// Point the store at another board (e.g. after a chain switch). The
    /// snapshot belongs to one (address, chain) pair, so it starts over.
    pub fn set_board(&mut self, board: BoardInfo) {
        let mut snapshot = BoardSnapshot::default();
        if !board.is_deployed() {
            if let Some(chain_id) = board.chain_id {
                snapshot.status_message =
                    format!("MessageBoard deployment not found for chainId={chain_id}.");
            }
        }
        *self.state.get_mut().unwrap_or_else(PoisonError::into_inner) = snapshot;
        self.board = board;
    }

    pub fn board(&self) -> &BoardInfo {
        &self.board
    }

    pub fn contract_address(&self) -> Option<Address> {
        self.board.address.filter(|a| !a.is_zero())
    }

    pub fn is_deployed(&self) -> bool {
        self.board.is_deployed()
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn signer(&self) -> Option<&W> {
        self.signer.as_ref()
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        lock(&self.state).clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        lock(&self.state).messages.clone()
    }

    pub fn total_count(&self) -> u64 {
        lock(&self.state).total_count
    }

    pub fn status_message(&self) -> String {
        lock(&self.state).status_message.clone()
    }

    pub fn is_loading_messages(&self) -> bool {
        lock(&self.state).is_loading_messages
    }

    pub fn is_posting_message(&self) -> bool {
        lock(&self.state).is_posting_message
    }

    pub fn is_rating_message(&self) -> bool {
        lock(&self.state).is_rating_message
    }

    pub fn can_load_messages(&self) -> bool {
        self.is_deployed() && self.reader.is_some() && !self.is_loading_messages()
    }

    pub fn can_post_message(&self) -> bool {
        self.is_deployed() && self.signer.is_some() && !self.is_posting_message()
    }

    pub fn can_rate_message(&self) -> bool {
        self.is_deployed()
            && self.encryptor.is_some()
            && self.signer.is_some()
            && !self.is_rating_message()
    }

    /// Whether another page is worth requesting. Until the total is known,
    /// a full first page is taken as a sign that more exist.
    pub fn has_more_messages(&self) -> bool {
        let snapshot = lock(&self.state);
        let loaded = snapshot.messages.len() as u64;
        if snapshot.total_count == 0 {
            self.config.page_size > 0 && loaded >= self.config.page_size
        } else {
            loaded < snapshot.total_count
        }
    }

    fn set_status(&self, status: impl Into<String>) {
        lock(&self.state).status_message = status.into();
    }

    fn record_failure(&self, context: &str, err: ChainError) -> Outcome {
        tracing::warn!(error = %err, "{context}");
        self.set_status(format!("{context}: {err}"));
        Outcome::Failed
    }
}

impl<R, W, E> BoardStore<R, W, E>
where
    R: BoardReader,
    W: BoardWriter,
    E: EncryptedInputBuilder,
{
    /// Refresh the total message count. Not guarded: concurrent refreshes
    /// race and the last one to finish wins.
    pub async fn load_count(&self) -> Outcome {
        let (Some(board), Some(reader)) = (self.contract_address(), self.reader.as_ref()) else {
            return Outcome::Skipped;
        };

        match with_timeout(self.config.call_timeout, reader.message_count(&board)).await {
            Ok(count) => {
                tracing::debug!(%board, count, "Loaded message count");
                lock(&self.state).total_count = count;
                Outcome::Completed
            }
            Err(e) => self.record_failure("Failed to load message count", e),
        }
    }

    /// Fetch messages `[start_index, start_index + count)`.
    ///
    /// A load from offset 0 replaces the list; any other offset appends.
    pub async fn load_messages(&self, start_index: u64, count: u64) -> Outcome {
        let Some(_in_flight) = InFlight::begin(&self.state, Op::Load) else {
            tracing::debug!(start_index, "Message load already in flight");
            return Outcome::Skipped;
        };
        let (Some(board), Some(reader)) = (self.contract_address(), self.reader.as_ref()) else {
            return Outcome::Skipped;
        };
        if count == 0 {
            self.set_status(STATUS_BAD_COUNT);
            return Outcome::Rejected;
        }
        {
            let mut snapshot = lock(&self.state);
            if snapshot.total_count > 0 && start_index >= snapshot.total_count {
                snapshot.status_message = STATUS_ALL_LOADED.to_string();
                return Outcome::Skipped;
            }
            snapshot.status_message = STATUS_LOADING.to_string();
        }

        let fetched = with_timeout(self.config.call_timeout, async {
            let columns = reader.messages(&board, start_index, count).await?;
            Ok::<_, ChainError>(columns.into_messages()?)
        })
        .await;

        match fetched {
            Ok(page) => {
                let loaded = page.len();
                let mut snapshot = lock(&self.state);
                if start_index == 0 {
                    snapshot.messages = page;
                } else {
                    snapshot.messages.extend(page);
                }
                snapshot.status_message = format!("Loaded {loaded} messages");
                tracing::info!(%board, start_index, loaded, "Loaded messages");
                Outcome::Completed
            }
            Err(e) => self.record_failure("Failed to load messages", e),
        }
    }

    /// Post `content`, wait for confirmation, then resynchronize the count and
    /// the first `resync_count` messages.
    pub async fn post_message(&self, content: &str, encrypted: bool) -> Outcome {
        let Some(_in_flight) = InFlight::begin(&self.state, Op::Post) else {
            tracing::debug!("Post already in flight");
            return Outcome::Skipped;
        };
        let (Some(board), Some(signer)) = (self.contract_address(), self.signer.as_ref()) else {
            return Outcome::Skipped;
        };
        if content.trim().is_empty() {
            self.set_status(STATUS_EMPTY_CONTENT);
            return Outcome::Rejected;
        }

        self.set_status(STATUS_POSTING);
        let submitted = with_timeout(self.config.call_timeout, async {
            if encrypted {
                signer.post_encrypted_message(&board, content).await
            } else {
                signer.post_message(&board, content).await
            }
        })
        .await;
        let pending = match submitted {
            Ok(pending) => pending,
            Err(e) => return self.record_failure("Failed to post message", e),
        };
        self.set_status(format!("Transaction submitted: {}", pending.tx_hash));

        let receipt =
            match with_timeout(self.config.confirmation_timeout, signer.confirm(&pending)).await {
                Ok(receipt) => receipt,
                Err(e) => return self.record_failure("Failed to post message", e),
            };
        tracing::info!(%board, tx = %receipt.tx_hash, block = receipt.block_number, encrypted, "Message posted");
        self.set_status(STATUS_POSTED);

        // Where the new message lands relative to the loaded pages is not
        // known locally, so refetch a canonical prefix instead of merging.
        self.load_count().await;
        self.reload_prefix(self.config.resync_count).await;
        Outcome::Completed
    }

    /// Encrypt `rating` for the connected account, submit it for `message_id`,
    /// wait for confirmation and reload the visible window.
    pub async fn rate_message(&self, message_id: MessageId, rating: u32) -> Outcome {
        let Some(_in_flight) = InFlight::begin(&self.state, Op::Rate) else {
            tracing::debug!(message_id, "Rating already in flight");
            return Outcome::Skipped;
        };
        let (Some(board), Some(encryptor), Some(signer)) = (
            self.contract_address(),
            self.encryptor.as_ref(),
            self.signer.as_ref(),
        ) else {
            return Outcome::Skipped;
        };
        if message_id == 0 {
            self.set_status(STATUS_BAD_MESSAGE_ID);
            return Outcome::Rejected;
        }
        if !RATING_RANGE.contains(&rating) {
            self.set_status(STATUS_BAD_RATING);
            return Outcome::Rejected;
        }

        self.set_status(STATUS_RATING);
        let caller = signer.address();
        let submitted = with_timeout(self.config.call_timeout, async {
            let input = encryptor
                .encrypt(&board, &caller, u64::from(rating), BitWidth::U32)
                .await?;
            let handle = input.handles.first().ok_or_else(|| {
                ChainError::Encryption("builder returned no ciphertext handles".to_string())
            })?;
            signer
                .rate_message(&board, message_id, handle, &input.input_proof)
                .await
        })
        .await;
        let pending = match submitted {
            Ok(pending) => pending,
            Err(e) => return self.record_failure("Failed to rate message", e),
        };
        self.set_status(format!("Transaction submitted: {}", pending.tx_hash));

        if let Err(e) =
            with_timeout(self.config.confirmation_timeout, signer.confirm(&pending)).await
        {
            return self.record_failure("Failed to rate message", e);
        }
        tracing::info!(%board, message_id, rater = %caller, "Message rated");
        self.set_status(STATUS_RATED);

        let visible = lock(&self.state).messages.len() as u64;
        let window = if visible == 0 {
            self.config.page_size
        } else {
            visible
        };
        self.reload_prefix(window).await;
        Outcome::Completed
    }

    /// Refetch the first `len` messages in pages no larger than a node serves.
    async fn reload_prefix(&self, len: u64) {
        let mut start = 0;
        while start < len {
            let count = (len - start).min(MAX_PAGE);
            if self.load_messages(start, count).await != Outcome::Completed {
                return;
            }
            start += count;
            let loaded = lock(&self.state).messages.len() as u64;
            if loaded < start {
                return;
            }
        }
        if len > MAX_PAGE {
            let loaded = lock(&self.state).messages.len();
            self.set_status(format!("Loaded {loaded} messages"));
        }
    }
}
