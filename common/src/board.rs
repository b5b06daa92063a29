//! The message-board contract: an append-only list of messages, each with an
//! encrypted rating that raters fold new ciphertexts into.
//!
//! Execution is deterministic given the caller, the contract address and the
//! block timestamp, so every node hosting the contract computes the same state.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::ciphertext::{verify_input_proof, CiphertextHandle, InputProof};
use crate::message::{Message, MessageColumns, MessageId};

/// Identifier of the encryption protocol configuration the contract was built against.
pub const PROTOCOL_ID: u64 = 10001;

/// Reasons a contract call reverts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum BoardError {
    #[error("message content cannot be empty")]
    EmptyContent,
    #[error("message {0} does not exist")]
    MessageNotFound(MessageId),
    #[error("invalid input proof for encrypted rating")]
    InvalidInputProof,
}

/// Events emitted by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BoardEvent {
    MessagePosted {
        message_id: MessageId,
        author: Address,
        is_encrypted: bool,
    },
    RatingUpdated {
        message_id: MessageId,
        rater: Address,
    },
}

/// Storage of one deployed message board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageBoardState {
    messages: Vec<Message>,
}

impl MessageBoardState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol_id(&self) -> u64 {
        PROTOCOL_ID
    }

    /// Append a plaintext message.
    pub fn post_message(
        &mut self,
        author: Address,
        content: &str,
        timestamp: u64,
    ) -> Result<BoardEvent, BoardError> {
        self.append(author, content, timestamp, false)
    }

    /// Append a message flagged as carrying encrypted content.
    pub fn post_encrypted_message(
        &mut self,
        author: Address,
        encrypted_content: &str,
        timestamp: u64,
    ) -> Result<BoardEvent, BoardError> {
        self.append(author, encrypted_content, timestamp, true)
    }

    fn append(
        &mut self,
        author: Address,
        content: &str,
        timestamp: u64,
        is_encrypted: bool,
    ) -> Result<BoardEvent, BoardError> {
        if content.trim().is_empty() {
            return Err(BoardError::EmptyContent);
        }
        let id = self.messages.len() as MessageId + 1;
        self.messages.push(Message {
            id,
            author,
            content: content.to_string(),
            timestamp,
            is_encrypted,
            encrypted_rating: CiphertextHandle::ZERO,
        });
        Ok(BoardEvent::MessagePosted {
            message_id: id,
            author,
            is_encrypted,
        })
    }

    /// Fold an encrypted rating into a message.
    ///
    /// `contract` is the address this board is deployed at; the proof must bind
    /// the handle to it and to `rater`.
    pub fn rate_message(
        &mut self,
        contract: &Address,
        rater: Address,
        message_id: MessageId,
        rating: &CiphertextHandle,
        input_proof: &InputProof,
    ) -> Result<BoardEvent, BoardError> {
        if !verify_input_proof(contract, &rater, rating, input_proof) {
            return Err(BoardError::InvalidInputProof);
        }
        let message = self
            .message_mut(message_id)
            .ok_or(BoardError::MessageNotFound(message_id))?;
        message.encrypted_rating = message.encrypted_rating.combine(rating);
        Ok(BoardEvent::RatingUpdated { message_id, rater })
    }

    pub fn message_count(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn get_message(&self, message_id: MessageId) -> Result<&Message, BoardError> {
        message_index(message_id)
            .and_then(|i| self.messages.get(i))
            .ok_or(BoardError::MessageNotFound(message_id))
    }

    /// Up to `count` messages starting at zero-based `start_index`, ascending by id.
    /// Past the end the page is short or empty.
    pub fn get_messages(&self, start_index: u64, count: u64) -> MessageColumns {
        let len = self.messages.len();
        let start = usize::try_from(start_index).unwrap_or(usize::MAX).min(len);
        let end = start.saturating_add(usize::try_from(count).unwrap_or(usize::MAX)).min(len);
        self.messages[start..end].iter().cloned().collect()
    }

    /// Ids of every message posted by `author`, ascending.
    pub fn get_user_messages(&self, author: &Address) -> Vec<MessageId> {
        self.messages
            .iter()
            .filter(|m| m.author == *author)
            .map(|m| m.id)
            .collect()
    }

    fn message_mut(&mut self, message_id: MessageId) -> Option<&mut Message> {
        message_index(message_id).and_then(|i| self.messages.get_mut(i))
    }
}

fn message_index(message_id: MessageId) -> Option<usize> {
    message_id
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
}
