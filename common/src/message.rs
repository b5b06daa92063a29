use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::ciphertext::CiphertextHandle;

/// Identifier assigned by the board contract, starting at 1.
pub type MessageId = u64;

/// A message posted to the board.
///
/// Everything except `encrypted_rating` is fixed once the post is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub author: Address,
    pub content: String,
    /// Seconds since the Unix epoch, taken from the block that included the post.
    pub timestamp: u64,
    pub is_encrypted: bool,
    pub encrypted_rating: CiphertextHandle,
}

impl Message {
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

/// Page of messages in the contract's column layout: six parallel arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageColumns {
    pub ids: Vec<MessageId>,
    pub authors: Vec<Address>,
    pub contents: Vec<String>,
    pub timestamps: Vec<u64>,
    pub is_encrypted: Vec<bool>,
    pub encrypted_ratings: Vec<CiphertextHandle>,
}

/// The columns of a page did not all have the same length.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("ragged message page: {ids} ids but column lengths {others:?}")]
pub struct RaggedColumns {
    pub ids: usize,
    pub others: [usize; 5],
}

impl MessageColumns {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn push(&mut self, message: Message) {
        self.ids.push(message.id);
        self.authors.push(message.author);
        self.contents.push(message.content);
        self.timestamps.push(message.timestamp);
        self.is_encrypted.push(message.is_encrypted);
        self.encrypted_ratings.push(message.encrypted_rating);
    }

    /// Zip the columns back into messages, rejecting pages whose columns disagree.
    pub fn into_messages(self) -> Result<Vec<Message>, RaggedColumns> {
        let n = self.ids.len();
        let others = [
            self.authors.len(),
            self.contents.len(),
            self.timestamps.len(),
            self.is_encrypted.len(),
            self.encrypted_ratings.len(),
        ];
        if others.iter().any(|&len| len != n) {
            return Err(RaggedColumns { ids: n, others });
        }

        Ok(self
            .ids
            .into_iter()
            .zip(self.authors)
            .zip(self.contents)
            .zip(self.timestamps)
            .zip(self.is_encrypted)
            .zip(self.encrypted_ratings)
            .map(
                |(((((id, author), content), timestamp), is_encrypted), encrypted_rating)| Message {
                    id,
                    author,
                    content,
                    timestamp,
                    is_encrypted,
                    encrypted_rating,
                },
            )
            .collect())
    }
}

impl FromIterator<Message> for MessageColumns {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        let mut columns = MessageColumns::default();
        for message in iter {
            columns.push(message);
        }
        columns
    }
}
