//! Capabilities the board client consumes: reading board state, submitting
//! signed transactions and building encrypted inputs.
//!
//! Implementations live elsewhere (HTTP against a node, in-process for tests
//! and offline use, the dev input builder).

use serde::{Deserialize, Serialize};

use crate::address::{Address, TxHash};
use crate::ciphertext::{BitWidth, CiphertextHandle, EncryptedInput, InputProof};
use crate::message::{MessageColumns, MessageId, RaggedColumns};
use crate::transaction::TxReceipt;

/// Errors from remote board operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or answered with garbage.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node understood the request and refused it.
    #[error("rejected by node: {0}")]
    Rejected(String),
    /// The transaction was included but reverted.
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: String, reason: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("timed out after {0} ms")]
    Timeout(u64),
}

impl From<RaggedColumns> for ChainError {
    fn from(err: RaggedColumns) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// A submitted transaction awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    pub tx_hash: TxHash,
}

/// Read-only calls against a deployed board.
#[allow(async_fn_in_trait)]
pub trait BoardReader {
    async fn message_count(&self, board: &Address) -> Result<u64, ChainError>;

    /// At most `count` messages from zero-based `start_index`, ascending by id.
    async fn messages(
        &self,
        board: &Address,
        start_index: u64,
        count: u64,
    ) -> Result<MessageColumns, ChainError>;
}

/// State-changing calls, signed by the account this writer holds.
#[allow(async_fn_in_trait)]
pub trait BoardWriter {
    /// Address of the signing account.
    fn address(&self) -> Address;

    async fn post_message(&self, board: &Address, content: &str) -> Result<PendingTx, ChainError>;

    async fn post_encrypted_message(
        &self,
        board: &Address,
        encrypted_content: &str,
    ) -> Result<PendingTx, ChainError>;

    async fn rate_message(
        &self,
        board: &Address,
        message_id: MessageId,
        encrypted_rating: &CiphertextHandle,
        input_proof: &InputProof,
    ) -> Result<PendingTx, ChainError>;

    /// Wait until `tx` is included and return its receipt, whatever its status.
    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError>;

    /// Wait for inclusion and turn a reverted receipt into an error.
    async fn confirm(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        let receipt = self.wait_for_receipt(tx).await?;
        if receipt.succeeded() {
            Ok(receipt)
        } else {
            Err(ChainError::Reverted {
                tx_hash: receipt.tx_hash.to_string(),
                reason: receipt
                    .revert_reason
                    .unwrap_or_else(|| "unknown reason".to_string()),
            })
        }
    }
}

/// Produces ciphertext handles plus proof for plaintext values, scoped to the
/// contract that will consume them and the user submitting them.
#[allow(async_fn_in_trait)]
pub trait EncryptedInputBuilder {
    async fn encrypt(
        &self,
        contract: &Address,
        user: &Address,
        value: u64,
        width: BitWidth,
    ) -> Result<EncryptedInput, ChainError>;
}
