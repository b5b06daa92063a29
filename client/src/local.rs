//! In-process chain for offline use and tests.
//!
//! Wraps the same [`Ledger`] a development node runs, so transactions execute
//! and revert exactly as they would remotely, just without the network hop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ed25519_dalek::SigningKey;

use board_common::address::Address;
use board_common::chain::{BoardReader, BoardWriter, ChainError, PendingTx};
use board_common::ciphertext::{CiphertextHandle, InputProof};
use board_common::ledger::Ledger;
use board_common::message::{MessageColumns, MessageId};
use board_common::transaction::{SignedTx, TxCall, TxReceipt};

#[derive(Debug, Clone)]
pub struct LocalChain {
    ledger: Arc<Mutex<Ledger>>,
    nonces: Arc<AtomicU64>,
}

impl LocalChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(chain_id))),
            nonces: Arc::new(AtomicU64::new(0)),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn chain_id(&self) -> u64 {
        self.ledger().chain_id()
    }

    pub fn block_number(&self) -> u64 {
        self.ledger().block_number()
    }

    /// Execute `tx` immediately, stamping it with the current wall-clock time.
    pub fn submit(&self, tx: &SignedTx) -> Result<PendingTx, ChainError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let receipt = self
            .ledger()
            .submit(tx, now)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        Ok(PendingTx {
            tx_hash: receipt.tx_hash,
        })
    }

    pub fn signer(&self, key: SigningKey) -> LocalSigner {
        LocalSigner {
            chain: self.clone(),
            key,
        }
    }
}

impl BoardReader for LocalChain {
    async fn message_count(&self, board: &Address) -> Result<u64, ChainError> {
        self.ledger()
            .board(board)
            .map(|b| b.message_count())
            .ok_or_else(|| ChainError::Rejected(format!("no board deployed at {board}")))
    }

    async fn messages(
        &self,
        board: &Address,
        start_index: u64,
        count: u64,
    ) -> Result<MessageColumns, ChainError> {
        self.ledger()
            .board(board)
            .map(|b| b.get_messages(start_index, count))
            .ok_or_else(|| ChainError::Rejected(format!("no board deployed at {board}")))
    }
}

/// Signs for one account against a [`LocalChain`].
#[derive(Debug)]
pub struct LocalSigner {
    chain: LocalChain,
    key: SigningKey,
}

impl LocalSigner {
    pub fn send(&self, call: TxCall) -> Result<PendingTx, ChainError> {
        // Shared across signers so two handles on one key never collide.
        let nonce = self.chain.nonces.fetch_add(1, Ordering::Relaxed);
        self.chain.submit(&SignedTx::sign(&self.key, nonce, call))
    }

    pub async fn deploy_board(&self) -> Result<Address, ChainError> {
        let pending = self.send(TxCall::DeployBoard)?;
        let receipt = self.confirm(&pending).await?;
        receipt
            .contract_address
            .ok_or_else(|| ChainError::Malformed("deploy receipt has no contract address".into()))
    }
}

impl BoardWriter for LocalSigner {
    fn address(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    async fn post_message(&self, board: &Address, content: &str) -> Result<PendingTx, ChainError> {
        self.send(TxCall::PostMessage {
            board: *board,
            content: content.to_string(),
        })
    }

    async fn post_encrypted_message(
        &self,
        board: &Address,
        encrypted_content: &str,
    ) -> Result<PendingTx, ChainError> {
        self.send(TxCall::PostEncryptedMessage {
            board: *board,
            encrypted_content: encrypted_content.to_string(),
        })
    }

    async fn rate_message(
        &self,
        board: &Address,
        message_id: MessageId,
        encrypted_rating: &CiphertextHandle,
        input_proof: &InputProof,
    ) -> Result<PendingTx, ChainError> {
        self.send(TxCall::RateMessage {
            board: *board,
            message_id,
            encrypted_rating: *encrypted_rating,
            input_proof: input_proof.clone(),
        })
    }

    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        self.chain
            .ledger()
            .receipt(&tx.tx_hash)
            .cloned()
            .ok_or_else(|| ChainError::Rejected(format!("unknown transaction {}", tx.tx_hash)))
    }
}
