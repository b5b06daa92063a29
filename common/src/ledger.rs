//! Transaction execution for a single-node development chain.
//!
//! Every accepted transaction is mined into its own block. Reverted calls are
//! still included and get a receipt; only transactions with a bad signature or
//! a hash already seen are refused outright.

use std::collections::{BTreeMap, HashMap};

use crate::address::{Address, TxHash};
use crate::board::{BoardEvent, MessageBoardState};
use crate::transaction::{LoggedEvent, SignedTx, TxCall, TxReceipt, TxStatus};

/// Reasons a transaction is not included at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("invalid transaction signature")]
    BadSignature,
    #[error("transaction {0} already submitted")]
    Duplicate(TxHash),
}

#[derive(Debug)]
pub struct Ledger {
    chain_id: u64,
    block_number: u64,
    boards: BTreeMap<Address, MessageBoardState>,
    receipts: HashMap<TxHash, TxReceipt>,
    events: Vec<LoggedEvent>,
}

impl Ledger {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            block_number: 0,
            boards: BTreeMap::new(),
            receipts: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn board(&self, address: &Address) -> Option<&MessageBoardState> {
        self.boards.get(address)
    }

    pub fn receipt(&self, tx_hash: &TxHash) -> Option<&TxReceipt> {
        self.receipts.get(tx_hash)
    }

    /// Events emitted by `board` in blocks at or after `from_block`.
    pub fn events(&self, board: &Address, from_block: u64) -> Vec<LoggedEvent> {
        self.events
            .iter()
            .filter(|e| e.board == *board && e.block_number >= from_block)
            .cloned()
            .collect()
    }

    /// Verify, execute and mine `tx` at `timestamp` (seconds since the epoch).
    pub fn submit(&mut self, tx: &SignedTx, timestamp: u64) -> Result<TxReceipt, SubmitError> {
        if !tx.verify_signature() {
            return Err(SubmitError::BadSignature);
        }
        let tx_hash = tx.hash();
        if self.receipts.contains_key(&tx_hash) {
            return Err(SubmitError::Duplicate(tx_hash));
        }

        self.block_number += 1;
        let from = tx.sender();
        let block_number = self.block_number;

        let receipt = match self.execute(from, tx, timestamp) {
            Ok((contract_address, emitted)) => {
                let logs: Vec<LoggedEvent> = emitted
                    .into_iter()
                    .map(|(board, event)| LoggedEvent {
                        board,
                        block_number,
                        tx_hash,
                        event,
                    })
                    .collect();
                self.events.extend(logs.iter().cloned());
                TxReceipt {
                    tx_hash,
                    from,
                    status: TxStatus::Success,
                    block_number,
                    block_timestamp: timestamp,
                    contract_address,
                    logs,
                    revert_reason: None,
                }
            }
            Err(reason) => TxReceipt {
                tx_hash,
                from,
                status: TxStatus::Reverted,
                block_number,
                block_timestamp: timestamp,
                contract_address: None,
                logs: Vec::new(),
                revert_reason: Some(reason),
            },
        };

        self.receipts.insert(tx_hash, receipt.clone());
        Ok(receipt)
    }

    #[allow(clippy::type_complexity)]
    fn execute(
        &mut self,
        from: Address,
        tx: &SignedTx,
        timestamp: u64,
    ) -> Result<(Option<Address>, Vec<(Address, BoardEvent)>), String> {
        match &tx.call {
            TxCall::DeployBoard => {
                let address = Address::for_deployment(&from, tx.nonce);
                if self.boards.contains_key(&address) {
                    return Err(format!("address {address} already in use"));
                }
                self.boards.insert(address, MessageBoardState::new());
                Ok((Some(address), Vec::new()))
            }
            TxCall::PostMessage { board, content } => {
                let event = self
                    .board_mut(board)?
                    .post_message(from, content, timestamp)
                    .map_err(|e| e.to_string())?;
                Ok((None, vec![(*board, event)]))
            }
            TxCall::PostEncryptedMessage {
                board,
                encrypted_content,
            } => {
                let event = self
                    .board_mut(board)?
                    .post_encrypted_message(from, encrypted_content, timestamp)
                    .map_err(|e| e.to_string())?;
                Ok((None, vec![(*board, event)]))
            }
            TxCall::RateMessage {
                board,
                message_id,
                encrypted_rating,
                input_proof,
            } => {
                let event = self
                    .board_mut(board)?
                    .rate_message(board, from, *message_id, encrypted_rating, input_proof)
                    .map_err(|e| e.to_string())?;
                Ok((None, vec![(*board, event)]))
            }
        }
    }

    fn board_mut(&mut self, board: &Address) -> Result<&mut MessageBoardState, String> {
        self.boards
            .get_mut(board)
            .ok_or_else(|| format!("no board deployed at {board}"))
    }
}
