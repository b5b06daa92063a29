//! Development encrypted-input builder.
//!
//! Handles are SHA-256 commitments to the plaintext, so nothing is hidden from
//! anyone who can guess the value. The proofs it produces are the ones the
//! board contract checks, which is all the board needs to exercise its flow.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::chain::{ChainError, EncryptedInputBuilder};
use crate::ciphertext::{input_proof_for, BitWidth, CiphertextHandle, EncryptedInput};

/// Mock encryption for local nodes and tests.
#[derive(Debug, Default)]
pub struct DevInputBuilder {
    counter: AtomicU64,
}

impl DevInputBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EncryptedInputBuilder for DevInputBuilder {
    async fn encrypt(
        &self,
        contract: &Address,
        user: &Address,
        value: u64,
        width: BitWidth,
    ) -> Result<EncryptedInput, ChainError> {
        if !width.fits(value) {
            return Err(ChainError::Encryption(format!(
                "{value} does not fit in {} bits",
                width.bits()
            )));
        }
        let nonce = self.counter.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(b"message-board/dev-ciphertext");
        hasher.update(contract.0);
        hasher.update(user.0);
        hasher.update([width.bits() as u8]);
        hasher.update(value.to_be_bytes());
        hasher.update(nonce.to_be_bytes());
        let handle = CiphertextHandle(hasher.finalize().into());

        Ok(EncryptedInput {
            handles: vec![handle],
            input_proof: input_proof_for(contract, user, &handle),
        })
    }
}
