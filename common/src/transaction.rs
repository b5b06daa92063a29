use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{Address, TxHash};
use crate::board::BoardEvent;
use crate::ciphertext::{CiphertextHandle, InputProof};
use crate::message::MessageId;

/// State-changing calls a node accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum TxCall {
    /// Deploy a fresh message board owned by nobody.
    DeployBoard,
    PostMessage {
        board: Address,
        content: String,
    },
    PostEncryptedMessage {
        board: Address,
        encrypted_content: String,
    },
    RateMessage {
        board: Address,
        message_id: MessageId,
        encrypted_rating: CiphertextHandle,
        input_proof: InputProof,
    },
}

impl TxCall {
    pub fn method(&self) -> &'static str {
        match self {
            Self::DeployBoard => "deploy_board",
            Self::PostMessage { .. } => "post_message",
            Self::PostEncryptedMessage { .. } => "post_encrypted_message",
            Self::RateMessage { .. } => "rate_message",
        }
    }
}

/// A call signed by the account submitting it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTx {
    pub signer: VerifyingKey,
    /// Sender-chosen value that makes otherwise identical calls distinct.
    pub nonce: u64,
    pub call: TxCall,
    pub signature: Signature,
}

#[derive(Serialize)]
struct SignableTx<'a> {
    signer: &'a VerifyingKey,
    nonce: u64,
    call: &'a TxCall,
}

impl SignedTx {
    pub fn sign(key: &SigningKey, nonce: u64, call: TxCall) -> Self {
        let signer = key.verifying_key();
        let bytes = signable_bytes(&signer, nonce, &call);
        let signature = key.sign(&bytes);
        Self {
            signer,
            nonce,
            call,
            signature,
        }
    }

    /// Serialize the signed fields (everything except the signature).
    pub fn signable_bytes(&self) -> Vec<u8> {
        signable_bytes(&self.signer, self.nonce, &self.call)
    }

    pub fn verify_signature(&self) -> bool {
        self.signer
            .verify(&self.signable_bytes(), &self.signature)
            .is_ok()
    }

    pub fn sender(&self) -> Address {
        Address::from_verifying_key(&self.signer)
    }

    pub fn hash(&self) -> TxHash {
        let mut hasher = Sha256::new();
        hasher.update(self.signable_bytes());
        hasher.update(self.signature.to_bytes());
        TxHash(hasher.finalize().into())
    }
}

fn signable_bytes(signer: &VerifyingKey, nonce: u64, call: &TxCall) -> Vec<u8> {
    let signable = SignableTx {
        signer,
        nonce,
        call,
    };
    serde_json::to_vec(&signable).expect("serialization should not fail")
}

/// Outcome of an included transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Reverted,
}

/// An event together with the board and block that emitted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub board: Address,
    pub block_number: u64,
    pub tx_hash: TxHash,
    #[serde(flatten)]
    pub event: BoardEvent,
}

/// Confirmation record for an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub from: Address,
    pub status: TxStatus,
    pub block_number: u64,
    pub block_timestamp: u64,
    /// Set for successful board deployments.
    pub contract_address: Option<Address>,
    pub logs: Vec<LoggedEvent>,
    pub revert_reason: Option<String>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == TxStatus::Success
    }
}

/// Deterministic development account keys, the same on every machine.
#[cfg(feature = "dev")]
pub fn dev_signing_key(index: u32) -> SigningKey {
    let seed: [u8; 32] = Sha256::digest(format!("message-board/dev-account/{index}")).into();
    SigningKey::from_bytes(&seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> SigningKey {
        SigningKey::from_bytes(&[byte; 32])
    }

    #[test]
    fn signed_tx_verifies_and_derives_sender() {
        let signing = key(1);
        let tx = SignedTx::sign(
            &signing,
            7,
            TxCall::PostMessage {
                board: Address([3u8; 20]),
                content: "hello".into(),
            },
        );
        assert!(tx.verify_signature());
        assert_eq!(tx.sender(), Address::from_verifying_key(&signing.verifying_key()));
    }

    #[test]
    fn tampered_call_fails_verification() {
        let mut tx = SignedTx::sign(
            &key(1),
            7,
            TxCall::PostMessage {
                board: Address([3u8; 20]),
                content: "hello".into(),
            },
        );
        tx.call = TxCall::PostMessage {
            board: Address([3u8; 20]),
            content: "goodbye".into(),
        };
        assert!(!tx.verify_signature());
    }

    #[test]
    fn nonce_changes_hash() {
        let a = SignedTx::sign(&key(1), 1, TxCall::DeployBoard);
        let b = SignedTx::sign(&key(1), 2, TxCall::DeployBoard);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }

    #[test]
    fn signed_tx_survives_json() {
        let tx = SignedTx::sign(
            &key(2),
            1,
            TxCall::RateMessage {
                board: Address([3u8; 20]),
                message_id: 4,
                encrypted_rating: CiphertextHandle([1u8; 32]),
                input_proof: InputProof(vec![1, 2, 3]),
            },
        );
        let json = serde_json::to_string(&tx).unwrap();
        let back: SignedTx = serde_json::from_str(&json).unwrap();
        assert!(back.verify_signature());
        assert_eq!(back.hash(), tx.hash());
        assert_eq!(back.call.method(), "rate_message");
    }
}
