use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{decode_fixed, decode_prefixed, hex_serde, Address, AddressError};

/// Opaque reference to an encrypted value held by the encryption subsystem.
///
/// The board never interprets a handle: it only compares and forwards it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CiphertextHandle(pub [u8; 32]);

impl CiphertextHandle {
    /// Handle of an uninitialized encrypted value.
    pub const ZERO: CiphertextHandle = CiphertextHandle([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Handle for the result of combining `self` with `other` (the encrypted sum
    /// of two ratings as far as the board is concerned).
    pub fn combine(&self, other: &CiphertextHandle) -> CiphertextHandle {
        let mut hasher = Sha256::new();
        hasher.update(b"message-board/add");
        hasher.update(self.0);
        hasher.update(other.0);
        CiphertextHandle(hasher.finalize().into())
    }
}

impl fmt::Display for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CiphertextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CiphertextHandle({self})")
    }
}

impl FromStr for CiphertextHandle {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s).map(CiphertextHandle)
    }
}

/// Byte string proving a ciphertext is well formed for a (contract, user) pair.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct InputProof(pub Vec<u8>);

impl fmt::Display for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for InputProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InputProof({} bytes)", self.0.len())
    }
}

impl FromStr for InputProof {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_prefixed(s).map(InputProof)
    }
}

hex_serde!(CiphertextHandle);
hex_serde!(InputProof);

/// Bit width of the plaintext an encrypted input carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitWidth {
    U8,
    U16,
    U32,
    U64,
}

impl BitWidth {
    pub fn bits(self) -> u32 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 => 32,
            Self::U64 => 64,
        }
    }

    /// Whether `value` is representable at this width.
    pub fn fits(self, value: u64) -> bool {
        self == Self::U64 || value < (1u64 << self.bits())
    }
}

/// Output of an encrypted-input builder: one handle per added value plus a
/// single proof covering all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handles: Vec<CiphertextHandle>,
    pub input_proof: InputProof,
}

const PROOF_DOMAIN: &[u8] = b"message-board/input-proof";

/// Proof bytes binding `handle` to the contract and user it was created for.
pub fn input_proof_for(contract: &Address, user: &Address, handle: &CiphertextHandle) -> InputProof {
    let mut hasher = Sha256::new();
    hasher.update(PROOF_DOMAIN);
    hasher.update(contract.0);
    hasher.update(user.0);
    hasher.update(handle.0);
    let mut proof = Vec::with_capacity(1 + 32 + 32);
    proof.push(1u8); // number of handles covered
    proof.extend_from_slice(&handle.0);
    proof.extend_from_slice(&hasher.finalize());
    InputProof(proof)
}

/// Check that `proof` was produced for `handle` under (`contract`, `user`).
pub fn verify_input_proof(
    contract: &Address,
    user: &Address,
    handle: &CiphertextHandle,
    proof: &InputProof,
) -> bool {
    *proof == input_proof_for(contract, user, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_binds_contract_and_user() {
        let contract = Address([1u8; 20]);
        let user = Address([2u8; 20]);
        let handle = CiphertextHandle([9u8; 32]);
        let proof = input_proof_for(&contract, &user, &handle);

        assert!(verify_input_proof(&contract, &user, &handle, &proof));
        assert!(!verify_input_proof(&Address([3u8; 20]), &user, &handle, &proof));
        assert!(!verify_input_proof(&contract, &Address([3u8; 20]), &handle, &proof));
        assert!(!verify_input_proof(
            &contract,
            &user,
            &CiphertextHandle([8u8; 32]),
            &proof
        ));
    }

    #[test]
    fn combine_is_order_sensitive_and_deterministic() {
        let a = CiphertextHandle([1u8; 32]);
        let b = CiphertextHandle([2u8; 32]);
        assert_eq!(a.combine(&b), a.combine(&b));
        assert_ne!(a.combine(&b), b.combine(&a));
        assert!(!CiphertextHandle::ZERO.combine(&a).is_zero());
    }

    #[test]
    fn handles_and_proofs_accept_either_prefix_case() {
        let lower = format!("0x{}", "ab".repeat(32));
        let upper = format!("0X{}", "ab".repeat(32));
        let a: CiphertextHandle = lower.parse().unwrap();
        let b: CiphertextHandle = upper.parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a, CiphertextHandle([0xab; 32]));
        assert_eq!(
            "0x00ff".parse::<CiphertextHandle>(),
            Err(AddressError::WrongLength {
                expected: 32,
                actual: 2
            })
        );
        assert_eq!("abab".parse::<CiphertextHandle>(), Err(AddressError::MissingPrefix));

        let proof: InputProof = "0X0102".parse().unwrap();
        assert_eq!(proof, InputProof(vec![1, 2]));
        assert_eq!("0102".parse::<InputProof>(), Err(AddressError::MissingPrefix));
    }

    #[test]
    fn bit_width_bounds() {
        assert!(BitWidth::U8.fits(255));
        assert!(!BitWidth::U8.fits(256));
        assert!(BitWidth::U32.fits(5));
        assert!(BitWidth::U64.fits(u64::MAX));
    }

    #[test]
    fn handle_and_proof_serialize_as_hex() {
        let input = EncryptedInput {
            handles: vec![CiphertextHandle([0xab; 32])],
            input_proof: InputProof(vec![1, 2, 3]),
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["input_proof"], "0x010203");
        assert!(json["handles"][0].as_str().unwrap().starts_with("0xabab"));
        let back: EncryptedInput = serde_json::from_value(json).unwrap();
        assert_eq!(back, input);
    }
}
