pub mod address;
pub mod api;
pub mod board;
pub mod chain;
pub mod ciphertext;
pub mod deployments;
pub mod encrypted_input;
pub mod ledger;
pub mod message;
pub mod transaction;

/// Chain id reported by the local development node.
pub const LOCAL_CHAIN_ID: u64 = 31337;
