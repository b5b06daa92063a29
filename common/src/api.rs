//! JSON bodies exchanged between board clients and a node.

use serde::{Deserialize, Serialize};

use crate::address::TxHash;
use crate::message::MessageId;

/// Largest page a single messages read may request.
pub const MAX_PAGE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub chain_name: String,
    pub block_number: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub chain_id: u64,
    pub block_number: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProtocolIdResponse {
    pub protocol_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessagesResponse {
    pub ids: Vec<MessageId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MessagesQuery {
    #[serde(default)]
    pub start: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub from_block: u64,
}
