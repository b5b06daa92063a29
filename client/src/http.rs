//! Board capabilities over a node's HTTP API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ed25519_dalek::SigningKey;
use serde::de::DeserializeOwned;
use serde::Serialize;

use board_common::address::{Address, TxHash};
use board_common::api::{
    ChainInfo, CountResponse, ErrorResponse, HealthResponse, ProtocolIdResponse, SubmitResponse,
    UserMessagesResponse,
};
use board_common::chain::{BoardReader, BoardWriter, ChainError, PendingTx};
use board_common::ciphertext::{CiphertextHandle, InputProof};
use board_common::message::{Message, MessageColumns, MessageId};
use board_common::transaction::{LoggedEvent, SignedTx, TxCall, TxReceipt};

/// Read access to a node.
#[derive(Debug, Clone)]
pub struct HttpBoardClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBoardClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ChainError> {
        let status = response.status();
        if !status.is_success() {
            let error = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(ChainError::Rejected(error));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ChainError::Malformed(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChainError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ChainError> {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "POST");
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Self::decode(response).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ChainError> {
        self.get("/health").await
    }

    pub async fn chain_info(&self) -> Result<ChainInfo, ChainError> {
        self.get("/v1/chain").await
    }

    pub async fn message(&self, board: &Address, message_id: MessageId) -> Result<Message, ChainError> {
        self.get(&format!("/v1/boards/{board}/messages/{message_id}"))
            .await
    }

    pub async fn user_messages(
        &self,
        board: &Address,
        author: &Address,
    ) -> Result<Vec<MessageId>, ChainError> {
        let response: UserMessagesResponse = self
            .get(&format!("/v1/boards/{board}/users/{author}/messages"))
            .await?;
        Ok(response.ids)
    }

    pub async fn protocol_id(&self, board: &Address) -> Result<u64, ChainError> {
        let response: ProtocolIdResponse = self
            .get(&format!("/v1/boards/{board}/protocol-id"))
            .await?;
        Ok(response.protocol_id)
    }

    pub async fn events(&self, board: &Address, from_block: u64) -> Result<Vec<LoggedEvent>, ChainError> {
        self.get(&format!("/v1/boards/{board}/events?from_block={from_block}"))
            .await
    }

    pub async fn submit(&self, tx: &SignedTx) -> Result<PendingTx, ChainError> {
        let response: SubmitResponse = self.post("/v1/tx", tx).await?;
        Ok(PendingTx {
            tx_hash: response.tx_hash,
        })
    }

    /// The receipt for `tx_hash`, or `None` while it is not yet included.
    pub async fn receipt(&self, tx_hash: &TxHash) -> Result<Option<TxReceipt>, ChainError> {
        let url = format!("{}/v1/tx/{tx_hash}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(response).await.map(Some)
    }
}

impl BoardReader for HttpBoardClient {
    async fn message_count(&self, board: &Address) -> Result<u64, ChainError> {
        let response: CountResponse = self.get(&format!("/v1/boards/{board}/count")).await?;
        Ok(response.count)
    }

    async fn messages(
        &self,
        board: &Address,
        start_index: u64,
        count: u64,
    ) -> Result<MessageColumns, ChainError> {
        self.get(&format!(
            "/v1/boards/{board}/messages?start={start_index}&count={count}"
        ))
        .await
    }
}

/// A node client plus the key that signs this account's transactions.
#[derive(Debug)]
pub struct HttpSigner {
    client: HttpBoardClient,
    key: SigningKey,
    nonce: AtomicU64,
    poll_interval: Duration,
}

impl HttpSigner {
    pub fn new(client: HttpBoardClient, key: SigningKey) -> Self {
        let seed = chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .unsigned_abs();
        Self {
            client,
            key,
            nonce: AtomicU64::new(seed),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn client(&self) -> &HttpBoardClient {
        &self.client
    }

    pub async fn send(&self, call: TxCall) -> Result<PendingTx, ChainError> {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let tx = SignedTx::sign(&self.key, nonce, call);
        tracing::debug!(method = tx.call.method(), hash = %tx.hash(), "Submitting transaction");
        self.client.submit(&tx).await
    }

    /// Deploy a new board and return its address once confirmed.
    pub async fn deploy_board(&self) -> Result<(Address, TxReceipt), ChainError> {
        let pending = self.send(TxCall::DeployBoard).await?;
        let receipt = self.confirm(&pending).await?;
        let address = receipt
            .contract_address
            .ok_or_else(|| ChainError::Malformed("deploy receipt has no contract address".into()))?;
        Ok((address, receipt))
    }
}

impl BoardWriter for HttpSigner {
    fn address(&self) -> Address {
        Address::from_verifying_key(&self.key.verifying_key())
    }

    async fn post_message(&self, board: &Address, content: &str) -> Result<PendingTx, ChainError> {
        self.send(TxCall::PostMessage {
            board: *board,
            content: content.to_string(),
        })
        .await
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
        .await
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
        .await
    }

    async fn wait_for_receipt(&self, tx: &PendingTx) -> Result<TxReceipt, ChainError> {
        loop {
            if let Some(receipt) = self.client.receipt(&tx.tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
