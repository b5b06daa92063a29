//! End-to-end fixtures: a development node served from this process on an
//! ephemeral port, and HTTP-backed stores pointed at it.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use board_client::http::{HttpBoardClient, HttpSigner};
use board_client::{BoardStore, StoreConfig};
use board_common::address::Address;
use board_common::deployments::BoardInfo;
use board_common::encrypted_input::DevInputBuilder;
use board_common::transaction::dev_signing_key;
use board_common::LOCAL_CHAIN_ID;
use board_node::NodeState;

pub type HttpStore = BoardStore<HttpBoardClient, HttpSigner, DevInputBuilder>;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A running node. The server task is aborted on drop.
pub struct TestNode {
    base_url: String,
    task: JoinHandle<()>,
}

impl TestNode {
    pub async fn start() -> Self {
        tracing_subscriber::fmt::try_init().ok();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test node");
        let addr = listener.local_addr().expect("bound listener has an address");
        let state = Arc::new(NodeState::new(LOCAL_CHAIN_ID, "localhost"));
        let task = tokio::spawn(async move {
            if let Err(e) = board_node::serve(listener, state).await {
                tracing::error!(error = %e, "Test node stopped");
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            task,
        }
    }

    pub fn url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> HttpBoardClient {
        HttpBoardClient::new(self.base_url.clone())
    }

    /// Signer for development account `account`.
    pub fn signer(&self, account: u32) -> HttpSigner {
        HttpSigner::new(self.client(), dev_signing_key(account)).with_poll_interval(POLL_INTERVAL)
    }

    pub fn address_of(account: u32) -> Address {
        Address::from_verifying_key(&dev_signing_key(account).verifying_key())
    }

    pub async fn deploy_board(&self) -> Address {
        let (address, _) = self
            .signer(0)
            .deploy_board()
            .await
            .unwrap_or_else(|e| panic!("Failed to deploy board: {e}"));
        address
    }

    /// A fully connected store for `account` on `board`.
    pub fn store(&self, board: Address, account: u32) -> HttpStore {
        self.store_with(BoardInfo::at(board, LOCAL_CHAIN_ID), account, StoreConfig::default())
    }

    pub fn store_with(&self, board: BoardInfo, account: u32, config: StoreConfig) -> HttpStore {
        BoardStore::new(board, config)
            .with_reader(self.client())
            .with_signer(self.signer(account))
            .with_encryptor(DevInputBuilder::new())
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        self.task.abort();
    }
}
