//! Command-line tasks for a message board: deploy it, then post, list and
//! rate messages against a running node.
//!
//! ```text
//! board-node &
//! board deploy
//! board post --content "Hello board!"
//! board messages --count 10
//! board rate --id 1 --rating 5
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use board_client::http::{HttpBoardClient, HttpSigner};
use board_client::store::RATING_RANGE;
use board_client::{BoardStore, Outcome, StoreConfig};
use board_common::address::Address;
use board_common::chain::{BoardReader, ChainError};
use board_common::deployments::{BoardInfo, DeploymentEntry, Deployments};
use board_common::encrypted_input::DevInputBuilder;
use board_common::message::{Message, MessageId};
use board_common::transaction::dev_signing_key;

type HttpStore = BoardStore<HttpBoardClient, HttpSigner, DevInputBuilder>;

#[derive(Debug, Parser)]
#[command(name = "board", about = "Message board tasks", version)]
struct Cli {
    /// Base URL of the node to talk to.
    #[arg(long, global = true, env = "BOARD_NODE_URL", default_value = "http://127.0.0.1:8545")]
    node_url: String,

    /// Deployments file (default: <config dir>/message-board/deployments.json).
    #[arg(long, global = true, env = "BOARD_DEPLOYMENTS")]
    deployments: Option<PathBuf>,

    /// Hex-encoded 32-byte signing key. Takes precedence over --account.
    #[arg(long, global = true, env = "BOARD_KEY", hide_env_values = true)]
    key: Option<String>,

    /// Development account index used when no key is given.
    #[arg(long, global = true, default_value_t = 0)]
    account: u32,

    /// Board address, overriding the recorded deployment.
    #[arg(long, global = true)]
    address: Option<Address>,

    /// JSON file with store tuning (page size, resync count, timeouts in ms).
    #[arg(long, global = true)]
    store_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a fresh signing key
    NewAccount,

    /// Deploy a new board and record it for the node's chain
    Deploy,

    /// Print the board address
    Address,

    /// Print the total number of messages
    Count,

    /// Post a message
    Post {
        /// The message content to post
        #[arg(long)]
        content: String,
        /// Mark the message as encrypted
        #[arg(long)]
        encrypted: bool,
    },

    /// List messages by zero-based index
    Messages {
        /// Number of messages to retrieve
        #[arg(long)]
        count: u64,
        /// Start index
        #[arg(long, default_value_t = 0)]
        start: u64,
    },

    /// Show a single message
    Message {
        #[arg(long)]
        id: MessageId,
    },

    /// List ids of messages posted by an author (default: the signing account)
    UserMessages {
        #[arg(long)]
        author: Option<Address>,
    },

    /// Rate a message from 1 to 5 with an encrypted rating
    Rate {
        #[arg(long)]
        id: MessageId,
        #[arg(long)]
        rating: u32,
    },

    /// Print events emitted by the board
    Events {
        #[arg(long, default_value_t = 0)]
        from_block: u64,
    },
}

fn default_deployments_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("message-board")
        .join("deployments.json")
}

fn parse_key(s: &str) -> anyhow::Result<SigningKey> {
    let digits = s.trim();
    let digits = digits.strip_prefix("0x").unwrap_or(digits);
    let bytes = hex::decode(digits).context("signing key is not valid hex")?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("signing key must be 32 bytes, got {}", bytes.len()))?;
    Ok(SigningKey::from_bytes(&seed))
}

fn validate_content(content: &str) -> anyhow::Result<()> {
    if content.trim().is_empty() {
        bail!("Content cannot be empty");
    }
    Ok(())
}

fn validate_count(count: u64) -> anyhow::Result<()> {
    if count == 0 {
        bail!("Count must be a positive integer");
    }
    Ok(())
}

fn validate_message_id(id: MessageId) -> anyhow::Result<()> {
    if id == 0 {
        bail!("Message ID must be a positive integer");
    }
    Ok(())
}

fn validate_rating(rating: u32) -> anyhow::Result<()> {
    if !RATING_RANGE.contains(&rating) {
        bail!("Rating must be an integer between 1 and 5");
    }
    Ok(())
}

fn load_store_config(path: Option<&Path>) -> anyhow::Result<StoreConfig> {
    let Some(path) = path else {
        return Ok(StoreConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read store config {}", path.display()))?;
    let config: StoreConfig = serde_json::from_str(&raw)
        .with_context(|| format!("invalid store config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid store config {}", path.display()))?;
    Ok(config)
}

/// Turn a store outcome into a CLI result, using the store's status text as
/// the error message.
fn finish(outcome: Outcome, status: String) -> anyhow::Result<()> {
    match outcome {
        Outcome::Completed => Ok(()),
        Outcome::Skipped if status.is_empty() => bail!("nothing was done"),
        _ => bail!(status),
    }
}

fn print_message(message: &Message) {
    println!("\n--- Message #{} ---", message.id);
    println!("Author: {}", message.author);
    println!("Content: {}", message.content);
    match message.posted_at() {
        Some(at) => println!("Timestamp: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("Timestamp: {}", message.timestamp),
    }
    println!("Encrypted: {}", message.is_encrypted);
    println!("Encrypted Rating: {}", message.encrypted_rating);
}

impl Cli {
    fn deployments_path(&self) -> PathBuf {
        self.deployments
            .clone()
            .unwrap_or_else(default_deployments_path)
    }

    fn signing_key(&self) -> anyhow::Result<SigningKey> {
        match &self.key {
            Some(key) => parse_key(key),
            None => Ok(dev_signing_key(self.account)),
        }
    }

    /// Locate the board on the node's chain, from `--address` or the
    /// deployments file.
    async fn board(&self, client: &HttpBoardClient) -> anyhow::Result<BoardInfo> {
        let chain = client
            .chain_info()
            .await
            .with_context(|| format!("failed to reach node at {}", client.base_url()))?;
        if let Some(address) = self.address {
            return Ok(BoardInfo::at(address, chain.chain_id));
        }
        let deployments = Deployments::load_or_default(&self.deployments_path())?;
        let board = deployments.board_for_chain(Some(chain.chain_id));
        if !board.is_deployed() {
            bail!(
                "MessageBoard deployment not found for chainId={}. Run `board deploy` first.",
                chain.chain_id
            );
        }
        Ok(board)
    }

    fn store(&self, client: &HttpBoardClient, board: BoardInfo) -> anyhow::Result<HttpStore> {
        let config = load_store_config(self.store_config.as_deref())?;
        let signer = HttpSigner::new(client.clone(), self.signing_key()?);
        Ok(BoardStore::new(board, config)
            .with_reader(client.clone())
            .with_signer(signer)
            .with_encryptor(DevInputBuilder::new()))
    }

    async fn run(&self) -> anyhow::Result<()> {
        let client = HttpBoardClient::new(&self.node_url);

        match &self.command {
            Command::NewAccount => {
                let key = SigningKey::generate(&mut OsRng);
                println!("Address: {}", Address::from_verifying_key(&key.verifying_key()));
                println!("Key: 0x{}", hex::encode(key.to_bytes()));
            }

            Command::Deploy => {
                let chain = client
                    .chain_info()
                    .await
                    .with_context(|| format!("failed to reach node at {}", client.base_url()))?;
                let signer = HttpSigner::new(client.clone(), self.signing_key()?);
                let (address, receipt) = signer.deploy_board().await?;
                println!(
                    "MessageBoard deployed at {address} (tx {}, block {})",
                    receipt.tx_hash, receipt.block_number
                );

                let path = self.deployments_path();
                let mut deployments = Deployments::load_or_default(&path)?;
                deployments.record(DeploymentEntry {
                    address,
                    chain_id: chain.chain_id,
                    chain_name: chain.chain_name,
                });
                deployments.save(&path)?;
                tracing::info!(%address, chain_id = chain.chain_id, "Recorded deployment");
                println!("Recorded deployment in {}", path.display());
            }

            Command::Address => {
                let board = self.board(&client).await?;
                if let Some(address) = board.address {
                    println!("MessageBoard address is {address}");
                }
            }

            Command::Count => {
                let address = self.board_address(&client).await?;
                let count = client.message_count(&address).await?;
                println!("Total messages: {count}");
            }

            Command::Post { content, encrypted } => {
                validate_content(content)?;
                let board = self.board(&client).await?;
                let store = self.store(&client, board)?;
                let outcome = store.post_message(content, *encrypted).await;
                finish(outcome, store.status_message())?;
                println!("Message posted successfully: \"{content}\"");
            }

            Command::Messages { count, start } => {
                validate_count(*count)?;
                let address = self.board_address(&client).await?;
                let messages = client
                    .messages(&address, *start, *count)
                    .await?
                    .into_messages()
                    .map_err(ChainError::from)?;
                println!(
                    "Retrieved {} messages starting from index {start}:",
                    messages.len()
                );
                messages.iter().for_each(print_message);
            }

            Command::Message { id } => {
                validate_message_id(*id)?;
                let address = self.board_address(&client).await?;
                let message = client.message(&address, *id).await?;
                print_message(&message);
            }

            Command::UserMessages { author } => {
                let author = match author {
                    Some(author) => *author,
                    None => Address::from_verifying_key(&self.signing_key()?.verifying_key()),
                };
                let address = self.board_address(&client).await?;
                let ids = client.user_messages(&address, &author).await?;
                println!("{author} has posted {} messages: {ids:?}", ids.len());
            }

            Command::Rate { id, rating } => {
                validate_message_id(*id)?;
                validate_rating(*rating)?;
                let board = self.board(&client).await?;
                let store = self.store(&client, board)?;
                let outcome = store.rate_message(*id, *rating).await;
                finish(outcome, store.status_message())?;
                println!("Message #{id} rated with {rating} stars successfully!");
            }

            Command::Events { from_block } => {
                let address = self.board_address(&client).await?;
                for event in client.events(&address, *from_block).await? {
                    println!("{}", serde_json::to_string(&event)?);
                }
            }
        }
        Ok(())
    }

    async fn board_address(&self, client: &HttpBoardClient) -> anyhow::Result<Address> {
        let board = self.board(client).await?;
        let address = board
            .address
            .ok_or_else(|| anyhow!("MessageBoard address unknown"))?;
        println!("MessageBoard: {address}");
        Ok(address)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Cli::parse().run().await
}
