//! Message board development node.
//!
//! Runs an in-memory chain that mines every accepted transaction into its own
//! block. State is lost on exit.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use board_common::LOCAL_CHAIN_ID;
use board_node::NodeState;

#[derive(Parser)]
#[command(name = "board-node", about = "Message board development node")]
struct Cli {
    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// HTTP port to listen on.
    #[arg(long, env = "BOARD_NODE_PORT", default_value_t = 8545)]
    port: u16,

    /// Chain id reported to clients and used to key deployment records.
    #[arg(long, env = "BOARD_CHAIN_ID", default_value_t = LOCAL_CHAIN_ID)]
    chain_id: u64,

    #[arg(long, default_value = "localhost")]
    chain_name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,board_node=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;

    let state = Arc::new(NodeState::new(cli.chain_id, cli.chain_name.clone()));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, chain_id = cli.chain_id, chain_name = %cli.chain_name, "Board node listening");
    board_node::serve(listener, state)
        .await
        .context("server failed")
}
