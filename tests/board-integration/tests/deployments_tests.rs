//! Resolving a board through a deployments file written after deploying.

use board_client::{Outcome, StoreConfig};
use board_common::deployments::{DeploymentEntry, Deployments};

use board_integration::TestNode;

#[tokio::test]
async fn recorded_deployment_drives_a_store() {
    let node = TestNode::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("message-board").join("deployments.json");

    let chain = node.client().chain_info().await.unwrap();
    let (address, receipt) = node.signer(0).deploy_board().await.unwrap();
    assert_eq!(receipt.contract_address, Some(address));

    let mut deployments = Deployments::load_or_default(&path).unwrap();
    deployments.record(DeploymentEntry {
        address,
        chain_id: chain.chain_id,
        chain_name: chain.chain_name.clone(),
    });
    deployments.save(&path).unwrap();

    let reloaded = Deployments::load(&path).unwrap();
    let board = reloaded.board_for_chain(Some(chain.chain_id));
    assert!(board.is_deployed());
    assert_eq!(board.chain_name.as_deref(), Some("localhost"));

    let store = node.store_with(board, 1, StoreConfig::default());
    assert_eq!(store.status_message(), "");
    assert_eq!(store.post_message("from the registry", false).await, Outcome::Completed);
    assert_eq!(store.total_count(), 1);
}

#[tokio::test]
async fn missing_deployment_disables_the_store() {
    let node = TestNode::start().await;
    let dir = tempfile::tempdir().unwrap();
    let deployments = Deployments::load_or_default(&dir.path().join("deployments.json")).unwrap();

    let board = deployments.board_for_chain(Some(11155111));
    assert!(!board.is_deployed());

    let store = node.store_with(board, 1, StoreConfig::default());
    assert_eq!(
        store.status_message(),
        "MessageBoard deployment not found for chainId=11155111."
    );
    assert!(!store.can_load_messages());
    assert!(!store.can_post_message());
    assert_eq!(store.load_messages(0, 10).await, Outcome::Skipped);
    assert_eq!(store.post_message("nowhere to go", false).await, Outcome::Skipped);
    assert_eq!(store.rate_message(1, 3).await, Outcome::Skipped);
}
