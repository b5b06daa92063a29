//! The node's HTTP API exercised through the client types and raw requests.

use board_common::board::PROTOCOL_ID;
use board_common::chain::{BoardReader, BoardWriter, ChainError};
use board_common::transaction::{dev_signing_key, SignedTx, TxCall, TxStatus};
use board_common::LOCAL_CHAIN_ID;

use board_integration::TestNode;

#[tokio::test]
async fn health_and_chain_info() {
    let node = TestNode::start().await;
    let client = node.client();

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.chain_id, LOCAL_CHAIN_ID);
    assert_eq!(health.block_number, 0);

    node.deploy_board().await;
    let chain = client.chain_info().await.unwrap();
    assert_eq!(chain.chain_name, "localhost");
    assert_eq!(chain.block_number, 1);
}

#[tokio::test]
async fn board_reads_after_posts() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let client = node.client();

    let alice = node.signer(1);
    let bob = node.signer(2);
    for (signer, text) in [(&alice, "one"), (&bob, "two"), (&alice, "three")] {
        let pending = signer.post_message(&board, text).await.unwrap();
        signer.confirm(&pending).await.unwrap();
    }

    assert_eq!(client.message_count(&board).await.unwrap(), 3);
    assert_eq!(client.protocol_id(&board).await.unwrap(), PROTOCOL_ID);

    let message = client.message(&board, 2).await.unwrap();
    assert_eq!(message.content, "two");
    assert_eq!(message.author, TestNode::address_of(2));

    let ids = client
        .user_messages(&board, &TestNode::address_of(1))
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 3]);

    let tail = client.messages(&board, 1, 10).await.unwrap();
    assert_eq!(tail.ids, vec![2, 3]);
    let past_end = client.messages(&board, 5, 10).await.unwrap();
    assert!(past_end.is_empty());

    let err = client.message(&board, 7).await.unwrap_err();
    assert!(
        matches!(&err, ChainError::Rejected(reason) if reason.contains("message 7 does not exist")),
        "{err}"
    );
}

#[tokio::test]
async fn tampered_and_duplicate_transactions_are_refused() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let client = node.client();

    let mut tampered = SignedTx::sign(
        &dev_signing_key(1),
        1,
        TxCall::PostMessage {
            board,
            content: "original".into(),
        },
    );
    tampered.call = TxCall::PostMessage {
        board,
        content: "forged".into(),
    };
    let err = client.submit(&tampered).await.unwrap_err();
    assert!(
        matches!(&err, ChainError::Rejected(reason) if reason.contains("invalid transaction signature")),
        "{err}"
    );

    let tx = SignedTx::sign(
        &dev_signing_key(1),
        2,
        TxCall::PostMessage {
            board,
            content: "once".into(),
        },
    );
    client.submit(&tx).await.unwrap();
    let err = client.submit(&tx).await.unwrap_err();
    assert!(
        matches!(&err, ChainError::Rejected(reason) if reason.contains("already submitted")),
        "{err}"
    );
    assert_eq!(client.message_count(&board).await.unwrap(), 1);
}

#[tokio::test]
async fn reverted_transactions_are_mined_with_reason() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let signer = node.signer(1);

    let pending = signer
        .send(TxCall::PostMessage {
            board,
            content: String::new(),
        })
        .await
        .unwrap();
    let receipt = signer.wait_for_receipt(&pending).await.unwrap();
    assert_eq!(receipt.status, TxStatus::Reverted);
    assert_eq!(receipt.block_number, 2);
    assert!(receipt.logs.is_empty());

    let err = signer.confirm(&pending).await.unwrap_err();
    assert!(
        matches!(&err, ChainError::Reverted { reason, .. } if reason.contains("cannot be empty")),
        "{err}"
    );
}

#[tokio::test]
async fn unknown_board_and_receipt() {
    let node = TestNode::start().await;
    let client = node.client();
    let nowhere = TestNode::address_of(9);

    let err = client.message_count(&nowhere).await.unwrap_err();
    assert!(
        matches!(&err, ChainError::Rejected(reason) if reason.contains("no board deployed")),
        "{err}"
    );

    let tx = SignedTx::sign(&dev_signing_key(1), 1, TxCall::DeployBoard);
    assert_eq!(client.receipt(&tx.hash()).await.unwrap(), None);
}

#[tokio::test]
async fn page_bounds_are_enforced() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;

    let url = format!("{}/v1/boards/{board}/messages?count=0", node.url());
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("count must be between"));
}

#[tokio::test]
async fn deploys_from_one_account_get_distinct_addresses() {
    let node = TestNode::start().await;
    let first = node.deploy_board().await;
    let second = node.deploy_board().await;
    assert_ne!(first, second);

    let client = node.client();
    assert_eq!(client.message_count(&first).await.unwrap(), 0);
    assert_eq!(client.message_count(&second).await.unwrap(), 0);
}
