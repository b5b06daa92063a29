//! Board stores driven against a live node over HTTP.

use board_client::http::{HttpBoardClient, HttpSigner};
use board_client::store::STATUS_ALL_LOADED;
use board_client::{BoardStore, Outcome, StoreConfig};
use board_common::address::Address;
use board_common::board::BoardEvent;
use board_common::deployments::BoardInfo;
use board_common::encrypted_input::DevInputBuilder;
use board_common::LOCAL_CHAIN_ID;

use board_integration::{HttpStore, TestNode};

#[tokio::test]
async fn second_reader_pages_through_posts() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;

    let writer = node.store(board, 1);
    for i in 1..=12 {
        let outcome = writer.post_message(&format!("message {i}"), false).await;
        assert_eq!(outcome, Outcome::Completed, "{}", writer.status_message());
    }
    assert_eq!(writer.total_count(), 12);
    assert_eq!(writer.messages().len(), 12);

    let reader = node.store(board, 2);
    assert!(!reader.has_more_messages());
    assert_eq!(reader.load_count().await, Outcome::Completed);
    assert_eq!(reader.load_messages(0, 10).await, Outcome::Completed);
    assert_eq!(reader.messages().len(), 10);
    assert_eq!(reader.status_message(), "Loaded 10 messages");
    assert!(reader.has_more_messages());

    assert_eq!(reader.load_messages(10, 10).await, Outcome::Completed);
    let ids: Vec<u64> = reader.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids, (1..=12).collect::<Vec<u64>>());
    assert!(!reader.has_more_messages());

    assert_eq!(reader.load_messages(12, 10).await, Outcome::Skipped);
    assert_eq!(reader.status_message(), STATUS_ALL_LOADED);
    assert_eq!(reader.messages().len(), 12);
}

#[tokio::test]
async fn ratings_fold_into_message_and_emit_events() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;

    let alice = node.store(board, 1);
    assert_eq!(alice.post_message("rate me", false).await, Outcome::Completed);
    assert_eq!(alice.post_message("0xdeadbeef", true).await, Outcome::Completed);

    let bob = node.store(board, 2);
    assert_eq!(bob.rate_message(1, 5).await, Outcome::Completed);
    // Nothing was loaded before rating, so a full page was fetched.
    assert_eq!(bob.status_message(), "Loaded 2 messages");
    let messages = bob.messages();
    let first = messages[0].encrypted_rating;
    assert!(!first.is_zero());
    assert!(messages[1].encrypted_rating.is_zero());
    assert!(messages[1].is_encrypted);

    assert_eq!(bob.rate_message(1, 3).await, Outcome::Completed);
    assert_ne!(bob.messages()[0].encrypted_rating, first);
    assert!(!bob.is_rating_message());

    let events = node.client().events(&board, 0).await.unwrap();
    let posted = events
        .iter()
        .filter(|e| matches!(e.event, BoardEvent::MessagePosted { .. }))
        .count();
    let rated_by_bob = events
        .iter()
        .filter(|e| {
            matches!(e.event, BoardEvent::RatingUpdated { message_id: 1, rater } if rater == TestNode::address_of(2))
        })
        .count();
    assert_eq!(posted, 2);
    assert_eq!(rated_by_bob, 2);
}

#[tokio::test]
async fn reverted_rating_is_reported_in_status() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let store = node.store(board, 1);

    assert_eq!(store.rate_message(99, 4).await, Outcome::Failed);
    let status = store.status_message();
    assert!(status.starts_with("Failed to rate message:"), "{status}");
    assert!(status.contains("message 99 does not exist"), "{status}");
    assert!(!store.is_rating_message());
    assert!(store.can_rate_message());
}

#[tokio::test]
async fn second_post_while_first_in_flight_is_skipped() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let store = node.store(board, 1);

    let (first, second) = tokio::join!(
        store.post_message("first", false),
        store.post_message("second", false)
    );
    assert_eq!(first, Outcome::Completed);
    assert_eq!(second, Outcome::Skipped);
    assert!(!store.is_posting_message());

    let contents: Vec<String> = store.messages().into_iter().map(|m| m.content).collect();
    assert_eq!(contents, vec!["first".to_string()]);
}

#[tokio::test]
async fn unreachable_node_fails_softly() {
    let store: HttpStore = BoardStore::new(
        BoardInfo::at(Address([7u8; 20]), LOCAL_CHAIN_ID),
        StoreConfig::default(),
    )
    .with_reader(HttpBoardClient::new("http://127.0.0.1:1"));

    assert_eq!(store.load_count().await, Outcome::Failed);
    assert!(store
        .status_message()
        .starts_with("Failed to load message count: transport error"));

    assert_eq!(store.load_messages(0, 10).await, Outcome::Failed);
    assert!(store
        .status_message()
        .starts_with("Failed to load messages: transport error"));
    assert!(!store.is_loading_messages());

    // No signer connected yet.
    assert!(!store.can_post_message());
    assert_eq!(store.post_message("hello", false).await, Outcome::Skipped);
}

#[tokio::test]
async fn empty_content_never_reaches_the_node() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;
    let store = node.store(board, 1);
    let before = node.client().chain_info().await.unwrap().block_number;

    assert_eq!(store.post_message("  \n", false).await, Outcome::Rejected);
    assert_eq!(store.status_message(), "Message content cannot be empty");

    let after = node.client().chain_info().await.unwrap().block_number;
    assert_eq!(before, after);
}

#[tokio::test]
async fn connecting_a_signer_later_enables_posting() {
    let node = TestNode::start().await;
    let board = node.deploy_board().await;

    let mut store: HttpStore = BoardStore::new(BoardInfo::at(board, LOCAL_CHAIN_ID), StoreConfig::default())
        .with_reader(node.client())
        .with_encryptor(DevInputBuilder::new());
    assert!(!store.can_post_message());
    assert!(!store.can_rate_message());

    store.set_signer(Some(HttpSigner::new(node.client(), board_common::transaction::dev_signing_key(3))));
    assert!(store.can_post_message());
    assert_eq!(store.post_message("late joiner", false).await, Outcome::Completed);
    assert_eq!(store.messages()[0].author, TestNode::address_of(3));
}
