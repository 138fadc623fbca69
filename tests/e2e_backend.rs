//! E2E tests for the backend client against the mock backend

mod common;

use common::{MockBackend, data_model, listing_page};
use linkcache::error::BackendError;

#[tokio::test]
async fn test_fetches_record_and_profiles() {
    let backend = MockBackend::start().await;
    backend.with(|state| state.add_linked(5, "069a79f4-44e9", "1001", "Steve", "g1"));
    let client = backend.client();

    let data = client.get_data(5).await.unwrap();
    assert_eq!(data.uuid, "069a79f4-44e9");
    assert_eq!(data.user.discord_id, "1001");
    assert_eq!(data.created_at, common::created_at());

    let user = client.get_user(&data.uuid).await.unwrap();
    assert_eq!(user.id, "1001");

    let account = client.get_account(&data.uuid).await.unwrap();
    assert_eq!(account.id, "069a79f444e9");
    assert_eq!(account.name, "Steve");
}

#[tokio::test]
async fn test_listing_passes_paging_parameters() {
    let backend = MockBackend::start().await;
    backend.with(|state| {
        state.listing = vec![
            listing_page(vec![data_model(1, "u1", "d1", "g1")], 0, 2),
            listing_page(vec![data_model(2, "u2", "d2", "g1")], 1, 2),
        ];
    });

    let page = backend.client().get_data_page(1, 30).await.unwrap();

    assert_eq!(page.total_pages, 2);
    assert_eq!(page.content[0].id, 2);
}

#[tokio::test]
async fn test_not_found_is_typed() {
    let backend = MockBackend::start().await;

    let error = backend.client().get_data(42).await.unwrap_err();

    assert!(error.is_not_found());
    assert!(!error.is_transient());
}

#[tokio::test]
async fn test_server_error_carries_message() {
    let backend = MockBackend::start().await;
    backend.with(|state| state.fail("/user/abc", 500, "GOAWAY received", 1));

    let error = backend.client().get_user("abc").await.unwrap_err();

    match &error {
        BackendError::Status { status, message } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "GOAWAY received");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_empty_feed_is_empty_list() {
    let backend = MockBackend::start().await;
    let since = chrono::Local::now().naive_local();

    let created = backend.client().get_created_after(since).await.unwrap();
    let deleted = backend.client().get_deleted_after(since).await.unwrap();

    assert!(created.is_empty());
    assert!(deleted.is_empty());
}

#[tokio::test]
async fn test_feed_returns_records() {
    let backend = MockBackend::start().await;
    backend.with(|state| state.deleted = vec![data_model(3, "u3", "d3", "g1")]);
    let since = chrono::Local::now().naive_local();

    let deleted = backend.client().get_deleted_after(since).await.unwrap();

    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].id, 3);
    let recorded = backend.with(|state| state.deleted_after.clone());
    assert_eq!(recorded, vec![linkcache::backend::format_timestamp(since)]);
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let client = linkcache::backend::BackendClient::with_http_client(
        reqwest::Client::new(),
        "http://127.0.0.1:9/api",
    )
    .unwrap();

    let error = client.get_data(1).await.unwrap_err();

    assert!(matches!(error, BackendError::Transport(_)));
    assert!(error.is_transient());
}
