//! End-to-end tests: the cache against the mock server over real HTTP
//!
//! Each test binds the mock server on an ephemeral port and drives a
//! `PaginationController` backed by an `HttpUserSource`.

#![cfg(feature = "http")]

use tokio::net::TcpListener;
use userdeck::prelude::*;
use userdeck::server::router;

/// Serve `count` generated users, returning the base URL
async fn spawn_server(count: usize) -> String {
    let app = router(InMemoryUserSource::generated(count), &[]).expect("router");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{}", addr)
}

async fn controller(count: usize, listing: ListingContract, page_size: usize) -> PaginationController {
    let base_url = spawn_server(count).await;
    let source = HttpUserSource::new(base_url, listing).expect("client");
    PaginationController::builder(Arc::new(source))
        .page_size(page_size)
        .build()
        .expect("controller")
}

fn ids(users: &[User]) -> Vec<u64> {
    users.iter().map(|u| u.id).collect()
}

#[tokio::test]
async fn test_simplified_listing_pages_through_everything() {
    let controller = controller(7, ListingContract::Simplified, 3).await;

    controller.load_initial().await.unwrap();
    assert_eq!(controller.meta().total_count, 7);
    assert_eq!(controller.meta().total_pages, 3);

    let last = controller.go_to_page(2).await.unwrap();
    assert_eq!(ids(&last.rows), vec![7]);
    assert!(!controller.has_more());
}

#[tokio::test]
async fn test_simplified_listing_filters_locally() {
    let controller = controller(20, ListingContract::Simplified, 10).await;
    controller.load_initial().await.unwrap();

    controller
        .set_filter(FilterCriteria::new().with(UserField::Department, "sales").unwrap())
        .await
        .unwrap();

    let view = controller.view().to_vec();
    assert_eq!(ids(&view), vec![3, 7, 11, 15, 19]);
}

#[tokio::test]
async fn test_full_listing_filters_and_sorts_on_server() {
    let controller = controller(40, ListingContract::Full, 4).await;
    controller.load_initial().await.unwrap();

    controller
        .set_filter(FilterCriteria::new().with(UserField::Department, "IT").unwrap())
        .await
        .unwrap();
    controller
        .set_sort(Some(SortConfig::desc(UserField::Id)))
        .await
        .unwrap();

    let page = controller.visible_slice();
    assert_eq!(ids(&page.rows), vec![37, 33, 29, 25]);
    assert_eq!(page.meta.total_count, 10);
}

#[tokio::test]
async fn test_edit_round_trip() {
    let controller = controller(5, ListingContract::Full, 5).await;
    controller.load_initial().await.unwrap();

    let patch = UserPatch {
        email: Some("new@x.com".to_string()),
        ..UserPatch::default()
    };
    let user = controller.editor().update(2, patch).await.unwrap();
    assert_eq!(user.email, "new@x.com");

    let loaded = controller.loaded();
    assert_eq!(ids(&loaded), vec![1, 2, 3, 4, 5]);
    assert_eq!(loaded[1].email, "new@x.com");

    // The server kept it too
    controller.reset_and_reload().await.unwrap();
    assert_eq!(controller.loaded()[1].email, "new@x.com");
}

#[tokio::test]
async fn test_edit_of_unknown_user_is_not_found() {
    let controller = controller(2, ListingContract::Full, 2).await;

    let patch = UserPatch {
        age: Some(33),
        ..UserPatch::default()
    };
    let err = controller.editor().update(50, patch).await.unwrap_err();
    assert_eq!(err, CacheError::NotFound { id: 50 });
}

#[tokio::test]
async fn test_server_validation_error_surfaces_as_request_error() {
    let base_url = spawn_server(3).await;
    let source = HttpUserSource::new(base_url, ListingContract::Full).unwrap();

    let err = source
        .update_user(
            1,
            &UserPatch {
                email: Some("nope".to_string()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap_err();

    match err {
        CacheError::Request { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("email"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_server_moves_to_error_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = HttpUserSource::new(format!("http://{}", addr), ListingContract::Simplified).unwrap();
    let controller = PaginationController::new(Arc::new(source)).unwrap();

    let err = controller.load_initial().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(controller.state(), LoadState::Error);
}
