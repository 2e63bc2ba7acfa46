use std::sync::Arc;
use std::time::Duration;

use snip_core::{ReadRepository, Repository, ShortCode, UserId};
use snip_deleter::{Deleter, DeleterConfig, DeleterError, UrlDeleter};
use snip_storage::InMemoryRepository;

fn code(value: &str) -> ShortCode {
    ShortCode::new_unchecked(value)
}

fn user(value: &str) -> UserId {
    UserId::new_unchecked(value)
}

async fn seeded_repository() -> Arc<InMemoryRepository> {
    let repo = Arc::new(InMemoryRepository::new());
    let alice = user("alice");
    let bob = user("bob");

    for (c, url, owner) in [
        ("alice1", "https://a1.example", &alice),
        ("alice2", "https://a2.example", &alice),
        ("alice3", "https://a3.example", &alice),
        ("bob001", "https://b1.example", &bob),
    ] {
        repo.insert(&code(c), url, Some(owner)).await.unwrap();
    }

    repo
}

async fn is_deleted(repo: &InMemoryRepository, value: &str) -> bool {
    repo.get(&code(value)).await.unwrap().unwrap().deleted
}

#[tokio::test(start_paused = true)]
async fn owned_codes_are_deleted_after_the_waiting_time() {
    let repo = seeded_repository().await;
    let config = DeleterConfig::builder()
        .max_batch_size(10)
        .batch_waiting_time(Duration::from_millis(100))
        .build();
    let deleter = UrlDeleter::new(config, Arc::clone(&repo));
    deleter.start().unwrap();

    deleter
        .delete(&user("alice"), &[code("alice1"), code("bob001")])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(is_deleted(&repo, "alice1").await);
    assert!(!is_deleted(&repo, "alice2").await);
    assert!(!is_deleted(&repo, "bob001").await);

    deleter.stop().await;
}

#[tokio::test]
async fn stop_flushes_pending_codes() {
    let repo = seeded_repository().await;
    let config = DeleterConfig::builder()
        .max_batch_size(100)
        .batch_waiting_time(Duration::from_secs(3600))
        .build();
    let deleter = UrlDeleter::new(config, Arc::clone(&repo));
    deleter.start().unwrap();

    deleter
        .delete(
            &user("alice"),
            &[code("alice1"), code("alice2"), code("alice3")],
        )
        .await
        .unwrap();
    deleter.stop().await;

    for value in ["alice1", "alice2", "alice3"] {
        assert!(is_deleted(&repo, value).await, "{value} should be deleted");
    }
    assert_eq!(repo.stats().await.unwrap().urls, 1);

    let err = deleter
        .delete(&user("bob"), &[code("bob001")])
        .await
        .unwrap_err();
    assert!(matches!(err, DeleterError::Stopped));
    assert!(!is_deleted(&repo, "bob001").await);
}

#[tokio::test]
async fn deleted_urls_disappear_from_owner_listing() {
    let repo = seeded_repository().await;
    let deleter: Arc<dyn Deleter> = {
        let deleter = Arc::new(UrlDeleter::new(
            DeleterConfig::builder().max_batch_size(2).build(),
            Arc::clone(&repo),
        ));
        deleter.start().unwrap();

        let handle: Arc<dyn Deleter> = deleter.clone();
        handle
            .delete(&user("alice"), &[code("alice1"), code("alice2")])
            .await
            .unwrap();

        deleter.stop().await;
        handle
    };

    let listed = repo.urls_owned_by(&user("alice")).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].code, code("alice3"));

    assert!(matches!(
        deleter.delete(&user("alice"), &[code("alice3")]).await,
        Err(DeleterError::Stopped)
    ));
}
