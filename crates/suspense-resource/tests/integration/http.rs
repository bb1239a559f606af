use std::time::Duration;

use suspense_resource::{EntryStatus, FetchError, Invalidation, Read, ResourceKey};
use suspense_test::HitCounter;

use crate::utils::user_cache;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_one_request() {
    let server = HitCounter::new();
    let cache = user_cache(|_| {});
    // the server delays the response, so that all readers arrive while it is in flight
    let key = ResourceKey::from(server.url("delay/100ms/users/1"));

    let readers: Vec<_> = (0..20)
        .map(|_| {
            let cache = cache.clone();
            let key = key.clone();
            tokio::spawn(async move {
                loop {
                    match cache.read(&key) {
                        Read::Ready(user) => return user,
                        Read::Suspended(handle) => handle.await,
                        Read::Failed(error) => panic!("unexpected error: {error}"),
                    }
                }
            })
        })
        .collect();

    for reader in readers {
        let user = reader.await.unwrap();
        assert_eq!(user.name, "Leanne Graham");
    }

    assert_eq!(
        server.all_hits(),
        [
            ("/delay/100ms/users/1".to_owned(), 1),
            ("/users/1".to_owned(), 1),
        ]
    );
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let server = HitCounter::new();
    let cache = user_cache(|_| {});
    let good = ResourceKey::from(server.url("users/2"));
    let missing = ResourceKey::from(server.url("users/999"));
    let broken = ResourceKey::from(server.url("respond_statuscode/500/users/3"));
    let garbage = ResourceKey::from(server.url("garbage_data/users/3"));

    for key in [&good, &missing, &broken, &garbage] {
        if let Read::Suspended(handle) = cache.read(key) {
            handle.await;
        }
    }

    assert!(matches!(cache.read(&good), Read::Ready(user) if user.username == "Antonette"));
    assert!(matches!(
        cache.read(&missing),
        Read::Failed(FetchError::NotFound)
    ));
    assert!(matches!(
        cache.read(&broken),
        Read::Failed(FetchError::Status(500))
    ));
    assert!(matches!(
        cache.read(&garbage),
        Read::Failed(FetchError::Malformed(_))
    ));

    let stats = cache.stats();
    assert_eq!((stats.success, stats.error, stats.pending), (1, 3, 0));
    // reading failed resources again does not hit the server
    assert_eq!(server.accesses(), 4);
}

#[tokio::test]
async fn test_invalidate_refetches() {
    let server = HitCounter::new();
    let cache = user_cache(|_| {});
    let key = ResourceKey::from(server.url("users/3"));

    let entry = cache.acquire(&key);
    assert_eq!(cache.invalidate(&key), Invalidation::InFlight);
    entry.in_flight().unwrap().clone().await;
    assert_eq!(server.accesses(), 1);

    assert_eq!(cache.invalidate(&key), Invalidation::Removed);
    let entry = cache.acquire(&key);
    assert_eq!(entry.status(), EntryStatus::Pending);
    entry.in_flight().unwrap().clone().await;

    let entry = cache.acquire(&key);
    assert_eq!(entry.payload().map(|user| user.id), Some(3));
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_retry_errors_after() {
    let server = HitCounter::new();
    let cache = user_cache(|config| config.retry_errors_after = Some(Duration::from_millis(50)));
    let key = ResourceKey::from(server.url("respond_statuscode/503/users/1"));

    cache.acquire(&key).in_flight().unwrap().clone().await;
    assert_eq!(cache.acquire(&key).status(), EntryStatus::Error);
    assert_eq!(server.accesses(), 1);

    tokio::time::sleep(Duration::from_millis(60)).await;
    let entry = cache.acquire(&key);
    assert_eq!(entry.status(), EntryStatus::Pending);
    entry.in_flight().unwrap().clone().await;
    assert_eq!(server.accesses(), 1);
}
