use std::sync::Arc;

use suspense_resource::{
    BoundaryState, ErrorBoundary, FetchError, Fetcher, Interrupt, Outcome, ResourceCache,
    ResourceKey, Suspense,
};
use suspense_test::HitCounter;

use crate::utils::{User, user_cache};

fn profiles<F: Fetcher<Value = User>>(
    cache: &ResourceCache<F>,
    keys: &[ResourceKey],
) -> Result<Vec<Arc<User>>, Interrupt> {
    keys.iter().map(|key| cache.get(key)).collect()
}

#[tokio::test]
async fn test_suspense_renders_all_users() {
    let server = HitCounter::new();
    let suspense = Suspense::new(user_cache(|_| {}));
    let keys: Vec<_> = (1..=3)
        .map(|id| ResourceKey::from(server.url(&format!("users/{id}"))))
        .collect();

    let mut fallbacks = 0;
    let users = suspense
        .render(|cache| profiles(cache, &keys), || fallbacks += 1)
        .await
        .unwrap();

    let names: Vec<_> = users.iter().map(|user| user.name.as_str()).collect();
    assert_eq!(names, ["Leanne Graham", "Ervin Howell", "Clementine Bauch"]);
    // each user suspends the render once, as it is only read after the previous one is ready
    assert_eq!(fallbacks, 3);
    assert_eq!(server.accesses(), 3);

    let user = suspense.resolve(&keys[1]).await.unwrap();
    assert_eq!(user.username, "Antonette");
    assert_eq!(server.accesses(), 0);
}

#[tokio::test]
async fn test_boundary_shows_error_until_reset() {
    let server = HitCounter::new();
    let mut boundary = ErrorBoundary::new(user_cache(|_| {}));
    let key = ResourceKey::from(server.url("users/999"));

    let outcome = boundary.render(|cache| cache.get(&key), || ()).await;
    let Outcome::Caught(failure) = outcome else {
        panic!("expected the user to fail");
    };
    assert_eq!(failure.key, key);
    assert_eq!(failure.error, FetchError::NotFound);
    assert_eq!(failure.to_string(), format!("failed to read `{key}`: not found"));

    // the caught failure is shown without fetching again
    for _ in 0..3 {
        let outcome = boundary.render(|cache| cache.get(&key), || ()).await;
        assert!(matches!(outcome, Outcome::Caught(_)));
    }
    assert!(matches!(boundary.state(), BoundaryState::Caught(_)));
    assert_eq!(server.accesses(), 1);

    // a reset retries the failed user
    assert!(boundary.reset());
    let outcome = boundary.render(|cache| cache.get(&key), || ()).await;
    assert!(matches!(outcome, Outcome::Caught(_)));
    assert_eq!(server.accesses(), 1);
}

#[tokio::test]
async fn test_boundary_renders_other_users_from_cache() {
    let server = HitCounter::new();
    let cache = user_cache(|_| {});
    let first = ResourceKey::from(server.url("users/1"));

    let user = Suspense::new(cache.clone()).resolve(&first).await.unwrap();
    assert_eq!(user.id, 1);

    let mut boundary = ErrorBoundary::new(cache);
    let mut fallbacks = 0;
    let user = boundary
        .render(|cache| cache.get(&first), || fallbacks += 1)
        .await
        .into_result()
        .unwrap();
    assert_eq!(user.username, "Bret");
    assert_eq!(fallbacks, 0);
    assert_eq!(server.accesses(), 1);
}
