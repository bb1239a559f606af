use reqwest::Client;
use serde::Deserialize;
use suspense_resource::config::ResourceCacheConfig;
use suspense_resource::{HttpFetcher, ResourceCache};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub username: String,
}

/// Creates a cache for users on the current runtime, after applying `update` to the default
/// configuration.
pub fn user_cache<U>(update: U) -> ResourceCache<HttpFetcher<User>>
where
    U: FnOnce(&mut ResourceCacheConfig),
{
    suspense_test::setup();

    let mut config = ResourceCacheConfig::default();
    update(&mut config);

    ResourceCache::new(
        &config,
        HttpFetcher::new(Client::new()),
        tokio::runtime::Handle::current(),
    )
}
