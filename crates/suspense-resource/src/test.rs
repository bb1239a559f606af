//! Helpers for testing the resource cache.
//!
//! In every test, call [`setup`]. This will set up the logger so that all console output is
//! captured by the test runner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::caching::{FetchError, ResourceCache, ResourceKey};
use crate::config::ResourceCacheConfig;
use crate::fetch::Fetcher;

/// Setup the test environment.
///
/// Initializes logs: The logger only captures logs from this crate and mutes all other logs.
pub fn setup() {
    suspense_test::setup();
}

/// A fetcher that counts its fetches and resolves to `"value of {key}"`.
///
/// Keys registered with [`fail`](Self::fail) resolve to the given error instead. A gated fetcher
/// holds every fetch until [`release`](Self::release) is called.
#[derive(Clone, Default)]
pub struct TestFetcher {
    fetches: Arc<Mutex<HashMap<ResourceKey, usize>>>,
    failures: Arc<Mutex<HashMap<ResourceKey, FetchError>>>,
    gate: Option<Arc<Semaphore>>,
}

impl TestFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Makes fetches of `key` fail with `error`.
    pub fn fail(self, key: &str, error: FetchError) -> Self {
        self.failures.lock().unwrap().insert(key.into(), error);
        self
    }

    /// Makes fetches of `key` succeed again.
    pub fn heal(&self, key: &str) {
        self.failures.lock().unwrap().remove(key);
    }

    /// Lets `n` held fetches complete.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// The number of fetches started for `key`.
    pub fn fetches(&self, key: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or_default()
    }

    /// The number of fetches started for any key.
    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

impl Fetcher for TestFetcher {
    type Value = String;

    fn fetch(&self, key: &ResourceKey) -> BoxFuture<'static, Result<String, FetchError>> {
        *self.fetches.lock().unwrap().entry(key.clone()).or_default() += 1;
        let failure = self.failures.lock().unwrap().get(key).cloned();
        let gate = self.gate.clone();
        let key = key.clone();

        Box::pin(async move {
            if let Some(gate) = gate {
                gate.acquire().await.unwrap().forget();
            }
            match failure {
                Some(error) => Err(error),
                None => Ok(format!("value of {key}")),
            }
        })
    }
}

/// Delays the completion of every fetch of the wrapped fetcher.
#[derive(Clone, Debug)]
pub struct Delayed<F> {
    inner: F,
    delay: Duration,
}

impl<F> Delayed<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: Fetcher> Fetcher for Delayed<F> {
    type Value = F::Value;

    fn fetch(&self, key: &ResourceKey) -> BoxFuture<'static, Result<F::Value, FetchError>> {
        let fetch = self.inner.fetch(key);
        let delay = self.delay;
        Box::pin(async move {
            let result = fetch.await;
            tokio::time::sleep(delay).await;
            result
        })
    }
}

/// Creates a cache with the default configuration on the current runtime.
pub fn cache<F: Fetcher>(fetcher: F) -> ResourceCache<F> {
    cache_with_config(&ResourceCacheConfig::default(), fetcher)
}

pub fn cache_with_config<F: Fetcher>(config: &ResourceCacheConfig, fetcher: F) -> ResourceCache<F> {
    ResourceCache::new(config, fetcher, tokio::runtime::Handle::current())
}
