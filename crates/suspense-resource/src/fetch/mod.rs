//! The fetch collaborator of the [`ResourceCache`](crate::ResourceCache).

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};

use crate::caching::{FetchError, ResourceKey};

mod http;

pub use http::{HttpFetcher, USER_AGENT};

/// Produces the value of a resource.
///
/// The cache calls [`fetch`](Self::fetch) at most once per in-flight key, and spawns the returned
/// future. The future has to eventually resolve. A future that never resolves leaves its entry
/// pending forever, callers should apply their own timeout policy in the fetcher if needed.
pub trait Fetcher: Send + Sync + 'static {
    /// The value the fetch resolves to.
    type Value: Send + Sync + 'static;

    /// Starts fetching the resource identified by `key`.
    fn fetch(&self, key: &ResourceKey) -> BoxFuture<'static, Result<Self::Value, FetchError>>;
}

/// A [`Fetcher`] backed by a closure.
#[derive(Debug, Clone)]
pub struct FnFetcher<F>(F);

impl<F> FnFetcher<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F, Fut, T> Fetcher for FnFetcher<F>
where
    F: Fn(ResourceKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    T: Send + Sync + 'static,
{
    type Value = T;

    fn fetch(&self, key: &ResourceKey) -> BoxFuture<'static, Result<T, FetchError>> {
        (self.0)(key.clone()).boxed()
    }
}
