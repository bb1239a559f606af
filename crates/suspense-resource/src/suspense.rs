//! Drivers for code that reads resources.
//!
//! A component is a closure that reads resources through [`ResourceCache::get`] and propagates
//! any [`Interrupt`] with `?`:
//!
//! ```
//! use std::sync::Arc;
//! use suspense_resource::{Fetcher, Interrupt, ResourceCache};
//!
//! fn greeting<F: Fetcher<Value = String>>(cache: &ResourceCache<F>) -> Result<String, Interrupt> {
//!     let name: Arc<String> = cache.get(&"user/1/name".into())?;
//!     Ok(format!("Hello, {name}!"))
//! }
//! ```
//!
//! [`Suspense`] evaluates such a component again whenever the resource it suspended on
//! settles. [`ErrorBoundary`] additionally catches failures and keeps showing them until it is
//! reset.

use std::sync::Arc;

use thiserror::Error;

use crate::caching::{FetchError, ResourceCache, ResourceKey};
use crate::fetch::Fetcher;
use crate::read::Interrupt;

/// A failure to read the resource identified by `key`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to read `{key}`: {error}")]
pub struct Failure {
    pub key: ResourceKey,
    #[source]
    pub error: FetchError,
}

/// Evaluates components until they produce a value.
#[derive(Debug)]
pub struct Suspense<F: Fetcher> {
    cache: ResourceCache<F>,
}

impl<F: Fetcher> Clone for Suspense<F> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<F: Fetcher> Suspense<F> {
    pub fn new(cache: ResourceCache<F>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ResourceCache<F> {
        &self.cache
    }

    /// Evaluates `component` until it returns a value or fails.
    ///
    /// Every time the component suspends, `fallback` is invoked before waiting for the resume
    /// handle to settle, and the component is evaluated again afterwards.
    pub async fn render<V, C, B>(&self, mut component: C, mut fallback: B) -> Result<V, Failure>
    where
        C: FnMut(&ResourceCache<F>) -> Result<V, Interrupt>,
        B: FnMut(),
    {
        let mut suspensions = 0usize;
        loop {
            match component(&self.cache) {
                Ok(value) => {
                    tracing::trace!(suspensions, "Component rendered");
                    return Ok(value);
                }
                Err(Interrupt::Suspend(handle)) => {
                    suspensions += 1;
                    fallback();
                    handle.await;
                }
                Err(Interrupt::Fail { key, error }) => {
                    tracing::trace!(suspensions, key = %key, "Component failed");
                    return Err(Failure { key, error });
                }
            }
        }
    }

    /// Waits for the resource identified by `key`.
    pub async fn resolve(&self, key: &ResourceKey) -> Result<Arc<F::Value>, FetchError> {
        self.render(|cache| cache.get(key), || ())
            .await
            .map_err(|failure| failure.error)
    }
}

/// The state of an [`ErrorBoundary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BoundaryState {
    /// Components are rendered.
    #[default]
    Clear,
    /// A component failed, and the failure is shown until the boundary is reset.
    Caught(Failure),
}

/// The result of rendering through an [`ErrorBoundary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V> {
    Rendered(V),
    Caught(Failure),
}

impl<V> Outcome<V> {
    pub fn into_result(self) -> Result<V, Failure> {
        match self {
            Self::Rendered(value) => Ok(value),
            Self::Caught(failure) => Err(failure),
        }
    }
}

/// Catches failures of the components rendered through it.
///
/// Once a failure is caught, the boundary stops rendering and reports the caught failure until
/// [`reset`](Self::reset) is called.
#[derive(Debug)]
pub struct ErrorBoundary<F: Fetcher> {
    suspense: Suspense<F>,
    state: BoundaryState,
}

impl<F: Fetcher> ErrorBoundary<F> {
    pub fn new(cache: ResourceCache<F>) -> Self {
        Self {
            suspense: Suspense::new(cache),
            state: BoundaryState::Clear,
        }
    }

    pub fn state(&self) -> &BoundaryState {
        &self.state
    }

    pub fn has_error(&self) -> bool {
        matches!(self.state, BoundaryState::Caught(_))
    }

    /// Renders `component` like [`Suspense::render`], unless a failure was caught before.
    pub async fn render<V, C, B>(&mut self, component: C, fallback: B) -> Outcome<V>
    where
        C: FnMut(&ResourceCache<F>) -> Result<V, Interrupt>,
        B: FnMut(),
    {
        if let BoundaryState::Caught(failure) = &self.state {
            return Outcome::Caught(failure.clone());
        }

        match self.suspense.render(component, fallback).await {
            Ok(value) => Outcome::Rendered(value),
            Err(failure) => {
                tracing::debug!(error = %failure, "Error boundary caught a failure");
                self.state = BoundaryState::Caught(failure.clone());
                Outcome::Caught(failure)
            }
        }
    }

    /// Clears a caught failure, and invalidates the failed resource so it is fetched again.
    ///
    /// Returns `false` if there was nothing to reset.
    pub fn reset(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            BoundaryState::Clear => false,
            BoundaryState::Caught(failure) => {
                self.suspense.cache().invalidate(&failure.key);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::ResourceCacheConfig;
    use crate::test::{self, TestFetcher};

    use super::*;

    const RENDER_TIMEOUT: Duration = Duration::from_secs(5);

    fn pair<F: Fetcher<Value = String>>(
        cache: &ResourceCache<F>,
    ) -> Result<(Arc<String>, Arc<String>), Interrupt> {
        let first = cache.get(&"first".into())?;
        let second = cache.get(&"second".into())?;
        Ok((first, second))
    }

    #[tokio::test]
    async fn test_render_suspends_per_resource() {
        test::setup();
        let fetcher = TestFetcher::new();
        let suspense = Suspense::new(test::cache(fetcher.clone()));

        let mut fallbacks = 0;
        let (first, second) = suspense.render(pair, || fallbacks += 1).await.unwrap();
        assert_eq!(*first, "value of first");
        assert_eq!(*second, "value of second");
        assert_eq!(fallbacks, 2);

        // everything is cached now
        let mut fallbacks = 0;
        suspense.render(pair, || fallbacks += 1).await.unwrap();
        assert_eq!(fallbacks, 0);
        assert_eq!(fetcher.total_fetches(), 2);
    }

    #[tokio::test]
    async fn test_render_with_zero_max_age() {
        test::setup();
        let config = ResourceCacheConfig {
            max_age: Some(Duration::ZERO),
            ..Default::default()
        };
        let fetcher = TestFetcher::new();
        let suspense = Suspense::new(test::cache_with_config(&config, fetcher.clone()));

        let value = tokio::time::timeout(RENDER_TIMEOUT, suspense.resolve(&"a".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*value, "value of a");
        assert_eq!(fetcher.fetches("a"), 1);

        // the value has been read, so the next render refetches it but still completes
        let key = ResourceKey::from("a");
        let mut fallbacks = 0;
        let value = tokio::time::timeout(
            RENDER_TIMEOUT,
            suspense.render(|cache| cache.get(&key), || fallbacks += 1),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(*value, "value of a");
        assert_eq!(fallbacks, 1);
        assert_eq!(fetcher.fetches("a"), 2);
    }

    #[tokio::test]
    async fn test_render_beyond_max_entries() {
        test::setup();
        let config = ResourceCacheConfig {
            max_entries: Some(1),
            ..Default::default()
        };
        let fetcher = TestFetcher::new();
        let suspense = Suspense::new(test::cache_with_config(&config, fetcher.clone()));

        let mut fallbacks = 0;
        let (first, second) =
            tokio::time::timeout(RENDER_TIMEOUT, suspense.render(pair, || fallbacks += 1))
                .await
                .unwrap()
                .unwrap();
        assert_eq!(*first, "value of first");
        assert_eq!(*second, "value of second");

        // `first` is evicted once when `second` is fetched, `second` is kept until it was read
        assert_eq!(fallbacks, 3);
        assert_eq!(fetcher.fetches("first"), 2);
        assert_eq!(fetcher.fetches("second"), 1);
    }

    #[tokio::test]
    async fn test_boundary_with_retried_errors() {
        test::setup();
        let config = ResourceCacheConfig {
            retry_errors_after: Some(Duration::from_nanos(1)),
            ..Default::default()
        };
        let fetcher = TestFetcher::new().fail("second", FetchError::Status(503));
        let mut boundary = ErrorBoundary::new(test::cache_with_config(&config, fetcher.clone()));

        let outcome = tokio::time::timeout(RENDER_TIMEOUT, boundary.render(pair, || ()))
            .await
            .unwrap();
        let Outcome::Caught(failure) = outcome else {
            panic!("expected the boundary to catch a failure");
        };
        assert_eq!(failure.error, FetchError::Status(503));
        assert_eq!(fetcher.fetches("second"), 1);
    }

    #[tokio::test]
    async fn test_resolve() {
        test::setup();
        let fetcher = TestFetcher::new().fail("gone", FetchError::NotFound);
        let suspense = Suspense::new(test::cache(fetcher));

        let value = suspense.resolve(&"here".into()).await.unwrap();
        assert_eq!(*value, "value of here");

        let error = suspense.resolve(&"gone".into()).await.unwrap_err();
        assert_eq!(error, FetchError::NotFound);
    }

    #[tokio::test]
    async fn test_boundary_catches_until_reset() {
        test::setup();
        let fetcher = TestFetcher::new().fail("second", FetchError::Status(502));
        let mut boundary = ErrorBoundary::new(test::cache(fetcher.clone()));

        let outcome = boundary.render(pair, || ()).await;
        let Outcome::Caught(failure) = outcome else {
            panic!("expected the boundary to catch a failure");
        };
        assert_eq!(failure.key, ResourceKey::from("second"));
        assert_eq!(failure.error, FetchError::Status(502));
        assert!(boundary.has_error());

        // the recovered resource is not picked up until the boundary is reset
        fetcher.heal("second");
        let outcome = boundary.render(pair, || ()).await;
        assert!(matches!(outcome, Outcome::Caught(_)));
        assert_eq!(fetcher.fetches("second"), 1);

        assert!(boundary.reset());
        assert!(!boundary.reset());
        assert_eq!(boundary.state(), &BoundaryState::Clear);

        let (first, second) = boundary.render(pair, || ()).await.into_result().unwrap();
        assert_eq!(*first, "value of first");
        assert_eq!(*second, "value of second");
        assert_eq!(fetcher.fetches("first"), 1);
        assert_eq!(fetcher.fetches("second"), 2);
    }
}
