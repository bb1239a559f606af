//! Render-as-you-fetch resources.
//!
//! A [`ResourceCache`] deduplicates in-flight fetches per [`ResourceKey`] and records their
//! outcome. [`ResourceCache::read`] turns the current entry into a [`Read`], which either hands
//! out the value, a [`ResumeHandle`] to wait on, or the recorded [`FetchError`].
//!
//! The [`suspense`] module contains a suspending renderer and an error boundary that drive
//! component closures on top of that protocol.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod fetch;
pub mod logging;
pub mod read;
pub mod suspense;
pub mod utils;

#[cfg(test)]
pub(crate) mod test;

pub use caching::{
    CacheEntry, CacheStats, EntryState, EntryStatus, ExpireAfter, FetchError, Invalidation,
    NeverStale, ResourceCache, ResourceKey, ResumeHandle, StalenessPolicy,
};
pub use fetch::{Fetcher, FnFetcher, HttpFetcher};
pub use read::{Interrupt, Read};
pub use suspense::{BoundaryState, ErrorBoundary, Failure, Outcome, Suspense};
