//! The synchronous read adapter.
//!
//! [`ResourceCache::read`] is meant to be called over and over again, once per evaluation of the
//! code that needs the resource, until it hands out a value. Instead of unwinding, the signals
//! to suspend or to fail are part of the returned [`Read`]. [`ResourceCache::get`] turns them into
//! an [`Interrupt`], which code can propagate with `?` up to whatever drives the evaluation, see
//! [`Suspense`](crate::Suspense).

use std::fmt;
use std::sync::Arc;

use crate::caching::{EntryState, FetchError, ResourceCache, ResourceKey, ResumeHandle};
use crate::fetch::Fetcher;

/// The outcome of reading a resource.
#[derive(Debug, Clone)]
pub enum Read<T> {
    /// The resource is available.
    Ready(Arc<T>),
    /// The resource is still being fetched.
    ///
    /// Read again once the handle has settled.
    Suspended(ResumeHandle),
    /// Fetching the resource failed.
    Failed(FetchError),
}

impl<T> Read<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    /// Returns the value, or the signal for whoever drives the evaluation.
    ///
    /// The `key` is attached to failures so an error boundary knows which resource to reset.
    pub fn into_result(self, key: &ResourceKey) -> Result<Arc<T>, Interrupt> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Suspended(handle) => Err(Interrupt::Suspend(handle)),
            Self::Failed(error) => Err(Interrupt::Fail {
                key: key.clone(),
                error,
            }),
        }
    }
}

/// A signal that stops the evaluation of code reading resources.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A resource is not ready yet, evaluate again once the handle settles.
    Suspend(ResumeHandle),
    /// Reading the resource identified by `key` failed.
    Fail { key: ResourceKey, error: FetchError },
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspend(_) => f.write_str("suspended on a pending resource"),
            Self::Fail { key, error } => write!(f, "failed to read `{key}`: {error}"),
        }
    }
}

impl<F: Fetcher> ResourceCache<F> {
    /// Reads the resource identified by `key`, starting a fetch if necessary.
    pub fn read(&self, key: &ResourceKey) -> Read<F::Value> {
        match self.acquire(key).into_state() {
            EntryState::Pending(handle) => Read::Suspended(handle),
            EntryState::Success(value) => Read::Ready(value),
            EntryState::Error(error) => Read::Failed(error),
        }
    }

    /// Like [`read`](Self::read), but signals anything other than a value as an [`Interrupt`].
    pub fn get(&self, key: &ResourceKey) -> Result<Arc<F::Value>, Interrupt> {
        self.read(key).into_result(key)
    }
}
