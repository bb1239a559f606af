use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use super::{FetchError, ResourceKey};

/// The status of a [`CacheEntry`].
///
/// An entry starts out as [`Pending`](Self::Pending) and transitions exactly once into one of
/// the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryStatus {
    Pending,
    Success,
    Error,
}

impl EntryStatus {
    /// Whether this is [`Success`](Self::Success) or [`Error`](Self::Error).
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A future that settles once the fetch of a pending entry has completed.
///
/// All readers of the same pending entry get a clone of the same handle. After the handle has
/// settled, the next read of the key observes a terminal status.
#[derive(Clone)]
pub struct ResumeHandle {
    // The channel resolves with `Err(Canceled)` if the sender is dropped, which settles the
    // handle just the same.
    inner: Shared<oneshot::Receiver<()>>,
}

impl ResumeHandle {
    /// Creates a new handle along with the sender that settles it.
    pub(crate) fn channel() -> (oneshot::Sender<()>, Self) {
        let (sender, receiver) = oneshot::channel();
        let handle = Self {
            inner: receiver.shared(),
        };
        (sender, handle)
    }

    /// Whether one of the clones of this handle has been polled to completion.
    ///
    /// A handle whose fetch has completed reports `false` until it is polled.
    pub fn was_observed_settled(&self) -> bool {
        self.inner.peek().is_some()
    }
}

impl Future for ResumeHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx).map(|_| ())
    }
}

impl fmt::Debug for ResumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeHandle")
            .field("observed_settled", &self.was_observed_settled())
            .finish()
    }
}

/// The contents of a [`CacheEntry`].
#[derive(Debug)]
pub enum EntryState<T> {
    /// A fetch is in flight, the handle settles when it completes.
    Pending(ResumeHandle),
    /// The fetch produced a value.
    Success(Arc<T>),
    /// The fetch failed.
    Error(FetchError),
}

impl<T> Clone for EntryState<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Pending(handle) => Self::Pending(handle.clone()),
            Self::Success(value) => Self::Success(Arc::clone(value)),
            Self::Error(error) => Self::Error(error.clone()),
        }
    }
}

impl<T> EntryState<T> {
    pub fn status(&self) -> EntryStatus {
        match self {
            Self::Pending(_) => EntryStatus::Pending,
            Self::Success(_) => EntryStatus::Success,
            Self::Error(_) => EntryStatus::Error,
        }
    }
}

/// A snapshot of what the cache knows about one resource.
///
/// Exactly one of [`payload`](Self::payload), [`failure`](Self::failure) and
/// [`in_flight`](Self::in_flight) is available, determined by [`status`](Self::status).
#[derive(Debug)]
pub struct CacheEntry<T> {
    key: ResourceKey,
    state: EntryState<T>,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> CacheEntry<T> {
    pub(crate) fn new(key: ResourceKey, state: EntryState<T>) -> Self {
        Self { key, state }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn status(&self) -> EntryStatus {
        self.state.status()
    }

    pub fn state(&self) -> &EntryState<T> {
        &self.state
    }

    pub fn into_state(self) -> EntryState<T> {
        self.state
    }

    /// The fetched value, if the entry is [`Success`](EntryStatus::Success).
    pub fn payload(&self) -> Option<&Arc<T>> {
        match &self.state {
            EntryState::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// The recorded error, if the entry is [`Error`](EntryStatus::Error).
    pub fn failure(&self) -> Option<&FetchError> {
        match &self.state {
            EntryState::Error(failure) => Some(failure),
            _ => None,
        }
    }

    /// The handle of the outstanding fetch, if the entry is [`Pending`](EntryStatus::Pending).
    pub fn in_flight(&self) -> Option<&ResumeHandle> {
        match &self.state {
            EntryState::Pending(handle) => Some(handle),
            _ => None,
        }
    }
}
