use std::fmt;
use std::time::Duration;

use crate::config::ResourceCacheConfig;

use super::EntryStatus;

/// Decides when a terminal cache entry should be fetched again.
///
/// The policy is consulted by [`acquire`](super::ResourceCache::acquire) for entries that are
/// [`Success`](EntryStatus::Success) or [`Error`](EntryStatus::Error). A stale entry is replaced
/// by a fresh fetch, as if it had been invalidated. Pending entries are never stale.
///
/// An entry that settled is only checked once it has been read, so the first read after a
/// resume handle settles always observes the terminal state.
pub trait StalenessPolicy: fmt::Debug + Send + Sync + 'static {
    /// Whether an entry with the given terminal `status`, settled `age` ago, is stale.
    fn is_stale(&self, status: EntryStatus, age: Duration) -> bool;
}

/// Entries only go away through explicit invalidation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStale;

impl StalenessPolicy for NeverStale {
    fn is_stale(&self, _status: EntryStatus, _age: Duration) -> bool {
        false
    }
}

/// Expires entries a fixed time after they have settled.
///
/// `None` means the entries with that status never expire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireAfter {
    pub success: Option<Duration>,
    pub error: Option<Duration>,
}

impl ExpireAfter {
    pub fn from_config(config: &ResourceCacheConfig) -> Self {
        Self {
            success: config.max_age,
            error: config.retry_errors_after,
        }
    }
}

impl StalenessPolicy for ExpireAfter {
    fn is_stale(&self, status: EntryStatus, age: Duration) -> bool {
        let max_age = match status {
            EntryStatus::Pending => return false,
            EntryStatus::Success => self.success,
            EntryStatus::Error => self.error,
        };
        max_age.is_some_and(|max_age| age >= max_age)
    }
}
