//! # Resource caching
//!
//! The [`ResourceCache`] maps a [`ResourceKey`] to what is currently known about fetching that
//! resource. Each entry is a small state machine:
//!
//! ```text
//! (absent) -> Pending -> Success | Error
//! ```
//!
//! The first access of a key stores a `Pending` entry and spawns the fetch on the configured
//! tokio runtime. All further accesses of the same key get the same entry, including a clone of
//! the same [`ResumeHandle`], until the fetch completes. This is the request coalescing that
//! guarantees that for any key at most one fetch is in flight at a time.
//!
//! When the fetch completes, its result is stored in the entry, and the [`ResumeHandle`]
//! settles. The completion is only applied if the entry still belongs to that fetch. Each fetch
//! carries a generation number that has to match the stored entry.
//!
//! ## Invalidation
//!
//! Terminal entries stay in the cache until one of the following happens:
//!
//! - [`ResourceCache::invalidate`] or [`ResourceCache::clear`] removes them explicitly.
//! - [`ResourceCache::forget`] drops interest in a key.
//! - The [`StalenessPolicy`] declares them stale on access, in which case a new fetch replaces
//!   them. The default policy is built from the `max_age` and `retry_errors_after` config
//!   options, and never expires anything when neither is set.
//! - The cache grows beyond `max_entries`, in which case the least recently read terminal
//!   entries are evicted.
//!
//! Pending entries are never removed, as that would allow a second fetch for the same key.
//!
//! ### Metrics
//!
//! All metrics are tagged with the `cache` name:
//!
//! - `resources.access`: All accesses.
//! - `resources.memory.hit`: Accesses served by a terminal entry.
//! - `resources.channel.hit`: Accesses that joined an in-flight fetch.
//! - `resources.fetch`: Fetches being spawned.
//! - `resources.fetch.result`: Completed fetches, tagged by `status`.
//! - `resources.fetch.duration`: How long fetches took.
//! - `resources.in_flight`: The number of fetches currently in flight.
//! - `resources.stale`, `resources.evicted`, `resources.discarded`: Entries that were replaced,
//!   evicted, or fetch results that were thrown away.

mod cache_error;
mod cache_key;
mod entry;
mod memory;
mod policy;

pub use cache_error::FetchError;
pub use cache_key::ResourceKey;
pub use entry::{CacheEntry, EntryState, EntryStatus, ResumeHandle};
pub use memory::{CacheStats, Invalidation, ResourceCache};
pub use policy::{ExpireAfter, NeverStale, StalenessPolicy};
