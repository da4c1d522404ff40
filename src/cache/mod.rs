//! Process-lifetime and disk-backed caches
//!
//! Two caches exist: the [`TopologyCache`] snapshot of the subscription →
//! workspace → project tree (disk-persisted, age-checked), and the in-process
//! [`UserCache`] of fetched user detail. Both are read-mostly with a single
//! writer; a `parking_lot::RwLock` is all the discipline they need.

pub mod topology;
pub mod users;

pub use topology::TopologyCache;
pub use users::UserCache;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Staleness policy for the topology cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Maximum cache-file age in days before the cache counts as stale
    pub max_age_days: u64,
    /// What `ensure_fresh` does when the cache is stale
    pub on_stale: OnStale,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age_days: 1,
            on_stale: OnStale::Refresh,
        }
    }
}

/// Behavior on a stale cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnStale {
    /// Rebuild from the directory service and overwrite the cache files
    Refresh,
    /// Load the stale files anyway
    LoadAnyway,
}

/// Why the topology cache was judged stale.
///
/// Staleness is not an error; it is the normal trigger for a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// One or more cache files is missing
    MissingFiles,
    /// The cache files are older than the configured maximum
    Expired { age_days: u64, max_age_days: u64 },
    /// The live subscription differs from the cached one, which means the
    /// environment or account changed underneath the cache
    SubscriptionChanged { cached: String, live: String },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::MissingFiles => write!(f, "one or more cache files is not found"),
            StaleReason::Expired {
                age_days,
                max_age_days,
            } => write!(
                f,
                "cache age of {} day(s) exceeds the configured maximum of {}",
                age_days, max_age_days
            ),
            StaleReason::SubscriptionChanged { cached, live } => write!(
                f,
                "live subscription {} differs from cached subscription {}",
                live, cached
            ),
        }
    }
}
