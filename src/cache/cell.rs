//! Shared cell holding the most recently fetched snapshot
//!
//! Provides a `CacheCell` that is written by the refresh loop and read by
//! request handlers. Every access holds the lock for exactly one clone or one
//! assignment, so readers see either the previous entry or the new one in
//! full.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::data::CachedSnapshot;

/// Snapshot copied out of the cache, with metadata about its freshness
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cached snapshot
    pub snapshot: CachedSnapshot,
    /// When the snapshot was published; `None` for the initial default
    pub updated_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// How long ago the snapshot was published, if it ever was
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.updated_at.map(|updated_at| now - updated_at)
    }

    /// Whether this is still the initial default entry
    pub fn is_default(&self) -> bool {
        self.updated_at.is_none()
    }
}

/// Holds the latest successfully fetched snapshot
///
/// Share it as `Arc<CacheCell>` between the refresher and the server state.
#[derive(Debug, Default)]
pub struct CacheCell {
    entry: RwLock<CacheEntry>,
}

impl CacheCell {
    /// Creates a cell holding the empty default snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cached snapshot, stamping it with the current time
    pub fn write(&self, snapshot: CachedSnapshot) {
        self.write_at(snapshot, Utc::now());
    }

    /// Replaces the cached snapshot with an explicit publish time
    pub fn write_at(&self, snapshot: CachedSnapshot, updated_at: DateTime<Utc>) {
        let entry = CacheEntry {
            snapshot,
            updated_at: Some(updated_at),
        };
        // A write is a single assignment, so a poisoned lock still guards a
        // complete entry.
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = entry;
    }

    /// Copies out the current entry
    pub fn read(&self) -> CacheEntry {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Copies out the current snapshot only
    pub fn snapshot(&self) -> CachedSnapshot {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot
            .clone()
    }
}
