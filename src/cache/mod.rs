//! In-memory cache for the latest schedule snapshot
//!
//! This module provides the single cache cell shared by the refresh loop
//! (one writer) and the HTTP handlers (many readers). Nothing is persisted;
//! the cell starts out holding the empty default snapshot.

mod cell;

pub use cell::{CacheCell, CacheEntry};
