//! Core data models for the waste collection schedule
//!
//! This module contains the upstream record type and the display-ready
//! snapshot that the cache holds and the server hands out.

pub mod schedule;

pub use schedule::{FetchError, ScheduleClient, ScheduleSource, SelectionPolicy};

use serde::{Deserialize, Deserializer, Serialize};

/// Label for mixed municipal waste
pub const MKO_LABEL: &str = "Mešani komunalni odpadki";

/// Label for packaging waste
pub const EMB_LABEL: &str = "Embalaža";

/// Label for biological waste
pub const BIO_LABEL: &str = "Biološki odpadki";

/// A single schedule record as returned by the upstream API
///
/// Missing keys and `null` values decode to empty strings, the same way the
/// upstream treats categories that have no upcoming collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawScheduleRecord {
    /// Upstream identifier of the address
    #[serde(deserialize_with = "null_as_empty")]
    pub id: String,
    /// Display name of the address
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    /// Address the record was matched against
    #[serde(deserialize_with = "null_as_empty")]
    pub query: String,
    /// Town or municipality
    #[serde(deserialize_with = "null_as_empty")]
    pub city: String,
    /// Next mixed municipal waste collection date
    #[serde(deserialize_with = "null_as_empty")]
    pub next_mko: String,
    /// Next packaging collection date
    #[serde(deserialize_with = "null_as_empty")]
    pub next_emb: String,
    /// Next bio waste collection date
    #[serde(deserialize_with = "null_as_empty")]
    pub next_bio: String,
}

/// Reads a string field, treating `null` as empty
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Display-ready projection of the most recent schedule record
///
/// This is the value served by both `/` and `/api/data`. The default value
/// has every field empty and is what readers see before the first
/// successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    /// Display name of the address
    pub name: String,
    /// Address the record was matched against
    pub query: String,
    /// Town or municipality
    pub city: String,
    /// Label for mixed municipal waste
    pub mko_name: String,
    /// Next mixed municipal waste collection date
    pub mko_date: String,
    /// Label for packaging waste
    pub emb_name: String,
    /// Next packaging collection date
    pub emb_date: String,
    /// Label for bio waste
    pub bio_name: String,
    /// Next bio waste collection date
    pub bio_date: String,
}

impl CachedSnapshot {
    /// Projects an upstream record into a snapshot, attaching the fixed
    /// category labels.
    pub fn from_record(record: RawScheduleRecord) -> Self {
        Self {
            name: record.name,
            query: record.query,
            city: record.city,
            mko_name: MKO_LABEL.to_string(),
            mko_date: record.next_mko,
            emb_name: EMB_LABEL.to_string(),
            emb_date: record.next_emb,
            bio_name: BIO_LABEL.to_string(),
            bio_date: record.next_bio,
        }
    }
}
