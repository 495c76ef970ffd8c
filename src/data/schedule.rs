//! Waste collection schedule API client
//!
//! Posts the configured address to the upstream schedule endpoint and turns
//! the JSON response into a [`CachedSnapshot`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

use super::{CachedSnapshot, RawScheduleRecord};

/// Upstream endpoint for schedule lookups
pub const DEFAULT_UPSTREAM_URL: &str = "https://www.simbio.si/sl/moj-dan-odvoza-odpadkov";

/// Form action the upstream expects for schedule lookups
const UPSTREAM_ACTION: &str = "simbioOdvozOdpadkov";

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur during a single fetch attempt
///
/// All of these are transient from the point of view of the refresh loop.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not complete within the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The upstream answered with a non-success status
    #[error("received non-OK HTTP status: {0}")]
    UpstreamError(StatusCode),

    /// The request could not be sent or the body could not be read
    #[error("failed to perform request: {0}")]
    Transport(reqwest::Error),

    /// The response body was not a JSON array of schedule records
    #[error("failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The upstream returned an empty array
    #[error("no data received in the response")]
    EmptyResult,

    /// No record matched the configured address
    #[error("no record matches query '{0}'")]
    NoMatchingRecord(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

/// How a record is picked when the upstream returns more than one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPolicy {
    /// Use the first record in the response
    #[default]
    First,
    /// Use the first record whose `query` equals the configured address,
    /// ignoring case and surrounding whitespace
    ExactQuery,
}

impl SelectionPolicy {
    /// Picks a record out of a parsed response
    pub fn select(
        self,
        records: Vec<RawScheduleRecord>,
        address: &str,
    ) -> Result<RawScheduleRecord, FetchError> {
        if records.is_empty() {
            return Err(FetchError::EmptyResult);
        }

        match self {
            SelectionPolicy::First => records.into_iter().next().ok_or(FetchError::EmptyResult),
            SelectionPolicy::ExactQuery => {
                let wanted = address.trim().to_lowercase();
                records
                    .into_iter()
                    .find(|record| record.query.trim().to_lowercase() == wanted)
                    .ok_or_else(|| FetchError::NoMatchingRecord(address.to_string()))
            }
        }
    }
}

/// Anything that can produce a fresh snapshot
///
/// The refresh loop only talks to this trait, which keeps it testable without
/// a network.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Performs one fetch attempt
    async fn fetch(&self) -> Result<CachedSnapshot, FetchError>;
}

/// Client for the upstream schedule API
#[derive(Debug, Clone)]
pub struct ScheduleClient {
    /// HTTP client for making requests
    http_client: Client,
    /// Endpoint the lookup is posted to
    base_url: String,
    /// Address sent as the `query` form field
    address: String,
    /// Record selection when several come back
    selection: SelectionPolicy,
}

impl ScheduleClient {
    /// Creates a client for the default upstream endpoint
    pub fn new(address: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_UPSTREAM_URL, address, timeout)
    }

    /// Creates a client that posts to a custom endpoint
    pub fn with_base_url(
        base_url: impl Into<String>,
        address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            address: address.into(),
            selection: SelectionPolicy::default(),
        })
    }

    /// Overrides the record selection policy
    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// The address this client looks up
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Fetches and parses the schedule for the configured address
    pub async fn fetch_schedule(&self) -> Result<CachedSnapshot, FetchError> {
        let response = self
            .http_client
            .post(&self.base_url)
            .form(&[("action", UPSTREAM_ACTION), ("query", self.address.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamError(status));
        }

        let body = response.text().await?;
        self.parse_response(&body)
    }

    /// Parses a response body into a snapshot using the selection policy
    ///
    /// A `null` body is treated like an empty array.
    fn parse_response(&self, body: &str) -> Result<CachedSnapshot, FetchError> {
        let records: Vec<RawScheduleRecord> =
            serde_json::from_str::<Option<Vec<RawScheduleRecord>>>(body)?.unwrap_or_default();
        let record = self.selection.select(records, &self.address)?;
        Ok(CachedSnapshot::from_record(record))
    }
}

#[async_trait]
impl ScheduleSource for ScheduleClient {
    async fn fetch(&self) -> Result<CachedSnapshot, FetchError> {
        self.fetch_schedule().await
    }
}
