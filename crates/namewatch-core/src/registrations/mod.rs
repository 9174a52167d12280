//! Registration activity: record types and the paginated fetcher.
//!
//! Records come from a cursor-paginated GraphQL API ([`subgraph`]). The
//! [`paginate`] loop walks it with a growing `skip` until a short page
//! signals exhaustion; [`RegistrationFetcher`] layers the two result modes
//! (full records, or just a count) on top of that single loop.

pub mod paginate;
pub mod subgraph;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use paginate::{paginate, Page, PageSource, QueryShape, PAGE_SIZE};
pub use subgraph::SubgraphSource;

// ── Errors ──────────────────────────────────────────────────────────

/// Failure of a fetch session. Any error aborts the session; nothing is
/// retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to registrations API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("registrations API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("registrations API reported errors: {0}")]
    Query(String),

    #[error("malformed registrations response: {0}")]
    Decode(String),
}

// ── Records ─────────────────────────────────────────────────────────

/// One name-claim event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRecord {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub owner: String,
    pub transaction_hash: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub block_number: u64,
    #[serde(deserialize_with = "lenient_i64")]
    pub block_timestamp: i64,
}

/// The narrow shape requested in count mode.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordId {
    pub id: String,
}

/// GraphQL `BigInt`s arrive as decimal strings; plain numbers are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

impl NumberOrString {
    fn parse<T: FromStr>(self) -> Result<T, String>
    where
        T: TryFrom<i64>,
    {
        match self {
            Self::Number(n) => T::try_from(n).map_err(|_| format!("{n} is out of range")),
            Self::Text(s) => s
                .trim()
                .parse::<T>()
                .map_err(|_| format!("`{s}` is not an integer")),
        }
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    NumberOrString::deserialize(d)?
        .parse()
        .map_err(serde::de::Error::custom)
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    NumberOrString::deserialize(d)?
        .parse()
        .map_err(serde::de::Error::custom)
}

// ── Fetch parameters ────────────────────────────────────────────────

/// A positive age window, in hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hours(f64);

#[derive(Debug, Clone, Error)]
#[error("hours must be a positive number, got `{0}`")]
pub struct InvalidHours(pub String);

impl Hours {
    pub fn new(value: f64) -> Result<Self, InvalidHours> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(InvalidHours(value.to_string()))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }

    /// Lower bound (inclusive, Unix seconds) of the window ending at `now`.
    pub fn target_timestamp(self, now: DateTime<Utc>) -> i64 {
        let now_ms = now.timestamp_millis() as f64;
        ((now_ms - self.0 * 3_600.0 * 1_000.0) / 1_000.0).floor() as i64
    }
}

impl FromStr for Hours {
    type Err = InvalidHours;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s.trim().parse().map_err(|_| InvalidHours(s.to_string()))?;
        Self::new(value).map_err(|_| InvalidHours(s.to_string()))
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters of one page request. `skip` only grows within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchWindow {
    pub target_timestamp: i64,
    pub skip: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Full records.
    Collect,
    /// Cardinality only; requests just the `id` field.
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FetchResult {
    Records(Vec<RegistrationRecord>),
    Count { count: u64 },
}

// ── Fetcher ─────────────────────────────────────────────────────────

/// Fetches every registration newer than an age window.
///
/// Records are merged by `id`: the first occurrence wins and later copies
/// are dropped with a warning, so a page boundary that shifts under
/// concurrent ledger writes cannot double-count.
#[derive(Clone)]
pub struct RegistrationFetcher {
    source: Arc<dyn PageSource>,
}

impl RegistrationFetcher {
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self { source }
    }

    pub async fn fetch(&self, hours: Hours, mode: FetchMode) -> Result<FetchResult, FetchError> {
        self.fetch_since(hours.target_timestamp(Utc::now()), mode).await
    }

    /// All records from the last `hours`, in page-arrival order.
    pub async fn collect(&self, hours: Hours) -> Result<Vec<RegistrationRecord>, FetchError> {
        self.collect_since(hours.target_timestamp(Utc::now())).await
    }

    /// Number of distinct registrations in the last `hours`.
    pub async fn count(&self, hours: Hours) -> Result<u64, FetchError> {
        self.count_since(hours.target_timestamp(Utc::now())).await
    }

    pub async fn fetch_since(
        &self,
        target_timestamp: i64,
        mode: FetchMode,
    ) -> Result<FetchResult, FetchError> {
        match mode {
            FetchMode::Collect => self
                .collect_since(target_timestamp)
                .await
                .map(FetchResult::Records),
            FetchMode::Count => self
                .count_since(target_timestamp)
                .await
                .map(|count| FetchResult::Count { count }),
        }
    }

    pub async fn collect_since(
        &self,
        target_timestamp: i64,
    ) -> Result<Vec<RegistrationRecord>, FetchError> {
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        let pages = paginate(
            self.source.as_ref(),
            QueryShape::Full,
            target_timestamp,
            |record: RegistrationRecord| {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                } else {
                    warn!(id = %record.id, "Duplicate registration across pages, skipping");
                }
            },
        )
        .await?;

        info!(target_timestamp, pages, records = records.len(), "Collected registrations");
        Ok(records)
    }

    pub async fn count_since(&self, target_timestamp: i64) -> Result<u64, FetchError> {
        let mut seen = HashSet::new();

        let pages = paginate(
            self.source.as_ref(),
            QueryShape::IdsOnly,
            target_timestamp,
            |record: RecordId| {
                if !seen.insert(record.id) {
                    warn!("Duplicate registration id across pages, not counted twice");
                }
            },
        )
        .await?;

        let count = seen.len() as u64;
        info!(target_timestamp, pages, count, "Counted registrations");
        Ok(count)
    }
}
