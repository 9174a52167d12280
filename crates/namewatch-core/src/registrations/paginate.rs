//! The paginate-until-short-page loop shared by both fetch modes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use super::{FetchError, FetchWindow};

/// Fixed page size of the upstream API.
pub const PAGE_SIZE: usize = 100;

/// Which fields a page request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Every record field.
    Full,
    /// Only `id`.
    IdsOnly,
}

/// A remote, offset-paginated list of registrations ordered by block number
/// descending and filtered by `blockTimestamp >= target_timestamp`.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch up to [`PAGE_SIZE`] raw entries for `window`.
    async fn fetch_page(
        &self,
        shape: QueryShape,
        window: FetchWindow,
    ) -> Result<Vec<Value>, FetchError>;
}

/// One page as received, before record validation.
#[derive(Debug, Clone)]
pub struct Page {
    pub window: FetchWindow,
    pub entries: Vec<Value>,
}

impl Page {
    /// A short page is the last one; no further request is made.
    pub fn is_last(&self) -> bool {
        self.entries.len() < PAGE_SIZE
    }
}

/// Walk `source` from `skip = 0` in steps of [`PAGE_SIZE`], decoding each
/// entry as `T` and handing it to `absorb` in arrival order.
///
/// Requests are strictly sequential. The loop ends on the first page with
/// fewer than [`PAGE_SIZE`] entries, judged on the raw length so a skipped
/// malformed entry can't end the session early. Returns the number of pages
/// requested. The first failure aborts the session.
pub async fn paginate<S, T, F>(
    source: &S,
    shape: QueryShape,
    target_timestamp: i64,
    mut absorb: F,
) -> Result<u32, FetchError>
where
    S: PageSource + ?Sized,
    T: DeserializeOwned,
    F: FnMut(T),
{
    let mut window = FetchWindow {
        target_timestamp,
        skip: 0,
    };
    let mut pages = 0u32;

    loop {
        let entries = source.fetch_page(shape, window).await.map_err(|e| {
            error!(skip = window.skip, error = %e, "Registrations page request failed");
            e
        })?;
        let page = Page { window, entries };
        pages += 1;

        debug!(skip = window.skip, page_len = page.entries.len(), "Fetched registrations page");

        let last = page.is_last();
        for entry in page.entries {
            match serde_json::from_value::<T>(entry) {
                Ok(item) => absorb(item),
                Err(e) => warn!(skip = window.skip, error = %e, "Skipping malformed registration"),
            }
        }

        if last {
            return Ok(pages);
        }
        window.skip += PAGE_SIZE as u64;
    }
}
