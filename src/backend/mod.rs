//! Table storage backends
//!
//! `TableBackend` is the boundary between the table client and whatever
//! actually stores the records. Two implementations ship with the crate:
//! - `AzureTableBackend`: Azure Table Storage via the Azure SDK
//! - `MemoryTableBackend`: ordered in-process tables, for tests and offline runs

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{PersonRecord, RecordKey};

pub mod azure;
pub mod memory;

pub use azure::AzureTableBackend;
pub use memory::MemoryTableBackend;

/// Opaque cursor into a paginated scan
///
/// Holds the first key of the next page, like the service's
/// `x-ms-continuation-NextPartitionKey` / `NextRowKey` response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken {
    pub(crate) next_partition_key: String,
    pub(crate) next_row_key: String,
}

impl ContinuationToken {
    pub(crate) fn at(key: &RecordKey) -> Self {
        Self {
            next_partition_key: key.partition_key.clone(),
            next_row_key: key.row_key.clone(),
        }
    }
}

/// One bounded page of a scan
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<PersonRecord>,
    /// `None` once the last page has been returned
    pub continuation: Option<ContinuationToken>,
}

/// Turn up to `page_size + 1` records in table order into a page.
///
/// The record past the page is not returned; its key becomes the
/// continuation token. A window of `page_size` or fewer is the last page.
pub(crate) fn page_from_window(mut window: Vec<PersonRecord>, page_size: usize) -> RecordPage {
    window.truncate(page_size + 1);
    let continuation = if window.len() > page_size {
        window.pop().map(|next| ContinuationToken::at(&next.key()))
    } else {
        None
    };
    RecordPage {
        records: window,
        continuation,
    }
}

#[async_trait]
pub trait TableBackend: Send + Sync {
    /// Create the table unless it already exists. Returns true if it was created.
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool>;

    /// Create the record, or fully overwrite the one with the same key pair
    async fn insert_or_replace(&self, table: &str, record: &PersonRecord) -> Result<()>;

    /// Point lookup. Absence is `Ok(None)`.
    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<PersonRecord>>;

    /// Overwrite an existing record unconditionally. Fails if it no longer exists.
    async fn replace(&self, table: &str, record: &PersonRecord) -> Result<()>;

    /// Remove an existing record unconditionally. Fails if it no longer exists.
    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()>;

    /// Fetch up to `page_size` records starting at `start` (or the beginning of
    /// the table), in partition then row key order.
    async fn query_page(
        &self,
        table: &str,
        start: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<RecordPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people(first_names: &[&str]) -> Vec<PersonRecord> {
        first_names
            .iter()
            .map(|first| PersonRecord::new(*first, "Doe", "000"))
            .collect()
    }

    #[test]
    fn test_full_window_yields_token_at_next_record() {
        let page = page_from_window(people(&["Ann", "Bob", "Cat"]), 2);

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1].first_name(), "Bob");
        assert_eq!(
            page.continuation,
            Some(ContinuationToken::at(&RecordKey::new("Doe", "Cat")))
        );
    }

    #[test]
    fn test_short_window_is_last_page() {
        let page = page_from_window(people(&["Ann", "Bob"]), 2);
        assert_eq!(page.records.len(), 2);
        assert!(page.continuation.is_none());

        let page = page_from_window(Vec::new(), 5);
        assert!(page.records.is_empty());
        assert!(page.continuation.is_none());
    }

    #[test]
    fn test_oversized_window_is_trimmed() {
        // The service can hand back more than was asked for across its own pages
        let page = page_from_window(people(&["Ann", "Bob", "Cat", "Dan", "Eve"]), 2);

        assert_eq!(page.records.len(), 2);
        assert_eq!(
            page.continuation,
            Some(ContinuationToken::at(&RecordKey::new("Doe", "Cat")))
        );
    }
}
