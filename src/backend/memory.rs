//! MemoryTableBackend: in-process table storage
//!
//! Tables are ordered maps keyed by (partition key, row key), so scans come
//! back in the same order the table service returns them. The backend applies
//! the service's rules (table must exist, key and property limits, service
//! assigned timestamps) so code tested against it behaves the same against
//! Azure.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tracing::{debug, info};

use super::{page_from_window, ContinuationToken, RecordPage, TableBackend};
use crate::error::{Operation, Result, TableError};
use crate::record::{PersonRecord, RecordKey, MAX_STRING_PROPERTY_LEN};

type Table = BTreeMap<RecordKey, PersonRecord>;

#[derive(Default)]
pub struct MemoryTableBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryTableBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a table and everything in it. Returns false if it did not exist.
    pub fn drop_table(&self, table: &str) -> bool {
        let dropped = self.tables.write().remove(table).is_some();
        if dropped {
            info!("Dropped in-memory table {}", table);
        }
        dropped
    }

    /// Number of records currently in `table`, if it exists
    pub fn len(&self, table: &str) -> Option<usize> {
        self.tables.read().get(table).map(|t| t.len())
    }

    fn check_writable(operation: Operation, record: &PersonRecord) -> Result<RecordKey> {
        let key = record.key();
        key.validate()
            .map_err(|reason| TableError::write(operation, &key, reason))?;

        let len = record.phone_number.chars().count();
        if len > MAX_STRING_PROPERTY_LEN {
            return Err(TableError::write(
                operation,
                &key,
                format!(
                    "PhoneNumber is {} characters (max: {})",
                    len, MAX_STRING_PROPERTY_LEN
                ),
            ));
        }
        Ok(key)
    }

    fn stamped(record: &PersonRecord) -> PersonRecord {
        let mut stored = record.clone();
        stored.timestamp = Utc::now();
        stored
    }
}

fn table_not_found(operation: Operation, table: &str) -> TableError {
    TableError::service(operation, format!("TableNotFound: table '{}' does not exist", table))
}

fn resource_not_found(operation: Operation, key: &RecordKey) -> TableError {
    TableError::write(operation, key, "ResourceNotFound: the specified resource does not exist")
}

#[async_trait]
impl TableBackend for MemoryTableBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            debug!("Table {} already exists", table);
            return Ok(false);
        }
        tables.insert(table.to_string(), Table::new());
        info!("Created in-memory table {}", table);
        Ok(true)
    }

    async fn insert_or_replace(&self, table: &str, record: &PersonRecord) -> Result<()> {
        let key = Self::check_writable(Operation::Insert, record)?;
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(Operation::Insert, table))?;
        rows.insert(key, Self::stamped(record));
        Ok(())
    }

    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<PersonRecord>> {
        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| table_not_found(Operation::Retrieve, table))?;
        Ok(rows.get(key).cloned())
    }

    async fn replace(&self, table: &str, record: &PersonRecord) -> Result<()> {
        let key = Self::check_writable(Operation::Update, record)?;
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(Operation::Update, table))?;
        match rows.get_mut(&key) {
            Some(existing) => {
                *existing = Self::stamped(record);
                Ok(())
            }
            None => Err(resource_not_found(Operation::Update, &key)),
        }
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        let mut tables = self.tables.write();
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| table_not_found(Operation::Delete, table))?;
        rows.remove(key)
            .map(|_| ())
            .ok_or_else(|| resource_not_found(Operation::Delete, key))
    }

    async fn query_page(
        &self,
        table: &str,
        start: Option<&ContinuationToken>,
        page_size: usize,
    ) -> Result<RecordPage> {
        if page_size == 0 {
            return Err(TableError::read(Operation::Scan, "page size must be at least 1"));
        }

        let tables = self.tables.read();
        let rows = tables
            .get(table)
            .ok_or_else(|| table_not_found(Operation::Scan, table))?;

        let lower = match start {
            Some(token) => Bound::Included(RecordKey::new(
                token.next_partition_key.clone(),
                token.next_row_key.clone(),
            )),
            None => Bound::Unbounded,
        };

        // One past the page tells us where the next page starts
        let window: Vec<PersonRecord> = rows
            .range((lower, Bound::Unbounded))
            .map(|(_, record)| record.clone())
            .take(page_size + 1)
            .collect();

        let page = page_from_window(window, page_size);
        debug!(
            "Scan page of {} records from {} (more: {})",
            page.records.len(),
            table,
            page.continuation.is_some()
        );
        Ok(page)
    }
}
