//! TableClient: CRUD over a single people table
//!
//! Every call round-trips to the backend; nothing is cached between calls.
//! Failures are logged and returned. A missing record is not a failure:
//! retrieve returns `None`, update and delete report `NotFound`.

use futures::stream::{self, Stream, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::{AzureTableBackend, ContinuationToken, TableBackend};
use crate::config::{validate_table_name, StorageConfig, MAX_SCAN_PAGE_SIZE};
use crate::connection::ConnectionString;
use crate::error::{Result, TableError};
use crate::record::{PersonRecord, RecordKey};

/// Result of an update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The record as sent to the service. Its timestamp is the one read
    /// before the write; the service assigns a newer one on replace.
    Updated(PersonRecord),
    NotFound,
}

/// Result of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

// Page loop state of a scan
enum ScanState {
    Start,
    Next(ContinuationToken),
    Done,
}

#[derive(Clone)]
pub struct TableClient {
    backend: Arc<dyn TableBackend>,
    table_name: String,
    scan_page_size: usize,
}

impl TableClient {
    /// Connect to Azure Table Storage and make sure the table exists
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        let connection = ConnectionString::parse(&config.connection_string).map_err(|e| {
            error!("Failed to parse storage connection string: {}", e);
            e
        })?;
        let backend = Arc::new(AzureTableBackend::new(&connection));
        Self::open(backend, &config.table_name, config.scan_page_size).await
    }

    /// Open `table_name` on an arbitrary backend, creating it if absent
    pub async fn open(
        backend: Arc<dyn TableBackend>,
        table_name: &str,
        scan_page_size: usize,
    ) -> Result<Self> {
        info!("Initializing TableClient: table={}", table_name);
        validate_table_name(table_name)?;

        match backend.create_table_if_not_exists(table_name).await {
            Ok(true) => info!("Created table {}", table_name),
            Ok(false) => debug!("Using existing table {}", table_name),
            Err(e) => {
                error!("Failed to initialize table {}: {}", table_name, e);
                return Err(e);
            }
        }

        Ok(Self {
            backend,
            table_name: table_name.to_string(),
            scan_page_size: scan_page_size.clamp(1, MAX_SCAN_PAGE_SIZE),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Insert the record, overwriting any record with the same key pair
    pub async fn insert(&self, record: &PersonRecord) -> Result<()> {
        info!("Adding new entry: {}", record);
        match self.backend.insert_or_replace(&self.table_name, record).await {
            Ok(()) => {
                info!("INSERT: {} written", record.key());
                Ok(())
            }
            Err(e) => {
                error!("Insert to table failed with error {}", e);
                Err(e)
            }
        }
    }

    /// Point lookup by (last name, first name)
    pub async fn retrieve(&self, partition_key: &str, row_key: &str) -> Result<Option<PersonRecord>> {
        let key = RecordKey::new(partition_key, row_key);
        self.fetch(&key).await
    }

    /// Set a new phone number on an existing record.
    ///
    /// Read then replace, with no concurrency check between the two: a
    /// concurrent writer in between is overwritten.
    pub async fn update(
        &self,
        partition_key: &str,
        row_key: &str,
        phone_number: &str,
    ) -> Result<UpdateOutcome> {
        let key = RecordKey::new(partition_key, row_key);
        info!("Updating record {}", key);

        let mut record = match self.fetch(&key).await? {
            Some(record) => record,
            None => {
                warn!("UPDATE: no matching record for {}", key);
                return Ok(UpdateOutcome::NotFound);
            }
        };

        record.phone_number = phone_number.to_string();
        if let Err(e) = self.backend.replace(&self.table_name, &record).await {
            error!("Update of {} failed with error {}", key, e);
            return Err(e);
        }

        info!("UPDATE: {} phone number set to {}", key, phone_number);
        Ok(UpdateOutcome::Updated(record))
    }

    /// Delete a record if it exists
    pub async fn delete(&self, partition_key: &str, row_key: &str) -> Result<DeleteOutcome> {
        let key = RecordKey::new(partition_key, row_key);
        info!("Deleting entry: {}", key);

        if self.fetch(&key).await?.is_none() {
            warn!("DELETE: no matching record for {}", key);
            return Ok(DeleteOutcome::NotFound);
        }

        if let Err(e) = self.backend.delete(&self.table_name, &key).await {
            error!("Delete of {} failed with error {}", key, e);
            return Err(e);
        }

        info!("DELETE: {} removed", key);
        Ok(DeleteOutcome::Deleted)
    }

    /// Stream the table one page at a time.
    ///
    /// Pages arrive in the order the backend returns them and the last page
    /// is the one that comes back without a continuation token. The stream is
    /// consumed once; call `scan_pages` again for a fresh pass.
    pub fn scan_pages(&self) -> impl Stream<Item = Result<Vec<PersonRecord>>> + '_ {
        stream::try_unfold(ScanState::Start, move |state| async move {
            let start = match state {
                ScanState::Start => None,
                ScanState::Next(token) => Some(token),
                ScanState::Done => return Ok(None),
            };

            let page = match self
                .backend
                .query_page(&self.table_name, start.as_ref(), self.scan_page_size)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    error!("Scan of {} failed with error {}", self.table_name, e);
                    return Err(e);
                }
            };

            debug!("SCAN: fetched page of {} records", page.records.len());
            let next = match page.continuation {
                Some(token) => ScanState::Next(token),
                None => ScanState::Done,
            };
            Ok(Some((page.records, next)))
        })
    }

    /// Stream every record in the table, page boundaries flattened away
    pub fn scan(&self) -> impl Stream<Item = Result<PersonRecord>> + '_ {
        self.scan_pages()
            .map_ok(|records| stream::iter(records.into_iter().map(Ok::<_, TableError>)))
            .try_flatten()
    }

    /// Collect the whole table
    pub async fn scan_all(&self) -> Result<Vec<PersonRecord>> {
        info!("Getting all values in table {}", self.table_name);
        let records: Vec<PersonRecord> = self.scan().try_collect().await?;
        info!("SCAN: returned {} entries", records.len());
        Ok(records)
    }

    async fn fetch(&self, key: &RecordKey) -> Result<Option<PersonRecord>> {
        match self.backend.get(&self.table_name, key).await {
            Ok(Some(record)) => {
                debug!("GET: {} found", key);
                Ok(Some(record))
            }
            Ok(None) => {
                debug!("GET: {} not found", key);
                Ok(None)
            }
            Err(e) => {
                error!("Retrieve of {} failed with error {}", key, e);
                Err(e)
            }
        }
    }
}
