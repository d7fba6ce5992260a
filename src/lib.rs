//! People Table - person records in Azure Table Storage
//!
//! A thin CRUD client over a key/value table service. Records are addressed
//! by (partition key, row key) = (last name, first name).
//!
//! Layers:
//! 1. TableBackend: the storage service boundary (Azure SDK or in-memory)
//! 2. TableClient: insert-or-replace, retrieve, update, delete, paged scan
//! 3. demo: the fixed demonstration sequence driven by the CLI

pub mod error;
pub mod record;
pub mod connection;
pub mod config;
pub mod backend;
pub mod client;
pub mod demo;

pub use backend::{AzureTableBackend, ContinuationToken, MemoryTableBackend, RecordPage, TableBackend};
pub use client::{DeleteOutcome, TableClient, UpdateOutcome};
pub use config::StorageConfig;
pub use error::{Operation, Result, TableError};
pub use record::{PersonRecord, RecordKey};
