//! AzureTableBackend: Azure Table Storage through the Azure SDK
//!
//! Writes are unconditional (`If-Match: *`), so concurrent writers follow
//! last-writer-wins. The SDK retry policy is disabled: a failed request is
//! reported straight back to the caller.

use async_trait::async_trait;
use azure_core::error::{Error as AzureError, ErrorKind};
use azure_core::{RetryOptions, StatusCode};
use azure_data_tables::clients::TableServiceClientBuilder;
use azure_data_tables::prelude::*;
use azure_storage::prelude::*;
use azure_storage::CloudLocation;
use futures::StreamExt;
use tracing::{debug, info};

use super::{page_from_window, ContinuationToken, RecordPage, TableBackend};
use crate::config::MAX_SCAN_PAGE_SIZE;
use crate::connection::{ConnectionString, TableEndpoint, EMULATOR_TABLE_PORT};
use crate::error::{Operation, Result, TableError};
use crate::record::{PersonRecord, RecordKey};

const TABLE_NOT_FOUND: &str = "TableNotFound";

pub struct AzureTableBackend {
    service_client: TableServiceClient,
    account_name: String,
}

impl AzureTableBackend {
    pub fn new(connection: &ConnectionString) -> Self {
        let account = connection.account_name.clone();

        let (location, credentials) = match &connection.endpoint {
            TableEndpoint::Emulator => (
                CloudLocation::Emulator {
                    address: "127.0.0.1".to_string(),
                    port: EMULATOR_TABLE_PORT,
                },
                StorageCredentials::emulator(),
            ),
            TableEndpoint::Account { protocol, suffix }
                if protocol == "https" && suffix == "core.windows.net" =>
            {
                (
                    CloudLocation::Public {
                        account: account.clone(),
                    },
                    StorageCredentials::access_key(account.clone(), connection.account_key.clone()),
                )
            }
            _ => (
                CloudLocation::Custom {
                    account: account.clone(),
                    uri: connection.table_uri(),
                },
                StorageCredentials::access_key(account.clone(), connection.account_key.clone()),
            ),
        };

        info!("Initializing AzureTableBackend: endpoint={}", connection.table_uri());

        let service_client = TableServiceClientBuilder::with_location(location, credentials)
            .retry(RetryOptions::none())
            .build();

        Self {
            service_client,
            account_name: account,
        }
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    fn entity_client(&self, table: &str, key: &RecordKey) -> EntityClient {
        self.service_client
            .table_client(table)
            .partition_key_client(&key.partition_key)
            .entity_client(&key.row_key)
    }
}

#[async_trait]
impl TableBackend for AzureTableBackend {
    async fn create_table_if_not_exists(&self, table: &str) -> Result<bool> {
        match self.service_client.table_client(table).create().await {
            Ok(_) => {
                info!("Created table {}", table);
                Ok(true)
            }
            Err(e) if matches!(http_status(&e), Some((StatusCode::Conflict, Some("TableAlreadyExists")))) => {
                debug!("Table {} already exists", table);
                Ok(false)
            }
            Err(e) => Err(classify(e, Operation::Initialize, None)),
        }
    }

    async fn insert_or_replace(&self, table: &str, record: &PersonRecord) -> Result<()> {
        let key = record.key();
        self.entity_client(table, &key)
            .insert_or_replace(record)
            .map_err(|e| classify(e, Operation::Insert, Some(&key)))?
            .await
            .map_err(|e| classify(e, Operation::Insert, Some(&key)))?;
        Ok(())
    }

    async fn get(&self, table: &str, key: &RecordKey) -> Result<Option<PersonRecord>> {
        match self.entity_client(table, key).get::<PersonRecord>().await {
            Ok(response) => Ok(Some(response.entity)),
            Err(e) if is_entity_not_found(&e) => Ok(None),
            Err(e) => Err(classify(e, Operation::Retrieve, Some(key))),
        }
    }

    async fn replace(&self, table: &str, record: &PersonRecord) -> Result<()> {
        let key = record.key();
        self.entity_client(table, &key)
            .update(record, IfMatchCondition::Any)
            .map_err(|e| classify(e, Operation::Update, Some(&key)))?
            .await
            .map_err(|e| classify(e, Operation::Update, Some(&key)))?;
        Ok(())
    }

    async fn delete(&self, table: &str, key: &RecordKey) -> Result<()> {
        self.entity_client(table, key)
            .delete()
            .await
            .map_err(|e| classify(e, Operation::Delete, Some(key)))?;
        Ok(())
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

        // Ask for one record past the page so the next page's first key is known
        let wanted = page_size + 1;
        let mut query = self
            .service_client
            .table_client(table)
            .query()
            .top(Top::new(wanted.min(MAX_SCAN_PAGE_SIZE) as u32));
        if let Some(token) = start {
            query = query.filter(Filter::new(key_range_filter(token)));
        }

        let mut stream = query.into_stream::<PersonRecord>();
        let mut window = Vec::with_capacity(wanted);

        // The SDK follows the service's own continuation headers; stop pulling
        // as soon as the window is full.
        while window.len() < wanted {
            match stream.next().await {
                Some(response) => {
                    let response = response.map_err(|e| classify(e, Operation::Scan, None))?;
                    window.extend(response.entities);
                }
                None => break,
            }
        }
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

/// OData filter selecting every key at or after the token, in table order
fn key_range_filter(token: &ContinuationToken) -> String {
    let pk = odata_literal(&token.next_partition_key);
    let rk = odata_literal(&token.next_row_key);
    format!(
        "PartitionKey gt {pk} or (PartitionKey eq {pk} and RowKey ge {rk})",
        pk = pk,
        rk = rk
    )
}

fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn http_status(err: &AzureError) -> Option<(StatusCode, Option<&str>)> {
    match err.kind() {
        ErrorKind::HttpResponse { status, error_code } => Some((*status, error_code.as_deref())),
        _ => None,
    }
}

// A 404 for a missing entity is an answer; a 404 for a missing table is not.
fn is_entity_not_found(err: &AzureError) -> bool {
    matches!(http_status(err), Some((StatusCode::NotFound, code)) if code != Some(TABLE_NOT_FOUND))
}

/// Map an SDK error onto the table error taxonomy
fn classify(err: AzureError, operation: Operation, key: Option<&RecordKey>) -> TableError {
    let reason = err.to_string();

    if matches!(err.kind(), ErrorKind::Credential) {
        return TableError::connection(reason);
    }
    if matches!(err.kind(), ErrorKind::Io) {
        return TableError::service(operation, reason);
    }

    if let Some((status, code)) = http_status(&err) {
        if matches!(status, StatusCode::Unauthorized | StatusCode::Forbidden) {
            return TableError::connection(reason);
        }
        if status.is_server_error() || code == Some(TABLE_NOT_FOUND) {
            return TableError::service(operation, reason);
        }
    }

    match (operation, key) {
        (Operation::Initialize, _) => TableError::service(operation, reason),
        (op, Some(key)) if op.is_write() => TableError::write(op, key, reason),
        (op, _) => TableError::read(op, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status: StatusCode, code: &str) -> AzureError {
        AzureError::message(
            ErrorKind::HttpResponse {
                status,
                error_code: Some(code.to_string()),
            },
            "request failed",
        )
    }

    #[test]
    fn test_key_range_filter() {
        let token = ContinuationToken::at(&RecordKey::new("Doe", "Jane"));
        assert_eq!(
            key_range_filter(&token),
            "PartitionKey gt 'Doe' or (PartitionKey eq 'Doe' and RowKey ge 'Jane')"
        );
    }

    #[test]
    fn test_filter_escapes_quotes() {
        let token = ContinuationToken::at(&RecordKey::new("O'Brien", "Pat"));
        assert!(key_range_filter(&token).contains("'O''Brien'"));
    }

    #[test]
    fn test_not_found_distinguishes_table_from_entity() {
        assert!(is_entity_not_found(&http_error(StatusCode::NotFound, "ResourceNotFound")));
        assert!(!is_entity_not_found(&http_error(StatusCode::NotFound, TABLE_NOT_FOUND)));
        assert!(!is_entity_not_found(&http_error(StatusCode::BadRequest, "InvalidInput")));
    }

    #[test]
    fn test_classify() {
        let key = RecordKey::new("Smith", "John");

        let err = classify(http_error(StatusCode::Forbidden, "AuthenticationFailed"), Operation::Initialize, None);
        assert!(matches!(err, TableError::Connection { .. }));

        let err = classify(http_error(StatusCode::ServiceUnavailable, "ServerBusy"), Operation::Insert, Some(&key));
        assert!(matches!(err, TableError::Service { .. }));

        let err = classify(http_error(StatusCode::NotFound, TABLE_NOT_FOUND), Operation::Retrieve, Some(&key));
        assert!(matches!(err, TableError::Service { .. }));

        let err = classify(http_error(StatusCode::BadRequest, "PropertyValueTooLarge"), Operation::Insert, Some(&key));
        assert!(matches!(err, TableError::Write { operation: Operation::Insert, .. }));

        let err = classify(http_error(StatusCode::BadRequest, "InvalidInput"), Operation::Scan, None);
        assert!(matches!(err, TableError::Read { operation: Operation::Scan, .. }));

        let err = classify(AzureError::message(ErrorKind::Io, "connection refused"), Operation::Initialize, None);
        assert!(matches!(err, TableError::Service { operation: Operation::Initialize, .. }));
    }

    #[test]
    fn test_development_storage_backend() {
        let conn = ConnectionString::parse("UseDevelopmentStorage=true").unwrap();
        let backend = AzureTableBackend::new(&conn);
        assert_eq!(backend.account_name(), "devstoreaccount1");
    }
}
