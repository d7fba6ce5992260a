use std::fmt;

use thiserror::Error;

use crate::record::RecordKey;

/// The table operation an error was raised from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Insert,
    Retrieve,
    Update,
    Delete,
    Scan,
}

impl Operation {
    /// Operations that write to the table. Service rejections of these
    /// surface as `TableError::Write`, everything else as `TableError::Read`.
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Insert | Operation::Update | Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Initialize => "initialize",
            Operation::Insert => "insert",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Scan => "scan",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Connection error: {reason}")]
    Connection { reason: String },

    #[error("Table service error during {operation}: {reason}")]
    Service { operation: Operation, reason: String },

    #[error("{operation} of {key} rejected by table service: {reason}")]
    Write {
        operation: Operation,
        key: RecordKey,
        reason: String,
    },

    #[error("{operation} failed: {reason}")]
    Read { operation: Operation, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TableError {
    pub fn connection(reason: impl Into<String>) -> Self {
        TableError::Connection {
            reason: reason.into(),
        }
    }

    pub fn service(operation: Operation, reason: impl Into<String>) -> Self {
        TableError::Service {
            operation,
            reason: reason.into(),
        }
    }

    pub fn write(operation: Operation, key: &RecordKey, reason: impl Into<String>) -> Self {
        TableError::Write {
            operation,
            key: key.clone(),
            reason: reason.into(),
        }
    }

    pub fn read(operation: Operation, reason: impl Into<String>) -> Self {
        TableError::Read {
            operation,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TableError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_operations() {
        assert!(Operation::Insert.is_write());
        assert!(Operation::Update.is_write());
        assert!(Operation::Delete.is_write());
        assert!(!Operation::Retrieve.is_write());
        assert!(!Operation::Scan.is_write());
        assert!(!Operation::Initialize.is_write());
    }

    #[test]
    fn test_error_messages() {
        let key = RecordKey::new("Smith", "John");
        let err = TableError::write(Operation::Insert, &key, "PropertyValueTooLarge");
        assert_eq!(
            err.to_string(),
            "insert of (Smith, John) rejected by table service: PropertyValueTooLarge"
        );

        let err = TableError::service(Operation::Scan, "connection refused");
        assert_eq!(
            err.to_string(),
            "Table service error during scan: connection refused"
        );
    }
}
