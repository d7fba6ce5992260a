//! PersonRecord: the entity stored in the people table
//!
//! A person is addressed by (last name, first name): the last name is the
//! partition key and the first name is the row key. The phone number is the
//! only mutable payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest key the table service accepts, in characters
pub const MAX_KEY_LEN: usize = 1024;

/// Longest string property the table service accepts, in characters
pub const MAX_STRING_PROPERTY_LEN: usize = 32 * 1024;

/// Two-part record address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub partition_key: String,
    pub row_key: String,
}

impl RecordKey {
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
        }
    }

    /// Check both key parts against the service's key rules.
    ///
    /// Returns the reason for the first violation found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        validate_key_part("PartitionKey", &self.partition_key)?;
        validate_key_part("RowKey", &self.row_key)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition_key, self.row_key)
    }
}

fn validate_key_part(name: &str, value: &str) -> std::result::Result<(), String> {
    let len = value.chars().count();
    if len > MAX_KEY_LEN {
        return Err(format!("{} is {} characters (max: {})", name, len, MAX_KEY_LEN));
    }
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '/' | '\\' | '#' | '?') || c.is_control())
    {
        return Err(format!("{} contains disallowed character {:?}", name, c));
    }
    Ok(())
}

/// A person entity
///
/// Field names serialize to the table service's property names
/// (`PartitionKey`, `RowKey`, `PhoneNumber`). `Timestamp` is owned by the
/// service: it is read back but never sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonRecord {
    pub partition_key: String,
    pub row_key: String,
    pub phone_number: String,
    #[serde(skip_serializing, default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl PersonRecord {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            partition_key: last_name.into(),
            row_key: first_name.into(),
            phone_number: phone_number.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn last_name(&self) -> &str {
        &self.partition_key
    }

    pub fn first_name(&self) -> &str {
        &self.row_key
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.partition_key.clone(), self.row_key.clone())
    }

    /// Equality on everything except the service-assigned timestamp
    pub fn same_contents(&self, other: &PersonRecord) -> bool {
        self.partition_key == other.partition_key
            && self.row_key == other.row_key
            && self.phone_number == other.phone_number
    }
}

impl fmt::Display for PersonRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.first_name(),
            self.last_name(),
            self.phone_number
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_mapping() {
        let person = PersonRecord::new("John", "Smith", "0411223344");
        assert_eq!(person.partition_key, "Smith");
        assert_eq!(person.row_key, "John");
        assert_eq!(person.last_name(), "Smith");
        assert_eq!(person.first_name(), "John");
        assert_eq!(person.to_string(), "John Smith 0411223344");
        assert_eq!(person.key(), RecordKey::new("Smith", "John"));
    }

    #[test]
    fn test_wire_names() {
        let person = PersonRecord::new("Jane", "Doe", "9999999");
        let json = serde_json::to_value(&person).unwrap();

        assert_eq!(json["PartitionKey"], "Doe");
        assert_eq!(json["RowKey"], "Jane");
        assert_eq!(json["PhoneNumber"], "9999999");
        assert!(json.get("Timestamp").is_none());
    }

    #[test]
    fn test_reads_service_entity() {
        let body = r#"{
            "odata.etag": "W/\"datetime'2024-05-01T10%3A00%3A00.1234567Z'\"",
            "PartitionKey": "Doe",
            "RowKey": "John",
            "Timestamp": "2024-05-01T10:00:00.1234567Z",
            "PhoneNumber": "1111111"
        }"#;
        let person: PersonRecord = serde_json::from_str(body).unwrap();

        assert_eq!(person.key(), RecordKey::new("Doe", "John"));
        assert_eq!(person.phone_number, "1111111");
        assert_eq!(person.timestamp.timestamp_subsec_nanos(), 123_456_700);
    }

    #[test]
    fn test_same_contents_ignores_timestamp() {
        let a = PersonRecord::new("John", "Smith", "1");
        let mut b = a.clone();
        b.timestamp = a.timestamp + chrono::Duration::seconds(30);
        assert!(a.same_contents(&b));

        b.phone_number = "2".to_string();
        assert!(!a.same_contents(&b));
    }

    #[test]
    fn test_key_validation() {
        assert!(RecordKey::new("Smith", "John").validate().is_ok());
        assert!(RecordKey::new("", "").validate().is_ok());
        assert!(RecordKey::new("Smith/Jones", "John").validate().is_err());
        assert!(RecordKey::new("Smith", "Jo#hn").validate().is_err());
        assert!(RecordKey::new("Smith", "John?").validate().is_err());
        assert!(RecordKey::new("back\\slash", "x").validate().is_err());
        assert!(RecordKey::new("tab\there", "x").validate().is_err());

        let long = "a".repeat(MAX_KEY_LEN + 1);
        let reason = RecordKey::new("Smith", long).validate().unwrap_err();
        assert!(reason.contains("RowKey"));
    }
}
