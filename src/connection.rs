//! Storage account connection string parsing
//!
//! Connection strings are `;`-separated `Key=Value` pairs as issued by the
//! Azure portal, e.g.
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`.
//! `UseDevelopmentStorage=true` selects the local storage emulator.

use crate::error::{Result, TableError};

/// Well-known account of the storage emulator
pub const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

/// Table endpoint port of the storage emulator
pub const EMULATOR_TABLE_PORT: u16 = 10002;

/// Where the table service lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEndpoint {
    /// `{protocol}://{account}.table.{suffix}`
    Account { protocol: String, suffix: String },
    /// Explicit `TableEndpoint=` URI
    Custom { uri: String },
    /// Local emulator on 127.0.0.1
    Emulator,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub account_key: String,
    pub endpoint: TableEndpoint,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl ConnectionString {
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut suffix = None;
        let mut table_endpoint = None;
        let mut development = false;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            // Account keys are base64 and end in '=', so split on the first one only
            let (key, value) = part.split_once('=').ok_or_else(|| {
                TableError::connection("malformed connection string: expected Key=Value segments")
            })?;
            match key {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                "EndpointSuffix" => suffix = Some(value.to_string()),
                "TableEndpoint" => table_endpoint = Some(value.trim_end_matches('/').to_string()),
                "UseDevelopmentStorage" => development = value.eq_ignore_ascii_case("true"),
                _ => {}
            }
        }

        if development {
            return Ok(Self {
                account_name: EMULATOR_ACCOUNT.to_string(),
                account_key: String::new(),
                endpoint: TableEndpoint::Emulator,
            });
        }

        let account_name = account_name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TableError::connection("Invalid connection string: missing AccountName"))?;
        let account_key = account_key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| TableError::connection("Invalid connection string: missing AccountKey"))?;

        let endpoint = match table_endpoint {
            Some(uri) => TableEndpoint::Custom { uri },
            None => TableEndpoint::Account {
                protocol: protocol.unwrap_or_else(|| "https".to_string()),
                suffix: suffix.unwrap_or_else(|| "core.windows.net".to_string()),
            },
        };

        Ok(Self {
            account_name,
            account_key,
            endpoint,
        })
    }

    /// Base URI of the table service
    pub fn table_uri(&self) -> String {
        match &self.endpoint {
            TableEndpoint::Account { protocol, suffix } => {
                format!("{}://{}.table.{}", protocol, self.account_name, suffix)
            }
            TableEndpoint::Custom { uri } => uri.clone(),
            TableEndpoint::Emulator => {
                format!("http://127.0.0.1:{}/{}", EMULATOR_TABLE_PORT, EMULATOR_ACCOUNT)
            }
        }
    }
}
