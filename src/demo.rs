//! The fixed demonstration sequence
//!
//! Insert three people, look one up, list the table, change a phone number,
//! delete a record, and list the table again. Every step completes before
//! the next starts; the optional pause only spaces out the console output.

use std::time::Duration;
use tracing::info;

use crate::client::{DeleteOutcome, TableClient, UpdateOutcome};
use crate::error::Result;
use crate::record::PersonRecord;

#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    /// Pause between steps, for reading along
    pub pause: Option<Duration>,
}

/// What the demo observed, step by step
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub found: Option<PersonRecord>,
    pub initial_scan: Vec<PersonRecord>,
    pub updated: Option<PersonRecord>,
    pub deleted: bool,
    pub lookup_after_delete: Option<PersonRecord>,
    pub final_scan: Vec<PersonRecord>,
}

pub fn demo_people() -> Vec<PersonRecord> {
    vec![
        PersonRecord::new("John", "Smith", "0411223344"),
        PersonRecord::new("Jane", "Doe", "9999999"),
        PersonRecord::new("John", "Doe", "1111111"),
    ]
}

/// Run the sequence once. The first error aborts the remaining steps.
pub async fn run_demo(client: &TableClient, options: &DemoOptions) -> Result<DemoReport> {
    info!("Starting demo against table {}", client.table_name());

    // Create
    for person in demo_people() {
        println!("Adding new entry: {}", person);
        client.insert(&person).await.map_err(|e| {
            println!("Insert to table failed with error {}", e);
            e
        })?;
        println!("Successfully wrote to table store");
    }

    // Read
    let found = client.retrieve("Smith", "John").await?;
    match &found {
        Some(person) => println!("Result found: {}", person),
        None => println!("No matching record in table"),
    }
    pause(options).await;

    // Read all values in table
    println!("Getting all values in table");
    let initial_scan = client.scan_all().await?;
    print_records(&initial_scan);
    pause(options).await;

    // Update
    println!("Updating record");
    let updated = match client.update("Smith", "John", "12345678").await? {
        UpdateOutcome::Updated(person) => {
            println!("Updated: {}", person);
            Some(person)
        }
        UpdateOutcome::NotFound => {
            println!("No matching record in table");
            None
        }
    };
    pause(options).await;

    // Delete
    println!("Deleting entry: John Doe");
    let deleted = match client.delete("Doe", "John").await? {
        DeleteOutcome::Deleted => {
            println!("Delete successful");
            true
        }
        DeleteOutcome::NotFound => {
            println!("No matching record in table");
            false
        }
    };

    let lookup_after_delete = client.retrieve("Doe", "John").await?;
    if lookup_after_delete.is_none() {
        println!("John Doe no longer in table");
    }

    println!("Getting all values in table");
    let final_scan = client.scan_all().await?;
    print_records(&final_scan);

    println!("Done");
    Ok(DemoReport {
        found,
        initial_scan,
        updated,
        deleted,
        lookup_after_delete,
        final_scan,
    })
}

pub fn print_records(records: &[PersonRecord]) {
    for person in records {
        println!("{}", person);
    }
}

async fn pause(options: &DemoOptions) {
    if let Some(duration) = options.pause {
        println!("Sleeping for {} secs", duration.as_secs());
        tokio::time::sleep(duration).await;
    }
}
