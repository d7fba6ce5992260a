use clap::{Parser, Subcommand};
use people_table::demo::{self, DemoOptions};
use people_table::{
    DeleteOutcome, MemoryTableBackend, PersonRecord, StorageConfig, TableClient, UpdateOutcome,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// CRUD demo against a people table in Azure Table Storage
#[derive(Parser, Debug)]
#[command(name = "people-table")]
struct Args {
    /// Settings file with an `azureStorage` section
    #[arg(short, long, default_value = people_table::config::DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Use an in-process table instead of Azure (nothing is persisted)
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the fixed demonstration sequence (default)
    Demo {
        /// Seconds to pause between steps
        #[arg(long, default_value_t = 0)]
        pause_secs: u64,

        /// Exit without waiting for Enter
        #[arg(long)]
        no_wait: bool,
    },

    /// Insert or replace a person
    Insert {
        last_name: String,
        first_name: String,
        phone_number: String,
    },

    /// Look up a person
    Get { last_name: String, first_name: String },

    /// Change a person's phone number
    Update {
        last_name: String,
        first_name: String,
        phone_number: String,
    },

    /// Delete a person
    Delete { last_name: String, first_name: String },

    /// List every person in the table
    Scan,
}

const IN_MEMORY_TABLE: &str = "people";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let client = open_client(&args).await?;

    match args.command.unwrap_or(Commands::Demo {
        pause_secs: 0,
        no_wait: false,
    }) {
        Commands::Demo { pause_secs, no_wait } => {
            let options = DemoOptions {
                pause: (pause_secs > 0).then(|| Duration::from_secs(pause_secs)),
            };
            demo::run_demo(&client, &options).await?;

            if !no_wait {
                println!("Press Enter to exit");
                let mut line = String::new();
                BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
            }
        }
        Commands::Insert {
            last_name,
            first_name,
            phone_number,
        } => {
            let person = PersonRecord::new(first_name, last_name, phone_number);
            client.insert(&person).await?;
            println!("Successfully wrote to table store: {}", person);
        }
        Commands::Get {
            last_name,
            first_name,
        } => match client.retrieve(&last_name, &first_name).await? {
            Some(person) => println!("Result found: {}", person),
            None => println!("No matching record in table"),
        },
        Commands::Update {
            last_name,
            first_name,
            phone_number,
        } => match client.update(&last_name, &first_name, &phone_number).await? {
            UpdateOutcome::Updated(person) => println!("Updated: {}", person),
            UpdateOutcome::NotFound => println!("No matching record in table"),
        },
        Commands::Delete {
            last_name,
            first_name,
        } => match client.delete(&last_name, &first_name).await? {
            DeleteOutcome::Deleted => println!("Delete successful"),
            DeleteOutcome::NotFound => println!("No matching record in table"),
        },
        Commands::Scan => {
            let people = client.scan_all().await?;
            demo::print_records(&people);
            println!("{} entries", people.len());
        }
    }

    Ok(())
}

async fn open_client(args: &Args) -> anyhow::Result<TableClient> {
    if args.in_memory {
        let backend = Arc::new(MemoryTableBackend::new());
        return Ok(TableClient::open(backend, IN_MEMORY_TABLE, people_table::config::MAX_SCAN_PAGE_SIZE).await?);
    }

    let config = StorageConfig::load(&args.config)?;
    Ok(TableClient::connect(&config).await?)
}
