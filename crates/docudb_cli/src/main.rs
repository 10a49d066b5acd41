//! DocuDB CLI
//!
//! Command-line tools for DocuDB stores.
//!
//! # Commands
//!
//! - `inspect` - List datastores and collections with their sizes
//! - `schema` - Print a collection schema
//! - `create-datastore`, `create-collection`, `drop-collection` - Lifecycle
//! - `insert`, `get`, `find` - Record access
//! - `reindex` - Rebuild a column index
//! - `stats` - Index and engine counters

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// DocuDB command-line store tools.
#[derive(Parser)]
#[command(name = "docudb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store base directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List datastores and collections
    Inspect {
        /// Show columns and indexes of each collection
        #[arg(short, long)]
        columns: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the schema of a collection
    Schema {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
    },

    /// Create a datastore
    CreateDatastore {
        /// Datastore name
        datastore: String,
    },

    /// Create a collection
    CreateCollection {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,

        /// Schema as inline JSON or `@file`
        #[arg(short, long, default_value = "{}")]
        schema: String,
    },

    /// Drop a collection into the archive area
    DropCollection {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
    },

    /// Insert a record given as a JSON object
    Insert {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
        /// Record body
        record: String,
    },

    /// Read a record by primary key
    Get {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
        /// Primary key
        key: String,

        /// Comma-separated columns to keep
        #[arg(short, long)]
        columns: Option<String>,
    },

    /// Find records by a column condition
    Find {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
        /// Column to match
        column: String,
        /// Operator (EQ, NEQ, LT, LTEQ, GT, GTEQ, IN, NOT_IN, LIKE)
        operator: String,
        /// Reference value, parsed as JSON when possible
        value: String,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print only primary keys
        #[arg(short, long)]
        keys_only: bool,
    },

    /// Rebuild the index of a column
    Reindex {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,
        /// Indexed column
        column: String,

        /// Return without waiting for the job to finish
        #[arg(short, long)]
        detach: bool,
    },

    /// Show index statistics of a collection and engine counters
    Stats {
        /// Datastore name
        datastore: String,
        /// Collection name
        collection: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("DocuDB CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("DocuDB Core v{}", docudb_core::VERSION);
        return Ok(());
    }

    let path = cli.path.ok_or("Store path required (--path)")?;
    let create = matches!(cli.command, Commands::CreateDatastore { .. });
    let engine = commands::open_engine(&path, create)?;

    match cli.command {
        Commands::Inspect { columns, format } => {
            commands::inspect::run(&engine, columns, &format)?;
        }
        Commands::Schema {
            datastore,
            collection,
        } => {
            commands::schema::run(&engine, &datastore, &collection)?;
        }
        Commands::CreateDatastore { datastore } => {
            engine.datastores().create_datastore(&datastore)?;
            println!("Created datastore {datastore}");
        }
        Commands::CreateCollection {
            datastore,
            collection,
            schema,
        } => {
            commands::lifecycle::create_collection(&engine, &datastore, &collection, &schema)?;
            println!("Created collection {datastore}.{collection}");
        }
        Commands::DropCollection {
            datastore,
            collection,
        } => {
            engine.collections().drop_collection(&datastore, &collection)?;
            println!("Dropped collection {datastore}.{collection}");
        }
        Commands::Insert {
            datastore,
            collection,
            record,
        } => {
            commands::records::insert(&engine, &datastore, &collection, &record)?;
        }
        Commands::Get {
            datastore,
            collection,
            key,
            columns,
        } => {
            commands::records::get(&engine, &datastore, &collection, &key, columns.as_deref())?;
        }
        Commands::Find {
            datastore,
            collection,
            column,
            operator,
            value,
            limit,
            keys_only,
        } => {
            let query = commands::records::Query {
                column: &column,
                operator: operator.parse()?,
                value: commands::parse_value(&value),
                limit,
                keys_only,
            };
            commands::records::find(&engine, &datastore, &collection, &query)?;
        }
        Commands::Reindex {
            datastore,
            collection,
            column,
            detach,
        } => {
            commands::reindex::run(&engine, &datastore, &collection, &column, detach)?;
        }
        Commands::Stats {
            datastore,
            collection,
            format,
        } => {
            commands::stats::run(&engine, &datastore, &collection, &format)?;
        }
        // Printed before the store is opened.
        Commands::Version => {}
    }

    Ok(())
}
