//! ReconKV CLI
//!
//! Command-line interface operating directly on a ReconKV data directory.

use clap::{Parser, Subcommand};
use reconkv::{Config, MemTable, ReconError};
use tracing_subscriber::{fmt, EnvFilter};

/// ReconKV CLI
#[derive(Parser, Debug)]
#[command(name = "reconkv-cli")]
#[command(about = "CLI for the ReconKV embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./reconkv_data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List entries whose key contains a substring
    Scan {
        /// Substring to match (empty matches everything)
        #[arg(default_value = "")]
        pattern: String,

        /// Stop after this many entries
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Merge all partitions into one
    Compact,

    /// Show partition statistics
    Stats,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reconkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> reconkv::Result<()> {
    let config = Config::builder().data_dir(&args.data_dir).build();
    let table = MemTable::open(&config)?;

    match args.command {
        Commands::Get { key } => match table.get(key.as_bytes()) {
            Ok(value) => println!("{}", String::from_utf8_lossy(&value)),
            Err(ReconError::NotFound) => println!("(nil)"),
            Err(e) => return Err(e),
        },
        Commands::Set { key, value } => {
            table.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            table.del(key.as_bytes())?;
            println!("OK");
        }
        Commands::Scan { pattern, limit } => {
            let limit = limit.unwrap_or(usize::MAX);
            let mut printed = 0;
            table.scan(pattern.as_bytes(), |key, value| {
                if printed >= limit {
                    return false;
                }
                println!("{} = {}", String::from_utf8_lossy(key), String::from_utf8_lossy(value));
                printed += 1;
                true
            })?;
        }
        Commands::Compact => {
            let result = table.compact()?;
            println!(
                "merged {} partitions: {} keys kept, {} tombstones dropped",
                result.partitions_merged, result.keys_written, result.tombstones_dropped
            );
        }
        Commands::Stats => {
            let (opened, available) = table.with_log(|log| {
                (log.opened_timestamps().len(), log.available_timestamps().len())
            });
            println!("version:    {}", reconkv::VERSION);
            println!("partitions: {}", table.partition_count());
            println!("opened:     {}", opened);
            println!("available:  {}", available);
        }
    }

    // Mutations only become durable once synced
    table.close()
}
