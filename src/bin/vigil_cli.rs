use std::path::PathBuf;
use structopt::StructOpt;

use vigil::config::Config;
use vigil::models::EventQuery;
use vigil::persistence::{SqliteStore, StoreOps};

/// Vigil suspicious-event service command line interface
#[derive(StructOpt, Debug)]
#[structopt(name = "vigil", about = "Suspicious event service CLI")]
pub enum Cli {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// List stored suspicious IP ranges
    Ranges {
        /// Path to the SQLite database file
        #[structopt(short, long, default_value = "vigil.db")]
        db: PathBuf,
    },
    /// Show recent suspicious events
    Events {
        /// Path to the SQLite database file
        #[structopt(short, long, default_value = "vigil.db")]
        db: PathBuf,
        /// Number of events to show
        #[structopt(short, long, default_value = "10")]
        limit: i64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::from_args();

    match cli {
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Ranges { db } => {
            let store = open_store(&db)?;
            let ranges = store.list_ranges()?;

            if ranges.is_empty() {
                println!("No suspicious IP ranges stored");
            } else {
                println!("Suspicious IP ranges ({}):", ranges.len());
                for range in ranges {
                    println!("  {}", range);
                }
            }
        }
        Cli::Events { db, limit } => {
            if !(1..=EventQuery::MAX_LIMIT).contains(&limit) {
                eprintln!("limit must be between 1 and {}", EventQuery::MAX_LIMIT);
                std::process::exit(1);
            }

            let store = open_store(&db)?;
            let events = store.suspicious_events(&EventQuery::recent(limit))?;

            println!("Suspicious events (showing {}):\n", events.len());
            for event in events {
                println!(
                    "  [{}] User: {}, IP: {}, Type: {}, App: {}, Success: {}",
                    event.timestamp.to_rfc3339(),
                    event.username,
                    event.source_ip,
                    event.event_type,
                    event.application,
                    event.success
                );
            }
        }
    }

    Ok(())
}

fn open_store(db: &PathBuf) -> Result<SqliteStore, Box<dyn std::error::Error>> {
    if !db.exists() {
        eprintln!("Database file not found: {:?}", db);
        std::process::exit(1);
    }
    Ok(SqliteStore::open(db)?)
}
