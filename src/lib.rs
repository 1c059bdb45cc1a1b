pub mod api;
pub mod classification;
pub mod config;
pub mod models;
pub mod net;
pub mod persistence;

// Re-export commonly used types
pub use classification::{ClassificationEngine, SuspicionSignals};
pub use config::Config;
pub use models::{EventQuery, NewEvent, ProcessOutcome, StoredEvent};
pub use net::{CidrParseError, CidrRange};
pub use persistence::{EventStore, SqliteStore, StoreError, StoreOps};
