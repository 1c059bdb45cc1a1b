//! Persistence module for ranges, flags and the event log
//!
//! All state lives in a relational store behind the traits below; the
//! classification engine holds no state of its own between calls.

pub mod sqlite_store;

pub use sqlite_store::SqliteStore;

use crate::models::{EventQuery, NewEvent, ProcessOutcome, StoredEvent};
use crate::net::CidrRange;
use std::net::IpAddr;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The CIDR being added is already present
    #[error("range {0} already exists")]
    Duplicate(CidrRange),

    /// The CIDR being deleted is not present
    #[error("range {0} not found")]
    NotFound(CidrRange),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("invalid data in database: {0}")]
    InvalidData(String),
}

/// Row-level store operations
///
/// Implemented over a borrowed connection so the same operations run
/// identically in autocommit mode and inside a transaction.
pub trait StoreOps {
    // =====================
    // Suspicious IP ranges
    // =====================

    /// Insert a normalized range; `Duplicate` if it is already stored
    fn add_range(&self, range: &CidrRange) -> Result<(), StoreError>;

    /// All stored ranges, in storage order
    fn list_ranges(&self) -> Result<Vec<CidrRange>, StoreError>;

    /// Delete an exact normalized range; `NotFound` if no row matched
    fn delete_range(&self, range: &CidrRange) -> Result<(), StoreError>;

    /// Whether `ip` falls within at least one stored range
    fn ip_in_suspicious_range(&self, ip: &IpAddr) -> Result<bool, StoreError>;

    // =====================
    // Flag membership sets
    // =====================

    fn is_user_flagged(&self, user: &str) -> Result<bool, StoreError>;

    fn is_ip_flagged(&self, ip: &IpAddr) -> Result<bool, StoreError>;

    /// Idempotent insert; concurrent duplicate inserts are not errors
    fn flag_user(&self, user: &str) -> Result<(), StoreError>;

    /// Idempotent insert; concurrent duplicate inserts are not errors
    fn flag_ip(&self, ip: &IpAddr) -> Result<(), StoreError>;

    // =====================
    // Event log
    // =====================

    /// Append an event with its classification; returns the assigned id
    ///
    /// An unset event timestamp defaults to the current time.
    fn append_event(&self, event: &NewEvent, is_suspicious: bool) -> Result<i64, StoreError>;

    /// Suspicious events matching `query`, newest first
    fn suspicious_events(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, StoreError>;
}

/// A shared store handle with a transactional boundary
///
/// The engine's per-event protocol runs through `transaction` so that flag
/// writes and the event-log append commit as one unit, or not at all.
pub trait EventStore: StoreOps + Send + Sync {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn StoreOps) -> Result<ProcessOutcome, StoreError>,
    ) -> Result<ProcessOutcome, StoreError>;
}
