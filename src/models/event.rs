use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// An incoming event, validated at the service boundary
///
/// The IP address is parsed during deserialization, so malformed input is
/// rejected before it reaches the classification engine. An absent
/// timestamp is filled with the current time when the event is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub username: String,
    pub source_ip: IpAddr,
    pub event_type: String,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    pub application: String,
    pub success: bool,
}

/// A persisted event row, immutable once written
///
/// `is_suspicious` is the classification decision taken at insert time;
/// it is never recomputed when ranges or flags change later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub source_ip: IpAddr,
    pub event_type: String,
    pub file_size_mb: Option<f64>,
    pub application: String,
    pub success: bool,
    pub is_suspicious: bool,
}

/// Result of running one event through the classification engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Identifier assigned to the appended event row
    pub event_id: i64,
    pub is_suspicious: bool,
    /// True when this event created the user's flag
    pub user_newly_flagged: bool,
    /// True when this event created the IP's flag
    pub ip_newly_flagged: bool,
}

/// Filter and pagination for suspicious-event retrieval
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    /// Keep events with `timestamp >= start`
    pub start: Option<DateTime<Utc>>,
    /// Keep events with `timestamp <= end`
    pub end: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl EventQuery {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 10_000;

    /// A query for the `limit` most recent suspicious events
    pub fn recent(limit: i64) -> Self {
        EventQuery {
            start: None,
            end: None,
            limit,
            offset: 0,
        }
    }
}
