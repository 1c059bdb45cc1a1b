//! SQLite implementation of the store traits

use super::{EventStore, StoreError, StoreOps};
use crate::models::{EventQuery, NewEvent, ProcessOutcome, StoredEvent};
use crate::net::CidrRange;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, ErrorCode};
use std::net::IpAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

/// SQLite-backed store
///
/// Holds the single shared connection with explicit lifecycle: opened on
/// service start, schema applied immediately, closed on drop.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the specified path
    ///
    /// Creates the database file and initializes the schema if needed.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }
}

/// Operations over a borrowed connection
///
/// `SqliteStore` delegates here for autocommit calls, and `transaction`
/// builds one over the active transaction so the engine protocol commits
/// atomically.
struct SqliteOps<'a> {
    conn: &'a Connection,
}

/// Helper to parse an IP address from a database string
fn parse_ip(ip_str: &str) -> Result<IpAddr, StoreError> {
    IpAddr::from_str(ip_str)
        .map_err(|_| StoreError::InvalidData(format!("invalid IP address: {}", ip_str)))
}

/// Helper to parse a CIDR range from a database string
fn parse_range(cidr_str: &str) -> Result<CidrRange, StoreError> {
    CidrRange::from_str(cidr_str)
        .map_err(|_| StoreError::InvalidData(format!("invalid CIDR range: {}", cidr_str)))
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid timestamp: {}", millis)))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

impl StoreOps for SqliteOps<'_> {
    fn add_range(&self, range: &CidrRange) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO suspicious_ip_ranges (cidr) VALUES (?)",
            params![range.to_string()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate(*range)),
            Err(e) => Err(e.into()),
        }
    }

    fn list_ranges(&self) -> Result<Vec<CidrRange>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT cidr FROM suspicious_ip_ranges")?;

        let cidrs = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        cidrs.iter().map(|c| parse_range(c)).collect()
    }

    fn delete_range(&self, range: &CidrRange) -> Result<(), StoreError> {
        let rows_affected = self.conn.execute(
            "DELETE FROM suspicious_ip_ranges WHERE cidr = ?",
            params![range.to_string()],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(*range));
        }
        Ok(())
    }

    fn ip_in_suspicious_range(&self, ip: &IpAddr) -> Result<bool, StoreError> {
        // SQLite has no native network type, so containment is tested
        // numerically against every stored range.
        let ranges = self.list_ranges()?;
        Ok(ranges.iter().any(|range| range.contains(ip)))
    }

    fn is_user_flagged(&self, user: &str) -> Result<bool, StoreError> {
        let flagged = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM flagged_users WHERE username = ?)",
            params![user],
            |row| row.get(0),
        )?;
        Ok(flagged)
    }

    fn is_ip_flagged(&self, ip: &IpAddr) -> Result<bool, StoreError> {
        let flagged = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM flagged_ips WHERE ip = ?)",
            params![ip.to_string()],
            |row| row.get(0),
        )?;
        Ok(flagged)
    }

    fn flag_user(&self, user: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO flagged_users (username) VALUES (?)",
            params![user],
        )?;
        Ok(())
    }

    fn flag_ip(&self, ip: &IpAddr) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO flagged_ips (ip) VALUES (?)",
            params![ip.to_string()],
        )?;
        Ok(())
    }

    fn append_event(&self, event: &NewEvent, is_suspicious: bool) -> Result<i64, StoreError> {
        let timestamp = event.timestamp.unwrap_or_else(Utc::now);

        self.conn.execute(
            "INSERT INTO events
             (timestamp, username, source_ip, event_type, file_size_mb, application, success, is_suspicious)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                timestamp.timestamp_millis(),
                event.username,
                event.source_ip.to_string(),
                event.event_type,
                event.file_size_mb,
                event.application,
                event.success,
                is_suspicious,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn suspicious_events(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, StoreError> {
        let mut sql = String::from(
            "SELECT id, timestamp, username, source_ip, event_type, file_size_mb, application, success, is_suspicious
             FROM events WHERE is_suspicious = 1",
        );
        let mut bindings: Vec<i64> = Vec::new();

        if let Some(start) = query.start {
            sql.push_str(" AND timestamp >= ?");
            bindings.push(start.timestamp_millis());
        }
        if let Some(end) = query.end {
            sql.push_str(" AND timestamp <= ?");
            bindings.push(end.timestamp_millis());
        }

        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?");
        bindings.push(query.limit);
        bindings.push(query.offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bindings), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, bool>(7)?,
                    row.get::<_, bool>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (id, millis, username, ip_str, event_type, file_size_mb, application, success, is_suspicious) in rows {
            events.push(StoredEvent {
                id,
                timestamp: timestamp_from_millis(millis)?,
                username,
                source_ip: parse_ip(&ip_str)?,
                event_type,
                file_size_mb,
                application,
                success,
                is_suspicious,
            });
        }

        Ok(events)
    }
}

impl StoreOps for SqliteStore {
    fn add_range(&self, range: &CidrRange) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.add_range(range)
    }

    fn list_ranges(&self) -> Result<Vec<CidrRange>, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.list_ranges()
    }

    fn delete_range(&self, range: &CidrRange) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.delete_range(range)
    }

    fn ip_in_suspicious_range(&self, ip: &IpAddr) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.ip_in_suspicious_range(ip)
    }

    fn is_user_flagged(&self, user: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.is_user_flagged(user)
    }

    fn is_ip_flagged(&self, ip: &IpAddr) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.is_ip_flagged(ip)
    }

    fn flag_user(&self, user: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.flag_user(user)
    }

    fn flag_ip(&self, ip: &IpAddr) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.flag_ip(ip)
    }

    fn append_event(&self, event: &NewEvent, is_suspicious: bool) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.append_event(event, is_suspicious)
    }

    fn suspicious_events(&self, query: &EventQuery) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.conn.lock().unwrap();
        SqliteOps { conn: &conn }.suspicious_events(query)
    }
}

impl EventStore for SqliteStore {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&dyn StoreOps) -> Result<ProcessOutcome, StoreError>,
    ) -> Result<ProcessOutcome, StoreError> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let outcome = f(&SqliteOps { conn: &tx })?;
        tx.commit()?;
        Ok(outcome)
    }
}
