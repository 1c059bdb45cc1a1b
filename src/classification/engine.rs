//! Suspicious-event classification
//!
//! Each incoming event is evaluated against the current store state: an
//! event is suspicious when its source IP falls in a stored range, its user
//! was flagged before, or its IP was flagged before. Once any signal fires,
//! both the user and the IP are flagged, so every later event from either
//! is suspicious through the flag-membership shortcut alone. Flags are
//! never cleared.

use crate::models::{NewEvent, ProcessOutcome};
use crate::persistence::{EventStore, StoreError, StoreOps};
use std::sync::Arc;

/// The three independent suspicion signals, snapshotted per event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuspicionSignals {
    pub user_flagged: bool,
    pub ip_flagged: bool,
    pub ip_in_range: bool,
}

impl SuspicionSignals {
    /// An event is suspicious when any signal fires
    pub fn any(&self) -> bool {
        self.user_flagged || self.ip_flagged || self.ip_in_range
    }
}

/// Classification engine over a shared store handle
///
/// The engine keeps no state between calls; each event is a pure decision
/// over the store snapshot plus the flag writes and the event-log append,
/// all committed in one transaction.
#[derive(Clone)]
pub struct ClassificationEngine {
    store: Arc<dyn EventStore>,
}

impl ClassificationEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        ClassificationEngine { store }
    }

    /// Classify one event and record it
    ///
    /// Runs the whole protocol inside a single store transaction: either
    /// the event row and any new flags commit together, or none of it does.
    pub fn process_event(&self, event: &NewEvent) -> Result<ProcessOutcome, StoreError> {
        self.store
            .transaction(&mut |ops| classify_and_record(ops, event))
    }

    /// Classify a batch of events independently, in submission order
    ///
    /// Each event runs in its own transaction; a storage failure stops the
    /// batch at that event, leaving earlier events committed.
    pub fn process_batch(&self, events: &[NewEvent]) -> Result<Vec<ProcessOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.process_event(event)?);
        }
        Ok(outcomes)
    }
}

/// The per-event protocol, run against a transaction-scoped store view
fn classify_and_record(ops: &dyn StoreOps, event: &NewEvent) -> Result<ProcessOutcome, StoreError> {
    let signals = SuspicionSignals {
        user_flagged: ops.is_user_flagged(&event.username)?,
        ip_flagged: ops.is_ip_flagged(&event.source_ip)?,
        ip_in_range: ops.ip_in_suspicious_range(&event.source_ip)?,
    };

    let is_suspicious = signals.any();
    let user_newly_flagged = is_suspicious && !signals.user_flagged;
    let ip_newly_flagged = is_suspicious && !signals.ip_flagged;

    if user_newly_flagged {
        ops.flag_user(&event.username)?;
    }
    if ip_newly_flagged {
        ops.flag_ip(&event.source_ip)?;
    }

    let event_id = ops.append_event(event, is_suspicious)?;

    if is_suspicious {
        log::warn!(
            "SUSPICIOUS EVENT: user: {}, ip: {}, type: {}, signals: user_flagged={} ip_flagged={} ip_in_range={}",
            event.username,
            event.source_ip,
            event.event_type,
            signals.user_flagged,
            signals.ip_flagged,
            signals.ip_in_range
        );
    }

    Ok(ProcessOutcome {
        event_id,
        is_suspicious,
        user_newly_flagged,
        ip_newly_flagged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventQuery;
    use crate::persistence::SqliteStore;
    use chrono::DateTime;

    fn create_engine() -> (ClassificationEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().expect("Failed to create in-memory store"));
        (ClassificationEngine::new(store.clone()), store)
    }

    fn event(user: &str, ip: &str, timestamp_secs: i64) -> NewEvent {
        NewEvent {
            timestamp: DateTime::from_timestamp(timestamp_secs, 0),
            username: user.to_string(),
            source_ip: ip.parse().unwrap(),
            event_type: "login".to_string(),
            file_size_mb: None,
            application: "email".to_string(),
            success: true,
        }
    }

    #[test]
    fn test_clean_event_not_suspicious() {
        let (engine, store) = create_engine();

        let outcome = engine
            .process_event(&event("alice", "10.0.0.5", 1_700_000_000))
            .unwrap();

        assert!(!outcome.is_suspicious);
        assert!(!outcome.user_newly_flagged);
        assert!(!outcome.ip_newly_flagged);

        // The event is logged, but not as suspicious, and no flags appear
        assert!(store.suspicious_events(&EventQuery::recent(10)).unwrap().is_empty());
        assert!(!store.is_user_flagged("alice").unwrap());
        assert!(!store.is_ip_flagged(&"10.0.0.5".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_range_hit_flags_user_and_ip() {
        let (engine, store) = create_engine();
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();

        let outcome = engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_000))
            .unwrap();

        assert!(outcome.is_suspicious);
        assert!(outcome.user_newly_flagged);
        assert!(outcome.ip_newly_flagged);
        assert!(store.is_user_flagged("alice").unwrap());
        assert!(store.is_ip_flagged(&"173.99.253.17".parse().unwrap()).unwrap());

        let logged = store.suspicious_events(&EventQuery::recent(10)).unwrap();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].is_suspicious);
    }

    #[test]
    fn test_flagged_user_infects_new_ip() {
        let (engine, store) = create_engine();
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();

        engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_000))
            .unwrap();

        // Same user, a fresh IP outside every range: suspicious purely via
        // the user flag, and the new IP becomes flagged too.
        let outcome = engine
            .process_event(&event("alice", "8.8.8.8", 1_700_000_060))
            .unwrap();

        assert!(outcome.is_suspicious);
        assert!(!outcome.user_newly_flagged);
        assert!(outcome.ip_newly_flagged);
        assert!(store.is_ip_flagged(&"8.8.8.8".parse().unwrap()).unwrap());
    }

    #[test]
    fn test_flagged_ip_infects_new_user() {
        let (engine, store) = create_engine();
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();

        engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_000))
            .unwrap();

        // A different user from the now-flagged IP
        let outcome = engine
            .process_event(&event("bob", "173.99.253.17", 1_700_000_060))
            .unwrap();

        assert!(outcome.is_suspicious);
        assert!(outcome.user_newly_flagged);
        assert!(!outcome.ip_newly_flagged);
        assert!(store.is_user_flagged("bob").unwrap());
    }

    #[test]
    fn test_repeat_offender_creates_no_new_flags() {
        let (engine, store) = create_engine();
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();

        engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_000))
            .unwrap();
        let outcome = engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_060))
            .unwrap();

        assert!(outcome.is_suspicious);
        assert!(!outcome.user_newly_flagged);
        assert!(!outcome.ip_newly_flagged);
    }

    #[test]
    fn test_snapshot_semantics_no_retroactive_reclassification() {
        let (engine, store) = create_engine();

        // Processed while the store is empty: not suspicious
        engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_000))
            .unwrap();

        // Adding the range later does not reclassify the past event
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();
        assert!(store.suspicious_events(&EventQuery::recent(10)).unwrap().is_empty());

        // But the next event from that IP is suspicious
        let outcome = engine
            .process_event(&event("alice", "173.99.253.17", 1_700_000_060))
            .unwrap();
        assert!(outcome.is_suspicious);
    }

    #[test]
    fn test_batch_processed_in_submission_order() {
        let (engine, store) = create_engine();
        store.add_range(&"173.99.253.0/24".parse().unwrap()).unwrap();

        let batch = vec![
            event("alice", "10.0.0.5", 1_700_000_000),
            event("alice", "173.99.253.17", 1_700_000_001),
            // Suspicious only because the previous event flagged alice
            event("alice", "10.0.0.5", 1_700_000_002),
        ];

        let outcomes = engine.process_batch(&batch).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(!outcomes[0].is_suspicious);
        assert!(outcomes[1].is_suspicious);
        assert!(outcomes[2].is_suspicious);
        assert!(!outcomes[2].user_newly_flagged);
        assert!(outcomes[2].ip_newly_flagged);
    }

    #[test]
    fn test_signals_disjunction() {
        let all_clear = SuspicionSignals {
            user_flagged: false,
            ip_flagged: false,
            ip_in_range: false,
        };
        assert!(!all_clear.any());

        for (user_flagged, ip_flagged, ip_in_range) in [
            (true, false, false),
            (false, true, false),
            (false, false, true),
            (true, true, true),
        ] {
            let signals = SuspicionSignals {
                user_flagged,
                ip_flagged,
                ip_in_range,
            };
            assert!(signals.any());
        }
    }
}
