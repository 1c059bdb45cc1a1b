pub mod event;

pub use event::{EventQuery, NewEvent, ProcessOutcome, StoredEvent};
