pub mod engine;

pub use engine::{ClassificationEngine, SuspicionSignals};
