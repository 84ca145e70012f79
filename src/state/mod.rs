// DANS : src/state/mod.rs

pub mod stats;

pub use stats::{Outcome, StatsAggregator, StatsReport, TransactionCounters};
