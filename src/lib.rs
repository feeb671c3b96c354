// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod consumer;
pub mod dedup;
pub mod error;
pub mod record;
pub mod scoring;
pub mod sink;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::config::ConsumerConfig;
pub use crate::consumer::{Consumer, ConsumerState, DrainReport, FailureLimits};
pub use crate::dedup::DedupTracker;
pub use crate::record::MessageRecord;
pub use crate::scoring::{EngagementLevel, LevelThresholds};
pub use crate::sink::{EngagementInsight, InsightSink, SqliteSink};
pub use crate::source::LineSource;
