// src/consumer.rs
//! Polling loop: source -> decode -> dedup -> score -> store.
//!
//! States: `Idle` (waiting for the next tick), `Draining` (consuming every unit
//! that appeared since the last tick) and `Stopped` (terminal). The interval
//! tick / shutdown `select!` in [`Consumer::run`] is the only await point;
//! shutdown is additionally checked between units so an in-flight store is
//! never interrupted.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::ConsumerConfig;
use crate::dedup::DedupTracker;
use crate::error::{ConsumerError, SourceError};
use crate::record::MessageRecord;
use crate::scoring::{self, storage_precision, LevelThresholds};
use crate::sink::{EngagementInsight, InsightSink};
use crate::source::LineSource;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("consumer_units_read_total", "Raw units read from the input source.");
        describe_counter!(
            "consumer_insights_stored_total",
            "Engagement insights persisted."
        );
        describe_counter!(
            "consumer_duplicates_total",
            "Units skipped because their identity was already processed."
        );
        describe_counter!(
            "consumer_decode_errors_total",
            "Units skipped because they failed to decode."
        );
        describe_counter!(
            "consumer_store_errors_total",
            "Insights that failed to persist."
        );
        describe_gauge!(
            "consumer_last_drain_ts",
            "Unix ts of the last completed drain pass."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureLimits {
    pub source: u32,
    pub store: u32,
}

impl Default for FailureLimits {
    fn default() -> Self {
        Self { source: 5, store: 5 }
    }
}

impl From<&ConsumerConfig> for FailureLimits {
    fn from(cfg: &ConsumerConfig) -> Self {
        Self {
            source: cfg.max_consecutive_source_failures,
            store: cfg.max_consecutive_store_failures,
        }
    }
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub read: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub decode_errors: usize,
    pub store_errors: usize,
}

pub struct Consumer<S: InsightSink> {
    source: LineSource,
    sink: S,
    dedup: DedupTracker,
    thresholds: LevelThresholds,
    limits: FailureLimits,
    state: ConsumerState,
    source_failures: u32,
    store_failures: u32,
}

impl<S: InsightSink> Consumer<S> {
    pub fn new(
        source: LineSource,
        sink: S,
        dedup: DedupTracker,
        thresholds: LevelThresholds,
        limits: FailureLimits,
    ) -> Self {
        ensure_metrics_described();
        Self {
            source,
            sink,
            dedup,
            thresholds,
            limits,
            state: ConsumerState::Idle,
            source_failures: 0,
            store_failures: 0,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn dedup(&self) -> &DedupTracker {
        &self.dedup
    }

    /// Run one drain pass without shutdown checks.
    pub fn drain_once(&mut self) -> Result<DrainReport, ConsumerError> {
        self.drain(None)
    }

    /// Tick every `interval` until `shutdown` flips to true or a terminal error occurs.
    pub async fn run(
        &mut self,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), ConsumerError> {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.drain(Some(&shutdown)) {
                Ok(report) if report.read == 0 => {
                    debug!("No new messages available, waiting...");
                }
                Ok(report) => {
                    debug!(
                        read = report.read,
                        stored = report.stored,
                        duplicates = report.duplicates,
                        decode_errors = report.decode_errors,
                        store_errors = report.store_errors,
                        "drain pass complete"
                    );
                }
                Err(e) => {
                    error!("consumer stopping: {e}");
                    return Err(e);
                }
            }
        }

        self.state = ConsumerState::Stopped;
        info!("Consumer stopped");
        Ok(())
    }

    fn drain(
        &mut self,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> Result<DrainReport, ConsumerError> {
        self.state = ConsumerState::Draining;
        let mut report = DrainReport::default();

        let units = match self.source.poll() {
            Ok(units) => {
                self.source_failures = 0;
                units
            }
            Err(SourceError::Unavailable(path)) => {
                debug!("Data file {} does not exist yet.", path.display());
                self.source_failures = 0;
                Vec::new()
            }
            Err(e) => {
                self.source_failures += 1;
                warn!(
                    failures = self.source_failures,
                    "Error reading input source: {e}"
                );
                if self.source_failures >= self.limits.source {
                    self.state = ConsumerState::Stopped;
                    return Err(ConsumerError::SourceFailed {
                        failures: self.source_failures,
                        last: e,
                    });
                }
                Vec::new()
            }
        };

        counter!("consumer_units_read_total").increment(units.len() as u64);
        report.read = units.len();

        for line in units {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                debug!("shutdown requested mid-drain; remaining units left unprocessed");
                break;
            }
            self.process_unit(&line, &mut report)?;
        }

        gauge!("consumer_last_drain_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        self.state = ConsumerState::Idle;
        Ok(report)
    }

    fn process_unit(&mut self, line: &str, report: &mut DrainReport) -> Result<(), ConsumerError> {
        let record = match MessageRecord::decode(line) {
            Ok(r) => r,
            Err(e) => {
                report.decode_errors += 1;
                counter!("consumer_decode_errors_total").increment(1);
                warn!("Error decoding JSON: {e}");
                return Ok(());
            }
        };

        let key = record.identity();
        if !self.dedup.admit(key) {
            report.duplicates += 1;
            counter!("consumer_duplicates_total").increment(1);
            debug!(author = %record.author, "Message already processed, skipping...");
            return Ok(());
        }

        debug!(
            "Processing message from {}: '{}...'",
            record.author,
            record.preview(50)
        );
        let engagement = scoring::score(record.sentiment, record.message_length, &self.thresholds);
        let insight = EngagementInsight::from_record(&record, engagement);

        match self.sink.store(&insight) {
            Ok(id) => {
                self.store_failures = 0;
                report.stored += 1;
                counter!("consumer_insights_stored_total").increment(1);
                info!(
                    id,
                    "Stored engagement insight: {} ({}) for message by {}",
                    insight.engagement_level,
                    storage_precision(insight.engagement_score),
                    insight.author
                );
                Ok(())
            }
            Err(e) => {
                self.dedup.release(&key);
                self.store_failures += 1;
                report.store_errors += 1;
                counter!("consumer_store_errors_total").increment(1);
                warn!(
                    author = %insight.author,
                    timestamp = %insight.timestamp,
                    score = insight.engagement_score,
                    level = %insight.engagement_level,
                    failures = self.store_failures,
                    "Failed to store engagement insight: {e}"
                );
                if self.store_failures >= self.limits.store {
                    self.state = ConsumerState::Stopped;
                    return Err(ConsumerError::StoreFailed {
                        failures: self.store_failures,
                        last: e,
                    });
                }
                Ok(())
            }
        }
    }
}
