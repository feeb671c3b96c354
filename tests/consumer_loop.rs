// tests/consumer_loop.rs
use engagement_consumer::error::{ConsumerError, PersistenceError};
use engagement_consumer::{
    Consumer, ConsumerState, DedupTracker, EngagementInsight, EngagementLevel, FailureLimits,
    InsightSink, LevelThresholds, LineSource, SqliteSink,
};
use std::time::Duration;
use tokio::sync::watch;

const ALICE: &str = r#"{"message":"I just found Python! It was amazing.","author":"Alice","timestamp":"t1","category":"tech","sentiment":0.87,"message_length":38}"#;
const BOB: &str = r#"{"message":"I just tried a recipe! It was boring.","author":"Bob","timestamp":"t2","category":"food","sentiment":0.48,"message_length":38}"#;

/// Keeps inserts in memory; fails while `fail` is set.
#[derive(Default)]
struct MockSink {
    fail: bool,
    rows: Vec<EngagementInsight>,
}

impl InsightSink for MockSink {
    fn initialize(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn store(&mut self, insight: &EngagementInsight) -> Result<i64, PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Insert {
                author: insight.author.clone(),
                source: rusqlite::Error::InvalidQuery,
            });
        }
        self.rows.push(insight.clone());
        Ok(self.rows.len() as i64)
    }
}

/// Requests shutdown right after its first successful insert.
struct StopAfterFirstSink {
    tx: watch::Sender<bool>,
    rows: Vec<EngagementInsight>,
}

impl InsightSink for StopAfterFirstSink {
    fn initialize(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn store(&mut self, insight: &EngagementInsight) -> Result<i64, PersistenceError> {
        self.rows.push(insight.clone());
        if self.rows.len() == 1 {
            self.tx.send_replace(true);
        }
        Ok(self.rows.len() as i64)
    }
}

fn limits(source: u32, store: u32) -> FailureLimits {
    FailureLimits { source, store }
}

#[tokio::test]
async fn run_drains_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    std::fs::write(&live, format!("{ALICE}\n{BOB}\n")).unwrap();

    let mut sink = SqliteSink::in_memory().unwrap();
    sink.initialize().unwrap();
    let mut c = Consumer::new(
        LineSource::new(&live),
        sink,
        DedupTracker::new(),
        LevelThresholds::default(),
        FailureLimits::default(),
    );

    let (tx, rx) = watch::channel(false);
    let stopper = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
    });

    c.run(Duration::from_millis(20), rx).await.unwrap();
    stopper.await.unwrap();

    assert_eq!(c.state(), ConsumerState::Stopped);
    let rows = c.sink().recent(10).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].author, "Alice");
}

#[tokio::test]
async fn shutdown_before_first_tick_processes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    std::fs::write(&live, format!("{ALICE}\n")).unwrap();

    let mut c = Consumer::new(
        LineSource::new(&live),
        MockSink::default(),
        DedupTracker::new(),
        LevelThresholds::default(),
        FailureLimits::default(),
    );
    let (_tx, rx) = watch::channel(true);
    c.run(Duration::from_millis(10), rx).await.unwrap();

    assert_eq!(c.state(), ConsumerState::Stopped);
    assert!(c.sink().rows.is_empty());
}

#[tokio::test]
async fn shutdown_mid_drain_stops_after_current_unit() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    let carol = r#"{"message":"ok","author":"Carol","timestamp":"t3","category":"misc","sentiment":0.3}"#;
    std::fs::write(&live, format!("{ALICE}\n{BOB}\n{carol}\n")).unwrap();

    let (tx, rx) = watch::channel(false);
    let mut c = Consumer::new(
        LineSource::new(&live),
        StopAfterFirstSink {
            tx,
            rows: Vec::new(),
        },
        DedupTracker::new(),
        LevelThresholds::default(),
        FailureLimits::default(),
    );
    c.run(Duration::from_millis(10), rx).await.unwrap();

    assert_eq!(c.state(), ConsumerState::Stopped);
    assert_eq!(c.sink().rows.len(), 1);
    assert_eq!(c.sink().rows[0].author, "Alice");
}

#[tokio::test]
async fn persistent_store_failure_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    let lines: String = (0..5)
        .map(|i| {
            format!(
                r#"{{"message":"m{i}","author":"A","timestamp":"t{i}","category":"c","sentiment":0.5}}"#
            ) + "\n"
        })
        .collect();
    std::fs::write(&live, lines).unwrap();

    let mut c = Consumer::new(
        LineSource::new(&live),
        MockSink {
            fail: true,
            rows: Vec::new(),
        },
        DedupTracker::new(),
        LevelThresholds::default(),
        limits(5, 3),
    );
    let (_tx, rx) = watch::channel(false);
    let err = c.run(Duration::from_millis(10), rx).await.unwrap_err();

    assert!(matches!(err, ConsumerError::StoreFailed { failures: 3, .. }));
    assert_eq!(c.state(), ConsumerState::Stopped);
    // failed identities are released for retry
    assert!(c.dedup().is_empty());
}

#[test]
fn isolated_store_failure_does_not_stop_draining() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    std::fs::write(&live, format!("{ALICE}\n")).unwrap();

    let mut c = Consumer::new(
        LineSource::new(&live),
        MockSink {
            fail: true,
            rows: Vec::new(),
        },
        DedupTracker::new(),
        LevelThresholds::default(),
        limits(5, 3),
    );
    let report = c.drain_once().unwrap();
    assert_eq!(report.store_errors, 1);
    assert_eq!(c.state(), ConsumerState::Idle);
}

#[tokio::test]
async fn unreadable_source_stops_after_limit() {
    let dir = tempfile::tempdir().unwrap();
    // a directory is not a readable input file
    let mut c = Consumer::new(
        LineSource::new(dir.path()),
        MockSink::default(),
        DedupTracker::new(),
        LevelThresholds::default(),
        limits(2, 5),
    );
    let (_tx, rx) = watch::channel(false);
    let err = c.run(Duration::from_millis(10), rx).await.unwrap_err();

    assert!(matches!(err, ConsumerError::SourceFailed { failures: 2, .. }));
    assert_eq!(c.state(), ConsumerState::Stopped);
}

#[test]
fn custom_thresholds_flow_into_insights() {
    let dir = tempfile::tempdir().unwrap();
    let live = dir.path().join("live.json");
    std::fs::write(&live, format!("{BOB}\n")).unwrap();

    let mut c = Consumer::new(
        LineSource::new(&live),
        MockSink::default(),
        DedupTracker::new(),
        LevelThresholds {
            high: 90.0,
            medium: 50.0,
            low: 20.0,
        },
        FailureLimits::default(),
    );
    c.drain_once().unwrap();
    assert_eq!(c.sink().rows[0].engagement_level, EngagementLevel::Medium);
}
