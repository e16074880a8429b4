use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use webtrail_events::{
    shared, EventCursor, EventRecord, EventStore, SqliteEventStore, StoreError,
};
use webtrail_logger::{
    AssertionFailure, BrowserSession, CaptureError, EventLog, EventPipeline, ExecutionContext, FailureRegistry,
    LogError, Logger, LoggerError, PriorityConfiguration,
};
use webtrail_types::{EventAction, EventSource, Priority, RunId, ScreenshotKind};

/// Collects inserted records in memory.
#[derive(Clone, Default)]
struct RecordingStore {
    records: Arc<Mutex<Vec<EventRecord>>>,
    fail_inserts: bool,
}

impl RecordingStore {
    fn records(&self) -> Vec<EventRecord> {
        self.records.lock().expect("records lock").clone()
    }
}

impl EventStore for RecordingStore {
    fn open(&mut self, _run: &RunId) -> Result<(), StoreError> {
        Ok(())
    }

    fn insert(&mut self, record: EventRecord) -> Result<(), StoreError> {
        if self.fail_inserts {
            return Err(StoreError::NotOpen);
        }
        self.records.lock().expect("records lock").push(record);
        Ok(())
    }

    fn write(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn read_all(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError> {
        let run = run.clone();
        let records: Vec<EventRecord> = self
            .records()
            .into_iter()
            .filter(|r| r.run_id == run)
            .collect();
        Ok(EventCursor::new(records.into_iter().map(Ok)))
    }

    fn read_milestones(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError> {
        self.read_all(run)
    }

    fn is_open(&self) -> bool {
        true
    }
}

/// A session whose capture behavior is fixed up front.
#[derive(Default)]
struct FakeSession {
    image: Option<Vec<u8>>,
    markup: Option<String>,
    fail: bool,
    captures: AtomicUsize,
}

impl FakeSession {
    fn rendering() -> Self {
        Self {
            image: Some(vec![0x89, b'P', b'N', b'G']),
            ..Self::default()
        }
    }

    fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl BrowserSession for FakeSession {
    fn capture_image(&self) -> Result<Option<Vec<u8>>, CaptureError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CaptureError::Driver("window closed".to_string()));
        }
        Ok(self.image.clone())
    }

    fn capture_markup(&self) -> Result<Option<String>, CaptureError> {
        Ok(self.markup.clone())
    }
}

fn pipeline(priorities: PriorityConfiguration) -> (RecordingStore, EventPipeline) {
    let store = RecordingStore::default();
    let pipeline = EventPipeline::new(
        RunId::new("run-1"),
        Arc::new(priorities),
        shared(store.clone()),
    );
    (store, pipeline)
}

// ── filtering ────────────────────────────────────────────────────────

#[test]
fn loggers_below_the_threshold_never_touch_the_store() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    let factory = pipeline.factory(EventSource::Test);

    let debug = factory.on_debug("LoginTest", "logs_in").expect("logger");
    assert!(matches!(debug, Logger::Null(_)));
    assert!(!debug.will_log());
    assert!(!debug.will_capture_screenshot(Priority::Exception));
    debug
        .log(EventAction::custom("STEP").expect("free label"), "step", &[&"ignored"])
        .expect("null log succeeds");
    assert!(store.records().is_empty());

    let doku = factory.on_doku("LoginTest", "logs_in").expect("logger");
    assert!(doku.will_log());
    doku.log(EventAction::custom("STEP").expect("free label"), "step", &[&"one"])
        .expect("log");
    doku.log(EventAction::custom("STEP").expect("free label"), "step", &[&"two"])
        .expect("log");

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].argument(0), Some("one"));
    assert_eq!(records[0].source, EventSource::Test);
    assert_eq!(records[0].group, "LoginTest");
    assert_eq!(records[0].item, "logs_in");
    assert_eq!(records[0].priority, Priority::Documentation);
    assert_eq!(records[0].run_id, RunId::new("run-1"));
}

#[test]
fn item_override_leaves_siblings_on_the_default() {
    let priorities = PriorityConfiguration::with_default(Priority::Documentation);
    priorities.set_priority(Priority::Exception, EventSource::Test, Some("ClassA"), Some("methodX"));
    let (_store, pipeline) = pipeline(priorities);
    let factory = pipeline.factory(EventSource::Test);

    assert!(!factory.on_doku("ClassA", "methodX").expect("logger").will_log());
    assert!(factory.on_doku("ClassA", "methodY").expect("logger").will_log());
}

#[test]
fn unseeded_source_is_a_configuration_error() {
    let (_store, pipeline) = pipeline(PriorityConfiguration::new());
    let err = pipeline
        .factory(EventSource::Widget)
        .on_exception("Table", "rows")
        .expect_err("factory should refuse");
    assert!(matches!(err, LoggerError::MissingDefault(EventSource::Widget)));
}

// ── screenshots ──────────────────────────────────────────────────────

#[test]
fn screenshot_threshold_is_independent_of_the_log_threshold() {
    let priorities = PriorityConfiguration::with_default(Priority::Debug);
    priorities.set_default_screenshot_priority(Priority::Failure);
    let (store, pipeline) = pipeline(priorities);
    let session = FakeSession::rendering();
    let logger = pipeline.factory(EventSource::Page).on_debug("CartPage", "total").expect("logger");

    assert!(!logger.will_capture_screenshot(Priority::Debug));
    assert!(logger.will_capture_screenshot(Priority::Exception));

    logger
        .with_screenshot(Priority::Debug, &session)
        .log(EventAction::ElementGetAttribute, "element.get_attribute", &[&"value"])
        .expect("log");
    logger
        .with_screenshot(Priority::Exception, &session)
        .log(EventAction::ElementGetAttribute, "element.get_attribute", &[&"value"])
        .expect("log");

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert!(records[0].screenshot.is_none());
    let shot = records[1].screenshot.as_ref().expect("screenshot");
    assert_eq!(shot.kind, ScreenshotKind::Png);
    assert_eq!(session.captures(), 1, "the low-priority call must not capture");
}

#[test]
fn markup_fallback_is_tagged_as_html() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Debug));
    let session = FakeSession {
        markup: Some("<html><body/></html>".to_string()),
        ..FakeSession::default()
    };

    pipeline
        .factory(EventSource::WebdriverAfter)
        .on_doku("Browser", "get")
        .expect("logger")
        .with_screenshot(Priority::Documentation, &session)
        .log(EventAction::WebdriverGet, "webdriver.get", &[&"https://example.test/"])
        .expect("log");

    let shot = store.records()[0].screenshot.clone().expect("screenshot");
    assert_eq!(shot.kind, ScreenshotKind::Html);
    assert_eq!(shot.bytes, b"<html><body/></html>");
}

#[test]
fn capture_failure_still_logs_the_event() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Debug));
    let session = FakeSession {
        fail: true,
        ..FakeSession::default()
    };

    pipeline
        .factory(EventSource::WebelementAfter)
        .on_failure("LoginPage", "submit")
        .expect("logger")
        .with_screenshot(Priority::Failure, &session)
        .log(EventAction::ElementClick, "element.click", &[])
        .expect("log must not fail");

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert!(records[0].screenshot.is_none());
}

#[test]
fn null_logger_never_captures() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Exception));
    let session = FakeSession::rendering();

    pipeline
        .factory(EventSource::Page)
        .on_doku("CartPage", "total")
        .expect("logger")
        .with_screenshot(Priority::Exception, &session)
        .log(EventAction::ElementClick, "element.click", &[])
        .expect("log");

    assert_eq!(session.captures(), 0);
    assert!(store.records().is_empty());
}

// ── failures ─────────────────────────────────────────────────────────

#[test]
fn assertion_failure_is_logged_once_per_handle() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    let session: Arc<dyn BrowserSession> = Arc::new(FakeSession::rendering());
    let ctx = ExecutionContext::with_session(session);
    let logger = pipeline.factory(EventSource::Test).on_failure("CheckoutTest", "pays").expect("logger");

    let failure = AssertionFailure::handle("expected 3 items but was 2");
    assert!(logger.log_assertion_failure(&failure, &ctx).expect("log"));
    assert!(!logger.log_assertion_failure(&failure, &ctx).expect("log"));

    let twin = AssertionFailure::handle("expected 3 items but was 2");
    assert!(logger.log_assertion_failure(&twin, &ctx).expect("log"));

    let records = store.records();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.action, EventAction::AssertionFailed);
        assert_eq!(record.priority, Priority::Failure);
        assert_eq!(record.argument(0), Some("expected 3 items but was 2"));
        assert!(record.screenshot.is_some());
    }
}

#[test]
fn dedup_spans_loggers_of_the_same_pipeline() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Debug));
    let ctx = ExecutionContext::new();
    let failure = AssertionFailure::handle("boom");

    let from_test = pipeline.factory(EventSource::Test).on_failure("C", "m").expect("logger");
    let from_assertion = pipeline.factory(EventSource::Assertion).on_failure("C", "m").expect("logger");

    assert!(from_assertion.log_assertion_failure(&failure, &ctx).expect("log"));
    assert!(!from_test.log_assertion_failure(&failure, &ctx).expect("log"));
    assert_eq!(store.records().len(), 1);
    assert!(store.records()[0].screenshot.is_none(), "no session, no screenshot");
}

#[test]
fn exceptions_are_logged_every_time() {
    let (store, pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Debug));
    let ctx = ExecutionContext::with_session(Arc::new(FakeSession::rendering()));
    let failure = AssertionFailure::handle("connection reset");
    let logger = pipeline.factory(EventSource::Test).on_exception("C", "m").expect("logger");

    logger.log_exception(&failure, &ctx).expect("log");
    logger.log_exception(&failure, &ctx).expect("log");

    let records = store.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, EventAction::ExceptionOccurred);
    assert_eq!(records[0].priority, Priority::Exception);
    assert!(records[0].screenshot.is_some());
}

#[test]
fn store_errors_reach_the_caller() {
    let store = RecordingStore {
        fail_inserts: true,
        ..RecordingStore::default()
    };
    let pipeline = EventPipeline::new(
        RunId::new("run-1"),
        Arc::new(PriorityConfiguration::with_default(Priority::Debug)),
        shared(store),
    );

    let err = pipeline
        .factory(EventSource::Test)
        .on_doku("C", "m")
        .expect("logger")
        .log(EventAction::TestStart, "test.start", &[])
        .expect_err("insert failure should propagate");
    assert!(matches!(err, LogError::Store(StoreError::NotOpen)));
}

// ── end to end through SQLite ────────────────────────────────────────

#[test]
fn dedup_is_visible_in_the_persisted_log() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("events.db");
    let pool = webtrail_db::create_pool(path.to_str().expect("utf-8"), Default::default())
        .expect("pool");
    webtrail_db::run_migrations(&pool.get().expect("conn")).expect("migrations");

    let run = RunId::new("run-sqlite");
    let mut sqlite = SqliteEventStore::new(pool);
    sqlite.open(&run).expect("open");
    let store = shared(sqlite);
    let pipeline = EventPipeline::new(
        run.clone(),
        Arc::new(PriorityConfiguration::with_default(Priority::Documentation)),
        Arc::clone(&store),
    );

    let ctx = ExecutionContext::new();
    let logger = pipeline.factory(EventSource::Assertion).on_failure("C", "m").expect("logger");
    let failure = AssertionFailure::handle("expected true");
    logger.log_assertion_failure(&failure, &ctx).expect("log");
    logger.log_assertion_failure(&failure, &ctx).expect("log");

    let mut guard = store.lock().expect("store lock");
    guard.write().expect("write");
    let failed = guard
        .read_all(&run)
        .expect("cursor")
        .map(|r| r.expect("row"))
        .filter(|r| r.action == EventAction::AssertionFailed)
        .count();
    assert_eq!(failed, 1);
}

#[test]
fn a_failure_is_reported_once_per_process() {
    let (first_store, first) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    let (second_store, second) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    assert!(Arc::ptr_eq(first.failures(), second.failures()));

    let ctx = ExecutionContext::new();
    let failure = AssertionFailure::handle("boom");
    let reported_first = first
        .factory(EventSource::Assertion)
        .on_failure("C", "m")
        .expect("logger")
        .log_assertion_failure(&failure, &ctx)
        .expect("log");
    let reported_second = second
        .factory(EventSource::Assertion)
        .on_failure("C", "m")
        .expect("logger")
        .log_assertion_failure(&failure, &ctx)
        .expect("log");

    assert!(reported_first);
    assert!(!reported_second);
    assert_eq!(first_store.records().len() + second_store.records().len(), 1);
}

#[test]
fn an_isolated_registry_reports_again() {
    let (_, shared_pipeline) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    let (store, isolated) = pipeline(PriorityConfiguration::with_default(Priority::Documentation));
    let isolated = isolated.with_failure_registry(Arc::new(FailureRegistry::new()));

    let ctx = ExecutionContext::new();
    let failure = AssertionFailure::handle("boom");
    for p in [&shared_pipeline, &isolated] {
        p.factory(EventSource::Assertion)
            .on_failure("C", "m")
            .expect("logger")
            .log_assertion_failure(&failure, &ctx)
            .expect("log");
    }

    assert_eq!(store.records().len(), 1);
    assert!(shared_pipeline.failures().release(&failure));
}
