//! Unit tests for the event store.

use tempfile::TempDir;
use webtrail_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use webtrail_types::{EventAction, EventSource, Priority, RunId, ScreenshotKind};

use crate::error::StoreError;
use crate::record::{EventRecord, Screenshot};
use crate::sqlite::SqliteEventStore;
use crate::store::EventStore;

/// Creates a file-backed pool with migrations applied.
fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("events.db");
    let pool = create_pool(path.to_str().expect("utf-8 path"), DbRuntimeSettings::default())
        .expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
    }
    (dir, pool)
}

fn record(run: &RunId, n: usize) -> EventRecord {
    EventRecord::new(
        run.clone(),
        EventSource::Page,
        "LoginPage",
        "username",
        EventAction::ElementSendKeys,
        Priority::Debug,
        "element.send_keys",
    )
    .with_arguments(&[&n])
}

fn count(store: &SqliteEventStore, run: &RunId) -> usize {
    store
        .read_all(run)
        .expect("cursor should open")
        .map(|r| r.expect("row should decode"))
        .count()
}

// ── lifecycle ────────────────────────────────────────────────────────

#[test]
fn insert_before_open_is_rejected() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");

    let err = store.insert(record(&run, 0)).expect_err("insert should fail");
    assert!(matches!(err, StoreError::NotOpen));
}

#[test]
fn open_is_idempotent() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");

    store.open(&run).expect("first open");
    store.insert(record(&run, 1)).expect("insert");
    store.open(&RunId::new("run-b")).expect("second open is a no-op");

    assert!(store.is_open());
    assert_eq!(store.run(), Some(&run));
    assert_eq!(store.pending(), 1, "re-opening must not drop the batch");
}

#[test]
fn close_is_idempotent_and_blocks_further_inserts() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");

    store.open(&run).expect("open");
    store.insert(record(&run, 1)).expect("insert");
    store.close().expect("first close");
    store.close().expect("second close is a no-op");

    assert!(!store.is_open());
    assert!(matches!(store.insert(record(&run, 2)), Err(StoreError::NotOpen)));
    assert_eq!(count(&store, &run), 1, "close must flush the pending batch");
}

#[test]
fn store_can_be_reopened_after_close() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");

    store.open(&run).expect("open");
    store.insert(record(&run, 1)).expect("insert");
    store.close().expect("close");

    store.open(&run).expect("reopen");
    store.insert(record(&run, 2)).expect("insert");
    store.write().expect("write");

    assert_eq!(count(&store, &run), 2);
}

// ── batching ─────────────────────────────────────────────────────────

#[test]
fn batch_executes_once_it_exceeds_the_limit() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");
    store.open(&run).expect("open");

    for n in 0..150 {
        store.insert(record(&run, n)).expect("insert");
    }

    let visible = count(&store, &run);
    assert!(visible >= 100, "auto-flush should expose at least 100 records, saw {visible}");
    assert_eq!(visible + store.pending(), 150);

    store.write().expect("write");
    assert_eq!(count(&store, &run), 150);
    assert_eq!(store.pending(), 0);
}

#[test]
fn write_commits_for_other_connections() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool.clone());
    let run = RunId::new("run-a");
    store.open(&run).expect("open");
    store.insert(record(&run, 1)).expect("insert");
    store.write().expect("write");

    let conn = pool.get().expect("reader connection");
    let committed: i64 = conn
        .query_row("SELECT COUNT(*) FROM events WHERE run_id = ?1", [run.as_str()], |row| row.get(0))
        .expect("should count rows");
    assert_eq!(committed, 1);

    // The transaction stays open for further inserts.
    store.insert(record(&run, 2)).expect("insert after write");
    store.write().expect("second write");
    assert_eq!(count(&store, &run), 2);
}

#[test]
fn smaller_batch_limit_is_honoured() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool).with_batch_limit(2);
    let run = RunId::new("run-a");
    store.open(&run).expect("open");

    for n in 0..3 {
        store.insert(record(&run, n)).expect("insert");
    }
    assert_eq!(store.pending(), 0);
    assert_eq!(count(&store, &run), 3);
}

// ── read-back ────────────────────────────────────────────────────────

#[test]
fn records_read_back_in_insertion_order_with_all_fields() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");
    store.open(&run).expect("open");

    let with_shot = EventRecord::new(
        run.clone(),
        EventSource::Assertion,
        "CheckoutTest",
        "pays",
        EventAction::AssertionFailed,
        Priority::Failure,
        "assertion.failed",
    )
    .with_arguments(&[&"expected 3 items", &"got 2"])
    .with_screenshot(Some(Screenshot::png(vec![0x89, b'P', b'N', b'G'])));
    let custom = EventRecord::new(
        run.clone(),
        EventSource::Test,
        "CheckoutTest",
        "pays",
        EventAction::custom("CART_FILLED").expect("free label"),
        Priority::Documentation,
        "cart.filled",
    );

    store.insert(with_shot.clone()).expect("insert");
    store.insert(custom).expect("insert");
    store.write().expect("write");

    let records: Vec<EventRecord> = store
        .read_all(&run)
        .expect("cursor")
        .collect::<Result<_, _>>()
        .expect("rows decode");

    assert_eq!(records.len(), 2);
    let first = &records[0];
    assert!(first.id.is_some());
    assert_eq!(first.source, EventSource::Assertion);
    assert_eq!(first.action, EventAction::AssertionFailed);
    assert_eq!(first.priority, Priority::Failure);
    assert_eq!(first.argument(0), Some("expected 3 items"));
    assert_eq!(first.argument(1), Some("got 2"));
    assert_eq!(first.argument(2), None);
    assert_eq!(first.thread_id, with_shot.thread_id);
    assert_eq!(
        first.ts.timestamp_millis(),
        with_shot.ts.timestamp_millis(),
        "timestamps keep millisecond precision"
    );
    let shot = first.screenshot.as_ref().expect("screenshot should survive");
    assert_eq!(shot.kind, ScreenshotKind::Png);
    assert_eq!(shot.bytes, vec![0x89, b'P', b'N', b'G']);

    assert_eq!(records[1].action, EventAction::custom("CART_FILLED").expect("free label"));
    assert!(records[1].screenshot.is_none());
    assert!(records[0].id < records[1].id);
}

#[test]
fn read_all_only_returns_the_requested_run() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run_a = RunId::new("run-a");
    let run_b = RunId::new("run-b");
    store.open(&run_a).expect("open");

    store.insert(record(&run_a, 1)).expect("insert");
    store.insert(record(&run_b, 2)).expect("insert");
    store.insert(record(&run_a, 3)).expect("insert");
    store.write().expect("write");

    assert_eq!(count(&store, &run_a), 2);
    assert_eq!(count(&store, &run_b), 1);
    assert_eq!(count(&store, &RunId::new("run-c")), 0);
}

#[test]
fn cursor_spans_multiple_pages() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");
    store.open(&run).expect("open");
    for n in 0..300 {
        store.insert(record(&run, n)).expect("insert");
    }
    store.close().expect("close");

    let args: Vec<String> = store
        .read_all(&run)
        .expect("cursor")
        .map(|r| r.expect("row").argument(0).unwrap_or_default().to_string())
        .collect();
    assert_eq!(args.len(), 300);
    assert_eq!(args.first().map(String::as_str), Some("0"));
    assert_eq!(args.last().map(String::as_str), Some("299"));
}

#[test]
fn abandoned_cursor_releases_its_connection() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool.clone());
    let run = RunId::new("run-a");
    store.open(&run).expect("open");
    for n in 0..10 {
        store.insert(record(&run, n)).expect("insert");
    }
    store.close().expect("close");

    for _ in 0..(pool.max_size() * 2) {
        let mut cursor = store.read_all(&run).expect("cursor");
        let first = cursor.next().expect("one row").expect("decodes");
        assert_eq!(first.argument(0), Some("0"));
        cursor.close();
    }
    assert_eq!(pool.state().connections - pool.state().idle_connections, 0);
}

#[test]
fn milestones_skip_intermediate_events() {
    let (_dir, pool) = test_pool();
    let mut store = SqliteEventStore::new(pool);
    let run = RunId::new("run-a");
    store.open(&run).expect("open");

    for action in [
        EventAction::TestStart,
        EventAction::ElementClick,
        EventAction::AssertionFailed,
        EventAction::TestFinishedWithFailures,
    ] {
        let record = EventRecord::new(
            run.clone(),
            EventSource::Test,
            "C",
            "m",
            action,
            Priority::Documentation,
            "k",
        );
        store.insert(record).expect("insert");
    }
    store.write().expect("write");

    let actions: Vec<EventAction> = store
        .read_milestones(&run)
        .expect("cursor")
        .map(|r| r.expect("row").action)
        .collect();
    assert_eq!(
        actions,
        vec![EventAction::TestStart, EventAction::TestFinishedWithFailures]
    );
}

#[test]
fn unreadable_priority_is_reported_as_corrupt() {
    let (_dir, pool) = test_pool();
    {
        let conn = pool.get().expect("connection");
        conn.execute(
            "INSERT INTO events (ts, run_id, thread_id, source, group_id, item, action, priority, description)
             VALUES ('2026-01-01T00:00:00.000Z', 'run-a', 1, 'TEST', 'C', 'm', 'TEST_START', 'LOUD', 'k')",
            [],
        )
        .expect("raw insert");
    }
    let store = SqliteEventStore::new(pool);

    let mut cursor = store.read_all(&RunId::new("run-a")).expect("cursor");
    match cursor.next() {
        Some(Err(StoreError::Corrupt { column, value })) => {
            assert_eq!(column, "priority");
            assert_eq!(value, "LOUD");
        }
        other => panic!("expected corrupt row, got {other:?}"),
    }
    assert!(cursor.next().is_none(), "cursor stops after an error");
}

#[test]
fn dropping_an_open_store_commits_pending_records() {
    let (_dir, pool) = test_pool();
    let run = RunId::new("run-a");
    {
        let mut store = SqliteEventStore::new(pool.clone());
        store.open(&run).expect("open");
        store.insert(record(&run, 1)).expect("insert");
    }

    let store = SqliteEventStore::new(pool);
    assert_eq!(count(&store, &run), 1);
}
