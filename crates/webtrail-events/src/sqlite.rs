//! SQLite-backed event store.
//!
//! The writer connection is checked out of the pool on `open` and keeps one
//! transaction open for the whole run. Buffered records are executed through
//! a cached prepared statement; commits either reopen the transaction
//! (`write`) or release the connection (`close`).
//!
//! Reads page through the `events` table by id, so a cursor never holds a
//! statement open between calls and can be abandoned at any point.

use std::collections::VecDeque;
use std::ops::Deref;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use webtrail_db::{DbPool, PooledConn};
use webtrail_types::{EventAction, EventSource, Priority, RunId, ScreenshotKind};

use crate::error::StoreError;
use crate::record::{EventRecord, Screenshot};
use crate::store::{EventCursor, EventStore};

/// Number of buffered records above which `insert` executes the batch.
pub const MAX_BATCH_SIZE: usize = 100;

/// Number of rows fetched per page by a read cursor.
const PAGE_SIZE: i64 = 128;

const INSERT_SQL: &str = "INSERT INTO events
    (ts, run_id, thread_id, source, group_id, item, action, priority, description,
     argument1, argument2, argument3, argument4, screenshot_type, screenshot)
 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)";

const SELECT_COLUMNS: &str = "SELECT id, ts, run_id, thread_id, source, group_id, item, action,
    priority, description, argument1, argument2, argument3, argument4, screenshot_type, screenshot
 FROM events";

const MILESTONE_ACTIONS: &str = "('TEST_START', 'TEST_FINISHED', 'TEST_SKIPPED', \
    'TEST_FINISHED_WITH_FAILURES', 'TEST_FINISHED_WITH_EXCEPTION')";

/// An [`EventStore`] persisting into the `events` table of a SQLite pool.
pub struct SqliteEventStore {
    pool: DbPool,
    writer: Option<PooledConn>,
    run: Option<RunId>,
    batch: Vec<EventRecord>,
    batch_limit: usize,
}

impl SqliteEventStore {
    /// Creates a closed store over `pool`. The `events` table must already
    /// exist (see `webtrail_db::run_migrations`).
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            writer: None,
            run: None,
            batch: Vec::new(),
            batch_limit: MAX_BATCH_SIZE,
        }
    }

    /// Overrides the batch limit.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Number of records buffered but not yet executed.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// The run the store was opened for, if open.
    pub fn run(&self) -> Option<&RunId> {
        self.run.as_ref()
    }

    fn execute_batch(&mut self) -> Result<usize, StoreError> {
        let conn = self.writer.as_deref().ok_or(StoreError::NotOpen)?;
        let records = std::mem::take(&mut self.batch);
        insert_records(conn, records)
    }

    fn cursor(&self, run: &RunId, milestones_only: bool) -> Result<EventCursor<'_>, StoreError> {
        let conn = match &self.writer {
            Some(conn) => ReadConn::Writer(conn),
            None => ReadConn::Pooled(self.pool.get()?),
        };
        Ok(EventCursor::new(Pages {
            conn,
            run: run.clone(),
            milestones_only,
            last_id: 0,
            page: VecDeque::new(),
            exhausted: false,
        }))
    }
}

impl EventStore for SqliteEventStore {
    fn open(&mut self, run: &RunId) -> Result<(), StoreError> {
        if self.writer.is_some() {
            return Ok(());
        }

        let conn = self.pool.get()?;
        conn.execute_batch("BEGIN")?;
        // Warm the statement cache so every batch reuses one prepared insert.
        drop(conn.prepare_cached(INSERT_SQL)?);

        tracing::debug!(run = %run, "opened event store");
        self.writer = Some(conn);
        self.run = Some(run.clone());
        Ok(())
    }

    fn insert(&mut self, record: EventRecord) -> Result<(), StoreError> {
        if self.writer.is_none() {
            return Err(StoreError::NotOpen);
        }
        self.batch.push(record);
        if self.batch.len() > self.batch_limit {
            let written = self.execute_batch()?;
            tracing::trace!(written, "executed full event batch");
        }
        Ok(())
    }

    fn write(&mut self) -> Result<(), StoreError> {
        let written = self.execute_batch()?;
        if let Some(conn) = self.writer.as_deref() {
            conn.execute_batch("COMMIT; BEGIN")?;
        }
        tracing::debug!(written, "committed event store checkpoint");
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        let Some(conn) = self.writer.take() else {
            return Ok(());
        };
        let run = self.run.take();
        let records = std::mem::take(&mut self.batch);

        let result = insert_records(&conn, records)
            .and_then(|_| conn.execute_batch("COMMIT").map_err(StoreError::from));

        if let Err(e) = &result {
            tracing::error!(error = %e, "final commit of event store failed");
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %rollback, "rollback after failed commit also failed");
            }
        } else if let Some(run) = run {
            tracing::debug!(run = %run, "closed event store");
        }
        result
    }

    fn read_all(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError> {
        self.cursor(run, false)
    }

    fn read_milestones(&self, run: &RunId) -> Result<EventCursor<'_>, StoreError> {
        self.cursor(run, true)
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for SqliteEventStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close event store on drop");
        }
    }
}

fn insert_records(conn: &Connection, records: Vec<EventRecord>) -> Result<usize, StoreError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut stmt = conn.prepare_cached(INSERT_SQL)?;
    let count = records.len();
    for record in &records {
        let screenshot = record.screenshot.as_ref();
        stmt.execute(params![
            record.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            record.run_id.as_str(),
            record.thread_id as i64,
            record.source.as_str(),
            record.group,
            record.item,
            record.action.as_str(),
            record.priority.as_str(),
            record.description,
            record.arguments[0],
            record.arguments[1],
            record.arguments[2],
            record.arguments[3],
            screenshot.map(|s| s.kind.as_str()),
            screenshot.map(|s| s.bytes.as_slice()),
        ])?;
    }
    Ok(count)
}

/// The connection a cursor reads through.
enum ReadConn<'a> {
    /// The open writer, so flushed but uncommitted records are visible.
    Writer(&'a PooledConn),
    /// A connection checked out for the cursor alone.
    Pooled(PooledConn),
}

impl Deref for ReadConn<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match self {
            ReadConn::Writer(conn) => conn,
            ReadConn::Pooled(conn) => conn,
        }
    }
}

struct Pages<'a> {
    conn: ReadConn<'a>,
    run: RunId,
    milestones_only: bool,
    last_id: i64,
    page: VecDeque<EventRecord>,
    exhausted: bool,
}

impl Pages<'_> {
    fn fetch_page(&mut self) -> Result<(), StoreError> {
        let filter = if self.milestones_only {
            format!(" AND action IN {MILESTONE_ACTIONS}")
        } else {
            String::new()
        };
        let sql = format!("{SELECT_COLUMNS} WHERE run_id = ?1 AND id > ?2{filter} ORDER BY id LIMIT ?3");

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(
            params![self.run.as_str(), self.last_id, PAGE_SIZE],
            RawEvent::from_row,
        )?;

        let mut fetched = 0;
        for row in rows {
            let record = row?.into_record()?;
            if let Some(id) = record.id {
                self.last_id = id;
            }
            self.page.push_back(record);
            fetched += 1;
        }
        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<EventRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.page.is_empty() && !self.exhausted {
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                self.page.clear();
                return Some(Err(e));
            }
        }
        self.page.pop_front().map(Ok)
    }
}

/// A row as stored, before enum columns are interpreted.
struct RawEvent {
    id: i64,
    ts: String,
    run_id: String,
    thread_id: i64,
    source: String,
    group: String,
    item: String,
    action: String,
    priority: String,
    description: String,
    arguments: [Option<String>; 4],
    screenshot_type: Option<String>,
    screenshot: Option<Vec<u8>>,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            ts: row.get(1)?,
            run_id: row.get(2)?,
            thread_id: row.get(3)?,
            source: row.get(4)?,
            group: row.get(5)?,
            item: row.get(6)?,
            action: row.get(7)?,
            priority: row.get(8)?,
            description: row.get(9)?,
            arguments: [row.get(10)?, row.get(11)?, row.get(12)?, row.get(13)?],
            screenshot_type: row.get(14)?,
            screenshot: row.get(15)?,
        })
    }

    fn into_record(self) -> Result<EventRecord, StoreError> {
        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| corrupt("ts", &self.ts))?;
        let source: EventSource = self.source.parse().map_err(|_| corrupt("source", &self.source))?;
        let priority: Priority = self
            .priority
            .parse()
            .map_err(|_| corrupt("priority", &self.priority))?;
        let screenshot = match (self.screenshot_type, self.screenshot) {
            (Some(kind), Some(bytes)) => {
                let kind: ScreenshotKind = kind.parse().map_err(|_| corrupt("screenshot_type", &kind))?;
                Some(Screenshot { kind, bytes })
            }
            (None, None) => None,
            (kind, _) => return Err(corrupt("screenshot_type", kind.as_deref().unwrap_or("NULL"))),
        };

        Ok(EventRecord {
            id: Some(self.id),
            ts,
            thread_id: self.thread_id as u64,
            run_id: RunId::new(self.run_id),
            source,
            group: self.group,
            item: self.item,
            action: EventAction::from_label(self.action),
            priority,
            description: self.description,
            arguments: self.arguments,
            screenshot,
        })
    }
}

fn corrupt(column: &'static str, value: &str) -> StoreError {
    StoreError::Corrupt {
        column,
        value: value.to_string(),
    }
}
