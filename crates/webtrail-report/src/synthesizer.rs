//! Markdown narratives and screenshot files per test.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use webtrail_events::{EventRecord, EventStore, Screenshot};
use webtrail_types::{EventAction, RunId, ScreenshotKind};

use crate::catalog::MessageCatalog;
use crate::error::ReportError;
use crate::settings::ReportSettings;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("valid file name pattern"));

/// File name of the per-test narrative.
pub const NARRATIVE_FILE: &str = "report.md";

const MAX_ARGUMENT_CHARS: usize = 80;
const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Replaces every run of characters outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize(name: &str) -> String {
    NON_WORD.replace_all(name, "_").into_owned()
}

/// Sanitizes `name` for use as a directory name, substituting `fallback`
/// when nothing usable remains.
fn path_segment(name: &str, fallback: &str) -> String {
    let segment = sanitize(name);
    if segment.is_empty() {
        fallback.to_string()
    } else {
        segment
    }
}

/// The run id as a single directory name below the report root.
fn run_segment(run: &RunId) -> String {
    let id = run.as_str();
    let mut parts = Path::new(id).components();
    match (parts.next(), parts.next()) {
        (Some(Component::Normal(_)), None) => id.to_string(),
        _ => path_segment(id, "no-run"),
    }
}

/// Counts of what one `synthesize` call produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportSummary {
    /// `<root>/<run>`; removed again if nothing was kept.
    pub run_dir: PathBuf,
    /// Tests started in the stream.
    pub tests: usize,
    /// Narrative files left on disk.
    pub narratives: usize,
    /// Screenshot files written.
    pub screenshots: usize,
    /// Records outside any test.
    pub ignored: usize,
}

/// Writes one directory per test with a markdown narrative and the
/// screenshots attached to its records.
///
/// Layout: `<root>/<run>/<class>/<method>/report.md` plus
/// `<id>.<method>_<argument>.<ext>` per screenshot.
#[derive(Debug, Clone)]
pub struct ReportSynthesizer {
    settings: ReportSettings,
    catalog: MessageCatalog,
}

impl ReportSynthesizer {
    /// Creates a synthesizer using the built-in message templates.
    pub fn new(settings: ReportSettings) -> Self {
        Self {
            settings,
            catalog: MessageCatalog::builtin(),
        }
    }

    /// Replaces the message catalog.
    pub fn with_catalog(mut self, catalog: MessageCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Where and what this synthesizer writes.
    pub fn settings(&self) -> &ReportSettings {
        &self.settings
    }

    /// Templates narrative lines are rendered from.
    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    /// Reads every record of `run` from `store` and writes the report tree.
    ///
    /// # Errors
    ///
    /// Stops at the first storage or I/O error. Files written up to that
    /// point stay on disk.
    pub fn synthesize(&self, store: &dyn EventStore, run: &RunId) -> Result<ReportSummary, ReportError> {
        let run_dir = self.settings.root.join(run_segment(run));
        let mut summary = ReportSummary {
            run_dir: run_dir.clone(),
            ..ReportSummary::default()
        };
        let mut current: Option<TestReport> = None;

        for record in store.read_all(run)? {
            let record = record?;

            let step = Step::of(&record.action);
            if step == Step::Open {
                if let Some(previous) = current.take() {
                    tracing::warn!(
                        class = %record.group,
                        method = %record.item,
                        previous = %previous.dir.display(),
                        "test started before the previous one finished"
                    );
                    previous.finish()?;
                    summary.narratives += 1;
                }
                current = Some(TestReport::start(&run_dir, &record)?);
                summary.tests += 1;
            }

            let Some(test) = current.as_mut() else {
                tracing::trace!(action = %record.action, "record outside of a test");
                summary.ignored += 1;
                continue;
            };

            if step == Step::Evidence {
                if let Some(screenshot) = &record.screenshot {
                    test.write_screenshot(&record, screenshot)?;
                    summary.screenshots += 1;
                }
            } else if self.settings.reports(record.priority) {
                let link = match &record.screenshot {
                    Some(screenshot) => {
                        summary.screenshots += 1;
                        Some(test.write_screenshot(&record, screenshot)?)
                    }
                    None => None,
                };
                let line = self.narrative_line(&record, link.as_ref());
                test.append(&line)?;
            }

            if step == Step::Close {
                if let Some(test) = current.take() {
                    if test.close(&record.action, self.settings.log_only_on_error)? {
                        summary.narratives += 1;
                    }
                }
            }
        }

        if let Some(unfinished) = current.take() {
            tracing::warn!(dir = %unfinished.dir.display(), "last test of the run never finished");
            unfinished.finish()?;
            summary.narratives += 1;
        }

        remove_dir_if_empty(&run_dir)?;
        tracing::info!(
            run = %run,
            path = %run_dir.display(),
            tests = summary.tests,
            narratives = summary.narratives,
            screenshots = summary.screenshots,
            "report written"
        );
        Ok(summary)
    }

    fn narrative_line(&self, record: &EventRecord, link: Option<&ScreenshotLink>) -> String {
        let args: Vec<Option<&str>> = record.arguments.iter().map(Option::as_deref).collect();
        let message = self
            .catalog
            .render(&record.description, &self.settings.locale, &args)
            .replace('\n', "\n  ");

        let mut line = format!(
            "- {} [thread {}] {} {} {}.{}: {}",
            record.ts.format(TS_FORMAT),
            record.thread_id,
            record.priority,
            record.source,
            record.group,
            record.item,
            message
        );
        if let Some(link) = link {
            line.push_str("\n  ");
            line.push_str(&link.to_string());
        }
        line
    }
}

/// What a record does to the report of the current test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Starts a new test report.
    Open,
    /// Adds a narrative line.
    Narrate,
    /// Only contributes its screenshot.
    Evidence,
    /// Adds a narrative line, then closes the test.
    Close,
}

impl Step {
    fn of(action: &EventAction) -> Self {
        match action {
            EventAction::TestStart => Self::Open,
            EventAction::AssertionFailed => Self::Evidence,
            EventAction::TestFinished
            | EventAction::TestSkipped
            | EventAction::TestFinishedWithFailures
            | EventAction::TestFinishedWithException => Self::Close,
            EventAction::ExceptionOccurred
            | EventAction::WebdriverCreateInstance
            | EventAction::WebdriverGet
            | EventAction::WebdriverQuit
            | EventAction::ElementClick
            | EventAction::ElementSendKeys
            | EventAction::ElementSubmit
            | EventAction::ElementClear
            | EventAction::ElementGetAttribute
            | EventAction::ElementSelect
            | EventAction::Custom(_) => Self::Narrate,
        }
    }
}

/// A screenshot file as referenced from the narrative.
struct ScreenshotLink {
    name: String,
    kind: ScreenshotKind,
}

impl fmt::Display for ScreenshotLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScreenshotKind::Png => write!(f, "![{0}]({0})", self.name),
            ScreenshotKind::Html => write!(f, "[{0}]({0})", self.name),
        }
    }
}

/// The open narrative of the test currently being reported.
struct TestReport {
    run_dir: PathBuf,
    class_dir: PathBuf,
    dir: PathBuf,
    method: String,
    narrative_path: PathBuf,
    narrative: BufWriter<File>,
    ordinal: usize,
}

impl TestReport {
    fn start(run_dir: &Path, record: &EventRecord) -> Result<Self, ReportError> {
        let method = path_segment(&record.item, "no-method");
        let class_dir = run_dir.join(path_segment(&record.group, "no-class"));
        let dir = class_dir.join(&method);
        fs::create_dir_all(&dir).map_err(ReportError::io(&dir))?;

        let narrative_path = dir.join(NARRATIVE_FILE);
        let file = File::create(&narrative_path).map_err(ReportError::io(&narrative_path))?;
        let mut narrative = BufWriter::new(file);
        writeln!(narrative, "# {}.{}\n", record.group, record.item)
            .map_err(ReportError::io(&narrative_path))?;

        tracing::debug!(dir = %dir.display(), "started test report");
        Ok(Self {
            run_dir: run_dir.to_path_buf(),
            class_dir,
            dir,
            method,
            narrative_path,
            narrative,
            ordinal: 0,
        })
    }

    fn append(&mut self, line: &str) -> Result<(), ReportError> {
        writeln!(self.narrative, "{line}").map_err(ReportError::io(&self.narrative_path))
    }

    fn write_screenshot(
        &mut self,
        record: &EventRecord,
        screenshot: &Screenshot,
    ) -> Result<ScreenshotLink, ReportError> {
        self.ordinal += 1;
        let id = record.id.map_or_else(|| format!("n{}", self.ordinal), |id| id.to_string());
        let mut argument = sanitize(record.argument(0).unwrap_or_default());
        // Sanitized names are ASCII, so byte truncation is safe.
        argument.truncate(MAX_ARGUMENT_CHARS);

        let name = format!(
            "{id}.{}_{argument}.{}",
            self.method,
            screenshot.kind.extension()
        );
        let path = self.dir.join(&name);
        fs::write(&path, &screenshot.bytes).map_err(ReportError::io(&path))?;
        Ok(ScreenshotLink {
            name,
            kind: screenshot.kind,
        })
    }

    /// Flushes and closes the narrative, keeping it on disk.
    fn finish(self) -> Result<(), ReportError> {
        self.flush().map(|_| ())
    }

    /// Closes the test on its terminal `outcome`. Returns `true` if the
    /// narrative was kept.
    fn close(self, outcome: &EventAction, log_only_on_error: bool) -> Result<bool, ReportError> {
        let run_dir = self.run_dir.clone();
        let class_dir = self.class_dir.clone();
        let (dir, narrative_path) = self.flush()?;
        if outcome.is_failure_outcome() {
            return Ok(true);
        }

        let kept = if log_only_on_error {
            fs::remove_file(&narrative_path).map_err(ReportError::io(&narrative_path))?;
            false
        } else {
            true
        };
        // Never climb past the run directory.
        if remove_dir_if_empty(&dir)? && class_dir != run_dir && class_dir.starts_with(&run_dir) {
            remove_dir_if_empty(&class_dir)?;
        }
        Ok(kept)
    }

    fn flush(self) -> Result<(PathBuf, PathBuf), ReportError> {
        let Self {
            dir,
            narrative_path,
            narrative,
            ..
        } = self;
        narrative
            .into_inner()
            .map_err(|e| ReportError::io(&narrative_path)(e.into_error()))?;
        Ok((dir, narrative_path))
    }
}

/// Removes `dir` if it exists and has no entries. Returns `true` if removed.
fn remove_dir_if_empty(dir: &Path) -> Result<bool, ReportError> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ReportError::io(dir)(e)),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).map_err(ReportError::io(dir))?;
    tracing::debug!(dir = %dir.display(), "removed empty report directory");
    Ok(true)
}
