//! User-facing activity log
//!
//! Mirrors notable agent events into a plain daily text file the machine's
//! user can read without digging through diagnostic logs. Lines are handed
//! to a background writer thread, so callers never wait on disk. Writing is
//! best effort: a failure is reported through `tracing` and otherwise
//! ignored.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

const SEPARATOR: &str = "==================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl ActivityLevel {
    fn marker(&self) -> &'static str {
        match self {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Warning => "WARN",
            ActivityLevel::Error => "ERROR",
            ActivityLevel::Success => "OK",
        }
    }
}

/// Cheap to clone; every clone feeds the same writer thread, which drains
/// pending lines when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    sink: Option<Sink>,
}

#[derive(Debug, Clone)]
struct Sink {
    dir: PathBuf,
    writer: NonBlocking,
    _guard: Arc<WorkerGuard>,
}

impl ActivityLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .thread_name("patch-activity")
            .finish(DailyFile { dir: dir.clone() });

        Self {
            sink: Some(Sink {
                dir,
                writer,
                _guard: Arc::new(guard),
            }),
        }
    }

    /// An activity log that records nothing
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Path of the file entries written at `now` land in
    pub fn file_for(&self, now: DateTime<Local>) -> Option<PathBuf> {
        self.sink.as_ref().map(|sink| daily_file(&sink.dir, now))
    }

    pub fn info(&self, message: &str) {
        self.record(ActivityLevel::Info, message);
    }

    pub fn warning(&self, message: &str) {
        self.record(ActivityLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.record(ActivityLevel::Error, message);
    }

    pub fn success(&self, message: &str) {
        self.record(ActivityLevel::Success, message);
    }

    pub fn separator(&self) {
        self.append_line(SEPARATOR);
    }

    pub fn record(&self, level: ActivityLevel, message: &str) {
        let line = format!(
            "[{}] {:<5} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level.marker(),
            message
        );
        self.append_line(&line);
    }

    fn append_line(&self, line: &str) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut writer = sink.writer.clone();
        let _ = writer
            .write_all(format!("{}\n", line).as_bytes())
            .inspect_err(|e| warn!("Failed to queue activity log line: {}", e));
    }
}

fn daily_file(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("PatchLog_{}.txt", now.format("%Y-%m-%d")))
}

/// Runs on the writer thread; each line goes to the file for the day it
/// is written.
struct DailyFile {
    dir: PathBuf,
}

impl Write for DailyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let path = daily_file(&self.dir, Local::now());
        append(&path, buf)
            .inspect_err(|e| warn!("Failed to write activity log {:?}: {}", path, e))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn append(path: &Path, line: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line)
}
