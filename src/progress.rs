//! Sync and import progress reporting.
//!
//! Reports observable progress while chunks are fetched and records are
//! ingested, so long imports show how much is left. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum SyncProgressEvent {
    /// Fetching chunk `chunk` of `chunks` from the upstream (or the cache).
    Fetching {
        kind: String,
        chunk: u64,
        chunks: u64,
    },
    /// Ingest phase: n records processed out of total.
    Ingesting { kind: String, n: u64, total: u64 },
}

/// Reports sync progress. Implementations write to stderr (human or JSON).
pub trait SyncProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the fetch and ingest loops.
    fn report(&self, event: SyncProgressEvent);
}

/// Human-friendly progress on stderr: "sync channels  ingesting  1,234 / 5,000 records".
pub struct StderrProgress;

impl SyncProgressReporter for StderrProgress {
    fn report(&self, event: SyncProgressEvent) {
        let line = match &event {
            SyncProgressEvent::Fetching {
                kind,
                chunk,
                chunks,
            } => {
                format!(
                    "sync {}  fetching  chunk {} / {}\n",
                    kind,
                    format_number(*chunk),
                    format_number(*chunks)
                )
            }
            SyncProgressEvent::Ingesting { kind, n, total } => {
                format!(
                    "sync {}  ingesting  {} / {} records\n",
                    kind,
                    format_number(*n),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SyncProgressReporter for JsonProgress {
    fn report(&self, event: SyncProgressEvent) {
        let obj = match &event {
            SyncProgressEvent::Fetching {
                kind,
                chunk,
                chunks,
            } => serde_json::json!({
                "event": "progress",
                "kind": kind,
                "phase": "fetching",
                "chunk": chunk,
                "chunks": chunks
            }),
            SyncProgressEvent::Ingesting { kind, n, total } => serde_json::json!({
                "event": "progress",
                "kind": kind,
                "phase": "ingesting",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SyncProgressReporter for NoProgress {
    fn report(&self, _event: SyncProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn SyncProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
