//! Ingest progress reporting.
//!
//! Reports observable progress during `crag ingest` so users see what is
//! being read and how much is left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for ingest.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// The docs directory is being walked. Total unknown.
    Discovering { root: String },
    /// `n` files read out of `total`.
    Reading { n: u64, total: u64 },
    /// `n` courses written to the store out of `total`.
    Storing { n: u64, total: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  reading  12 / 40 files".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Discovering { root } => {
                format!("ingest {}  discovering...\n", root)
            }
            IngestProgressEvent::Reading { n, total } => format!(
                "ingest  reading  {} / {} files\n",
                format_number(*n),
                format_number(*total)
            ),
            IngestProgressEvent::Storing { n, total } => format!(
                "ingest  storing  {} / {} courses\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Discovering { root } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "root": root
            }),
            IngestProgressEvent::Reading { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "reading",
                "n": n,
                "total": total
            }),
            IngestProgressEvent::Storing { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "storing",
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

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
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

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
