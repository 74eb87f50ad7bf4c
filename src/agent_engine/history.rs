use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;

pub const LOG_VERSION: u32 = 1;

/// One line of the append-only step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub run_id: String,
    pub step_index: u32,
    pub kind: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_platform: Option<String>,
}

/// Writes `<log_dir>/<run_id>.jsonl`. Purely observational; nothing in the
/// loop reads it back.
pub struct StepLogger {
    run_id: String,
    file_path: PathBuf,
}

impl StepLogger {
    pub fn new(log_dir: &Path) -> PilotResult<Self> {
        std::fs::create_dir_all(log_dir)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let file_path = log_dir.join(format!("{run_id}.jsonl"));
        tracing::debug!(path = %file_path.display(), "step log opened");
        Ok(Self { run_id, file_path })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Appends one event line.
    pub fn log<T: Serialize>(&self, step_index: u32, kind: &str, payload: &T) -> PilotResult<()> {
        let event = StepEvent {
            run_id: self.run_id.clone(),
            step_index,
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
            timestamp: Utc::now(),
            version: LOG_VERSION,
            host_platform: Some(std::env::consts::OS.to_string()),
        };
        let line = serde_json::to_string(&event)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Reads a step log, skipping lines that do not parse.
pub fn load_events(path: &Path) -> PilotResult<Vec<StepEvent>> {
    let file = std::fs::File::open(path)?;
    let mut events = Vec::new();
    for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StepEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(path = %path.display(), line = number + 1, error = %e, "skipping malformed log line"),
        }
    }
    Ok(events)
}

/// Most recently modified `.jsonl` log in `dir`.
pub fn latest_log(dir: &Path) -> PilotResult<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }
    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// One human-readable line per event, e.g. `[03] verify  {...}`.
pub fn render_events(events: &[StepEvent]) -> String {
    events
        .iter()
        .map(|e| format!("[{:02}] {:<8}{}", e.step_index, e.kind, e.payload))
        .collect::<Vec<_>>()
        .join("\n")
}
