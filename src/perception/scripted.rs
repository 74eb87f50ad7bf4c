use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::perception::traits::Observer;
use crate::perception::types::Observation;

/// Replays a fixed sequence of observations. Once the script runs out the last
/// frame repeats, which is what a frozen application looks like.
pub struct ScriptedObserver {
    frames: Vec<Observation>,
    cursor: Mutex<usize>,
}

impl ScriptedObserver {
    pub fn new(frames: Vec<Observation>) -> PilotResult<Self> {
        if frames.is_empty() {
            return Err(PilotError::Observer("observation script is empty".into()));
        }
        Ok(Self {
            frames,
            cursor: Mutex::new(0),
        })
    }

    /// Loads a JSON array of observations.
    pub fn from_file(path: &Path) -> PilotResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let frames: Vec<Observation> = serde_json::from_str(&content)?;
        tracing::info!(path = %path.display(), frames = frames.len(), "observation script loaded");
        Self::new(frames)
    }

    pub fn frames_served(&self) -> usize {
        self.cursor.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait]
impl Observer for ScriptedObserver {
    async fn observe(&self) -> PilotResult<Observation> {
        let mut cursor = self
            .cursor
            .lock()
            .map_err(|_| PilotError::Observer("observer cursor poisoned".into()))?;
        let idx = (*cursor).min(self.frames.len() - 1);
        *cursor += 1;
        let mut frame = self.frames[idx].clone();
        frame.timestamp = chrono::Utc::now();
        tracing::debug!(frame = idx, "scripted observation served");
        Ok(frame)
    }
}
