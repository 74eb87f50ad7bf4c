use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::Observation;

/// Source of raw frames: accessibility tree, screenshot and OCR for the
/// current foreground window. Platform capture lives behind this seam.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn observe(&self) -> PilotResult<Observation>;
}
