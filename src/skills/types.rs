use std::fmt;

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{IntentAction, RiskMode};

/// Trust lifecycle of a procedure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureStatus {
    #[default]
    Draft,
    Trial,
    Trusted,
    Degraded,
}

impl ProcedureStatus {
    /// Statuses the decision engine may replay from.
    pub fn is_replayable(&self) -> bool {
        matches!(self, ProcedureStatus::Trial | ProcedureStatus::Trusted)
    }
}

impl fmt::Display for ProcedureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcedureStatus::Draft => "draft",
            ProcedureStatus::Trial => "trial",
            ProcedureStatus::Trusted => "trusted",
            ProcedureStatus::Degraded => "degraded",
        })
    }
}

/// Lifetime counters; never reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStats {
    pub runs: u32,
    pub successes: u32,
    pub failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub description: String,
    #[serde(default)]
    pub expected_change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureStep {
    pub intent: IntentAction,
    #[serde(default)]
    pub checkpoint: Option<Checkpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub name: String,
    /// Case-insensitive substring looked up in goal, window title and executable.
    #[serde(default)]
    pub context_hint: Option<String>,
    #[serde(default)]
    pub preconditions: Vec<String>,
    pub steps: Vec<ProcedureStep>,
    #[serde(default)]
    pub stop_condition: Option<String>,
    #[serde(default)]
    pub risk: RiskMode,
    #[serde(default)]
    pub status: ProcedureStatus,
    #[serde(default)]
    pub stats: ProcedureStats,
}

impl Procedure {
    pub fn new(name: impl Into<String>, steps: Vec<IntentAction>) -> Self {
        Self {
            name: name.into(),
            context_hint: None,
            preconditions: Vec::new(),
            steps: steps
                .into_iter()
                .map(|intent| ProcedureStep { intent, checkpoint: None })
                .collect(),
            stop_condition: None,
            risk: RiskMode::Normal,
            status: ProcedureStatus::Draft,
            stats: ProcedureStats::default(),
        }
    }

    pub fn with_context(mut self, hint: impl Into<String>) -> Self {
        self.context_hint = Some(hint.into());
        self
    }

    pub fn with_status(mut self, status: ProcedureStatus) -> Self {
        self.status = status;
        self
    }
}

/// On-disk mirror of one procedure's trust state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProcedure {
    pub runs: u32,
    pub successes: u32,
    pub failures: u32,
    pub status: ProcedureStatus,
}

impl From<&Procedure> for PersistedProcedure {
    fn from(p: &Procedure) -> Self {
        Self {
            runs: p.stats.runs,
            successes: p.stats.successes,
            failures: p.stats.failures,
            status: p.status,
        }
    }
}

/// A replayable step picked for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureMatch {
    pub name: String,
    pub intent: IntentAction,
}
