use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::agent_engine::state::{ActionVerb, IntentAction, IntentTarget, RiskMode, WorkingMemory};
use crate::errors::{PilotError, PilotResult};
use crate::perception::types::UIState;
use crate::skills::store::{SkillRecords, SkillStore};
use crate::skills::types::{
    PersistedProcedure, Procedure, ProcedureMatch, ProcedureStats, ProcedureStatus,
};

const PROMOTE_AFTER_SUCCESSES: u32 = 3;
const DEGRADE_AFTER_FAILURES: u32 = 3;

/// Registry of replayable procedures and their trust state.
///
/// Owned explicitly by the decision engine; persisted statistics are read once
/// at construction and written back after every [`SkillLibrary::record_result`].
pub struct SkillLibrary {
    procedures: Vec<Procedure>,
    store: Option<Arc<SkillStore>>,
    persisted: SkillRecords,
}

impl SkillLibrary {
    /// In-memory library with no persistence.
    pub fn new() -> Self {
        Self {
            procedures: Vec::new(),
            store: None,
            persisted: SkillRecords::new(),
        }
    }

    /// Library backed by `store`; persisted counters merge into procedures as
    /// they get registered.
    pub fn open(store: Arc<SkillStore>) -> PilotResult<Self> {
        let persisted = store.load()?;
        tracing::info!(
            path = %store.path().display(),
            records = persisted.len(),
            "skill statistics loaded"
        );
        Ok(Self {
            procedures: Vec::new(),
            store: Some(store),
            persisted,
        })
    }

    /// Registers the built-in starter procedures.
    pub fn with_defaults(mut self) -> Self {
        for procedure in default_procedures() {
            self.register(procedure);
        }
        self
    }

    /// Adds or replaces a procedure; registration order is match order.
    pub fn register(&mut self, mut procedure: Procedure) {
        if let Some(saved) = self.persisted.get(&procedure.name) {
            procedure.stats = ProcedureStats {
                runs: saved.runs,
                successes: saved.successes,
                failures: saved.failures,
            };
            procedure.status = saved.status;
            tracing::debug!(procedure = %procedure.name, status = %procedure.status, "persisted stats merged");
        }
        match self.procedures.iter_mut().find(|p| p.name == procedure.name) {
            Some(existing) => *existing = procedure,
            None => self.procedures.push(procedure),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    /// First eligible procedure's first step, if any.
    pub fn match_procedure(&self, state: &UIState, memory: &WorkingMemory) -> Option<ProcedureMatch> {
        self.procedures
            .iter()
            .filter(|p| p.status.is_replayable())
            .filter(|p| !(p.status == ProcedureStatus::Trial && memory.risk_mode == RiskMode::High))
            .filter(|p| context_matches(p, state, memory))
            .find_map(|p| {
                p.steps.first().map(|step| ProcedureMatch {
                    name: p.name.clone(),
                    intent: step.intent.clone(),
                })
            })
    }

    /// Updates counters, re-evaluates trust and persists. Returns the new status.
    pub fn record_result(&mut self, name: &str, success: bool) -> PilotResult<ProcedureStatus> {
        let procedure = self
            .procedures
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| PilotError::Skills(format!("unknown procedure '{name}'")))?;

        procedure.stats.runs += 1;
        if success {
            procedure.stats.successes += 1;
        } else {
            procedure.stats.failures += 1;
        }

        let previous = procedure.status;
        procedure.status = next_status(procedure.status, &procedure.stats);
        if procedure.status != previous {
            tracing::info!(
                procedure = name,
                from = %previous,
                to = %procedure.status,
                successes = procedure.stats.successes,
                failures = procedure.stats.failures,
                "procedure trust changed"
            );
        }

        let record = PersistedProcedure::from(&*procedure);
        let status = procedure.status;
        self.persisted.insert(name.to_string(), record);
        if let Some(store) = &self.store {
            store.update(name, record)?;
        }
        Ok(status)
    }
}

impl Default for SkillLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn next_status(current: ProcedureStatus, stats: &ProcedureStats) -> ProcedureStatus {
    if stats.failures >= DEGRADE_AFTER_FAILURES && stats.failures >= stats.successes {
        return ProcedureStatus::Degraded;
    }
    if current != ProcedureStatus::Trusted
        && stats.successes >= PROMOTE_AFTER_SUCCESSES
        && stats.failures == 0
    {
        return ProcedureStatus::Trusted;
    }
    current
}

fn context_matches(procedure: &Procedure, state: &UIState, memory: &WorkingMemory) -> bool {
    let Some(hint) = procedure.context_hint.as_deref().map(|h| h.trim().to_lowercase()) else {
        return true;
    };
    if hint.is_empty() {
        return true;
    }
    [
        memory.goal.as_deref(),
        state.window.title.as_deref(),
        state.window.exe_name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|haystack| haystack.to_lowercase().contains(&hint))
}

/// Starter procedures shipped with the agent. Both begin in `trial`.
pub fn default_procedures() -> Vec<Procedure> {
    let dismiss = IntentAction::new(ActionVerb::Click).with_target(IntentTarget {
        name_equals: Some("OK".into()),
        ..Default::default()
    });
    let scroll = IntentAction {
        amount: Some(-600),
        ..IntentAction::new(ActionVerb::Scroll)
    };
    vec![
        Procedure::new("dismiss_dialog", vec![dismiss])
            .with_context("dialog")
            .with_status(ProcedureStatus::Trial),
        Procedure::new("scroll_down", vec![scroll])
            .with_context("scroll")
            .with_status(ProcedureStatus::Trial),
    ]
}

#[derive(Debug, Deserialize)]
struct ProcedureFile {
    #[serde(default, rename = "procedure")]
    procedures: Vec<Procedure>,
}

/// Reads `[[procedure]]` tables from a TOML definitions file.
pub fn load_definitions(path: &Path) -> PilotResult<Vec<Procedure>> {
    let content = std::fs::read_to_string(path)?;
    let file: ProcedureFile = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), count = file.procedures.len(), "procedure definitions loaded");
    Ok(file.procedures)
}
