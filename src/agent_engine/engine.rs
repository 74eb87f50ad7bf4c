use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent_engine::decision::DecisionEngine;
use crate::agent_engine::history::StepLogger;
use crate::agent_engine::loop_control::{LoopController, StopReason};
use crate::agent_engine::state::{
    ActionVerb, DecisionSource, EpisodicStep, ExecutionStatus, VerificationStatus, WorkingMemory,
};
use crate::agent_engine::verifier::Verifier;
use crate::config::PolicyViolationAction;
use crate::errors::PilotResult;
use crate::executor::dispatcher::ExecutionDispatcher;
use crate::grounding::grounder::Grounder;
use crate::perception::compression::UiCompressor;
use crate::perception::traits::Observer;

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub steps: u32,
    pub final_status: Option<VerificationStatus>,
    pub stop_reason: StopReason,
}

enum StepFlow {
    Continue(Option<VerificationStatus>),
    Stop(StopReason, Option<VerificationStatus>),
}

/// Closed-loop controller: observe, compress, decide, ground, execute,
/// re-observe, verify, update memory. Steps run strictly one after another.
pub struct AgentLoop {
    observer: Arc<dyn Observer>,
    compressor: UiCompressor,
    decision: DecisionEngine,
    grounder: Grounder,
    dispatcher: ExecutionDispatcher,
    verifier: Verifier,
    logger: Option<StepLogger>,
    memory: WorkingMemory,
    on_policy_violation: PolicyViolationAction,
    max_duration_minutes: Option<u32>,
    trace: Vec<EpisodicStep>,
}

impl AgentLoop {
    pub fn new(
        observer: Arc<dyn Observer>,
        decision: DecisionEngine,
        dispatcher: ExecutionDispatcher,
        memory: WorkingMemory,
    ) -> Self {
        Self {
            observer,
            compressor: UiCompressor::default(),
            decision,
            grounder: Grounder::new(),
            dispatcher,
            verifier: Verifier::new(),
            logger: None,
            memory,
            on_policy_violation: PolicyViolationAction::Stop,
            max_duration_minutes: None,
            trace: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: StepLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_compressor(mut self, compressor: UiCompressor) -> Self {
        self.compressor = compressor;
        self
    }

    pub fn with_policy_action(mut self, action: PolicyViolationAction) -> Self {
        self.on_policy_violation = action;
        self
    }

    pub fn with_max_duration_minutes(mut self, minutes: Option<u32>) -> Self {
        self.max_duration_minutes = minutes;
        self
    }

    pub fn trace(&self) -> &[EpisodicStep] {
        &self.trace
    }

    pub fn memory(&self) -> &WorkingMemory {
        &self.memory
    }

    pub fn decision(&self) -> &DecisionEngine {
        &self.decision
    }

    pub async fn run(&mut self) -> RunSummary {
        let run_id = self
            .logger
            .as_ref()
            .map(|l| l.run_id().to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut ctrl = LoopController::new(self.memory.step_budget, self.max_duration_minutes);
        let mut final_status = None;

        tracing::info!(run_id = %run_id, goal = ?self.memory.goal, budget = self.memory.step_budget, "run started");

        let stop_reason = loop {
            if let Some(reason) = ctrl.should_stop() {
                break reason;
            }
            let step_index = ctrl.steps();
            ctrl.record_step();

            match self.step(step_index).await {
                Ok(StepFlow::Continue(status)) => final_status = status.or(final_status),
                Ok(StepFlow::Stop(reason, status)) => {
                    final_status = status.or(final_status);
                    break reason;
                }
                Err(e) => {
                    tracing::error!(step = step_index, error = %e, "observation failed, ending run");
                    self.emit(step_index, "error", &serde_json::json!({ "error": e.to_string() }));
                    break StopReason::ObserverFailed;
                }
            }
        };

        tracing::info!(
            run_id = %run_id,
            steps = ctrl.steps(),
            status = ?final_status,
            reason = %stop_reason,
            "run ended"
        );
        RunSummary {
            run_id,
            steps: ctrl.steps(),
            final_status,
            stop_reason,
        }
    }

    async fn step(&mut self, step_index: u32) -> PilotResult<StepFlow> {
        // ── Observe ───────────────────────────────────────────────────────
        let observation = self.observer.observe().await?;
        self.emit(
            step_index,
            "observe",
            &serde_json::json!({
                "window": observation.window.fingerprint(),
                "title": observation.window.title,
                "warnings": observation.warnings,
            }),
        );
        let state = self.compressor.compress(&observation);
        self.emit(
            step_index,
            "state",
            &serde_json::json!({
                "elements": state.elements.len(),
                "focused": state.focused_element_id,
                "signature": state.screen_signature,
                "salient_text": state.salient_text,
            }),
        );

        // ── Decide ────────────────────────────────────────────────────────
        let decision = match self
            .decision
            .decide_with(&state, &self.memory, observation.screenshot_path.as_deref())
            .await
        {
            Ok(decision) => decision,
            Err(e) if e.is_policy() => {
                tracing::warn!(step = step_index, error = %e, action = ?self.on_policy_violation, "selector refused intent");
                self.emit(step_index, "policy", &serde_json::json!({ "error": e }));
                self.memory.last_error = Some(e.to_string());
                return Ok(match self.on_policy_violation {
                    PolicyViolationAction::Stop => StepFlow::Stop(StopReason::PolicyViolation, None),
                    PolicyViolationAction::Skip => StepFlow::Continue(None),
                });
            }
            Err(e) => return Err(e),
        };
        self.emit(step_index, "decide", &decision);

        if decision.intent.verb == ActionVerb::Stop {
            tracing::info!(step = step_index, rationale = %decision.rationale, "stop requested by decision");
            return Ok(StepFlow::Stop(StopReason::StopRequested, None));
        }

        // ── Ground & execute ──────────────────────────────────────────────
        let grounded = self.grounder.ground(&decision.intent, &state);
        self.emit(
            step_index,
            "ground",
            &serde_json::json!({
                "element": grounded.element.as_ref().map(|e| &e.element_id),
                "confidence": grounded.confidence,
                "alternatives": grounded.alternatives.len(),
            }),
        );

        let execution = self.dispatcher.dispatch(&decision.intent, &grounded).await;
        self.emit(step_index, "execute", &execution);

        // ── Verify ────────────────────────────────────────────────────────
        let after = self.observer.observe().await?;
        let new_state = self.compressor.compress(&after);
        let verification = self.verifier.verify(Some(&state), &new_state, &after);
        self.emit(step_index, "verify", &verification);

        // ── Memory & skills ───────────────────────────────────────────────
        self.memory.last_error = verification
            .failure_reason
            .map(|r| r.to_string())
            .or_else(|| execution.error.clone().filter(|_| execution.status == ExecutionStatus::Fail));
        self.memory.reflection = verification.guidance.map(|g| match verification.failure_reason {
            Some(reason) => format!("{g}: {reason}"),
            None => g.to_string(),
        });

        if let DecisionSource::Procedure { name } = &decision.source {
            let success = verification.status == VerificationStatus::Success;
            match self.decision.skills_mut().record_result(name, success) {
                Ok(status) => tracing::debug!(procedure = %name, %status, success, "procedure outcome recorded"),
                Err(e) => tracing::warn!(procedure = %name, error = %e, "could not record procedure outcome"),
            }
        }

        let status = verification.status;
        self.trace.push(EpisodicStep {
            step_index,
            intent: decision.intent,
            source: decision.source,
            grounded,
            execution,
            verification,
            observation_signature: new_state.screen_signature,
        });

        Ok(match status {
            VerificationStatus::Stuck => StepFlow::Stop(StopReason::Stuck, Some(status)),
            VerificationStatus::Fail => StepFlow::Stop(StopReason::VerificationFailed, Some(status)),
            _ => StepFlow::Continue(Some(status)),
        })
    }

    fn emit<T: Serialize>(&self, step_index: u32, kind: &str, payload: &T) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(step_index, kind, payload) {
                tracing::warn!(kind, error = %e, "step log write failed");
            }
        }
    }
}
