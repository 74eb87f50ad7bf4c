use std::path::Path;
use std::sync::Arc;

use crate::agent_engine::state::{
    ActionVerb, DecisionOutcome, DecisionSource, IntentAction, IntentTarget, WorkingMemory,
};
use crate::errors::PilotResult;
use crate::executor::safety::SafetySelector;
use crate::grounding::grounder::Grounder;
use crate::llm::provider::{ProposalRequest, Proposer};
use crate::perception::types::{UIElement, UIState};
use crate::retry::{attempt_with_backoff, RetryPolicy};
use crate::skills::library::SkillLibrary;

/// Names the micro-policy clicks without consulting anything else.
const MICRO_POLICY_NAMES: &[&str] = &["ok", "next"];
const CANDIDATE_ROLES: &[&str] = &["button", "link", "hyperlink", "menuitem", "checkbox", "tab"];
const MAX_CANDIDATES: usize = 5;
const DEFAULT_WAIT_SECONDS: f64 = 1.0;

/// One link in the decision chain; the first that yields an intent wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Procedure,
    MicroPolicy,
    Proposer,
}

pub const DEFAULT_STRATEGIES: [Strategy; 3] = [Strategy::Procedure, Strategy::MicroPolicy, Strategy::Proposer];

/// Arbitrates between procedure replay, the micro-policy and the proposer,
/// then passes the chosen intent through the safety selector.
pub struct DecisionEngine {
    skills: SkillLibrary,
    selector: SafetySelector,
    proposer: Arc<dyn Proposer>,
    proposer_retry: RetryPolicy,
    grounder: Grounder,
    strategies: Vec<Strategy>,
}

impl DecisionEngine {
    pub fn new(
        skills: SkillLibrary,
        selector: SafetySelector,
        proposer: Arc<dyn Proposer>,
        proposer_retry: RetryPolicy,
    ) -> Self {
        Self {
            skills,
            selector,
            proposer,
            proposer_retry,
            grounder: Grounder::new(),
            strategies: DEFAULT_STRATEGIES.to_vec(),
        }
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn skills(&self) -> &SkillLibrary {
        &self.skills
    }

    pub fn skills_mut(&mut self) -> &mut SkillLibrary {
        &mut self.skills
    }

    pub fn selector(&self) -> &SafetySelector {
        &self.selector
    }

    pub async fn decide(&mut self, state: &UIState, memory: &WorkingMemory) -> PilotResult<DecisionOutcome> {
        self.decide_with(state, memory, None).await
    }

    /// Like [`DecisionEngine::decide`], letting the proposer see the frame's
    /// screenshot. Gate violations propagate to the caller.
    pub async fn decide_with(
        &mut self,
        state: &UIState,
        memory: &WorkingMemory,
        screenshot: Option<&Path>,
    ) -> PilotResult<DecisionOutcome> {
        let mut chosen = None;
        let mut used_proposer = false;
        for strategy in self.strategies.clone() {
            used_proposer |= strategy == Strategy::Proposer;
            if let Some(outcome) = self.attempt(strategy, state, memory, screenshot).await {
                chosen = Some(outcome);
                break;
            }
        }

        let outcome = chosen.unwrap_or_else(|| DecisionOutcome {
            intent: IntentAction::wait(DEFAULT_WAIT_SECONDS),
            rationale: "no valid proposal, waiting".into(),
            source: DecisionSource::Proposer,
            used_proposer,
        });
        tracing::info!(
            verb = %outcome.intent.verb,
            source = ?outcome.source,
            rationale = %outcome.rationale,
            "decision made"
        );

        let intent = self.selector.gate(outcome.intent, memory)?;
        Ok(DecisionOutcome { intent, ..outcome })
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        state: &UIState,
        memory: &WorkingMemory,
        screenshot: Option<&Path>,
    ) -> Option<DecisionOutcome> {
        match strategy {
            Strategy::Procedure => self.skills.match_procedure(state, memory).map(|m| DecisionOutcome {
                rationale: format!("replaying procedure '{}'", m.name),
                source: DecisionSource::Procedure { name: m.name },
                intent: m.intent,
                used_proposer: false,
            }),
            Strategy::MicroPolicy => micro_policy(state).map(|intent| DecisionOutcome {
                rationale: "micro-policy: confirm-style button present".into(),
                intent,
                source: DecisionSource::MicroPolicy,
                used_proposer: false,
            }),
            Strategy::Proposer => self.propose(state, memory, screenshot).await,
        }
    }

    async fn propose(
        &self,
        state: &UIState,
        memory: &WorkingMemory,
        screenshot: Option<&Path>,
    ) -> Option<DecisionOutcome> {
        let candidates = candidate_actions(state);
        let request = ProposalRequest {
            state,
            goal: memory.goal.as_deref(),
            candidates: &candidates,
            screenshot,
        };
        let proposer = self.proposer.as_ref();
        let descriptors = match attempt_with_backoff(&self.proposer_retry, "proposer", |_| proposer.propose(&request)).await {
            Ok(descriptors) => descriptors,
            Err(e) => {
                tracing::warn!(proposer = proposer.name(), error = %e, "proposer unavailable, degrading to empty proposal");
                Vec::new()
            }
        };

        let proposed = descriptors.len();
        let intents: Vec<IntentAction> = descriptors.into_iter().filter_map(|d| d.into_intent()).collect();
        let ranked = self.rank(intents, state);
        tracing::debug!(proposer = proposer.name(), proposed, valid = ranked.len(), "proposals ranked");

        ranked.into_iter().next().map(|intent| DecisionOutcome {
            rationale: format!("{} proposed {} (1 of {})", proposer.name(), intent.verb, proposed),
            intent,
            source: DecisionSource::Proposer,
            used_proposer: true,
        })
    }

    /// Stable partition: proposals whose target grounds come first.
    fn rank(&self, mut intents: Vec<IntentAction>, state: &UIState) -> Vec<IntentAction> {
        intents.sort_by_key(|intent| match &intent.target {
            Some(_) => self.grounder.ground(intent, state).element.is_none(),
            None => false,
        });
        intents
    }
}

fn click_target(element: &UIElement) -> IntentTarget {
    IntentTarget {
        element_id: Some(element.element_id.clone()),
        name_equals: element.name.clone(),
        role: element.role.clone(),
        ..Default::default()
    }
}

/// Click the first enabled element named "OK" or "Next".
pub fn micro_policy(state: &UIState) -> Option<IntentAction> {
    state
        .elements
        .iter()
        .filter(|e| !e.is_disabled())
        .find(|e| MICRO_POLICY_NAMES.contains(&e.name_or_empty().trim().to_lowercase().as_str()))
        .map(|e| IntentAction::new(ActionVerb::Click).with_target(click_target(e)))
}

/// Clicks on the most salient enabled interactive elements, offered to the
/// proposer as suggestions.
fn candidate_actions(state: &UIState) -> Vec<IntentAction> {
    state
        .elements
        .iter()
        .filter(|e| !e.is_disabled())
        .filter(|e| e.role.as_deref().is_some_and(|r| CANDIDATE_ROLES.contains(&r)))
        .take(MAX_CANDIDATES)
        .map(|e| IntentAction::new(ActionVerb::Click).with_target(click_target(e)))
        .collect()
}
