// Safety selector: every intent passes through `SafetySelector::gate` before execution.
use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ActionVerb, IntentAction, RiskMode, WorkingMemory};
use crate::errors::{PilotResult, PolicyViolation};

/// Largest absolute scroll amount allowed under high safety.
pub const HIGH_SAFETY_SCROLL_LIMIT: i64 = 1200;

const SCROLL_HINTS: &[&str] = &["scroll", "list", "feed", "results", "page"];

pub fn default_deny_terms() -> Vec<String> {
    [
        "purchase",
        "checkout",
        "buy now",
        "place order",
        "pay now",
        "delete account",
        "close account",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_actions() -> u64 {
    500
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_max_actions")]
    pub max_actions: u64,
    /// When set, only these verbs may run.
    #[serde(default)]
    pub allowed_verbs: Option<Vec<ActionVerb>>,
    #[serde(default = "default_deny_terms")]
    pub deny_terms: Vec<String>,
    #[serde(default)]
    pub safety_level: RiskMode,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            allowed_verbs: None,
            deny_terms: default_deny_terms(),
            safety_level: RiskMode::Normal,
        }
    }
}

/// Rate and policy gate. The action counter is the only mutable state and is
/// scoped to this instance.
#[derive(Debug)]
pub struct SafetySelector {
    config: SelectorConfig,
    deny_terms: Vec<String>,
    action_count: u64,
}

impl SafetySelector {
    pub fn new(config: SelectorConfig) -> Self {
        let deny_terms = config
            .deny_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            config,
            deny_terms,
            action_count: 0,
        }
    }

    pub fn action_count(&self) -> u64 {
        self.action_count
    }

    pub fn gate(&mut self, intent: IntentAction, memory: &WorkingMemory) -> PilotResult<IntentAction> {
        self.action_count += 1;
        match self.check(&intent, memory) {
            Ok(()) => Ok(intent),
            Err(violation) => {
                tracing::warn!(verb = %intent.verb, count = self.action_count, %violation, "intent blocked by selector");
                Err(violation.into())
            }
        }
    }

    fn check(&self, intent: &IntentAction, memory: &WorkingMemory) -> Result<(), PolicyViolation> {
        if self.action_count > self.config.max_actions {
            return Err(PolicyViolation::RateLimited {
                count: self.action_count,
                max: self.config.max_actions,
            });
        }

        if let Some(allowed) = &self.config.allowed_verbs {
            if !allowed.contains(&intent.verb) {
                return Err(PolicyViolation::VerbNotAllowed(intent.verb));
            }
        }

        let target_text: Vec<String> = intent
            .target
            .iter()
            .flat_map(|t| t.text_fields())
            .map(|t| t.to_lowercase())
            .collect();
        if let Some(term) = self
            .deny_terms
            .iter()
            .find(|term| target_text.iter().any(|text| text.contains(term.as_str())))
        {
            return Err(PolicyViolation::DeniedTerm(term.clone()));
        }

        let high = self.config.safety_level == RiskMode::High || memory.risk_mode == RiskMode::High;
        if high {
            match intent.verb {
                ActionVerb::OpenUrl | ActionVerb::RightClick => {
                    return Err(PolicyViolation::HighSafetyVerb(intent.verb));
                }
                ActionVerb::Scroll => {
                    let hinted = target_text
                        .iter()
                        .any(|text| SCROLL_HINTS.iter().any(|hint| text.contains(hint)));
                    let amount = intent.amount.unwrap_or(0);
                    if !hinted && amount.unsigned_abs() > HIGH_SAFETY_SCROLL_LIMIT.unsigned_abs() {
                        return Err(PolicyViolation::HighSafetyScroll(amount));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::IntentTarget;
    use crate::errors::PilotError;

    fn named(verb: ActionVerb, text: &str) -> IntentAction {
        IntentAction::new(verb).with_target(IntentTarget {
            name_contains: Some(text.into()),
            ..Default::default()
        })
    }

    fn violation(result: PilotResult<IntentAction>) -> PolicyViolation {
        match result {
            Err(PilotError::Policy(v)) => v,
            other => panic!("expected policy violation, got {other:?}"),
        }
    }

    #[test]
    fn denied_terms_block_regardless_of_case() {
        let mut selector = SafetySelector::new(SelectorConfig::default());
        let err = violation(selector.gate(named(ActionVerb::Click, "Purchase now"), &WorkingMemory::default()));
        assert_eq!(err, PolicyViolation::DeniedTerm("purchase".into()));
    }

    #[test]
    fn denied_terms_also_cover_exact_names() {
        let mut selector = SafetySelector::new(SelectorConfig::default());
        let intent = IntentAction::new(ActionVerb::Click).with_target(IntentTarget {
            name_equals: Some("Proceed to Checkout".into()),
            ..Default::default()
        });
        assert!(selector.gate(intent, &WorkingMemory::default()).is_err());
    }

    #[test]
    fn high_safety_blocks_open_url_but_not_click() {
        let config = SelectorConfig {
            safety_level: RiskMode::High,
            ..Default::default()
        };
        let mut selector = SafetySelector::new(config);
        let err = violation(selector.gate(IntentAction::new(ActionVerb::OpenUrl), &WorkingMemory::default()));
        assert_eq!(err, PolicyViolation::HighSafetyVerb(ActionVerb::OpenUrl));
        assert!(selector.gate(named(ActionVerb::Click, "Next"), &WorkingMemory::default()).is_ok());
    }

    #[test]
    fn memory_risk_mode_raises_safety() {
        let mut selector = SafetySelector::new(SelectorConfig::default());
        let memory = WorkingMemory {
            risk_mode: RiskMode::High,
            ..Default::default()
        };
        assert!(selector.gate(IntentAction::new(ActionVerb::RightClick), &memory).is_err());
        assert!(selector.gate(IntentAction::new(ActionVerb::RightClick), &WorkingMemory::default()).is_ok());
    }

    #[test]
    fn high_safety_scroll_bounds() {
        let config = SelectorConfig {
            safety_level: RiskMode::High,
            ..Default::default()
        };
        let mut selector = SafetySelector::new(config);
        let memory = WorkingMemory::default();
        let small = IntentAction { amount: Some(-1200), ..IntentAction::new(ActionVerb::Scroll) };
        let large = IntentAction { amount: Some(5000), ..IntentAction::new(ActionVerb::Scroll) };
        let hinted = IntentAction { amount: Some(5000), ..named(ActionVerb::Scroll, "Results list") };
        assert!(selector.gate(small, &memory).is_ok());
        assert_eq!(violation(selector.gate(large, &memory)), PolicyViolation::HighSafetyScroll(5000));
        assert!(selector.gate(hinted, &memory).is_ok());
    }

    #[test]
    fn extreme_scroll_amounts_are_rejected_without_overflow() {
        let config = SelectorConfig {
            safety_level: RiskMode::High,
            ..Default::default()
        };
        let mut selector = SafetySelector::new(config);
        let memory = WorkingMemory::default();
        for amount in [i64::MIN, i64::MAX] {
            let scroll = IntentAction { amount: Some(amount), ..IntentAction::new(ActionVerb::Scroll) };
            assert_eq!(violation(selector.gate(scroll, &memory)), PolicyViolation::HighSafetyScroll(amount));
        }
    }

    #[test]
    fn allow_list_restricts_verbs() {
        let config = SelectorConfig {
            allowed_verbs: Some(vec![ActionVerb::Click, ActionVerb::Wait]),
            ..Default::default()
        };
        let mut selector = SafetySelector::new(config);
        assert!(selector.gate(IntentAction::wait(1.0), &WorkingMemory::default()).is_ok());
        let err = violation(selector.gate(IntentAction::new(ActionVerb::Type), &WorkingMemory::default()));
        assert_eq!(err, PolicyViolation::VerbNotAllowed(ActionVerb::Type));
    }

    #[test]
    fn counter_enforces_rate_limit() {
        let config = SelectorConfig {
            max_actions: 2,
            ..Default::default()
        };
        let mut selector = SafetySelector::new(config);
        let memory = WorkingMemory::default();
        assert!(selector.gate(IntentAction::wait(1.0), &memory).is_ok());
        assert!(selector.gate(IntentAction::wait(1.0), &memory).is_ok());
        let err = violation(selector.gate(IntentAction::wait(1.0), &memory));
        assert_eq!(err, PolicyViolation::RateLimited { count: 3, max: 2 });
        assert_eq!(selector.action_count(), 3);
    }
}
