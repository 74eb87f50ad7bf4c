use std::collections::VecDeque;

use crate::agent_engine::state::{FailureReason, Guidance, VerificationResult, VerificationStatus};
use crate::perception::types::{Observation, UIState};

/// Frames with one identical signature before the loop counts as stuck.
pub const STUCK_WINDOW: usize = 3;
/// A frame keeping fewer than this share of the previous elements failed.
const ELEMENT_DROP_RATIO: f64 = 0.3;

/// Post-action check. Holds the rolling signature window, so one verifier
/// serves exactly one run.
#[derive(Debug, Default)]
pub struct Verifier {
    recent: VecDeque<String>,
}

impl Verifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verify(&mut self, previous: Option<&UIState>, current: &UIState, observation: &Observation) -> VerificationResult {
        if !observation.warnings.is_empty() {
            tracing::debug!(warnings = ?observation.warnings, "observation carried warnings");
        }

        if let Some(signature) = &current.screen_signature {
            self.recent.push_back(signature.clone());
            while self.recent.len() > STUCK_WINDOW {
                self.recent.pop_front();
            }
        }

        if self.is_stuck() {
            tracing::warn!(signature = ?current.screen_signature, "screen unchanged for {} frames", STUCK_WINDOW);
            return VerificationResult {
                status: VerificationStatus::Stuck,
                failure_reason: Some(FailureReason::ScreenUnchanged),
                guidance: Some(Guidance::Replan),
                updated_focus_id: current.focused_element_id.clone(),
            };
        }

        let mut failure_reason = None;
        let mut guidance = None;

        if let Some(previous) = previous {
            if previous.screen_signature.is_some() && previous.screen_signature == current.screen_signature {
                failure_reason = Some(FailureReason::NoScreenChange);
                guidance = Some(Guidance::RetryDifferentTarget);
            }

            let before = previous.elements.len();
            let after = current.elements.len();
            if before > 0 && (after as f64) < before as f64 * ELEMENT_DROP_RATIO {
                failure_reason = Some(FailureReason::LargeElementDrop);
                guidance = Some(Guidance::AdjustWindow);
            }

            if current.focused_element_id.is_some() && current.focused_element_id != previous.focused_element_id {
                guidance = Some(Guidance::FocusShift);
            }
        }

        let status = if failure_reason.is_some() {
            VerificationStatus::Fail
        } else {
            VerificationStatus::Success
        };
        tracing::debug!(?status, reason = ?failure_reason, ?guidance, "step verified");

        VerificationResult {
            status,
            failure_reason,
            guidance,
            updated_focus_id: current.focused_element_id.clone(),
        }
    }

    fn is_stuck(&self) -> bool {
        self.recent.len() == STUCK_WINDOW && self.recent.iter().all(|s| Some(s) == self.recent.front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::UIElement;
    use crate::test_support::{element, window};

    fn frame(signature: Option<&str>, count: usize, focused: Option<&str>) -> UIState {
        UIState {
            window: window(),
            timestamp: chrono::Utc::now(),
            elements: (0..count)
                .map(|i| element(&format!("e{i}"), "button", "B", [0, 0, 10, 10]))
                .collect::<Vec<UIElement>>(),
            focused_element_id: focused.map(String::from),
            salient_text: vec![],
            screen_signature: signature.map(String::from),
        }
    }

    fn obs() -> Observation {
        Observation::new(window())
    }

    #[test]
    fn three_identical_signatures_are_stuck() {
        let mut verifier = Verifier::new();
        let a = frame(Some("same"), 3, None);
        assert_ne!(verifier.verify(None, &a, &obs()).status, VerificationStatus::Stuck);
        assert_ne!(verifier.verify(Some(&a), &a, &obs()).status, VerificationStatus::Stuck);
        let result = verifier.verify(Some(&a), &a, &obs());
        assert_eq!(result.status, VerificationStatus::Stuck);
        assert_eq!(result.guidance, Some(Guidance::Replan));
    }

    #[test]
    fn absent_signatures_never_count_as_stuck() {
        let mut verifier = Verifier::new();
        let blank = frame(None, 0, None);
        for _ in 0..4 {
            assert_eq!(verifier.verify(Some(&blank), &blank, &obs()).status, VerificationStatus::Success);
        }
    }

    #[test]
    fn unchanged_screen_fails_with_retry_hint() {
        let mut verifier = Verifier::new();
        let a = frame(Some("a"), 3, None);
        let result = verifier.verify(Some(&a), &a, &obs());
        assert_eq!(result.status, VerificationStatus::Fail);
        assert_eq!(result.failure_reason, Some(FailureReason::NoScreenChange));
        assert_eq!(result.guidance, Some(Guidance::RetryDifferentTarget));
    }

    #[test]
    fn large_element_drop_fails() {
        let mut verifier = Verifier::new();
        let before = frame(Some("a"), 5, None);
        let after = frame(Some("b"), 1, None);
        let result = verifier.verify(Some(&before), &after, &obs());
        assert_eq!(result.status, VerificationStatus::Fail);
        assert_eq!(result.failure_reason, Some(FailureReason::LargeElementDrop));
        assert_eq!(result.failure_reason.unwrap().to_string(), "large element drop");
        assert_eq!(result.guidance, Some(Guidance::AdjustWindow));
    }

    #[test]
    fn element_drop_overrides_unchanged_signature() {
        let mut verifier = Verifier::new();
        let before = frame(Some("same"), 5, None);
        let after = frame(Some("same"), 1, None);
        let result = verifier.verify(Some(&before), &after, &obs());
        assert_eq!(result.status, VerificationStatus::Fail);
        assert_eq!(result.failure_reason, Some(FailureReason::LargeElementDrop));
        assert_eq!(result.guidance, Some(Guidance::AdjustWindow));
    }

    #[test]
    fn focus_shift_alone_is_success() {
        let mut verifier = Verifier::new();
        let before = frame(Some("a"), 4, Some("e0"));
        let after = frame(Some("b"), 4, Some("e1"));
        let result = verifier.verify(Some(&before), &after, &obs());
        assert_eq!(result.status, VerificationStatus::Success);
        assert_eq!(result.guidance, Some(Guidance::FocusShift));
        assert_eq!(result.updated_focus_id.as_deref(), Some("e1"));
    }
}
