use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    StepBudget,
    TimeLimit,
    Stuck,
    VerificationFailed,
    PolicyViolation,
    StopRequested,
    ObserverFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopReason::StepBudget => "step budget exhausted",
            StopReason::TimeLimit => "time limit reached",
            StopReason::Stuck => "screen stuck",
            StopReason::VerificationFailed => "verification failed",
            StopReason::PolicyViolation => "policy violation",
            StopReason::StopRequested => "stop requested",
            StopReason::ObserverFailed => "observer failed",
        })
    }
}

/// Outer run limits: step budget and optional wall-clock limit.
pub struct LoopController {
    step_budget: u32,
    max_duration: Option<Duration>,
    start_time: Instant,
    steps: u32,
}

impl LoopController {
    pub fn new(step_budget: u32, max_duration_minutes: Option<u32>) -> Self {
        Self {
            step_budget,
            max_duration: max_duration_minutes.map(|m| Duration::from_secs(u64::from(m) * 60)),
            start_time: Instant::now(),
            steps: 0,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = Some(max_duration);
        self
    }

    pub fn record_step(&mut self) {
        self.steps += 1;
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn should_stop(&self) -> Option<StopReason> {
        if self.steps >= self.step_budget {
            return Some(StopReason::StepBudget);
        }
        match self.max_duration {
            Some(limit) if self.start_time.elapsed() >= limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }
}
