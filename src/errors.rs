use thiserror::Error;

use crate::agent_engine::state::ActionVerb;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Observer error: {0}")]
    Observer(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Proposer error: {0}")]
    Proposer(String),

    #[error("Skills error: {0}")]
    Skills(String),

    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyViolation),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Missing target: {0}")]
    MissingTarget(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl PilotError {
    /// Gate violations abort the current step only; everything else is the caller's call.
    pub fn is_policy(&self) -> bool {
        matches!(self, PilotError::Policy(_))
    }

    /// Coarse category used to prefix execution error strings.
    pub fn category(&self) -> &'static str {
        match self {
            PilotError::Timeout(_) => "timeout",
            PilotError::MissingTarget(_) => "missing-target",
            PilotError::Http(e) if e.is_timeout() => "timeout",
            other => {
                let text = other.to_string().to_lowercase();
                if text.contains("timed out") || text.contains("timeout") {
                    "timeout"
                } else {
                    "generic"
                }
            }
        }
    }
}

/// Reasons the safety selector refuses an intent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("action rate limit exceeded ({count} > {max})")]
    RateLimited { count: u64, max: u64 },

    #[error("verb '{0}' is not allow-listed")]
    VerbNotAllowed(ActionVerb),

    #[error("target text matches denied term '{0}'")]
    DeniedTerm(String),

    #[error("verb '{0}' is forbidden under high safety")]
    HighSafetyVerb(ActionVerb),

    #[error("scroll amount {0} is out of bounds under high safety")]
    HighSafetyScroll(i64),
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
