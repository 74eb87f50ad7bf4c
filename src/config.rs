use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::RiskMode;
use crate::errors::{PilotError, PilotResult};
use crate::executor::safety::SelectorConfig;
use crate::retry::RetryPolicy;

pub const API_KEY_ENV: &str = "DESKPILOT_PROPOSER_API_KEY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub proposer: ProposerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
}

/// What the loop does after the selector refuses an intent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyViolationAction {
    #[default]
    Stop,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,
    /// Maximum elements kept per compressed frame.
    #[serde(default = "default_element_cap")]
    pub element_cap: usize,
    #[serde(default)]
    pub risk_mode: RiskMode,
    /// Step logs directory; defaults to `<data_dir>/runs`.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    /// Persisted skill statistics; defaults to `<data_dir>/skills.json`.
    #[serde(default)]
    pub skills_path: Option<PathBuf>,
    /// Optional TOML file with extra `[[procedure]]` definitions.
    #[serde(default)]
    pub procedures_path: Option<PathBuf>,
    #[serde(default)]
    pub on_policy_violation: PolicyViolationAction,
    /// Wall-clock limit for a run; unlimited when absent.
    #[serde(default)]
    pub max_duration_minutes: Option<u32>,
}

fn default_step_budget() -> u32 {
    20
}

fn default_element_cap() -> usize {
    250
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            goal: None,
            step_budget: default_step_budget(),
            element_cap: default_element_cap(),
            risk_mode: RiskMode::Normal,
            log_dir: None,
            skills_path: None,
            procedures_path: None,
            on_policy_violation: PolicyViolationAction::Stop,
            max_duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerConfig {
    /// When false, the built-in heuristic proposer is used.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional API key stored in config.toml (falls back to env var DESKPILOT_PROPOSER_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub send_screenshot: bool,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_temperature() -> f64 {
    0.1
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_api_base(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            send_screenshot: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl ProposerConfig {
    /// Key from config, else from the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// JSON array of observations replayed by the scripted observer.
    #[serde(default)]
    pub script_path: Option<PathBuf>,
}

/// Per-user data directory for logs and skill state.
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("deskpilot"))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

impl AppConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.agent.log_dir.clone().unwrap_or_else(|| data_dir().join("runs"))
    }

    pub fn skills_path(&self) -> PathBuf {
        self.agent.skills_path.clone().unwrap_or_else(|| data_dir().join("skills.json"))
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn load_config() -> PilotResult<AppConfig> {
    let path = resolve_config_path()?;
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        step_budget = config.agent.step_budget,
        proposer = config.proposer.enabled,
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::ActionVerb;

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.agent.step_budget, 20);
        assert_eq!(config.agent.element_cap, 250);
        assert_eq!(config.agent.on_policy_violation, PolicyViolationAction::Stop);
        assert_eq!(config.selector.max_actions, 500);
        assert!(config.selector.deny_terms.iter().any(|t| t == "checkout"));
        assert!(!config.proposer.enabled);
    }

    #[test]
    fn sections_override_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [agent]
            goal = "close the dialog"
            step_budget = 5
            risk_mode = "high"
            on_policy_violation = "skip"

            [selector]
            allowed_verbs = ["click", "double-click"]

            [executor.retry]
            max_retries = 3
            backoff_seconds = 0.25
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.goal.as_deref(), Some("close the dialog"));
        assert_eq!(config.agent.step_budget, 5);
        assert_eq!(config.agent.risk_mode, RiskMode::High);
        assert_eq!(config.agent.on_policy_violation, PolicyViolationAction::Skip);
        assert_eq!(
            config.selector.allowed_verbs,
            Some(vec![ActionVerb::Click, ActionVerb::DoubleClick])
        );
        assert_eq!(config.executor.retry.max_retries, 3);
    }

    #[test]
    fn save_then_load_keeps_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = AppConfig::default();
        config.agent.goal = Some("open settings".into());
        config.proposer.model = "local-model".into();
        save_config(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.agent.goal.as_deref(), Some("open settings"));
        assert_eq!(loaded.proposer.model, "local-model");
    }

    #[test]
    fn configured_key_wins_over_environment() {
        let config = ProposerConfig {
            api_key: Some("from-config".into()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }
}
