pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod grounding;
pub mod llm;
pub mod perception;
pub mod retry;
pub mod skills;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use crate::agent_engine::decision::DecisionEngine;
use crate::agent_engine::engine::{AgentLoop, RunSummary};
use crate::agent_engine::history::{latest_log, load_events, render_events, StepLogger};
use crate::agent_engine::state::WorkingMemory;
use crate::config::AppConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::ExecutionDispatcher;
use crate::executor::input::{DryRunInputBackend, InputExecutor};
use crate::executor::safety::SafetySelector;
use crate::llm::provider::Proposer;
use crate::llm::providers::heuristic::HeuristicProposer;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProposer;
use crate::perception::compression::UiCompressor;
use crate::perception::scripted::ScriptedObserver;
use crate::skills::library::{load_definitions, SkillLibrary};
use crate::skills::store::SkillStore;

const USAGE: &str = "usage: deskpilot run | deskpilot replay [run_id]";

/// Skill library backed by the configured store, with starter and
/// user-defined procedures registered.
pub fn build_skills(config: &AppConfig) -> PilotResult<SkillLibrary> {
    let store = Arc::new(SkillStore::new(config.skills_path()));
    let mut skills = SkillLibrary::open(store)?.with_defaults();
    if let Some(path) = &config.agent.procedures_path {
        for procedure in load_definitions(path)? {
            if skills.get(&procedure.name).is_some() {
                tracing::warn!(procedure = %procedure.name, "definition shadows a built-in procedure; skipped");
                continue;
            }
            skills.register(procedure);
        }
    }
    Ok(skills)
}

fn build_proposer(config: &AppConfig) -> PilotResult<Arc<dyn Proposer>> {
    if config.proposer.enabled {
        let proposer = OpenAiCompatibleProposer::from_config(&config.proposer)?;
        tracing::info!(model = %config.proposer.model, api_base = %config.proposer.api_base, "model proposer enabled");
        Ok(Arc::new(proposer))
    } else {
        tracing::info!("no proposer backend configured; using heuristic proposer");
        Ok(Arc::new(HeuristicProposer))
    }
}

/// Wires a scripted, dry-run session from configuration.
pub fn build_agent(config: &AppConfig) -> PilotResult<AgentLoop> {
    let script = config.observer.script_path.as_ref().ok_or_else(|| {
        PilotError::Config("no observer configured: set [observer] script_path".into())
    })?;
    let observer = Arc::new(ScriptedObserver::from_file(script)?);

    let decision = DecisionEngine::new(
        build_skills(config)?,
        SafetySelector::new(config.selector.clone()),
        build_proposer(config)?,
        config.proposer.retry,
    );
    let dispatcher = ExecutionDispatcher::raw_only(Arc::new(InputExecutor::new(
        Arc::new(DryRunInputBackend),
        config.executor.retry,
    )));
    let memory = WorkingMemory {
        goal: config.agent.goal.clone(),
        risk_mode: config.agent.risk_mode,
        step_budget: config.agent.step_budget,
        ..WorkingMemory::default()
    };
    let logger = StepLogger::new(&config.log_dir())?;
    tracing::info!(log = %logger.path().display(), "step log ready");

    Ok(AgentLoop::new(observer, decision, dispatcher, memory)
        .with_logger(logger)
        .with_compressor(UiCompressor::new(config.agent.element_cap))
        .with_policy_action(config.agent.on_policy_violation)
        .with_max_duration_minutes(config.agent.max_duration_minutes))
}

pub async fn run_session(config: &AppConfig) -> PilotResult<RunSummary> {
    let mut agent = build_agent(config)?;
    Ok(agent.run().await)
}

/// Renders the log of `run_id`, or of the newest run when absent.
pub fn replay(config: &AppConfig, run_id: Option<&str>) -> PilotResult<String> {
    let dir = config.log_dir();
    let path = match run_id {
        Some(id) => dir.join(format!("{id}.jsonl")),
        None => latest_log(&dir)?
            .ok_or_else(|| PilotError::Config(format!("no step logs in {}", dir.display())))?,
    };
    let events = load_events(&path)?;
    tracing::info!(path = %path.display(), events = events.len(), "replaying step log");
    Ok(render_events(&events))
}

/// Binary entry point; returns the process exit code.
pub async fn run(args: Vec<String>) -> i32 {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let config = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config; using defaults");
            AppConfig::default()
        }
    };

    match args.first().map(String::as_str) {
        Some("run") => match run_session(&config).await {
            Ok(summary) => {
                println!(
                    "run {} finished after {} step(s): {} ({:?})",
                    summary.run_id, summary.steps, summary.stop_reason, summary.final_status
                );
                0
            }
            Err(e) => {
                tracing::error!(error = %e, "run failed");
                1
            }
        },
        Some("replay") => match replay(&config, args.get(1).map(String::as_str)) {
            Ok(rendered) => {
                println!("{rendered}");
                0
            }
            Err(e) => {
                tracing::error!(error = %e, "replay failed");
                1
            }
        },
        _ => {
            eprintln!("{USAGE}");
            2
        }
    }
}
