use std::fs;
use std::path::Path;
use std::sync::Arc;

use ano_core::audit::InMemoryAuditSink;
use ano_core::config::AppConfig;
use ano_core::errors::{FrameworkError, ValidationError};
use ano_core::pipeline::{Pipeline, PipelineCoordinator, PipelineResult, Stage};
use ano_core::policy::hooks::{AuditLoggingHook, CostTrackingHook, DataSanitizationHook, RateLimitHook};
use ano_core::policy::{custom_gates, PolicyEngine, PolicyHook};
use ano_core::types::{AgentContext, Context, OrgProfile};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::commands::{
    builtin_registries, offline_llm, CommandResult, EXIT_CONFIG_INVALID, EXIT_IO,
    EXIT_PIPELINE_FAILED,
};

pub const PIPELINE_NAME: &str = "research-review";

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub topic: String,
    pub org_name: String,
    pub org_type: String,
    /// JSON object merged into the initial input (gate evidence, extra fields).
    pub input_file: Option<std::path::PathBuf>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            topic: "Adopting autonomous agents for grant research".to_string(),
            org_name: "Demo Organization".to_string(),
            org_type: "nonprofit".to_string(),
            input_file: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    command: &'static str,
    status: &'static str,
    pipeline: &'static str,
    tier: &'a str,
    gates: Vec<String>,
    total_cost: String,
    audit_events: usize,
    result: &'a PipelineResult,
}

/// research → parallel security/QA analysis → executive review, with an
/// optional documentation stage that may fail without failing the run.
pub fn research_review_pipeline() -> Result<Pipeline, ValidationError> {
    Pipeline::new(
        PIPELINE_NAME,
        vec![
            Stage::new("research", ["researcher"])?.with_description("Investigate the topic"),
            Stage::new("analysis", ["security-reviewer", "qa-specialist"])?
                .parallel()
                .with_description("Independent security and quality review"),
            Stage::new("executive-review", ["ceo-advisor"])?
                .with_description("Strategic recommendation from upstream findings"),
            Stage::new("documentation", ["technical-writer"])?
                .optional()
                .with_description("Write up the decision"),
        ],
    )
}

pub async fn run(config: &AppConfig, args: &RunArgs) -> CommandResult {
    let initial_input = match initial_input(args) {
        Ok(input) => input,
        Err(message) => return CommandResult::failure("run", "input", message, EXIT_IO),
    };

    let engine = match policy_engine(config) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure("run", "config_validation", error.to_string(), EXIT_CONFIG_INVALID)
        }
    };
    let gates = engine.gate_names();

    let (agents, _capabilities) = builtin_registries(offline_llm(config));
    let coordinator = match research_review_pipeline()
        .and_then(|pipeline| PipelineCoordinator::new(pipeline, Arc::new(agents)))
    {
        Ok(coordinator) => coordinator,
        Err(error) => {
            return CommandResult::failure("run", "pipeline_validation", error.to_string(), EXIT_CONFIG_INVALID)
        }
    };

    let audit_sink = InMemoryAuditSink::default();
    let cost = Arc::new(CostTrackingHook::new(config.policy.cost_per_1k_tokens));
    let hooks: Vec<Arc<dyn PolicyHook>> = vec![
        Arc::new(AuditLoggingHook::with_sink(Arc::new(audit_sink.clone()))),
        Arc::new(DataSanitizationHook::new(config.policy.sensitive_keys.clone())),
        Arc::new(RateLimitHook::new(config.policy.rate_limit_per_minute)),
        cost.clone(),
    ];
    let coordinator = coordinator.with_policy_engine(Arc::new(engine)).with_hooks(hooks);

    let mut context = AgentContext::new(OrgProfile::new(args.org_name.clone(), args.org_type.clone()));
    let result = coordinator.run(&initial_input, &mut context).await;

    info!(
        event_name = "cli.run.completed",
        pipeline = PIPELINE_NAME,
        success = result.success,
        stages_completed = result.stages_completed.len(),
        "pipeline run finished"
    );

    let report = RunReport {
        command: "run",
        status: if result.success { "ok" } else { "fail" },
        pipeline: PIPELINE_NAME,
        tier: config.environment.as_str(),
        gates,
        total_cost: format!("{:.4}", cost.total_cost()),
        audit_events: audit_sink.events().len(),
        result: &result,
    };
    let exit_code = if result.success { 0 } else { EXIT_PIPELINE_FAILED };
    CommandResult::report(exit_code, &report)
}

/// Explicit `policy.gates` when configured, otherwise the tier preset.
pub fn policy_engine(config: &AppConfig) -> Result<PolicyEngine, FrameworkError> {
    match &config.policy.gates {
        Some(names) => Ok(PolicyEngine::new(custom_gates(names.as_slice())?, config.environment)),
        None => Ok(PolicyEngine::for_tier(config.environment)),
    }
}

fn initial_input(args: &RunArgs) -> Result<Context, String> {
    let mut input = Context::new();
    // Every stage sees the same initial input, so it carries each role's
    // primary field.
    for key in ["topic", "question", "target", "subject"] {
        input.insert(key.to_string(), Value::String(args.topic.clone()));
    }
    input.insert(
        "task".to_string(),
        Value::String("Summarize the review and the decision for the team".to_string()),
    );

    if let Some(path) = &args.input_file {
        input.extend(read_input_file(path)?);
    }
    Ok(input)
}

fn read_input_file(path: &Path) -> Result<Context, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read input file `{}`: {error}", path.display()))?;
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(format!("input file `{}` must contain a JSON object", path.display())),
        Err(error) => Err(format!("could not parse input file `{}`: {error}", path.display())),
    }
}
