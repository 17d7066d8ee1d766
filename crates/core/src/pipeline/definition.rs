use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::errors::{ExecutionError, ValidationError};
use crate::registry::AgentRegistry;
use crate::types::{AgentOutput, PolicyViolation};

/// One step of a pipeline. Constructed through [`Stage::new`], which rejects
/// an empty agent list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Stage {
    name: String,
    agents: Vec<String>,
    parallel: bool,
    required: bool,
    description: String,
}

impl Stage {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        agents: impl IntoIterator<Item = S>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let agents: Vec<String> = agents.into_iter().map(Into::into).collect();
        if agents.is_empty() {
            return Err(ValidationError::EmptyStage { stage: name });
        }

        Ok(Self { name, agents, parallel: false, required: true, description: String::new() })
    }

    pub fn parallel(mut self) -> Self {
        if self.agents.len() == 1 {
            warn!(
                event_name = "pipeline.stage.parallel_noop",
                stage = %self.name,
                "parallel stage has a single agent; it will run sequentially"
            );
        }
        self.parallel = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn agents(&self) -> &[String] {
        &self.agents
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when the coordinator will fan the stage out concurrently.
    pub(crate) fn fans_out(&self) -> bool {
        self.parallel && self.agents.len() > 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self, ValidationError> {
        let name = name.into();
        if stages.is_empty() {
            return Err(ValidationError::EmptyPipeline { pipeline: name });
        }

        let mut seen = BTreeSet::new();
        for stage in &stages {
            if !seen.insert(stage.name()) {
                return Err(ValidationError::DuplicateStage {
                    pipeline: name,
                    stage: stage.name().to_string(),
                });
            }
        }

        Ok(Self { name, stages })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn total_agents(&self) -> usize {
        self.stages.iter().map(|stage| stage.agents().len()).sum()
    }

    pub fn get_stage(&self, stage_name: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.name() == stage_name)
    }

    /// Referenced agent names absent from `registry`, each reported once in
    /// first-reference order. Read-only; callers decide whether it is fatal.
    pub fn validate(&self, registry: &AgentRegistry) -> Vec<String> {
        let mut checked = BTreeSet::new();
        let mut missing = Vec::new();
        for agent_name in self.stages.iter().flat_map(|stage| stage.agents()) {
            if checked.insert(agent_name.as_str()) && !registry.has(agent_name) {
                warn!(
                    event_name = "pipeline.validate.unknown_agent",
                    pipeline = %self.name,
                    agent = %agent_name,
                    "pipeline references unknown agent"
                );
                missing.push(agent_name.clone());
            }
        }

        if missing.is_empty() {
            info!(event_name = "pipeline.validate.passed", pipeline = %self.name, "pipeline validation passed");
        } else {
            error!(
                event_name = "pipeline.validate.failed",
                pipeline = %self.name,
                missing = missing.len(),
                "pipeline validation failed"
            );
        }
        missing
    }
}

/// Why a stage failed, keeping the typed error for callers that need to
/// tell a hook veto from a gate denial from an agent crash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: String,
    pub agent: String,
    pub message: String,
    pub violations: Vec<PolicyViolation>,
    #[serde(skip)]
    pub error: ExecutionError,
}

impl StageFailure {
    pub fn new(stage: impl Into<String>, error: ExecutionError) -> Self {
        Self {
            stage: stage.into(),
            agent: error.agent().to_string(),
            message: error.to_string(),
            violations: error.violations().to_vec(),
            error,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub stages_completed: Vec<String>,
    pub stages_failed: Vec<String>,
    pub outputs: BTreeMap<String, AgentOutput>,
    pub duration_ms: f64,
    pub error: Option<String>,
    pub failures: Vec<StageFailure>,
}

impl PipelineResult {
    /// Stages attempted, whether they completed or failed.
    pub fn total_stages(&self) -> usize {
        self.stages_completed.len() + self.stages_failed.len()
    }

    pub fn get_agent_output(&self, agent_name: &str) -> Option<&AgentOutput> {
        self.outputs.get(agent_name)
    }
}
