use std::any::Any;

use thiserror::Error;

use crate::types::{ExecutionPhase, PolicyViolation};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("unknown gate `{name}`; available: {available:?}")]
    UnknownGate { name: String, available: Vec<String> },
    #[error("unknown environment tier `{0}` (expected development|test|production)")]
    UnknownTier(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent `{name}` is already registered")]
    AlreadyRegistered { name: String },
    #[error("agent `{name}` not found in registry; available: {available:?}")]
    NotFound { name: String, available: Vec<String> },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("stage `{stage}` must have at least one agent")]
    EmptyStage { stage: String },
    #[error("pipeline `{pipeline}` must have at least one stage")]
    EmptyPipeline { pipeline: String },
    #[error("pipeline `{pipeline}` has duplicate stage name `{stage}`")]
    DuplicateStage { pipeline: String, stage: String },
    #[error("pipeline `{pipeline}` references missing agents: {missing:?}")]
    MissingAgents { pipeline: String, missing: Vec<String> },
}

/// Failure raised by an agent's own `execute`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("llm backend `{provider}` failed: {message}")]
    Llm { provider: String, message: String },
    #[error("{0}")]
    Failed(String),
    #[error("agent panicked: {0}")]
    Panicked(String),
}

/// Everything that can fail a single agent invocation inside a stage.
///
/// The coordinator treats every variant the same way (the stage fails); the
/// variant tells the caller which layer refused.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("agent `{agent}` not found in registry")]
    AgentNotFound { agent: String },
    #[error("hook `{hook}` vetoed {phase} of agent `{agent}`: {message}")]
    HookVeto { agent: String, hook: String, phase: ExecutionPhase, message: String },
    #[error("hook `{hook}` returned unusable data for agent `{agent}`: {message}")]
    InvalidHookData { agent: String, hook: String, message: String },
    #[error("hook `{hook}` panicked during {phase} of agent `{agent}`: {message}")]
    HookPanicked { agent: String, hook: String, phase: ExecutionPhase, message: String },
    #[error("{phase} policy check failed for agent `{agent}`: {}", gate_list(.violations))]
    PolicyDenied { agent: String, phase: ExecutionPhase, violations: Vec<PolicyViolation> },
    #[error("agent `{agent}` execution failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: AgentError,
    },
}

impl ExecutionError {
    pub fn agent(&self) -> &str {
        match self {
            Self::AgentNotFound { agent }
            | Self::HookVeto { agent, .. }
            | Self::InvalidHookData { agent, .. }
            | Self::HookPanicked { agent, .. }
            | Self::PolicyDenied { agent, .. }
            | Self::Agent { agent, .. } => agent,
        }
    }

    pub fn violations(&self) -> &[PolicyViolation] {
        match self {
            Self::PolicyDenied { violations, .. } => violations,
            _ => &[],
        }
    }
}

/// Text of a caught panic payload (`panic!` with a literal or a format string).
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn gate_list(violations: &[PolicyViolation]) -> String {
    violations.iter().map(|violation| violation.gate.as_str()).collect::<Vec<_>>().join(", ")
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FrameworkError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    #[error(transparent)]
    Agent(#[from] AgentError),
}
