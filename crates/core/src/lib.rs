pub mod agent;
pub mod audit;
pub mod config;
pub mod environment;
pub mod errors;
pub mod memory;
pub mod pipeline;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod types;

pub use agent::Agent;
pub use audit::{AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use environment::{EnvironmentTier, TierRestrictions};
pub use errors::{
    AgentError, ConfigurationError, ExecutionError, FrameworkError, RegistryError,
    ValidationError,
};
pub use memory::{WorkingMemory, WorkingState};
pub use pipeline::{Pipeline, PipelineCoordinator, PipelineResult, Stage, StageFailure};
pub use policy::{
    HookResult, PolicyDecision, PolicyEngine, PolicyGate, PolicyHook,
};
pub use registry::{
    register_with_capabilities, AgentMetadataEntry, AgentRegistry, CapabilityRegistry,
};
pub use schema::validate_against_schema;
pub use types::{
    AgentContext, AgentInput, AgentMetadata, AgentOutput, Context, ExecutionPhase, OrgProfile,
    PolicyReport, PolicyViolation, Severity,
};
