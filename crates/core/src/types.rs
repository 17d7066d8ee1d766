use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// String-keyed mapping passed between agents, gates and hooks.
pub type Context = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrgProfile {
    pub org_name: String,
    pub org_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default)]
    pub departments: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub metadata: Context,
}

impl OrgProfile {
    pub fn new(org_name: impl Into<String>, org_type: impl Into<String>) -> Self {
        Self { org_name: org_name.into(), org_type: org_type.into(), ..Self::default() }
    }
}

/// Runtime context shared across one pipeline run.
///
/// Only the coordinator writes `upstream_outputs`; agents receive a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub org_profile: OrgProfile,
    #[serde(default)]
    pub pipeline_state: Context,
    #[serde(default)]
    pub upstream_outputs: BTreeMap<String, AgentOutput>,
}

impl AgentContext {
    pub fn new(org_profile: OrgProfile) -> Self {
        Self { org_profile, ..Self::default() }
    }

    pub fn upstream(&self, agent_name: &str) -> Option<&AgentOutput> {
        self.upstream_outputs.get(agent_name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub data: Context,
    pub context: AgentContext,
    #[serde(default)]
    pub policy_attachments: Vec<String>,
}

impl AgentInput {
    pub fn new(data: Context, context: AgentContext) -> Self {
        Self { data, context, policy_attachments: Vec::new() }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    pub agent_name: String,
    pub version: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub llm_calls: u32,
    #[serde(default)]
    pub tokens_used: u64,
}

impl AgentMetadata {
    pub fn new(agent_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            version: version.into(),
            started_at: Utc::now(),
            completed_at: None,
            llm_calls: 0,
            tokens_used: 0,
        }
    }

    pub fn completed(mut self) -> Self {
        self.completed_at = Some(Utc::now());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionPhase {
    PreExecution,
    PostExecution,
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PreExecution => "pre-execution",
            Self::PostExecution => "post-execution",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub gate: String,
    pub severity: Severity,
    pub message: String,
    pub remediation: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyReport {
    pub gates_passed: Vec<String>,
    pub gates_failed: Vec<String>,
    pub violations: Vec<PolicyViolation>,
}

impl PolicyReport {
    pub fn merge(mut self, other: PolicyReport) -> Self {
        self.gates_passed.extend(other.gates_passed);
        self.gates_failed.extend(other.gates_failed);
        self.violations.extend(other.violations);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub result: Context,
    pub metadata: AgentMetadata,
    #[serde(default)]
    pub policy_report: Option<PolicyReport>,
}

impl AgentOutput {
    pub fn new(result: Context, metadata: AgentMetadata) -> Self {
        Self { result, metadata, policy_report: None }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.result.get(key)
    }

    /// Mapping form seen by hooks: `{"result": .., "metadata": .., "policy_report": ..}`.
    pub fn to_context(&self) -> Result<Context, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "agent output serialized to non-object {other}"
            ))),
        }
    }

    pub fn from_context(context: Context) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(context))
    }
}
