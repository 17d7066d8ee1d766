use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;

/// Deployment tier. The only axis that controls policy strictness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentTier {
    #[default]
    Development,
    Test,
    Production,
}

impl EnvironmentTier {
    pub const ALL: [EnvironmentTier; 3] = [Self::Development, Self::Test, Self::Production];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        }
    }

    pub fn restrictions(&self) -> TierRestrictions {
        match self {
            Self::Development => TierRestrictions {
                allowed_operations: operations(&[
                    "agent_execute",
                    "policy_attach",
                    "policy_detach",
                    "pipeline_run",
                    "database_read",
                    "database_write",
                    "database_delete",
                    "llm_call",
                    "file_read",
                    "file_write",
                    "external_api_call",
                ]),
                blocked_operations: Vec::new(),
                requires_approval: false,
                max_concurrent_agents: 10,
            },
            Self::Test => TierRestrictions {
                allowed_operations: operations(&[
                    "agent_execute",
                    "policy_attach",
                    "pipeline_run",
                    "database_read",
                    "database_write",
                    "llm_call",
                    "file_read",
                    "file_write",
                    "external_api_call",
                ]),
                blocked_operations: operations(&["database_delete"]),
                requires_approval: true,
                max_concurrent_agents: 5,
            },
            Self::Production => TierRestrictions {
                allowed_operations: operations(&[
                    "agent_execute",
                    "policy_attach",
                    "pipeline_run",
                    "database_read",
                    "llm_call",
                    "file_read",
                ]),
                blocked_operations: operations(&[
                    "database_write",
                    "database_delete",
                    "file_write",
                    "policy_detach",
                ]),
                requires_approval: true,
                max_concurrent_agents: 3,
            },
        }
    }
}

impl fmt::Display for EnvironmentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvironmentTier {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigurationError::UnknownTier(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRestrictions {
    pub allowed_operations: Vec<String>,
    pub blocked_operations: Vec<String>,
    pub requires_approval: bool,
    pub max_concurrent_agents: usize,
}

impl TierRestrictions {
    pub fn is_operation_allowed(&self, operation: &str) -> bool {
        !self.blocked_operations.iter().any(|blocked| blocked == operation)
            && self.allowed_operations.iter().any(|allowed| allowed == operation)
    }
}

fn operations(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
