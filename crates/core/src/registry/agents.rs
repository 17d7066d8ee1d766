use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::errors::RegistryError;

/// Descriptive record kept alongside each registered agent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMetadataEntry {
    pub name: String,
    pub team: String,
    pub version: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_to: Option<String>,
}

impl AgentMetadataEntry {
    pub fn new(
        name: impl Into<String>,
        team: impl Into<String>,
        version: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            team: team.into(),
            version: version.into(),
            capabilities,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn reporting_to(mut self, supervisor: impl Into<String>) -> Self {
        self.reporting_to = Some(supervisor.into());
        self
    }
}

struct RegisteredAgent {
    agent: Arc<dyn Agent>,
    metadata: AgentMetadataEntry,
}

/// Name → implementation and name → metadata, keyed by `metadata.name`.
#[derive(Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, RegisteredAgent>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry").field("agents", &self.names()).finish()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        agent: Arc<dyn Agent>,
        metadata: AgentMetadataEntry,
    ) -> Result<(), RegistryError> {
        if self.agents.contains_key(&metadata.name) {
            return Err(RegistryError::AlreadyRegistered { name: metadata.name });
        }

        info!(
            event_name = "registry.agent.registered",
            agent = %metadata.name,
            team = %metadata.team,
            version = %metadata.version,
            "registered agent"
        );
        self.agents.insert(metadata.name.clone(), RegisteredAgent { agent, metadata });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>, RegistryError> {
        self.agents
            .get(name)
            .map(|registered| Arc::clone(&registered.agent))
            .ok_or_else(|| self.not_found(name))
    }

    /// Lookup used by the coordinator, which maps `None` to an execution error.
    pub fn get_agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).map(|registered| Arc::clone(&registered.agent))
    }

    pub fn get_metadata(&self, name: &str) -> Result<&AgentMetadataEntry, RegistryError> {
        self.agents.get(name).map(|registered| &registered.metadata).ok_or_else(|| self.not_found(name))
    }

    /// Filters apply conjunctively; `None` means "any".
    pub fn list_agents(&self, team: Option<&str>, capability: Option<&str>) -> Vec<&AgentMetadataEntry> {
        let results: Vec<_> = self
            .agents
            .values()
            .map(|registered| &registered.metadata)
            .filter(|metadata| team.map_or(true, |team| metadata.team == team))
            .filter(|metadata| {
                capability.map_or(true, |capability| {
                    metadata.capabilities.iter().any(|provided| provided == capability)
                })
            })
            .collect();

        debug!(
            event_name = "registry.agent.listed",
            count = results.len(),
            team = team.unwrap_or("*"),
            capability = capability.unwrap_or("*"),
            "listed agents"
        );
        results
    }

    pub fn has(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.agents.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn unregister(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.agents.remove(name).is_none() {
            return Err(self.not_found(name));
        }
        info!(event_name = "registry.agent.unregistered", agent = name, "unregistered agent");
        Ok(())
    }

    fn not_found(&self, name: &str) -> RegistryError {
        RegistryError::NotFound { name: name.to_string(), available: self.names() }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{AgentMetadataEntry, AgentRegistry};
    use crate::agent::Agent;
    use crate::errors::{AgentError, RegistryError};
    use crate::types::{AgentInput, AgentMetadata, AgentOutput, Context};

    struct NamedAgent {
        name: &'static str,
    }

    #[async_trait]
    impl Agent for NamedAgent {
        fn name(&self) -> &str {
            self.name
        }

        async fn execute(&self, _input: AgentInput) -> Result<AgentOutput, AgentError> {
            Ok(AgentOutput::new(Context::new(), AgentMetadata::new(self.name, "1.0.0")))
        }
    }

    fn entry(name: &str, team: &str, capabilities: &[&str]) -> AgentMetadataEntry {
        AgentMetadataEntry::new(
            name,
            team,
            "1.0.0",
            capabilities.iter().map(|capability| capability.to_string()).collect(),
        )
    }

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(NamedAgent { name: "ceo" }), entry("ceo", "executive", &["strategy"]))
            .expect("register ceo");
        registry
            .register(
                Arc::new(NamedAgent { name: "cto" }),
                entry("cto", "executive", &["architecture", "strategy"]),
            )
            .expect("register cto");
        registry
            .register(Arc::new(NamedAgent { name: "qa" }), entry("qa", "development", &["qa"]))
            .expect("register qa");
        registry
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let mut registry = registry();
        let error = registry
            .register(Arc::new(NamedAgent { name: "impostor" }), entry("ceo", "ops", &[]))
            .expect_err("duplicate must fail");

        assert_eq!(error, RegistryError::AlreadyRegistered { name: "ceo".to_owned() });
        assert_eq!(registry.get("ceo").expect("original").name(), "ceo");
        assert_eq!(registry.get_metadata("ceo").expect("metadata").team, "executive");
    }

    #[test]
    fn missing_lookup_lists_available_names() {
        let registry = registry();
        let error = match registry.get("ghost") {
            Ok(_) => panic!("ghost must not resolve"),
            Err(error) => error,
        };
        assert_eq!(
            error,
            RegistryError::NotFound {
                name: "ghost".to_owned(),
                available: vec!["ceo".to_owned(), "cto".to_owned(), "qa".to_owned()],
            }
        );
        assert!(registry.get_agent("ghost").is_none());
        assert!(registry.get_metadata("ghost").is_err());
    }

    #[test]
    fn list_filters_apply_conjunctively() {
        let registry = registry();
        assert_eq!(registry.list_agents(None, None).len(), 3);

        let executive: Vec<_> =
            registry.list_agents(Some("executive"), None).iter().map(|m| m.name.clone()).collect();
        assert_eq!(executive, vec!["ceo", "cto"]);

        let architects: Vec<_> = registry
            .list_agents(Some("executive"), Some("architecture"))
            .iter()
            .map(|m| m.name.clone())
            .collect();
        assert_eq!(architects, vec!["cto"]);

        assert!(registry.list_agents(Some("development"), Some("strategy")).is_empty());
    }

    #[test]
    fn unregister_removes_agent_and_rejects_unknown() {
        let mut registry = registry();
        registry.unregister("qa").expect("unregister qa");
        assert!(!registry.has("qa"));
        assert_eq!(registry.len(), 2);

        assert!(matches!(registry.unregister("qa"), Err(RegistryError::NotFound { .. })));
    }
}
