//! Explicitly constructed registries. Nothing here is process-global: the
//! composition root owns the registries and hands them to the coordinator.

pub mod agents;
pub mod capabilities;

use std::sync::Arc;

use tracing::warn;

use crate::agent::Agent;

pub use agents::{AgentMetadataEntry, AgentRegistry};
pub use capabilities::{CapabilityEntry, CapabilityRegistry};

/// Registers `agent` and mirrors its declared capabilities (category = team).
///
/// Failures are logged and skipped so a startup registration table never
/// aborts half way. Returns whether the agent was added.
pub fn register_with_capabilities(
    agents: &mut AgentRegistry,
    capabilities: &mut CapabilityRegistry,
    agent: Arc<dyn Agent>,
    metadata: AgentMetadataEntry,
) -> bool {
    let name = metadata.name.clone();
    let team = metadata.team.clone();
    let declared = metadata.capabilities.clone();
    let description = metadata.description.clone();

    if let Err(error) = agents.register(agent, metadata) {
        warn!(
            event_name = "registry.registration_skipped",
            agent = %name,
            error = %error,
            "agent registration skipped"
        );
        return false;
    }

    for capability in &declared {
        capabilities.register(capability, &name, &description, &team);
    }
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{register_with_capabilities, AgentMetadataEntry, AgentRegistry, CapabilityRegistry};
    use crate::agent::Agent;
    use crate::errors::AgentError;
    use crate::types::{AgentInput, AgentMetadata, AgentOutput, Context};

    struct Idle;

    #[async_trait]
    impl Agent for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        async fn execute(&self, _input: AgentInput) -> Result<AgentOutput, AgentError> {
            Ok(AgentOutput::new(Context::new(), AgentMetadata::new("idle", "1.0.0")))
        }
    }

    #[test]
    fn registration_table_mirrors_capabilities_and_skips_duplicates() {
        let mut agents = AgentRegistry::new();
        let mut capabilities = CapabilityRegistry::new();
        let metadata = AgentMetadataEntry::new(
            "idle",
            "operations",
            "1.0.0",
            vec!["waiting".to_owned(), "idling".to_owned()],
        );

        assert!(register_with_capabilities(
            &mut agents,
            &mut capabilities,
            Arc::new(Idle),
            metadata.clone()
        ));
        assert!(!register_with_capabilities(&mut agents, &mut capabilities, Arc::new(Idle), metadata));

        assert_eq!(agents.len(), 1);
        assert_eq!(capabilities.get_providers("waiting"), vec!["idle".to_owned()]);
        assert_eq!(capabilities.list_by_category("operations").len(), 2);
    }
}
