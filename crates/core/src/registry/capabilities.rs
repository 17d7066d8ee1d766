use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub name: String,
    pub description: String,
    /// Provider agent names in registration order, never duplicated.
    pub provided_by: Vec<String>,
    pub category: String,
}

/// Many-to-many capability ↔ agent mapping.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, CapabilityEntry>,
    agent_capabilities: BTreeMap<String, BTreeSet<String>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent for a repeated (capability, agent) pair. Description and
    /// category are taken from the first registration of the capability.
    pub fn register(&mut self, capability: &str, agent_name: &str, description: &str, category: &str) {
        let entry = self.capabilities.entry(capability.to_string()).or_insert_with(|| CapabilityEntry {
            name: capability.to_string(),
            description: description.to_string(),
            provided_by: Vec::new(),
            category: category.to_string(),
        });

        if !entry.provided_by.iter().any(|provider| provider == agent_name) {
            entry.provided_by.push(agent_name.to_string());
        }
        self.agent_capabilities
            .entry(agent_name.to_string())
            .or_default()
            .insert(capability.to_string());

        debug!(
            event_name = "registry.capability.registered",
            capability,
            agent = agent_name,
            category,
            "registered capability"
        );
    }

    pub fn get_providers(&self, capability: &str) -> Vec<String> {
        self.capabilities.get(capability).map(|entry| entry.provided_by.clone()).unwrap_or_default()
    }

    /// Sorted capability names for `agent_name`.
    pub fn get_capabilities(&self, agent_name: &str) -> Vec<String> {
        self.agent_capabilities
            .get(agent_name)
            .map(|capabilities| capabilities.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list_all(&self) -> Vec<&CapabilityEntry> {
        self.capabilities.values().collect()
    }

    pub fn get_entry(&self, capability: &str) -> Option<&CapabilityEntry> {
        self.capabilities.get(capability)
    }

    pub fn list_by_category(&self, category: &str) -> Vec<&CapabilityEntry> {
        self.capabilities.values().filter(|entry| entry.category == category).collect()
    }

    pub fn unregister_capability(&mut self, capability: &str) {
        let Some(entry) = self.capabilities.remove(capability) else {
            return;
        };
        for agent_name in &entry.provided_by {
            if let Some(capabilities) = self.agent_capabilities.get_mut(agent_name) {
                capabilities.remove(capability);
            }
        }
        info!(event_name = "registry.capability.unregistered", capability, "unregistered capability");
    }

    /// Drops `agent_name` from every provider list. Entries left without
    /// providers stay registered.
    pub fn unregister_agent(&mut self, agent_name: &str) {
        let Some(capabilities) = self.agent_capabilities.remove(agent_name) else {
            return;
        };
        for capability in capabilities {
            if let Some(entry) = self.capabilities.get_mut(&capability) {
                entry.provided_by.retain(|provider| provider != agent_name);
            }
        }
        info!(
            event_name = "registry.capability.agent_removed",
            agent = agent_name,
            "unregistered agent from all capabilities"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::CapabilityRegistry;

    #[test]
    fn repeated_registration_is_idempotent() {
        let mut registry = CapabilityRegistry::new();
        registry.register("qa", "qa-specialist", "Quality assurance", "testing");
        registry.register("qa", "qa-specialist", "Quality assurance", "testing");

        assert_eq!(registry.get_providers("qa"), vec!["qa-specialist".to_owned()]);
        assert_eq!(registry.get_capabilities("qa-specialist"), vec!["qa".to_owned()]);
    }

    #[test]
    fn reverse_lookup_is_sorted_and_categories_filter() {
        let mut registry = CapabilityRegistry::new();
        registry.register("strategy", "ceo-advisor", "", "executive");
        registry.register("governance", "ceo-advisor", "", "executive");
        registry.register("security-scan", "security-reviewer", "", "security");

        assert_eq!(
            registry.get_capabilities("ceo-advisor"),
            vec!["governance".to_owned(), "strategy".to_owned()]
        );
        assert_eq!(registry.list_by_category("executive").len(), 2);
        assert_eq!(registry.list_all().len(), 3);
        assert!(registry.get_entry("security-scan").is_some());
        assert!(registry.get_providers("unknown").is_empty());
        assert!(registry.get_capabilities("nobody").is_empty());
    }

    #[test]
    fn unregistering_capability_removes_reverse_links() {
        let mut registry = CapabilityRegistry::new();
        registry.register("research", "researcher", "", "analysis");
        registry.register("research", "ceo-advisor", "", "analysis");
        registry.register("strategy", "ceo-advisor", "", "executive");

        registry.unregister_capability("research");

        assert!(registry.get_entry("research").is_none());
        assert!(registry.get_capabilities("researcher").is_empty());
        assert_eq!(registry.get_capabilities("ceo-advisor"), vec!["strategy".to_owned()]);
    }

    #[test]
    fn unregistering_agent_keeps_empty_capabilities() {
        let mut registry = CapabilityRegistry::new();
        registry.register("docs", "technical-writer", "Documentation", "writing");

        registry.unregister_agent("technical-writer");

        let entry = registry.get_entry("docs").expect("entry survives");
        assert!(entry.provided_by.is_empty());
        assert!(registry.get_capabilities("technical-writer").is_empty());
    }
}
