use ano_core::config::AppConfig;
use ano_core::registry::AgentMetadataEntry;
use serde::Serialize;

use crate::commands::{builtin_registries, offline_llm, CommandResult};

#[derive(Debug, Serialize)]
struct AgentsReport<'a> {
    command: &'static str,
    status: &'static str,
    team: Option<&'a str>,
    capability: Option<&'a str>,
    /// Providers of `capability` from the capability index, when filtered.
    providers: Option<Vec<String>>,
    agents: Vec<&'a AgentMetadataEntry>,
}

pub fn run(config: &AppConfig, team: Option<&str>, capability: Option<&str>) -> CommandResult {
    let (agents, capabilities) = builtin_registries(offline_llm(config));
    let listed = agents.list_agents(team, capability);

    let report = AgentsReport {
        command: "agents",
        status: "ok",
        team,
        capability,
        providers: capability.map(|capability| capabilities.get_providers(capability)),
        agents: listed,
    };
    CommandResult::report(0, &report)
}
