use ano_core::config::AppConfig;
use ano_core::environment::{EnvironmentTier, TierRestrictions};
use ano_core::policy::{gate_names, get_gate, remediation};
use serde::Serialize;

use crate::commands::run::policy_engine;
use crate::commands::{CommandResult, EXIT_CONFIG_INVALID};

#[derive(Debug, Serialize)]
struct GateEntry {
    name: String,
    description: String,
    active: bool,
    remediation: String,
}

#[derive(Debug, Serialize)]
struct GatesReport {
    command: &'static str,
    status: &'static str,
    tier: EnvironmentTier,
    enforcement: &'static str,
    restrictions: TierRestrictions,
    gates: Vec<GateEntry>,
}

/// Every registered gate, marked active when the engine built for the
/// configured tier (or the configured gate list) would evaluate it.
pub fn run(config: &AppConfig) -> CommandResult {
    let tier = config.environment;

    let active = match policy_engine(config) {
        Ok(engine) => engine.gate_names(),
        Err(error) => {
            return CommandResult::failure("gates", "config_validation", error.to_string(), EXIT_CONFIG_INVALID)
        }
    };

    let mut gates = Vec::new();
    for name in gate_names() {
        let gate = match get_gate(name) {
            Ok(gate) => gate,
            Err(error) => {
                return CommandResult::failure("gates", "config_validation", error.to_string(), EXIT_CONFIG_INVALID)
            }
        };
        gates.push(GateEntry {
            name: name.to_string(),
            description: gate.description().to_string(),
            active: active.iter().any(|active| active == name),
            remediation: remediation(name, tier),
        });
    }

    let report = GatesReport {
        command: "gates",
        status: "ok",
        tier,
        enforcement: match tier {
            EnvironmentTier::Development => "advisory",
            EnvironmentTier::Test | EnvironmentTier::Production => "blocking",
        },
        restrictions: tier.restrictions(),
        gates,
    };
    CommandResult::report(0, &report)
}
