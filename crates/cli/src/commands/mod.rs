pub mod agents;
pub mod chat;
pub mod config;
pub mod gates;
pub mod run;

use std::sync::Arc;

use ano_agent::{register_builtin_agents, LlmClient, OfflineBackend};
use ano_core::config::AppConfig;
use ano_core::registry::{AgentRegistry, CapabilityRegistry};
use serde::Serialize;

pub const EXIT_PIPELINE_FAILED: u8 = 1;
pub const EXIT_CONFIG_INVALID: u8 = 2;
pub const EXIT_NOT_FOUND: u8 = 3;
pub const EXIT_IO: u8 = 4;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    /// Wraps a command-specific report; the report carries its own `command`
    /// and `status` fields.
    pub fn report<T: Serialize>(exit_code: u8, payload: &T) -> Self {
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload<T: Serialize>(payload: &T) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// The offline backend configured from `llm.*` settings.
pub fn offline_llm(config: &AppConfig) -> Arc<dyn LlmClient> {
    Arc::new(OfflineBackend::new(config.llm.model.clone()).with_max_output_tokens(config.llm.max_tokens))
}

/// Both registries populated from the built-in registration table.
pub fn builtin_registries(llm: Arc<dyn LlmClient>) -> (AgentRegistry, CapabilityRegistry) {
    let mut agents = AgentRegistry::new();
    let mut capabilities = CapabilityRegistry::new();
    register_builtin_agents(&mut agents, &mut capabilities, llm);
    (agents, capabilities)
}
