use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use ano_core::agent::Agent;
use ano_core::errors::AgentError;
use ano_core::types::{AgentContext, AgentInput, AgentOutput, Context};

/// Turns kept per sender and replayed to the agent as conversation history.
pub const HISTORY_TURNS: usize = 5;

/// A deployment surface (terminal, chat widget, messaging bot) that routes
/// inbound text to an agent and returns the reply text.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn handle_message(
        &self,
        sender_id: &str,
        text: &str,
        metadata: Option<&Context>,
    ) -> Result<String, AgentError>;
}

pub struct AgentChannel {
    name: String,
    agent: Arc<dyn Agent>,
    context: AgentContext,
    input_field: String,
    response_field: String,
    history: Mutex<HashMap<String, Vec<Value>>>,
}

impl AgentChannel {
    /// Forwards messages under `message` and reads the reply from `response`.
    pub fn new(name: impl Into<String>, agent: Arc<dyn Agent>, context: AgentContext) -> Self {
        Self {
            name: name.into(),
            agent,
            context,
            input_field: "message".to_string(),
            response_field: "response".to_string(),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_fields(mut self, input_field: impl Into<String>, response_field: impl Into<String>) -> Self {
        self.input_field = input_field.into();
        self.response_field = response_field.into();
        self
    }

    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }

    fn recent_history(&self, sender_id: &str) -> Vec<Value> {
        let history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        history
            .get(sender_id)
            .map(|turns| turns.iter().rev().take(HISTORY_TURNS).rev().cloned().collect())
            .unwrap_or_default()
    }

    fn remember(&self, sender_id: &str, text: &str, reply: &str) {
        let mut history = match self.history.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let turns = history.entry(sender_id.to_string()).or_default();
        turns.push(json!({"role": "user", "content": text}));
        turns.push(json!({"role": "assistant", "content": reply}));
        let excess = turns.len().saturating_sub(HISTORY_TURNS * 2);
        turns.drain(..excess);
    }

    fn render(&self, output: &AgentOutput) -> String {
        let mut reply = match output.get(&self.response_field) {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => Value::Object(output.result.clone()).to_string(),
        };

        let followups: Vec<&str> = output
            .get("suggested_followups")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if !followups.is_empty() {
            reply.push_str("\n\nYou might also ask:");
            for followup in followups {
                reply.push_str(&format!("\n- {followup}"));
            }
        }
        reply
    }
}

#[async_trait]
impl Channel for AgentChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle_message(
        &self,
        sender_id: &str,
        text: &str,
        metadata: Option<&Context>,
    ) -> Result<String, AgentError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AgentError::InvalidInput("empty message".to_string()));
        }

        let mut caller_context = Map::new();
        caller_context.insert("sender_id".to_string(), Value::String(sender_id.to_string()));
        caller_context.insert("conversation_history".to_string(), Value::Array(self.recent_history(sender_id)));
        if let Some(metadata) = metadata {
            caller_context.extend(metadata.clone());
        }

        let mut data = Map::new();
        data.insert(self.input_field.clone(), Value::String(text.to_string()));
        data.insert("context".to_string(), Value::Object(caller_context));

        info!(
            event_name = "channel.message.received",
            channel = %self.name,
            agent = self.agent.name(),
            sender = sender_id,
            "routing channel message"
        );
        let output = match self.agent.execute(AgentInput::new(data, self.context.clone())).await {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    event_name = "channel.message.failed",
                    channel = %self.name,
                    sender = sender_id,
                    error = %err,
                    "agent could not answer channel message"
                );
                return Err(err);
            }
        };

        let reply = self.render(&output);
        self.remember(sender_id, text, &reply);
        Ok(reply)
    }
}
