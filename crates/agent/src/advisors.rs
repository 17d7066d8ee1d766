use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use ano_core::agent::Agent;
use ano_core::errors::AgentError;
use ano_core::registry::AgentMetadataEntry;
use ano_core::schema::validate_against_schema;
use ano_core::types::{AgentContext, AgentInput, AgentOutput, Context};

use crate::llm::{CompletionRequest, LlmClient, RESPONSE_KEYS_MARKER};
use crate::response::parse_json_response;
use crate::usage::UsageTracker;

const UPSTREAM_PREVIEW_CHARS: usize = 600;

/// Value a result key takes when the model leaves it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldDefault {
    Text,
    List,
    Object,
    Fixed(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResultField {
    pub key: &'static str,
    pub default: FieldDefault,
}

impl ResultField {
    pub const fn text(key: &'static str) -> Self {
        Self { key, default: FieldDefault::Text }
    }

    pub const fn list(key: &'static str) -> Self {
        Self { key, default: FieldDefault::List }
    }

    pub const fn object(key: &'static str) -> Self {
        Self { key, default: FieldDefault::Object }
    }

    pub const fn fixed(key: &'static str, value: &'static str) -> Self {
        Self { key, default: FieldDefault::Fixed(value) }
    }

    fn default_value(&self) -> Value {
        match self.default {
            FieldDefault::Text => Value::String(String::new()),
            FieldDefault::List => Value::Array(Vec::new()),
            FieldDefault::Object => Value::Object(Map::new()),
            FieldDefault::Fixed(value) => Value::String(value.to_string()),
        }
    }
}

/// Static description of one advisory role.
///
/// `required_fields[0]` is the primary question field and is rendered under
/// `prompt_heading`. `result_fields[0]` receives the raw reply when the model
/// does not answer with JSON.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdvisorProfile {
    pub name: &'static str,
    pub team: &'static str,
    pub version: &'static str,
    pub capabilities: &'static [&'static str],
    pub description: &'static str,
    pub reporting_to: Option<&'static str>,
    pub system_prompt: &'static str,
    pub prompt_heading: &'static str,
    pub required_fields: &'static [&'static str],
    pub result_fields: &'static [ResultField],
    pub max_tokens: u32,
    pub temperature: f64,
}

impl AdvisorProfile {
    pub fn metadata_entry(&self) -> AgentMetadataEntry {
        let mut entry = AgentMetadataEntry::new(
            self.name,
            self.team,
            self.version,
            self.capabilities.iter().map(|capability| capability.to_string()).collect(),
        )
        .with_description(self.description);
        entry.input_schema = Some(self.input_schema());
        entry.output_schema = Some(self.output_schema());
        if let Some(supervisor) = self.reporting_to {
            entry = entry.reporting_to(supervisor);
        }
        entry
    }

    /// Required question fields are strings; an optional caller `context`
    /// must be an object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in self.required_fields {
            properties.insert(field.to_string(), json!({"type": "string"}));
        }
        properties.insert("context".to_string(), json!({"type": "object"}));
        json!({
            "type": "object",
            "required": self.required_fields,
            "properties": properties,
        })
    }

    /// Every result key is required. List and object keys are typed, text
    /// keys accept any value the model renders.
    pub fn output_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .result_fields
            .iter()
            .map(|field| {
                let property = match field.default {
                    FieldDefault::List => json!({"type": "array"}),
                    FieldDefault::Object => json!({"type": "object"}),
                    FieldDefault::Text | FieldDefault::Fixed(_) => json!({}),
                };
                (field.key.to_string(), property)
            })
            .collect();
        json!({
            "type": "object",
            "required": self.result_keys(),
            "properties": properties,
        })
    }

    pub fn result_keys(&self) -> Vec<&'static str> {
        self.result_fields.iter().map(|field| field.key).collect()
    }
}

/// An LLM-backed agent whose behavior is fully described by its profile.
pub struct AdvisorAgent {
    profile: AdvisorProfile,
    llm: Arc<dyn LlmClient>,
}

impl AdvisorAgent {
    pub fn new(profile: AdvisorProfile, llm: Arc<dyn LlmClient>) -> Self {
        Self { profile, llm }
    }

    pub fn profile(&self) -> &AdvisorProfile {
        &self.profile
    }

    fn required_values<'a>(&self, input: &'a AgentInput) -> Result<Vec<(&'static str, &'a str)>, AgentError> {
        let mut values = Vec::with_capacity(self.profile.required_fields.len());
        let mut missing = Vec::new();
        for field in self.profile.required_fields {
            match input.str_field(field).map(str::trim).filter(|value| !value.is_empty()) {
                Some(value) => values.push((*field, value)),
                None => missing.push(*field),
            }
        }

        match missing.as_slice() {
            [] => Ok(values),
            [only] => Err(AgentError::InvalidInput(format!("Missing required field: '{only}'"))),
            many => Err(AgentError::InvalidInput(format!(
                "Missing required field(s): {}",
                many.join(", ")
            ))),
        }
    }

    fn build_prompt(&self, values: &[(&'static str, &str)], input: &AgentInput) -> String {
        let mut prompt = String::new();
        for (index, (field, value)) in values.iter().enumerate() {
            let heading = if index == 0 { self.profile.prompt_heading.to_string() } else { title_case(field) };
            prompt.push_str(&format!("{heading}:\n{value}\n"));
        }

        push_org_profile(&mut prompt, &input.context);

        if let Some(Value::Object(caller_context)) = input.data.get("context") {
            if !caller_context.is_empty() {
                prompt.push_str("\nContext:\n");
                for (key, value) in caller_context {
                    prompt.push_str(&format!("- {}: {}\n", title_case(key), render_value(value)));
                }
            }
        }

        if !input.context.upstream_outputs.is_empty() {
            prompt.push_str("\nUpstream Findings:\n");
            for (agent, output) in &input.context.upstream_outputs {
                let rendered = Value::Object(output.result.clone()).to_string();
                let preview: String = rendered.chars().take(UPSTREAM_PREVIEW_CHARS).collect();
                prompt.push_str(&format!("- {agent}: {preview}\n"));
            }
        }

        prompt.push_str(&format!(
            "\nFormat your response as {RESPONSE_KEYS_MARKER} {}",
            self.profile.result_keys().join(", ")
        ));
        prompt
    }

    fn normalize(&self, mut result: Context) -> Context {
        if let Some(primary) = self.profile.result_fields.first() {
            if !result.contains_key(primary.key) {
                if let Some(raw) = result.get("raw_text").cloned() {
                    result.insert(primary.key.to_string(), raw);
                }
            }
        }
        for field in self.profile.result_fields {
            let entry = result.entry(field.key.to_string()).or_insert_with(|| field.default_value());
            match field.default {
                FieldDefault::List if !entry.is_array() => {
                    let single = entry.take();
                    *entry = Value::Array(vec![single]);
                }
                FieldDefault::Object if !entry.is_object() => {
                    let raw = entry.take();
                    *entry = json!({"raw_text": raw});
                }
                _ => {}
            }
        }
        result
    }
}

#[async_trait]
impl Agent for AdvisorAgent {
    fn name(&self) -> &str {
        self.profile.name
    }

    fn version(&self) -> &str {
        self.profile.version
    }

    async fn execute(&self, input: AgentInput) -> Result<AgentOutput, AgentError> {
        let values = self.required_values(&input)?;
        validate_against_schema(&input.data, &self.profile.input_schema())
            .map_err(|errors| AgentError::InvalidInput(errors.join("; ")))?;
        let mut usage = UsageTracker::start(self.profile.name, self.profile.version);

        let request = CompletionRequest {
            system_prompt: self.profile.system_prompt.to_string(),
            user_prompt: self.build_prompt(&values, &input),
            max_tokens: self.profile.max_tokens,
            temperature: self.profile.temperature,
        };

        info!(
            event_name = "agent.llm.request",
            agent = self.profile.name,
            provider = self.llm.provider(),
            "calling llm"
        );
        let response = match self.llm.complete(&request).await {
            Ok(response) => response,
            Err(err) => {
                error!(
                    event_name = "agent.llm.failed",
                    agent = self.profile.name,
                    error = %err,
                    "llm call failed"
                );
                return Err(err);
            }
        };
        usage.record(&response);

        let result = self.normalize(parse_json_response(&response.text));
        if let Err(errors) = validate_against_schema(&result, &self.profile.output_schema()) {
            error!(
                event_name = "agent.output.invalid",
                agent = self.profile.name,
                errors = %errors.join("; "),
                "agent output does not match its schema"
            );
            return Err(AgentError::Failed(format!(
                "output does not match schema: {}",
                errors.join("; ")
            )));
        }
        Ok(AgentOutput::new(result, usage.finish()))
    }
}

fn push_org_profile(prompt: &mut String, context: &AgentContext) {
    let org = &context.org_profile;
    if org.org_name.is_empty() {
        return;
    }
    prompt.push_str(&format!("\nOrganization Profile:\n- Name: {}\n- Type: {}\n", org.org_name, org.org_type));
    for (label, value) in [("State", &org.state), ("Industry", &org.industry), ("Size", &org.size), ("Budget", &org.budget)] {
        if let Some(value) = value {
            prompt.push_str(&format!("- {label}: {value}\n"));
        }
    }
    if !org.concerns.is_empty() {
        prompt.push_str(&format!("- Concerns: {}\n", org.concerns.join(", ")));
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join("; "),
        other => other.to_string(),
    }
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
