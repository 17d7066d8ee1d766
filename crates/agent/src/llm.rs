use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use ano_core::errors::AgentError;

pub const OFFLINE_PROVIDER: &str = "offline";

/// Marker the advisors put in front of the comma separated key list they
/// expect back.
pub const RESPONSE_KEYS_MARKER: &str = "JSON with keys:";

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub latency_ms: f64,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, AgentError>;
}

/// Deterministic backend with no network access.
///
/// Answers every request with a fenced JSON object whose keys are the ones
/// the prompt asks for, so downstream parsing sees realistic shapes.
#[derive(Clone, Debug)]
pub struct OfflineBackend {
    model: String,
    max_output_tokens: Option<u32>,
}

impl OfflineBackend {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into(), max_output_tokens: None }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn render(&self, request: &CompletionRequest) -> String {
        let subject = prompt_subject(&request.user_prompt);
        let keys = requested_keys(&request.user_prompt);

        let mut body = Map::new();
        if keys.is_empty() {
            body.insert("response".to_string(), Value::String(format!("[{}] {subject}", self.model)));
        }
        for key in keys {
            body.insert(key.clone(), Value::String(format!("[{}] {key} for: {subject}", self.model)));
        }

        let json = Value::Object(body).to_string();
        format!("```json\n{json}\n```")
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new("offline-advisor")
    }
}

#[async_trait]
impl LlmClient for OfflineBackend {
    fn provider(&self) -> &str {
        OFFLINE_PROVIDER
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<LlmResponse, AgentError> {
        if request.user_prompt.trim().is_empty() {
            return Err(AgentError::Llm {
                provider: OFFLINE_PROVIDER.to_string(),
                message: "empty user prompt".to_string(),
            });
        }

        let started = Instant::now();
        let text = self.render(request);
        let cap = self.max_output_tokens.unwrap_or(request.max_tokens).min(request.max_tokens);
        let input_tokens = estimate_tokens(&request.system_prompt) + estimate_tokens(&request.user_prompt);
        let output_tokens = estimate_tokens(&text).min(u64::from(cap));

        let response = LlmResponse {
            text,
            model: self.model.clone(),
            input_tokens,
            output_tokens,
            latency_ms: started.elapsed().as_secs_f64() * 1_000.0,
        };
        debug!(
            event_name = "llm.offline.completed",
            model = %self.model,
            input_tokens,
            output_tokens,
            "offline completion produced"
        );
        Ok(response)
    }
}

/// Rough token count: one token per four characters, at least one.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4).max(1)
}

fn requested_keys(prompt: &str) -> Vec<String> {
    let Some((_, tail)) = prompt.rsplit_once(RESPONSE_KEYS_MARKER) else {
        return Vec::new();
    };
    let line = tail.lines().next().unwrap_or_default();
    line.split(',')
        .map(|key| key.trim().trim_end_matches('.'))
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

fn prompt_subject(prompt: &str) -> String {
    prompt
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.ends_with(':'))
        .map(|line| line.chars().take(120).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::{estimate_tokens, CompletionRequest, LlmClient, OfflineBackend};
    use crate::parse_json_response;

    fn request(user_prompt: &str) -> CompletionRequest {
        CompletionRequest {
            system_prompt: "You are a research analyst.".to_string(),
            user_prompt: user_prompt.to_string(),
            max_tokens: 4096,
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn offline_backend_answers_with_requested_keys() {
        let backend = OfflineBackend::new("offline-test");
        let response = backend
            .complete(&request(
                "Research Topic:\nGrant funding\n\nFormat your response as JSON with keys: summary, findings",
            ))
            .await
            .expect("offline completion");

        let parsed = parse_json_response(&response.text);
        assert_eq!(
            parsed.get("summary").and_then(Value::as_str),
            Some("[offline-test] summary for: Grant funding")
        );
        assert!(parsed.contains_key("findings"));
        assert_eq!(response.model, "offline-test");
        assert!(response.input_tokens > 0);
    }

    #[tokio::test]
    async fn offline_backend_is_deterministic_and_capped() {
        let backend = OfflineBackend::default().with_max_output_tokens(3);
        let first = backend.complete(&request("Question:\nWhat next?")).await.expect("first");
        let second = backend.complete(&request("Question:\nWhat next?")).await.expect("second");

        assert_eq!(first.text, second.text);
        assert_eq!(first.output_tokens, 3);
        assert!(first.text.contains("\"response\""));
    }

    #[tokio::test]
    async fn empty_prompt_is_an_llm_error() {
        let error = OfflineBackend::default().complete(&request("   ")).await;
        assert!(matches!(error, Err(ano_core::AgentError::Llm { ref provider, .. }) if provider == "offline"));
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
        assert_eq!(estimate_tokens(&"x".repeat(4_000)), 1_000);
    }
}
