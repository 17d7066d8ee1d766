use chrono::{DateTime, Utc};

use ano_core::types::AgentMetadata;

use crate::llm::LlmResponse;

/// Counts LLM calls and tokens for a single `execute` call.
#[derive(Clone, Debug)]
pub struct UsageTracker {
    agent_name: String,
    version: String,
    started_at: DateTime<Utc>,
    llm_calls: u32,
    input_tokens: u64,
    output_tokens: u64,
}

impl UsageTracker {
    pub fn start(agent_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            version: version.into(),
            started_at: Utc::now(),
            llm_calls: 0,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    pub fn record(&mut self, response: &LlmResponse) {
        self.llm_calls = self.llm_calls.saturating_add(1);
        self.input_tokens = self.input_tokens.saturating_add(response.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(response.output_tokens);
    }

    pub fn llm_calls(&self) -> u32 {
        self.llm_calls
    }

    pub fn tokens_used(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn finish(self) -> AgentMetadata {
        let tokens_used = self.tokens_used();
        AgentMetadata {
            agent_name: self.agent_name,
            version: self.version,
            started_at: self.started_at,
            completed_at: Some(Utc::now()),
            llm_calls: self.llm_calls,
            tokens_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UsageTracker;
    use crate::llm::LlmResponse;

    fn response(input_tokens: u64, output_tokens: u64) -> LlmResponse {
        LlmResponse {
            text: "{}".to_string(),
            model: "offline-advisor".to_string(),
            input_tokens,
            output_tokens,
            latency_ms: 1.0,
        }
    }

    #[test]
    fn tracker_sums_calls_into_metadata() {
        let mut tracker = UsageTracker::start("researcher", "1.0.0");
        tracker.record(&response(400, 100));
        tracker.record(&response(900, 100));

        assert_eq!(tracker.llm_calls(), 2);
        let metadata = tracker.finish();
        assert_eq!(metadata.agent_name, "researcher");
        assert_eq!(metadata.llm_calls, 2);
        assert_eq!(metadata.tokens_used, 1_500);
        assert!(metadata.completed_at.is_some_and(|done| done >= metadata.started_at));
    }

    #[test]
    fn untouched_tracker_reports_zero_usage() {
        let metadata = UsageTracker::start("optimizer", "2.0.0").finish();
        assert_eq!(metadata.llm_calls, 0);
        assert_eq!(metadata.tokens_used, 0);
        assert_eq!(metadata.version, "2.0.0");
    }
}
