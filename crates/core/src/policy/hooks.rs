use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditOutcome, AuditSink, EXECUTION_COMPLETED, EXECUTION_STARTED};
use crate::types::{Context, ExecutionPhase};

pub const REDACTED: &str = "***REDACTED***";
pub const DEFAULT_SENSITIVE_KEYS: [&str; 6] =
    ["password", "api_key", "secret", "token", "ssn", "credit_card"];
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Outcome of one hook call. `proceed == false` vetoes the agent call;
/// `modified_data` replaces what the next hook (and then the agent or the
/// caller) sees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HookResult {
    pub proceed: bool,
    pub message: String,
    pub modified_data: Option<Context>,
}

impl HookResult {
    pub fn proceed() -> Self {
        Self { proceed: true, ..Self::default() }
    }

    pub fn proceed_with(message: impl Into<String>) -> Self {
        Self { proceed: true, message: message.into(), modified_data: None }
    }

    pub fn veto(message: impl Into<String>) -> Self {
        Self { proceed: false, message: message.into(), modified_data: None }
    }

    pub fn with_data(mut self, data: Context) -> Self {
        self.modified_data = Some(data);
        self
    }
}

/// Interceptor around a single agent call.
///
/// `before_execute` sees the stage input data. `after_execute` sees the
/// output in its map form (`result`, `metadata`, `policy_report`).
#[async_trait]
pub trait PolicyHook: Send + Sync {
    fn name(&self) -> &str;
    async fn before_execute(&self, agent_name: &str, input_data: &Context) -> HookResult;
    async fn after_execute(&self, agent_name: &str, output: &Context) -> HookResult;
}

#[derive(Clone, Default)]
pub struct AuditLoggingHook {
    sink: Option<Arc<dyn AuditSink>>,
}

impl AuditLoggingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink: Some(sink) }
    }

    fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(event);
        }
    }
}

#[async_trait]
impl PolicyHook for AuditLoggingHook {
    fn name(&self) -> &str {
        "audit-logging"
    }

    async fn before_execute(&self, agent_name: &str, input_data: &Context) -> HookResult {
        let input_keys = joined_keys(input_data);
        info!(
            event_name = EXECUTION_STARTED,
            agent = agent_name,
            input_keys = %input_keys,
            phase = %ExecutionPhase::PreExecution,
            "audit: agent starting execution"
        );
        self.emit(
            AuditEvent::new(
                agent_name,
                EXECUTION_STARTED,
                ExecutionPhase::PreExecution,
                AuditOutcome::Started,
            )
            .with_metadata("input_keys", input_keys),
        );
        HookResult::proceed_with("Audit logged")
    }

    async fn after_execute(&self, agent_name: &str, output: &Context) -> HookResult {
        let output_keys = output
            .get("result")
            .and_then(Value::as_object)
            .map(joined_keys)
            .unwrap_or_else(|| joined_keys(output));
        info!(
            event_name = EXECUTION_COMPLETED,
            agent = agent_name,
            output_keys = %output_keys,
            phase = %ExecutionPhase::PostExecution,
            "audit: agent completed execution"
        );
        self.emit(
            AuditEvent::new(
                agent_name,
                EXECUTION_COMPLETED,
                ExecutionPhase::PostExecution,
                AuditOutcome::Success,
            )
            .with_metadata("output_keys", output_keys),
        );
        HookResult::proceed_with("Audit logged")
    }
}

#[derive(Clone, Debug)]
pub struct DataSanitizationHook {
    sensitive_keys: Vec<String>,
}

impl Default for DataSanitizationHook {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVE_KEYS.iter().map(|key| key.to_string()).collect())
    }
}

impl DataSanitizationHook {
    pub fn new(sensitive_keys: Vec<String>) -> Self {
        Self { sensitive_keys: sensitive_keys.into_iter().map(|key| key.to_lowercase()).collect() }
    }

    pub fn sanitize(&self, data: &Context) -> Context {
        data.iter()
            .map(|(key, value)| {
                let value = if self.is_sensitive(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    self.sanitize_value(value)
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize(map)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(map) => Value::Object(self.sanitize(map)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.sensitive_keys.iter().any(|sensitive| key.contains(sensitive.as_str()))
    }

    fn message(&self) -> String {
        format!("Sanitized {} sensitive keys", self.sensitive_keys.len())
    }
}

#[async_trait]
impl PolicyHook for DataSanitizationHook {
    fn name(&self) -> &str {
        "data-sanitization"
    }

    async fn before_execute(&self, _agent_name: &str, input_data: &Context) -> HookResult {
        HookResult::proceed_with(self.message()).with_data(self.sanitize(input_data))
    }

    async fn after_execute(&self, _agent_name: &str, output: &Context) -> HookResult {
        // Only the agent's result is user data; metadata counters stay intact.
        let mut modified = output.clone();
        if let Some(Value::Object(result)) = output.get("result") {
            modified.insert("result".to_string(), Value::Object(self.sanitize(result)));
        }
        HookResult::proceed_with(self.message()).with_data(modified)
    }
}

/// Sliding 60-second window per agent name.
#[derive(Debug)]
pub struct RateLimitHook {
    max_executions_per_minute: u32,
    executions: Mutex<HashMap<String, Vec<Instant>>>,
}

impl Default for RateLimitHook {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_PER_MINUTE)
    }
}

impl RateLimitHook {
    pub fn new(max_executions_per_minute: u32) -> Self {
        Self { max_executions_per_minute, executions: Mutex::new(HashMap::new()) }
    }

    pub fn max_executions_per_minute(&self) -> u32 {
        self.max_executions_per_minute
    }

    fn admit(&self, agent_name: &str, now: Instant) -> Option<usize> {
        let mut executions = match self.executions.lock() {
            Ok(executions) => executions,
            Err(poisoned) => poisoned.into_inner(),
        };
        let recent = executions.entry(agent_name.to_string()).or_default();
        recent.retain(|timestamp| now.duration_since(*timestamp) < RATE_WINDOW);

        if recent.len() >= self.max_executions_per_minute as usize {
            return None;
        }
        recent.push(now);
        Some(recent.len())
    }
}

#[async_trait]
impl PolicyHook for RateLimitHook {
    fn name(&self) -> &str {
        "rate-limiting"
    }

    async fn before_execute(&self, agent_name: &str, _input_data: &Context) -> HookResult {
        match self.admit(agent_name, Instant::now()) {
            Some(count) => HookResult::proceed_with(format!(
                "Rate limit OK: {count}/{}",
                self.max_executions_per_minute
            )),
            None => {
                warn!(
                    event_name = "policy.rate_limit.exceeded",
                    agent = agent_name,
                    limit = self.max_executions_per_minute,
                    "rate limit exceeded"
                );
                HookResult::veto(format!(
                    "Rate limit exceeded: {}/min",
                    self.max_executions_per_minute
                ))
            }
        }
    }

    async fn after_execute(&self, _agent_name: &str, _output: &Context) -> HookResult {
        HookResult::proceed()
    }
}

#[derive(Debug)]
pub struct CostTrackingHook {
    cost_per_1k_tokens: Decimal,
    total_cost: Mutex<Decimal>,
}

impl Default for CostTrackingHook {
    fn default() -> Self {
        Self::new(default_cost_per_1k_tokens())
    }
}

pub fn default_cost_per_1k_tokens() -> Decimal {
    Decimal::new(1, 2)
}

impl CostTrackingHook {
    pub fn new(cost_per_1k_tokens: Decimal) -> Self {
        Self { cost_per_1k_tokens, total_cost: Mutex::new(Decimal::ZERO) }
    }

    pub fn total_cost(&self) -> Decimal {
        match self.total_cost.lock() {
            Ok(total) => *total,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn reset(&self) {
        match self.total_cost.lock() {
            Ok(mut total) => *total = Decimal::ZERO,
            Err(poisoned) => *poisoned.into_inner() = Decimal::ZERO,
        }
    }

    fn add(&self, cost: Decimal) -> Decimal {
        let mut total = match self.total_cost.lock() {
            Ok(total) => total,
            Err(poisoned) => poisoned.into_inner(),
        };
        *total += cost;
        *total
    }
}

#[async_trait]
impl PolicyHook for CostTrackingHook {
    fn name(&self) -> &str {
        "cost-tracking"
    }

    async fn before_execute(&self, _agent_name: &str, _input_data: &Context) -> HookResult {
        HookResult::proceed()
    }

    async fn after_execute(&self, agent_name: &str, output: &Context) -> HookResult {
        let tokens_used = output
            .get("metadata")
            .and_then(|metadata| metadata.get("tokens_used"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let cost = Decimal::from(tokens_used) / Decimal::from(1000) * self.cost_per_1k_tokens;
        let total = self.add(cost);

        info!(
            event_name = "policy.cost.tracked",
            agent = agent_name,
            tokens_used,
            cost = %cost.round_dp(4),
            total = %total.round_dp(4),
            "cost tracked"
        );
        HookResult::proceed_with(format!("Cost tracked: ${:.4}", cost))
    }
}

fn joined_keys(data: &Context) -> String {
    data.keys().map(String::as_str).collect::<Vec<_>>().join(",")
}
