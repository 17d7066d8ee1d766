use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::environment::EnvironmentTier;
use crate::errors::panic_message;
use crate::policy::gates::{GateResult, PolicyGate};
use crate::policy::tiers::tier_gates;
use crate::types::{Context, ExecutionPhase, PolicyReport, PolicyViolation, Severity};

/// Aggregated verdict from one pass over every configured gate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub gates_passed: Vec<String>,
    pub gates_failed: Vec<String>,
    pub violations: Vec<PolicyViolation>,
}

impl PolicyDecision {
    pub fn report(&self) -> PolicyReport {
        PolicyReport {
            gates_passed: self.gates_passed.clone(),
            gates_failed: self.gates_failed.clone(),
            violations: self.violations.clone(),
        }
    }
}

pub struct PolicyEngine {
    gates: Vec<Arc<dyn PolicyGate>>,
    tier: EnvironmentTier,
}

impl PolicyEngine {
    pub fn new(gates: Vec<Arc<dyn PolicyGate>>, tier: EnvironmentTier) -> Self {
        info!(
            event_name = "policy.engine.initialized",
            gate_count = gates.len(),
            tier = %tier,
            "initialized policy engine"
        );
        Self { gates, tier }
    }

    /// Engine loaded with the preset gate list for `tier`.
    pub fn for_tier(tier: EnvironmentTier) -> Self {
        Self::new(tier_gates(tier), tier)
    }

    pub fn tier(&self) -> EnvironmentTier {
        self.tier
    }

    pub fn gate_names(&self) -> Vec<String> {
        self.gates.iter().map(|gate| gate.name().to_string()).collect()
    }

    pub async fn evaluate_pre(&self, agent_name: &str, input_data: &Context) -> PolicyDecision {
        info!(event_name = "policy.evaluate_pre", agent = agent_name, "pre-execution policy evaluation");
        let context = self.evaluation_context(
            agent_name,
            ExecutionPhase::PreExecution,
            "input_data",
            input_data,
        );
        self.evaluate_gates(&context).await
    }

    pub async fn evaluate_post(&self, agent_name: &str, output: &Context) -> PolicyDecision {
        info!(event_name = "policy.evaluate_post", agent = agent_name, "post-execution policy evaluation");
        let context =
            self.evaluation_context(agent_name, ExecutionPhase::PostExecution, "output", output);
        self.evaluate_gates(&context).await
    }

    fn evaluation_context(
        &self,
        agent_name: &str,
        phase: ExecutionPhase,
        payload_key: &str,
        payload: &Context,
    ) -> Context {
        let mut context = Context::new();
        context.insert("agent_name".to_string(), Value::String(agent_name.to_string()));
        context.insert(payload_key.to_string(), Value::Object(payload.clone()));
        context.insert("tier".to_string(), Value::String(self.tier.as_str().to_string()));
        context.insert("phase".to_string(), Value::String(phase.to_string()));
        // Caller keys win over phase metadata.
        context.extend(payload.iter().map(|(key, value)| (key.clone(), value.clone())));
        context
    }

    async fn evaluate_gates(&self, context: &Context) -> PolicyDecision {
        let mut decision = PolicyDecision::default();

        for gate in &self.gates {
            let name = gate.name().to_string();
            let evaluated = match AssertUnwindSafe(gate.evaluate(context)).catch_unwind().await {
                Ok(outcome) => outcome.map_err(|gate_error| gate_error.to_string()),
                Err(payload) => Err(format!("gate panicked: {}", panic_message(payload.as_ref()))),
            };
            match evaluated {
                Ok(result) => {
                    debug!(
                        event_name = "policy.gate.evaluated",
                        gate = %name,
                        passed = result.passed,
                        message = %result.message,
                        "gate evaluated"
                    );
                    if result.passed {
                        decision.gates_passed.push(name);
                    } else {
                        decision.violations.push(self.violation(&result));
                        decision.gates_failed.push(name);
                    }
                }
                Err(gate_error) => {
                    error!(
                        event_name = "policy.gate.error",
                        gate = %name,
                        error = %gate_error,
                        "gate evaluation failed"
                    );
                    decision.violations.push(PolicyViolation {
                        gate: name.clone(),
                        severity: Severity::Error,
                        message: format!("Gate evaluation error: {gate_error}"),
                        remediation: "Check gate configuration and context data".to_string(),
                    });
                    decision.gates_failed.push(name);
                }
            }
        }

        decision.allowed = self.compute_decision(&decision.gates_failed);
        info!(
            event_name = "policy.decision",
            allowed = decision.allowed,
            passed = decision.gates_passed.len(),
            failed = decision.gates_failed.len(),
            "policy decision computed"
        );
        decision
    }

    fn compute_decision(&self, gates_failed: &[String]) -> bool {
        if gates_failed.is_empty() {
            return true;
        }

        match self.tier {
            EnvironmentTier::Development => {
                warn!(
                    event_name = "policy.advisory_failure",
                    failed = gates_failed.len(),
                    "development tier: gates failed, proceeding"
                );
                true
            }
            EnvironmentTier::Test => {
                warn!(
                    event_name = "policy.blocked",
                    tier = "test",
                    failed = gates_failed.len(),
                    "test tier: gates failed, blocking"
                );
                false
            }
            EnvironmentTier::Production => {
                error!(
                    event_name = "policy.blocked",
                    tier = "production",
                    failed = gates_failed.len(),
                    "production tier: gates failed, blocking"
                );
                false
            }
        }
    }

    fn violation(&self, result: &GateResult) -> PolicyViolation {
        PolicyViolation {
            gate: result.gate_name.clone(),
            severity: result.severity,
            message: result.message.clone(),
            remediation: remediation(&result.gate_name, self.tier),
        }
    }
}

pub fn remediation(gate_name: &str, tier: EnvironmentTier) -> String {
    let base = match gate_name {
        "test-success" => "Run tests locally and fix failures before retrying".to_string(),
        "file-verification" => {
            "Ensure all required files are present and have correct checksums".to_string()
        }
        "branch-policy" => "Switch to an allowed branch for this environment".to_string(),
        "documentation" => "Update documentation to reflect your changes".to_string(),
        "code-quality" => "Run linting and type checking tools, fix reported issues".to_string(),
        "security-validation" => {
            "Review security scan results and remediate vulnerabilities".to_string()
        }
        "approval" => "Request approval from authorized personnel before proceeding".to_string(),
        other => format!("Review {other} requirements and retry"),
    };

    match tier {
        EnvironmentTier::Production => format!("{base}. Production requires strict compliance."),
        EnvironmentTier::Test => format!("{base}. Approval may be required in test environment."),
        EnvironmentTier::Development => base,
    }
}
