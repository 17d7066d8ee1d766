//! Policy enforcement: named gates, the tier-aware engine that aggregates
//! them into a decision, and hooks that intercept individual agent calls.

pub mod engine;
pub mod gates;
pub mod hooks;
pub mod tiers;

pub use engine::{remediation, PolicyDecision, PolicyEngine};
pub use gates::{gate_names, get_gate, GateError, GateResult, PolicyGate};
pub use hooks::{
    AuditLoggingHook, CostTrackingHook, DataSanitizationHook, HookResult, PolicyHook,
    RateLimitHook,
};
pub use tiers::{custom_gates, minimal_gates, quality_gates, security_gates, tier_gates};
