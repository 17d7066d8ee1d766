use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::errors::ConfigurationError;
use crate::types::{Context, Severity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub passed: bool,
    pub gate_name: String,
    pub message: String,
    pub severity: Severity,
}

impl GateResult {
    pub fn pass(gate_name: &str, message: impl Into<String>) -> Self {
        Self {
            passed: true,
            gate_name: gate_name.to_string(),
            message: message.into(),
            severity: Severity::Info,
        }
    }

    pub fn fail(gate_name: &str, message: impl Into<String>) -> Self {
        Self {
            passed: false,
            gate_name: gate_name.to_string(),
            message: message.into(),
            severity: Severity::Error,
        }
    }
}

/// Raised by a gate that could not evaluate at all. The engine turns this
/// into a failed gate; it never reaches the coordinator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct GateError(pub String);

/// A single named pass/fail check over an evaluation context.
///
/// Built-in gates never return `Err`: a missing key means the check fails.
#[async_trait]
pub trait PolicyGate: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError>;
}

pub const TEST_SUCCESS: &str = "test-success";
pub const FILE_VERIFICATION: &str = "file-verification";
pub const BRANCH_POLICY: &str = "branch-policy";
pub const DOCUMENTATION: &str = "documentation";
pub const CODE_QUALITY: &str = "code-quality";
pub const SECURITY_VALIDATION: &str = "security-validation";
pub const APPROVAL: &str = "approval";

#[derive(Clone, Debug, Default)]
pub struct TestSuccessGate;

#[async_trait]
impl PolicyGate for TestSuccessGate {
    fn name(&self) -> &str {
        TEST_SUCCESS
    }

    fn description(&self) -> &str {
        "All automated tests must pass"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        if flag(context, "tests_passed") {
            return Ok(GateResult::pass(TEST_SUCCESS, "All tests passed"));
        }

        let failed_count = context
            .get("test_results")
            .and_then(|results| results.get("failed"))
            .map(render_scalar)
            .unwrap_or_else(|| "unknown".to_string());
        Ok(GateResult::fail(TEST_SUCCESS, format!("Tests failed (failed count: {failed_count})")))
    }
}

#[derive(Clone, Debug, Default)]
pub struct FileVerificationGate;

#[async_trait]
impl PolicyGate for FileVerificationGate {
    fn name(&self) -> &str {
        FILE_VERIFICATION
    }

    fn description(&self) -> &str {
        "Required files must exist and have correct integrity"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        if flag(context, "files_verified") {
            return Ok(GateResult::pass(FILE_VERIFICATION, "All required files verified"));
        }

        let missing_files = string_list(context, "missing_files");
        if !missing_files.is_empty() {
            return Ok(GateResult::fail(
                FILE_VERIFICATION,
                format!("Missing or corrupted files: {}", missing_files.join(", ")),
            ));
        }

        Ok(GateResult::fail(FILE_VERIFICATION, "File verification failed"))
    }
}

#[derive(Clone, Debug, Default)]
pub struct BranchPolicyGate;

#[async_trait]
impl PolicyGate for BranchPolicyGate {
    fn name(&self) -> &str {
        BRANCH_POLICY
    }

    fn description(&self) -> &str {
        "Operations must target correct branch for environment"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        let current_branch = context.get("current_branch").and_then(Value::as_str).unwrap_or("");
        if current_branch.is_empty() {
            return Ok(GateResult::fail(BRANCH_POLICY, "No branch information available"));
        }

        let allowed_branches = string_list(context, "allowed_branches");
        if allowed_branches.iter().any(|branch| branch == current_branch) {
            return Ok(GateResult::pass(
                BRANCH_POLICY,
                format!("Branch '{current_branch}' is allowed"),
            ));
        }

        Ok(GateResult::fail(
            BRANCH_POLICY,
            format!("Branch '{current_branch}' not in allowed list: {allowed_branches:?}"),
        ))
    }
}

#[derive(Clone, Debug, Default)]
pub struct DocumentationGate;

#[async_trait]
impl PolicyGate for DocumentationGate {
    fn name(&self) -> &str {
        DOCUMENTATION
    }

    fn description(&self) -> &str {
        "Changes must include appropriate documentation"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        if flag(context, "documentation_updated") {
            let score =
                context.get("documentation_score").and_then(Value::as_f64).unwrap_or(1.0);
            return Ok(GateResult::pass(
                DOCUMENTATION,
                format!("Documentation updated (score: {score:.2})"),
            ));
        }

        let missing_docs = string_list(context, "missing_docs");
        if !missing_docs.is_empty() {
            return Ok(GateResult::fail(
                DOCUMENTATION,
                format!("Missing documentation: {}", missing_docs.join(", ")),
            ));
        }

        Ok(GateResult::fail(DOCUMENTATION, "Documentation not updated"))
    }
}

#[derive(Clone, Debug, Default)]
pub struct CodeQualityGate;

#[async_trait]
impl PolicyGate for CodeQualityGate {
    fn name(&self) -> &str {
        CODE_QUALITY
    }

    fn description(&self) -> &str {
        "Code must pass linting and type checks"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        let lint_passed = flag(context, "lint_passed");
        let type_check_passed = flag(context, "type_check_passed");
        if lint_passed && type_check_passed {
            return Ok(GateResult::pass(CODE_QUALITY, "Code quality checks passed"));
        }

        let mut failed_checks = Vec::new();
        if !lint_passed {
            failed_checks.push("linting");
        }
        if !type_check_passed {
            failed_checks.push("type checking");
        }
        let issue_count =
            context.get("quality_issues").and_then(Value::as_array).map(Vec::len).unwrap_or(0);

        Ok(GateResult::fail(
            CODE_QUALITY,
            format!("Failed checks: {}. Issues: {issue_count}", failed_checks.join(", ")),
        ))
    }
}

#[derive(Clone, Debug, Default)]
pub struct SecurityValidationGate;

#[async_trait]
impl PolicyGate for SecurityValidationGate {
    fn name(&self) -> &str {
        SECURITY_VALIDATION
    }

    fn description(&self) -> &str {
        "No security vulnerabilities or exposed secrets"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        if flag(context, "security_scan_passed") {
            return Ok(GateResult::pass(SECURITY_VALIDATION, "Security validation passed"));
        }

        let vulnerabilities =
            context.get("vulnerabilities_found").and_then(Value::as_u64).unwrap_or(0);
        let severity_levels = context
            .get("severity_levels")
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));

        Ok(GateResult::fail(
            SECURITY_VALIDATION,
            format!("Found {vulnerabilities} vulnerabilities: {severity_levels}"),
        ))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalGate;

#[async_trait]
impl PolicyGate for ApprovalGate {
    fn name(&self) -> &str {
        APPROVAL
    }

    fn description(&self) -> &str {
        "Human approval required for sensitive operations"
    }

    async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
        if !flag(context, "approval_granted") {
            return Ok(GateResult::fail(APPROVAL, "Approval required but not granted"));
        }

        let approver = context.get("approver").and_then(Value::as_str).unwrap_or("unknown");
        let timestamp =
            context.get("approval_timestamp").and_then(Value::as_str).unwrap_or("unknown");
        Ok(GateResult::pass(APPROVAL, format!("Approved by {approver} at {timestamp}")))
    }
}

type GateConstructor = fn() -> Arc<dyn PolicyGate>;

const GATE_REGISTRY: [(&str, GateConstructor); 7] = [
    (TEST_SUCCESS, || Arc::new(TestSuccessGate)),
    (FILE_VERIFICATION, || Arc::new(FileVerificationGate)),
    (BRANCH_POLICY, || Arc::new(BranchPolicyGate)),
    (DOCUMENTATION, || Arc::new(DocumentationGate)),
    (CODE_QUALITY, || Arc::new(CodeQualityGate)),
    (SECURITY_VALIDATION, || Arc::new(SecurityValidationGate)),
    (APPROVAL, || Arc::new(ApprovalGate)),
];

pub fn gate_names() -> Vec<&'static str> {
    GATE_REGISTRY.iter().map(|(name, _)| *name).collect()
}

pub fn get_gate(name: &str) -> Result<Arc<dyn PolicyGate>, ConfigurationError> {
    GATE_REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, constructor)| constructor())
        .ok_or_else(|| ConfigurationError::UnknownGate {
            name: name.to_string(),
            available: gate_names().into_iter().map(str::to_string).collect(),
        })
}

fn flag(context: &Context, key: &str) -> bool {
    context.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(context: &Context, key: &str) -> Vec<String> {
    context
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(render_scalar).collect())
        .unwrap_or_default()
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        gate_names, get_gate, ApprovalGate, BranchPolicyGate, CodeQualityGate, DocumentationGate,
        FileVerificationGate, PolicyGate, SecurityValidationGate, TestSuccessGate,
    };
    use crate::errors::ConfigurationError;
    use crate::types::{Context, Severity};

    fn context(value: serde_json::Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn every_gate_fails_safe_on_empty_context() {
        let empty = Context::new();
        for name in gate_names() {
            let gate = get_gate(name).expect("registered gate");
            let result = gate.evaluate(&empty).await.expect("built-in gates never error");
            assert!(!result.passed, "gate {name} should fail on empty context");
            assert_eq!(result.gate_name, name);
            assert_eq!(result.severity, Severity::Error);
        }
    }

    #[tokio::test]
    async fn test_success_reports_failed_count() {
        let gate = TestSuccessGate;
        let passed = gate.evaluate(&context(json!({"tests_passed": true}))).await.expect("eval");
        assert!(passed.passed);
        assert_eq!(passed.severity, Severity::Info);

        let failed = gate
            .evaluate(&context(json!({"tests_passed": false, "test_results": {"failed": 3}})))
            .await
            .expect("eval");
        assert_eq!(failed.message, "Tests failed (failed count: 3)");
    }

    #[tokio::test]
    async fn file_verification_lists_missing_files() {
        let result = FileVerificationGate
            .evaluate(&context(json!({"missing_files": ["a.rs", "b.rs"]})))
            .await
            .expect("eval");
        assert!(!result.passed);
        assert!(result.message.contains("a.rs, b.rs"));
    }

    #[tokio::test]
    async fn branch_policy_checks_allowed_list() {
        let gate = BranchPolicyGate;
        let allowed = gate
            .evaluate(&context(json!({
                "current_branch": "main",
                "allowed_branches": ["main", "release"],
            })))
            .await
            .expect("eval");
        assert!(allowed.passed);

        let rejected = gate
            .evaluate(&context(json!({
                "current_branch": "feature/x",
                "allowed_branches": ["main"],
            })))
            .await
            .expect("eval");
        assert!(!rejected.passed);
        assert!(rejected.message.contains("feature/x"));

        let missing = gate.evaluate(&context(json!({}))).await.expect("eval");
        assert_eq!(missing.message, "No branch information available");
    }

    #[tokio::test]
    async fn documentation_reports_score_and_missing_docs() {
        let gate = DocumentationGate;
        let updated = gate
            .evaluate(&context(json!({"documentation_updated": true, "documentation_score": 0.5})))
            .await
            .expect("eval");
        assert_eq!(updated.message, "Documentation updated (score: 0.50)");

        let missing =
            gate.evaluate(&context(json!({"missing_docs": ["README"]}))).await.expect("eval");
        assert_eq!(missing.message, "Missing documentation: README");
    }

    #[tokio::test]
    async fn code_quality_names_each_failed_check() {
        let gate = CodeQualityGate;
        let lint_only = gate
            .evaluate(&context(json!({"lint_passed": false, "type_check_passed": true})))
            .await
            .expect("eval");
        assert_eq!(lint_only.message, "Failed checks: linting. Issues: 0");

        let both = gate
            .evaluate(&context(json!({"quality_issues": ["unused import", "missing type"]})))
            .await
            .expect("eval");
        assert_eq!(both.message, "Failed checks: linting, type checking. Issues: 2");
    }

    #[tokio::test]
    async fn security_and_approval_gates() {
        let security = SecurityValidationGate
            .evaluate(&context(json!({"vulnerabilities_found": 2})))
            .await
            .expect("eval");
        assert!(security.message.starts_with("Found 2 vulnerabilities"));

        let approval = ApprovalGate
            .evaluate(&context(json!({
                "approval_granted": true,
                "approver": "cfo",
                "approval_timestamp": "2026-01-01T00:00:00Z",
            })))
            .await
            .expect("eval");
        assert!(approval.passed);
        assert_eq!(approval.message, "Approved by cfo at 2026-01-01T00:00:00Z");
    }

    #[test]
    fn unknown_gate_lists_valid_names() {
        let error = match get_gate("vibes") {
            Ok(_) => panic!("unknown gate must be rejected"),
            Err(error) => error,
        };
        match error {
            ConfigurationError::UnknownGate { name, available } => {
                assert_eq!(name, "vibes");
                assert_eq!(available.len(), 7);
                assert!(available.contains(&"approval".to_owned()));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
