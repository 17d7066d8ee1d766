use std::sync::Arc;

use tracing::info;

use crate::environment::EnvironmentTier;
use crate::errors::ConfigurationError;
use crate::policy::gates::{
    get_gate, ApprovalGate, BranchPolicyGate, CodeQualityGate, DocumentationGate,
    FileVerificationGate, PolicyGate, SecurityValidationGate, TestSuccessGate,
};

/// Preset gate list for a tier. Development omits the approval gate; test and
/// production carry all seven and differ only in remediation wording.
pub fn tier_gates(tier: EnvironmentTier) -> Vec<Arc<dyn PolicyGate>> {
    let mut gates: Vec<Arc<dyn PolicyGate>> = vec![
        Arc::new(TestSuccessGate),
        Arc::new(FileVerificationGate),
        Arc::new(BranchPolicyGate),
        Arc::new(DocumentationGate),
        Arc::new(CodeQualityGate),
        Arc::new(SecurityValidationGate),
    ];
    if tier != EnvironmentTier::Development {
        gates.push(Arc::new(ApprovalGate));
    }

    info!(event_name = "policy.tier_gates.loaded", tier = %tier, gate_count = gates.len(), "loaded tier policy");
    gates
}

pub fn minimal_gates() -> Vec<Arc<dyn PolicyGate>> {
    vec![Arc::new(TestSuccessGate), Arc::new(SecurityValidationGate)]
}

pub fn quality_gates() -> Vec<Arc<dyn PolicyGate>> {
    vec![Arc::new(TestSuccessGate), Arc::new(CodeQualityGate), Arc::new(DocumentationGate)]
}

pub fn security_gates() -> Vec<Arc<dyn PolicyGate>> {
    vec![Arc::new(SecurityValidationGate), Arc::new(FileVerificationGate), Arc::new(ApprovalGate)]
}

pub fn custom_gates<S: AsRef<str>>(names: &[S]) -> Result<Vec<Arc<dyn PolicyGate>>, ConfigurationError> {
    let gates = names.iter().map(|name| get_gate(name.as_ref())).collect::<Result<Vec<_>, _>>()?;
    info!(event_name = "policy.custom_gates.loaded", gate_count = gates.len(), "built custom policy");
    Ok(gates)
}

#[cfg(test)]
mod tests {
    use super::{custom_gates, minimal_gates, quality_gates, security_gates, tier_gates};
    use crate::environment::EnvironmentTier;
    use crate::errors::ConfigurationError;

    fn names(gates: &[std::sync::Arc<dyn crate::policy::gates::PolicyGate>]) -> Vec<String> {
        gates.iter().map(|gate| gate.name().to_owned()).collect()
    }

    #[test]
    fn development_preset_skips_approval() {
        let development = names(&tier_gates(EnvironmentTier::Development));
        assert_eq!(development.len(), 6);
        assert!(!development.contains(&"approval".to_owned()));

        for tier in [EnvironmentTier::Test, EnvironmentTier::Production] {
            let strict = names(&tier_gates(tier));
            assert_eq!(strict.len(), 7);
            assert_eq!(strict.last().map(String::as_str), Some("approval"));
        }
    }

    #[test]
    fn focused_presets_have_expected_members() {
        assert_eq!(names(&minimal_gates()), vec!["test-success", "security-validation"]);
        assert_eq!(names(&quality_gates()), vec!["test-success", "code-quality", "documentation"]);
        assert_eq!(
            names(&security_gates()),
            vec!["security-validation", "file-verification", "approval"]
        );
    }

    #[test]
    fn custom_policy_rejects_unknown_names() {
        let gates = custom_gates(&["approval", "branch-policy"]).expect("known gates");
        assert_eq!(names(&gates), vec!["approval", "branch-policy"]);

        let error = match custom_gates(&["approval", "nope"]) {
            Ok(_) => panic!("unknown gate must fail"),
            Err(error) => error,
        };
        assert!(matches!(error, ConfigurationError::UnknownGate { ref name, .. } if name == "nope"));
    }
}
