use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};

use crate::errors::{panic_message, AgentError, ExecutionError, ValidationError};
use crate::pipeline::definition::{Pipeline, PipelineResult, Stage, StageFailure};
use crate::policy::{HookResult, PolicyEngine, PolicyHook};
use crate::registry::AgentRegistry;
use crate::types::{AgentContext, AgentInput, AgentOutput, Context, ExecutionPhase};

/// Runs one [`Pipeline`] against a registry, wrapping every agent call in
/// hooks and policy checks.
///
/// Per agent: before-hooks, pre-policy, `execute`, post-policy, after-hooks.
/// Any refusal fails the agent's stage; `run` itself never fails.
pub struct PipelineCoordinator {
    pipeline: Pipeline,
    registry: Arc<AgentRegistry>,
    policy_engine: Option<Arc<PolicyEngine>>,
    hooks: Vec<Arc<dyn PolicyHook>>,
}

impl PipelineCoordinator {
    pub fn new(pipeline: Pipeline, registry: Arc<AgentRegistry>) -> Result<Self, ValidationError> {
        let missing = pipeline.validate(&registry);
        if !missing.is_empty() {
            return Err(ValidationError::MissingAgents {
                pipeline: pipeline.name().to_string(),
                missing,
            });
        }

        info!(
            event_name = "pipeline.coordinator.initialized",
            pipeline = pipeline.name(),
            stages = pipeline.stages().len(),
            "pipeline coordinator initialized"
        );
        Ok(Self { pipeline, registry, policy_engine: None, hooks: Vec::new() })
    }

    pub fn with_policy_engine(mut self, policy_engine: Arc<PolicyEngine>) -> Self {
        self.policy_engine = Some(policy_engine);
        self
    }

    /// Hooks run in the given order for both phases.
    pub fn with_hooks(mut self, hooks: Vec<Arc<dyn PolicyHook>>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn PolicyHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Every stage receives `initial_input`; results flow forward only
    /// through `context.upstream_outputs`.
    pub async fn run(&self, initial_input: &Context, context: &mut AgentContext) -> PipelineResult {
        let started = Instant::now();
        let mut result = PipelineResult::default();
        info!(event_name = "pipeline.run.started", pipeline = self.pipeline.name(), "starting pipeline");

        for stage in self.pipeline.stages() {
            info!(
                event_name = "pipeline.stage.started",
                pipeline = self.pipeline.name(),
                stage = stage.name(),
                parallel = stage.fans_out(),
                "executing stage"
            );

            match self.execute_stage(stage, initial_input, context).await {
                Ok(outputs) => {
                    info!(
                        event_name = "pipeline.stage.completed",
                        stage = stage.name(),
                        outputs = outputs.len(),
                        "stage completed"
                    );
                    for (agent_name, output) in outputs {
                        context.upstream_outputs.insert(agent_name.clone(), output.clone());
                        result.outputs.insert(agent_name, output);
                    }
                    result.stages_completed.push(stage.name().to_string());
                }
                Err(stage_error) => {
                    result.stages_failed.push(stage.name().to_string());
                    result.error = Some(stage_error.to_string());
                    result.failures.push(StageFailure::new(stage.name(), stage_error));

                    if stage.is_required() {
                        error!(
                            event_name = "pipeline.stage.failed",
                            stage = stage.name(),
                            required = true,
                            error = result.error.as_deref().unwrap_or_default(),
                            "required stage failed, aborting pipeline"
                        );
                        break;
                    }
                    warn!(
                        event_name = "pipeline.stage.failed",
                        stage = stage.name(),
                        required = false,
                        error = result.error.as_deref().unwrap_or_default(),
                        "optional stage failed, continuing"
                    );
                }
            }
        }

        result.success = !self.pipeline.stages().iter().any(|stage| {
            stage.is_required() && result.stages_failed.iter().any(|failed| failed == stage.name())
        });
        result.duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        info!(
            event_name = "pipeline.run.finished",
            pipeline = self.pipeline.name(),
            success = result.success,
            completed = result.stages_completed.len(),
            failed = result.stages_failed.len(),
            duration_ms = result.duration_ms,
            "pipeline finished"
        );
        result
    }

    async fn execute_stage(
        &self,
        stage: &Stage,
        stage_input: &Context,
        context: &mut AgentContext,
    ) -> Result<Vec<(String, AgentOutput)>, ExecutionError> {
        let mut outputs = Vec::with_capacity(stage.agents().len());

        if stage.fans_out() {
            // Same-stage agents see only earlier stages; nothing is merged
            // until every sibling has succeeded.
            let snapshot: &AgentContext = context;
            let runs = stage
                .agents()
                .iter()
                .map(|agent_name| self.execute_agent(agent_name, stage_input, snapshot));
            let results = join_all(runs).await;

            for (agent_name, agent_result) in stage.agents().iter().zip(results) {
                outputs.push((agent_name.clone(), agent_result?));
            }
            return Ok(outputs);
        }

        for agent_name in stage.agents() {
            let output = self.execute_agent(agent_name, stage_input, context).await?;
            context.upstream_outputs.insert(agent_name.clone(), output.clone());
            outputs.push((agent_name.clone(), output));
        }
        Ok(outputs)
    }

    async fn execute_agent(
        &self,
        agent_name: &str,
        input_data: &Context,
        context: &AgentContext,
    ) -> Result<AgentOutput, ExecutionError> {
        debug!(event_name = "pipeline.agent.started", agent = agent_name, "executing agent");
        let agent = self
            .registry
            .get_agent(agent_name)
            .ok_or_else(|| ExecutionError::AgentNotFound { agent: agent_name.to_string() })?;

        let mut data = input_data.clone();
        for hook in &self.hooks {
            let outcome =
                self.call_hook(hook.as_ref(), agent_name, ExecutionPhase::PreExecution, &data).await?;
            if !outcome.proceed {
                return Err(ExecutionError::HookVeto {
                    agent: agent_name.to_string(),
                    hook: hook.name().to_string(),
                    phase: ExecutionPhase::PreExecution,
                    message: outcome.message,
                });
            }
            if let Some(modified) = outcome.modified_data {
                data = modified;
            }
        }

        let pre_decision = match &self.policy_engine {
            Some(engine) => {
                let decision = engine.evaluate_pre(agent_name, &data).await;
                if !decision.allowed {
                    return Err(ExecutionError::PolicyDenied {
                        agent: agent_name.to_string(),
                        phase: ExecutionPhase::PreExecution,
                        violations: decision.violations,
                    });
                }
                Some(decision)
            }
            None => None,
        };

        let input = AgentInput::new(data, context.clone());
        let mut output = match AssertUnwindSafe(agent.execute(input)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(ExecutionError::Agent { agent: agent_name.to_string(), source });
            }
            Err(payload) => {
                return Err(ExecutionError::Agent {
                    agent: agent_name.to_string(),
                    source: AgentError::Panicked(panic_message(payload.as_ref())),
                });
            }
        };

        if let (Some(engine), Some(pre_decision)) = (&self.policy_engine, pre_decision) {
            let post_decision = engine.evaluate_post(agent_name, &output.result).await;
            if !post_decision.allowed {
                return Err(ExecutionError::PolicyDenied {
                    agent: agent_name.to_string(),
                    phase: ExecutionPhase::PostExecution,
                    violations: post_decision.violations,
                });
            }
            output.policy_report = Some(pre_decision.report().merge(post_decision.report()));
        }

        if !self.hooks.is_empty() {
            output = self.run_after_hooks(agent_name, output).await?;
        }

        debug!(event_name = "pipeline.agent.completed", agent = agent_name, "agent completed");
        Ok(output)
    }

    async fn run_after_hooks(
        &self,
        agent_name: &str,
        mut output: AgentOutput,
    ) -> Result<AgentOutput, ExecutionError> {
        let mut current = output.to_context().map_err(|error| ExecutionError::Agent {
            agent: agent_name.to_string(),
            source: AgentError::Failed(format!("output is not serializable: {error}")),
        })?;

        for hook in &self.hooks {
            let outcome = self
                .call_hook(hook.as_ref(), agent_name, ExecutionPhase::PostExecution, &current)
                .await?;
            if !outcome.proceed {
                return Err(ExecutionError::HookVeto {
                    agent: agent_name.to_string(),
                    hook: hook.name().to_string(),
                    phase: ExecutionPhase::PostExecution,
                    message: outcome.message,
                });
            }
            if let Some(modified) = outcome.modified_data {
                output = AgentOutput::from_context(modified.clone()).map_err(|error| {
                    ExecutionError::InvalidHookData {
                        agent: agent_name.to_string(),
                        hook: hook.name().to_string(),
                        message: error.to_string(),
                    }
                })?;
                current = modified;
            }
        }
        Ok(output)
    }

    /// A panicking hook fails the agent like a veto does.
    async fn call_hook(
        &self,
        hook: &dyn PolicyHook,
        agent_name: &str,
        phase: ExecutionPhase,
        data: &Context,
    ) -> Result<HookResult, ExecutionError> {
        let call = async {
            match phase {
                ExecutionPhase::PreExecution => hook.before_execute(agent_name, data).await,
                ExecutionPhase::PostExecution => hook.after_execute(agent_name, data).await,
            }
        };

        AssertUnwindSafe(call).catch_unwind().await.map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(
                event_name = "pipeline.hook.panicked",
                agent = agent_name,
                hook = hook.name(),
                phase = %phase,
                error = %message,
                "hook panicked"
            );
            ExecutionError::HookPanicked {
                agent: agent_name.to_string(),
                hook: hook.name().to_string(),
                phase,
                message,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::PipelineCoordinator;
    use crate::agent::Agent;
    use crate::environment::EnvironmentTier;
    use crate::errors::{AgentError, ExecutionError, ValidationError};
    use crate::pipeline::definition::{Pipeline, Stage};
    use crate::policy::gates::{GateError, GateResult, PolicyGate, TestSuccessGate};
    use crate::policy::hooks::{DataSanitizationHook, HookResult, PolicyHook, REDACTED};
    use crate::policy::PolicyEngine;
    use crate::registry::{AgentMetadataEntry, AgentRegistry};
    use crate::types::{
        AgentContext, AgentInput, AgentMetadata, AgentOutput, Context, ExecutionPhase, OrgProfile,
    };

    #[derive(Clone)]
    enum Behavior {
        Return(Value),
        Fail(&'static str),
        Panic,
    }

    struct ScriptedAgent {
        name: String,
        behavior: Behavior,
        calls: AtomicUsize,
        seen_upstream: Mutex<Vec<Vec<String>>>,
        seen_data: Mutex<Vec<Context>>,
    }

    impl ScriptedAgent {
        fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                behavior,
                calls: AtomicUsize::new(0),
                seen_upstream: Mutex::new(Vec::new()),
                seen_data: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn upstream_seen(&self) -> Vec<Vec<String>> {
            self.seen_upstream.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self, input: AgentInput) -> Result<AgentOutput, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_upstream
                .lock()
                .expect("lock")
                .push(input.context.upstream_outputs.keys().cloned().collect());
            self.seen_data.lock().expect("lock").push(input.data.clone());

            match &self.behavior {
                Behavior::Return(value) => {
                    let mut metadata = AgentMetadata::new(&self.name, "1.0.0");
                    metadata.tokens_used = 100;
                    Ok(AgentOutput::new(
                        value.as_object().cloned().unwrap_or_default(),
                        metadata.completed(),
                    ))
                }
                Behavior::Fail(message) => Err(AgentError::Failed((*message).to_owned())),
                Behavior::Panic => panic!("agent blew up"),
            }
        }
    }

    struct RecordingHook {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        veto_before: bool,
    }

    #[async_trait]
    impl PolicyHook for RecordingHook {
        fn name(&self) -> &str {
            self.label
        }

        async fn before_execute(&self, _agent_name: &str, _input_data: &Context) -> HookResult {
            self.log.lock().expect("lock").push(format!("before-{}", self.label));
            if self.veto_before {
                return HookResult::veto("not today");
            }
            HookResult::proceed()
        }

        async fn after_execute(&self, _agent_name: &str, _output: &Context) -> HookResult {
            self.log.lock().expect("lock").push(format!("after-{}", self.label));
            HookResult::proceed()
        }
    }

    struct CorruptingHook;

    #[async_trait]
    impl PolicyHook for CorruptingHook {
        fn name(&self) -> &str {
            "corrupting"
        }

        async fn before_execute(&self, _agent_name: &str, _input_data: &Context) -> HookResult {
            HookResult::proceed()
        }

        async fn after_execute(&self, _agent_name: &str, _output: &Context) -> HookResult {
            HookResult::proceed().with_data(Context::new())
        }
    }

    struct PostPhaseGate;

    #[async_trait]
    impl PolicyGate for PostPhaseGate {
        fn name(&self) -> &str {
            "post-only"
        }

        fn description(&self) -> &str {
            "fails after execution"
        }

        async fn evaluate(&self, context: &Context) -> Result<GateResult, GateError> {
            if context.get("phase") == Some(&json!("post-execution")) {
                return Ok(GateResult::fail("post-only", "output rejected"));
            }
            Ok(GateResult::pass("post-only", "input ok"))
        }
    }

    fn registry(agents: &[&Arc<ScriptedAgent>]) -> Arc<AgentRegistry> {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            let metadata = AgentMetadataEntry::new(agent.name.clone(), "test", "1.0.0", Vec::new());
            registry.register(Arc::clone(agent) as Arc<dyn Agent>, metadata).expect("register");
        }
        Arc::new(registry)
    }

    fn context() -> AgentContext {
        AgentContext::new(OrgProfile::new("Acme", "startup"))
    }

    fn input(value: Value) -> Context {
        value.as_object().cloned().unwrap_or_default()
    }

    fn stage(name: &str, agents: &[&str]) -> Stage {
        Stage::new(name, agents.iter().copied()).expect("stage")
    }

    #[tokio::test]
    async fn single_stage_success() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({"answer": 42})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent])).expect("coordinator");

        let mut context = context();
        let result = coordinator.run(&Context::new(), &mut context).await;

        assert!(result.success);
        assert_eq!(result.stages_completed, vec!["only".to_owned()]);
        assert!(result.stages_failed.is_empty());
        assert_eq!(result.outputs["agent-a"].get("answer"), Some(&json!(42)));
        assert!(context.upstream("agent-a").is_some());
        assert!(result.duration_ms >= 0.0);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn required_failure_stops_pipeline() {
        let failing = ScriptedAgent::new("agent-a", Behavior::Fail("model unavailable"));
        let never = ScriptedAgent::new("agent-b", Behavior::Return(json!({})));
        let pipeline =
            Pipeline::new("p", vec![stage("only", &["agent-a"]), stage("later", &["agent-b"])])
                .expect("pipeline");
        let coordinator =
            PipelineCoordinator::new(pipeline, registry(&[&failing, &never])).expect("coordinator");

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(!result.success);
        assert_eq!(result.stages_failed, vec!["only".to_owned()]);
        assert!(result.stages_completed.is_empty());
        assert_eq!(never.calls(), 0);
        assert_eq!(result.total_stages(), 1);
        assert!(result.error.as_deref().is_some_and(|error| error.contains("model unavailable")));
        assert!(matches!(
            result.failures[0].error,
            ExecutionError::Agent { ref agent, source: AgentError::Failed(_) } if agent == "agent-a"
        ));
    }

    #[tokio::test]
    async fn optional_failure_does_not_fail_pipeline() {
        let flaky = ScriptedAgent::new("flaky", Behavior::Fail("timeout"));
        let steady = ScriptedAgent::new("steady", Behavior::Return(json!({"ok": true})));
        let pipeline = Pipeline::new(
            "p",
            vec![stage("extra", &["flaky"]).optional(), stage("main", &["steady"])],
        )
        .expect("pipeline");
        let coordinator =
            PipelineCoordinator::new(pipeline, registry(&[&flaky, &steady])).expect("coordinator");

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(result.success);
        assert_eq!(result.stages_failed, vec!["extra".to_owned()]);
        assert_eq!(result.stages_completed, vec!["main".to_owned()]);
        assert!(result.error.is_some());
        assert_eq!(steady.calls(), 1);
    }

    #[tokio::test]
    async fn parallel_partial_failure_discards_successful_sibling() {
        let first = ScriptedAgent::new("agent-1", Behavior::Return(json!({"draft": "x"})));
        let second = ScriptedAgent::new("agent-2", Behavior::Fail("crashed"));
        let pipeline =
            Pipeline::new("p", vec![stage("fan", &["agent-1", "agent-2"]).parallel()]).expect("pipeline");
        let coordinator =
            PipelineCoordinator::new(pipeline, registry(&[&first, &second])).expect("coordinator");

        let mut context = context();
        let result = coordinator.run(&Context::new(), &mut context).await;

        assert!(!result.success);
        assert_eq!(result.stages_failed, vec!["fan".to_owned()]);
        assert_eq!(first.calls(), 1);
        assert!(context.upstream("agent-1").is_none());
        assert!(result.get_agent_output("agent-1").is_none());
        assert_eq!(result.failures[0].agent, "agent-2");
    }

    #[tokio::test]
    async fn sequential_agents_see_same_stage_outputs_parallel_agents_do_not() {
        let seed = ScriptedAgent::new("seed", Behavior::Return(json!({"n": 1})));
        let follow = ScriptedAgent::new("follow", Behavior::Return(json!({"n": 2})));
        let left = ScriptedAgent::new("left", Behavior::Return(json!({"n": 3})));
        let right = ScriptedAgent::new("right", Behavior::Return(json!({"n": 4})));
        let pipeline = Pipeline::new(
            "p",
            vec![stage("first", &["seed", "follow"]), stage("fan", &["left", "right"]).parallel()],
        )
        .expect("pipeline");
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&seed, &follow, &left, &right]))
            .expect("coordinator");

        let mut context = context();
        let result = coordinator.run(&Context::new(), &mut context).await;

        assert!(result.success);
        assert_eq!(follow.upstream_seen(), vec![vec!["seed".to_owned()]]);
        let visible = vec!["follow".to_owned(), "seed".to_owned()];
        assert_eq!(left.upstream_seen(), vec![visible.clone()]);
        assert_eq!(right.upstream_seen(), vec![visible]);
        assert_eq!(context.upstream_outputs.len(), 4);
        assert_eq!(result.outputs.len(), 4);
    }

    #[tokio::test]
    async fn pre_policy_denial_skips_agent() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let engine = PolicyEngine::new(vec![Arc::new(TestSuccessGate)], EnvironmentTier::Production);
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_policy_engine(Arc::new(engine));

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert_eq!(agent.calls(), 0);
        assert!(!result.success);
        assert_eq!(result.stages_failed, vec!["only".to_owned()]);
        assert_eq!(result.failures[0].violations[0].gate, "test-success");
    }

    #[tokio::test]
    async fn post_policy_denial_discards_output() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({"secret_plan": 1})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let engine = PolicyEngine::new(vec![Arc::new(PostPhaseGate)], EnvironmentTier::Test);
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_policy_engine(Arc::new(engine));

        let mut context = context();
        let result = coordinator.run(&Context::new(), &mut context).await;

        assert_eq!(agent.calls(), 1);
        assert!(!result.success);
        assert!(result.outputs.is_empty());
        assert!(context.upstream_outputs.is_empty());
        assert!(matches!(
            result.failures[0].error,
            ExecutionError::PolicyDenied { phase: crate::types::ExecutionPhase::PostExecution, .. }
        ));
    }

    #[tokio::test]
    async fn advisory_tier_attaches_policy_report() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({"ok": true})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let engine = PolicyEngine::new(vec![Arc::new(TestSuccessGate)], EnvironmentTier::Development);
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_policy_engine(Arc::new(engine));

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(result.success);
        let report = result.outputs["agent-a"].policy_report.clone().expect("report");
        assert_eq!(report.gates_failed, vec!["test-success".to_owned(), "test-success".to_owned()]);
        assert_eq!(report.violations.len(), 2);
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order_for_both_phases() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_hook(Arc::new(RecordingHook { label: "A", log: Arc::clone(&log), veto_before: false }))
            .with_hook(Arc::new(RecordingHook { label: "B", log: Arc::clone(&log), veto_before: false }));

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(result.success);
        assert_eq!(*log.lock().expect("lock"), vec!["before-A", "before-B", "after-A", "after-B"]);
    }

    #[tokio::test]
    async fn hook_veto_stops_before_agent_and_later_hooks() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let log = Arc::new(Mutex::new(Vec::new()));
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_hooks(vec![
                Arc::new(RecordingHook { label: "A", log: Arc::clone(&log), veto_before: true }),
                Arc::new(RecordingHook { label: "B", log: Arc::clone(&log), veto_before: false }),
            ]);

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(!result.success);
        assert_eq!(agent.calls(), 0);
        assert_eq!(*log.lock().expect("lock"), vec!["before-A"]);
        assert!(matches!(
            result.failures[0].error,
            ExecutionError::HookVeto { ref hook, ref message, .. } if hook == "A" && message == "not today"
        ));
    }

    #[tokio::test]
    async fn sanitizing_hook_rewrites_agent_input_and_output() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({"api_key": "leak", "summary": "ok"})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_hook(Arc::new(DataSanitizationHook::default()));

        let result = coordinator
            .run(&input(json!({"query": "x", "password": "hunter2"})), &mut context())
            .await;

        assert!(result.success);
        let seen = agent.seen_data.lock().expect("lock")[0].clone();
        assert_eq!(seen["password"], json!(REDACTED));
        assert_eq!(seen["query"], json!("x"));
        let output = &result.outputs["agent-a"];
        assert_eq!(output.get("api_key"), Some(&json!(REDACTED)));
        assert_eq!(output.metadata.tokens_used, 100);
    }

    #[tokio::test]
    async fn unusable_hook_output_fails_stage() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_hook(Arc::new(CorruptingHook));

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(!result.success);
        assert!(matches!(
            result.failures[0].error,
            ExecutionError::InvalidHookData { ref hook, .. } if hook == "corrupting"
        ));
    }

    #[tokio::test]
    async fn agent_panic_becomes_stage_failure() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Panic);
        let pipeline = Pipeline::new("p", vec![stage("only", &["agent-a"])]).expect("pipeline");
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent])).expect("coordinator");

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(!result.success);
        assert!(matches!(
            result.failures[0].error,
            ExecutionError::Agent { source: AgentError::Panicked(ref message), .. } if message == "agent blew up"
        ));
    }

    struct PanickingHook {
        phase: ExecutionPhase,
    }

    #[async_trait]
    impl PolicyHook for PanickingHook {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn before_execute(&self, _agent_name: &str, _input_data: &Context) -> HookResult {
            if self.phase == ExecutionPhase::PreExecution {
                panic!("hook exploded");
            }
            HookResult::proceed()
        }

        async fn after_execute(&self, _agent_name: &str, _output: &Context) -> HookResult {
            if self.phase == ExecutionPhase::PostExecution {
                panic!("hook exploded");
            }
            HookResult::proceed()
        }
    }

    struct PanickingGate;

    #[async_trait]
    impl PolicyGate for PanickingGate {
        fn name(&self) -> &str {
            "panicking"
        }

        fn description(&self) -> &str {
            "panics on every call"
        }

        async fn evaluate(&self, _context: &Context) -> Result<GateResult, GateError> {
            panic!("gate exploded")
        }
    }

    #[tokio::test]
    async fn gate_panic_is_a_violation_not_a_crash() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({"answer": 42})));
        let pipeline =
            Pipeline::new("p", vec![stage("checked", &["agent-a"]).optional()]).expect("pipeline");
        let engine = PolicyEngine::new(vec![Arc::new(PanickingGate)], EnvironmentTier::Production);
        let coordinator = PipelineCoordinator::new(pipeline, registry(&[&agent]))
            .expect("coordinator")
            .with_policy_engine(Arc::new(engine));

        let result = coordinator.run(&Context::new(), &mut context()).await;

        assert!(result.success, "the failed stage is optional");
        assert_eq!(result.stages_failed, vec!["checked".to_owned()]);
        assert_eq!(agent.calls(), 0);
        assert!(result.duration_ms >= 0.0);
        let violations = result.failures[0].error.violations();
        assert_eq!(violations[0].gate, "panicking");
        assert!(violations[0].message.contains("gate exploded"));
    }

    #[tokio::test]
    async fn hook_panic_fails_only_its_stage() {
        for phase in [ExecutionPhase::PreExecution, ExecutionPhase::PostExecution] {
            let flaky = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
            let pipeline =
                Pipeline::new("p", vec![stage("hooked", &["agent-a"]).optional()]).expect("pipeline");
            let coordinator = PipelineCoordinator::new(pipeline, registry(&[&flaky]))
                .expect("coordinator")
                .with_hook(Arc::new(PanickingHook { phase }));

            let result = coordinator.run(&Context::new(), &mut context()).await;

            assert!(result.success, "optional stage failure must not fail the pipeline");
            assert_eq!(result.stages_failed, vec!["hooked".to_owned()]);
            assert!(result.outputs.is_empty());
            assert_eq!(
                result.failures[0].error,
                ExecutionError::HookPanicked {
                    agent: "agent-a".to_owned(),
                    hook: "panicking".to_owned(),
                    phase,
                    message: "hook exploded".to_owned(),
                }
            );
            let expected_calls = usize::from(phase == ExecutionPhase::PostExecution);
            assert_eq!(flaky.calls(), expected_calls);
        }
    }

    #[test]
    fn coordinator_refuses_pipeline_with_missing_agents() {
        let agent = ScriptedAgent::new("agent-a", Behavior::Return(json!({})));
        let pipeline =
            Pipeline::new("p", vec![stage("only", &["agent-a", "ghost"])]).expect("pipeline");

        let error = match PipelineCoordinator::new(pipeline, registry(&[&agent])) {
            Ok(_) => panic!("missing agents must be rejected"),
            Err(error) => error,
        };
        assert_eq!(
            error,
            ValidationError::MissingAgents { pipeline: "p".to_owned(), missing: vec!["ghost".to_owned()] }
        );
    }
}
