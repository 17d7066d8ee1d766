use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ExecutionPhase;

pub const EXECUTION_STARTED: &str = "agent.execution_started";
pub const EXECUTION_COMPLETED: &str = "agent.execution_completed";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Started,
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub agent_name: String,
    pub pipeline: Option<String>,
    pub event_type: String,
    pub phase: ExecutionPhase,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        agent_name: impl Into<String>,
        event_type: impl Into<String>,
        phase: ExecutionPhase,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            agent_name: agent_name.into(),
            pipeline: None,
            event_type: event_type.into(),
            phase,
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_pipeline(mut self, pipeline: impl Into<String>) -> Self {
        self.pipeline = Some(pipeline.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn events_for(&self, agent_name: &str) -> Vec<AuditEvent> {
        self.events().into_iter().filter(|event| event.agent_name == agent_name).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audit::{
        AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink, EXECUTION_COMPLETED,
        EXECUTION_STARTED,
    };
    use crate::types::ExecutionPhase;

    #[test]
    fn in_memory_sink_records_events_per_agent() {
        let sink = InMemoryAuditSink::default();
        sink.emit(
            AuditEvent::new(
                "researcher",
                EXECUTION_STARTED,
                ExecutionPhase::PreExecution,
                AuditOutcome::Started,
            )
            .with_pipeline("research-review")
            .with_metadata("input_keys", "topic"),
        );
        sink.emit(AuditEvent::new(
            "analyst",
            EXECUTION_COMPLETED,
            ExecutionPhase::PostExecution,
            AuditOutcome::Success,
        ));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].event_id, events[1].event_id);

        let researcher = sink.events_for("researcher");
        assert_eq!(researcher.len(), 1);
        assert_eq!(researcher[0].pipeline.as_deref(), Some("research-review"));
        assert_eq!(researcher[0].metadata.get("input_keys").map(String::as_str), Some("topic"));
    }
}
