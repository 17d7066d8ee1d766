use async_trait::async_trait;

use crate::errors::AgentError;
use crate::types::{AgentInput, AgentOutput};

/// The single contract every pipeline participant implements.
///
/// Implementations must treat `input.context.upstream_outputs` as read-only
/// and report token usage through `AgentOutput::metadata` so cost tracking
/// can see it.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn execute(&self, input: AgentInput) -> Result<AgentOutput, AgentError>;
}
