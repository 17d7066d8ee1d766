//! Agent runtime for ANO pipelines.
//!
//! - `llm`: the completion contract and a deterministic offline backend
//! - `usage`: per-execution LLM call and token accounting
//! - `advisors`: profile-driven LLM agents
//! - `catalog`: the built-in advisory roles and their registration table
//! - `channels`: routing inbound messages from a deployment surface to an agent
//!
//! The LLM only drafts advice. Whether an agent may run, and whether its
//! output is kept, is decided by the policy engine and hooks in `ano-core`.

pub mod advisors;
pub mod catalog;
pub mod channels;
pub mod llm;
pub mod response;
pub mod usage;

pub use advisors::{AdvisorAgent, AdvisorProfile, FieldDefault, ResultField};
pub use catalog::{builtin_profile, register_builtin_agents, BUILTIN_PROFILES};
pub use channels::{AgentChannel, Channel};
pub use llm::{CompletionRequest, LlmClient, LlmResponse, OfflineBackend};
pub use response::parse_json_response;
pub use usage::UsageTracker;
