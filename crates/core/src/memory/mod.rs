//! Per-agent working memory persisted as a markdown `WORKING.md` document
//! so a person can read and edit it between sessions.

pub mod document;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use document::{parse_working_state, render_working_state};

pub const WORKING_FILE: &str = "WORKING.md";

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("working memory I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid timestamp `{value}` in working memory: {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        }
    }

    /// Unknown values fall back to `Pending`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim() {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "blocked" => Self::Blocked,
            other => {
                warn!(event_name = "memory.task_status.invalid", status = other, "invalid task status, defaulting to pending");
                Self::Pending
            }
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl BlockerSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Case-insensitive; unknown values fall back to `Medium`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "critical" => Self::Critical,
            other => {
                warn!(event_name = "memory.blocker_severity.invalid", severity = other, "invalid blocker severity, defaulting to medium");
                Self::Medium
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assigned_at: DateTime<Utc>,
}

impl TaskInfo {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            assigned_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerInfo {
    pub description: String,
    pub severity: BlockerSeverity,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingState {
    pub current_task: Option<TaskInfo>,
    pub context: Vec<String>,
    pub next_steps: Vec<String>,
    pub blockers: Vec<BlockerInfo>,
    pub handoff_notes: String,
    pub session_history: Vec<SessionEntry>,
    pub files_modified: Vec<String>,
    pub decisions_made: Vec<String>,
}

impl WorkingState {
    pub fn has_active_task(&self) -> bool {
        self.current_task.as_ref().is_some_and(|task| task.status != TaskStatus::Completed)
    }

    pub fn has_blockers(&self) -> bool {
        !self.blockers.is_empty()
    }

    pub fn critical_blockers(&self) -> Vec<&BlockerInfo> {
        self.blockers.iter().filter(|blocker| blocker.severity == BlockerSeverity::Critical).collect()
    }
}

/// File-backed working state for one agent. Every mutating call saves.
#[derive(Debug)]
pub struct WorkingMemory {
    agent_name: String,
    working_file: PathBuf,
    state: Option<WorkingState>,
}

impl WorkingMemory {
    pub fn new(agent_name: impl Into<String>, memory_dir: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let memory_dir = memory_dir.as_ref();
        fs::create_dir_all(memory_dir)
            .map_err(|source| MemoryError::Io { path: memory_dir.to_path_buf(), source })?;

        let agent_name = agent_name.into();
        let working_file = memory_dir.join(WORKING_FILE);
        info!(
            event_name = "memory.initialized",
            agent = %agent_name,
            path = %working_file.display(),
            "working memory initialized"
        );
        Ok(Self { agent_name, working_file, state: None })
    }

    pub fn working_file(&self) -> &Path {
        &self.working_file
    }

    /// Reads `WORKING.md`; a missing file yields an empty state.
    pub fn load(&mut self) -> Result<&WorkingState, MemoryError> {
        let state = if self.working_file.exists() {
            let content = fs::read_to_string(&self.working_file)
                .map_err(|source| MemoryError::Io { path: self.working_file.clone(), source })?;
            parse_working_state(&content)?
        } else {
            info!(event_name = "memory.empty", agent = %self.agent_name, "no working memory file, starting empty");
            WorkingState::default()
        };
        Ok(&*self.state.insert(state))
    }

    pub fn save(&mut self, state: WorkingState) -> Result<(), MemoryError> {
        fs::write(&self.working_file, render_working_state(&state))
            .map_err(|source| MemoryError::Io { path: self.working_file.clone(), source })?;
        debug!(event_name = "memory.saved", agent = %self.agent_name, "saved working state");
        self.state = Some(state);
        Ok(())
    }

    pub fn state(&mut self) -> Result<&WorkingState, MemoryError> {
        if self.state.is_none() {
            self.load()?;
        }
        Ok(&*self.state.get_or_insert_with(WorkingState::default))
    }

    pub fn set_task(&mut self, title: &str, description: &str) -> Result<(), MemoryError> {
        self.update(|state| {
            state.current_task = Some(TaskInfo::new(title, description));
            true
        })
    }

    pub fn complete_task(&mut self) -> Result<(), MemoryError> {
        let agent_name = self.agent_name.clone();
        self.update(|state| match state.current_task.as_mut() {
            Some(task) => {
                task.status = TaskStatus::Completed;
                true
            }
            None => {
                warn!(event_name = "memory.complete_without_task", agent = %agent_name, "no task to complete");
                false
            }
        })
    }

    /// Adds a blocker and marks an unfinished task as blocked.
    pub fn add_blocker(&mut self, description: &str, severity: BlockerSeverity) -> Result<(), MemoryError> {
        self.update(|state| {
            state.blockers.push(BlockerInfo {
                description: description.to_string(),
                severity,
                created_at: Utc::now(),
            });
            if let Some(task) = state.current_task.as_mut() {
                if task.status != TaskStatus::Completed {
                    task.status = TaskStatus::Blocked;
                }
            }
            true
        })
    }

    pub fn clear_blockers(&mut self) -> Result<(), MemoryError> {
        self.update(|state| {
            state.blockers.clear();
            if let Some(task) = state.current_task.as_mut() {
                if task.status == TaskStatus::Blocked {
                    task.status = TaskStatus::InProgress;
                }
            }
            true
        })
    }

    pub fn update_session(&mut self, action: &str, outcome: &str) -> Result<(), MemoryError> {
        self.update(|state| {
            state.session_history.push(SessionEntry {
                timestamp: Utc::now(),
                action: action.to_string(),
                outcome: outcome.to_string(),
            });
            true
        })
    }

    pub fn add_context(&mut self, item: &str) -> Result<(), MemoryError> {
        self.update(|state| push_unique(&mut state.context, item))
    }

    pub fn add_next_step(&mut self, step: &str) -> Result<(), MemoryError> {
        self.update(|state| push_unique(&mut state.next_steps, step))
    }

    pub fn add_file_modified(&mut self, path: &str) -> Result<(), MemoryError> {
        self.update(|state| push_unique(&mut state.files_modified, path))
    }

    pub fn add_decision(&mut self, decision: &str) -> Result<(), MemoryError> {
        self.update(|state| push_unique(&mut state.decisions_made, decision))
    }

    fn update(&mut self, change: impl FnOnce(&mut WorkingState) -> bool) -> Result<(), MemoryError> {
        let mut state = self.state()?.clone();
        if change(&mut state) {
            self.save(state)?;
        }
        Ok(())
    }
}

fn push_unique(items: &mut Vec<String>, item: &str) -> bool {
    if items.iter().any(|existing| existing == item) {
        return false;
    }
    items.push(item.to_string());
    true
}
