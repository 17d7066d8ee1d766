use chrono::{DateTime, SecondsFormat, Utc};

use crate::memory::{
    BlockerInfo, BlockerSeverity, MemoryError, SessionEntry, TaskInfo, TaskStatus, WorkingState,
};

const TITLE: &str = "**Title**:";
const STATUS: &str = "**Status**:";
const ASSIGNED: &str = "**Assigned**:";
const DESCRIPTION: &str = "**Description**:";
const ACTION: &str = "**Action**:";
const OUTCOME: &str = "**Outcome**:";
const CREATED: &str = "*Created:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    CurrentTask,
    Context,
    NextSteps,
    Blockers,
    HandoffNotes,
    FilesModified,
    DecisionsMade,
    SessionHistory,
    Unknown,
}

impl Section {
    fn from_heading(heading: &str) -> Self {
        match heading {
            "Current Task" => Self::CurrentTask,
            "Context" => Self::Context,
            "Next Steps" => Self::NextSteps,
            "Blockers" => Self::Blockers,
            "Handoff Notes" => Self::HandoffNotes,
            "Files Modified" => Self::FilesModified,
            "Decisions Made" => Self::DecisionsMade,
            "Session History" => Self::SessionHistory,
            _ => Self::Unknown,
        }
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MemoryError> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|source| MemoryError::InvalidTimestamp { value: value.to_string(), source })
}

/// Renders the human-editable `WORKING.md` document.
pub fn render_working_state(state: &WorkingState) -> String {
    let mut lines: Vec<String> = vec!["# Agent Working Memory".into(), String::new()];

    section(&mut lines, "Current Task");
    match &state.current_task {
        Some(task) => {
            paragraph(&mut lines, format!("{TITLE} {}", task.title));
            paragraph(&mut lines, format!("{STATUS} {}", task.status.as_str()));
            paragraph(&mut lines, format!("{ASSIGNED} {}", format_timestamp(&task.assigned_at)));
            if !task.description.is_empty() {
                paragraph(&mut lines, format!("{DESCRIPTION} {}", task.description));
            }
        }
        None => paragraph(&mut lines, "No active task.".into()),
    }

    section(&mut lines, "Context");
    list(&mut lines, &state.context, |item| format!("- {item}"), "No context items.");

    section(&mut lines, "Next Steps");
    if state.next_steps.is_empty() {
        paragraph(&mut lines, "No next steps defined.".into());
    } else {
        lines.extend(state.next_steps.iter().enumerate().map(|(index, step)| format!("{}. {step}", index + 1)));
        lines.push(String::new());
    }

    section(&mut lines, "Blockers");
    if state.blockers.is_empty() {
        paragraph(&mut lines, "No blockers.".into());
    }
    for blocker in &state.blockers {
        paragraph(
            &mut lines,
            format!("### {}: {}", blocker.severity.as_str().to_uppercase(), blocker.description),
        );
        paragraph(&mut lines, format!("{CREATED} {}*", format_timestamp(&blocker.created_at)));
    }

    section(&mut lines, "Handoff Notes");
    if state.handoff_notes.is_empty() {
        paragraph(&mut lines, "No handoff notes.".into());
    } else {
        paragraph(&mut lines, state.handoff_notes.clone());
    }

    section(&mut lines, "Files Modified");
    list(&mut lines, &state.files_modified, |path| format!("- `{path}`"), "No files modified.");

    section(&mut lines, "Decisions Made");
    list(&mut lines, &state.decisions_made, |decision| format!("- {decision}"), "No decisions recorded.");

    section(&mut lines, "Session History");
    if state.session_history.is_empty() {
        paragraph(&mut lines, "No session history.".into());
    }
    for entry in &state.session_history {
        paragraph(&mut lines, format!("### {}", format_timestamp(&entry.timestamp)));
        paragraph(&mut lines, format!("{ACTION} {}", entry.action));
        paragraph(&mut lines, format!("{OUTCOME} {}", entry.outcome));
    }

    lines.join("\n")
}

fn section(lines: &mut Vec<String>, heading: &str) {
    lines.push(format!("## {heading}"));
    lines.push(String::new());
}

fn paragraph(lines: &mut Vec<String>, text: String) {
    lines.push(text);
    lines.push(String::new());
}

fn list(lines: &mut Vec<String>, items: &[String], render: impl Fn(&str) -> String, empty: &str) {
    if items.is_empty() {
        paragraph(lines, empty.to_string());
        return;
    }
    lines.extend(items.iter().map(|item| render(item)));
    lines.push(String::new());
}

/// Parses a document produced by [`render_working_state`] (or edited by
/// hand in the same layout). Unknown sections and stray lines are ignored.
pub fn parse_working_state(markdown: &str) -> Result<WorkingState, MemoryError> {
    let mut state = WorkingState::default();
    let mut current = Section::Unknown;
    let mut pending_blocker: Option<(BlockerSeverity, String)> = None;
    let mut pending_session: Option<(DateTime<Utc>, Option<String>)> = None;

    for raw in markdown.lines() {
        let line = raw.trim();

        if let Some(heading) = line.strip_prefix("## ") {
            current = Section::from_heading(heading.trim());
            continue;
        }

        match current {
            Section::CurrentTask => parse_task_line(&mut state, line)?,
            Section::Context => {
                if let Some(item) = line.strip_prefix("- ") {
                    state.context.push(item.to_string());
                }
            }
            Section::NextSteps => {
                if line.starts_with(|c: char| c.is_ascii_digit()) {
                    if let Some((_, step)) = line.split_once(". ") {
                        state.next_steps.push(step.to_string());
                    }
                }
            }
            Section::Blockers => {
                if let Some(header) = line.strip_prefix("### ") {
                    if let Some((severity, description)) = header.split_once(':') {
                        pending_blocker =
                            Some((BlockerSeverity::parse_lenient(severity), description.trim().to_string()));
                    }
                } else if let Some(created) = line.strip_prefix(CREATED) {
                    if let Some((severity, description)) = pending_blocker.take() {
                        state.blockers.push(BlockerInfo {
                            description,
                            severity,
                            created_at: parse_timestamp(created.trim_end_matches('*'))?,
                        });
                    }
                }
            }
            Section::HandoffNotes => {
                if !line.is_empty() && !line.starts_with('#') && line != "No handoff notes." {
                    if !state.handoff_notes.is_empty() {
                        state.handoff_notes.push('\n');
                    }
                    state.handoff_notes.push_str(line);
                }
            }
            Section::FilesModified => {
                if let Some(path) = line.strip_prefix("- `").and_then(|rest| rest.strip_suffix('`')) {
                    state.files_modified.push(path.to_string());
                }
            }
            Section::DecisionsMade => {
                if let Some(decision) = line.strip_prefix("- ") {
                    state.decisions_made.push(decision.to_string());
                }
            }
            Section::SessionHistory => {
                if let Some(timestamp) = line.strip_prefix("### ") {
                    flush_session(&mut state, pending_session.take());
                    pending_session = Some((parse_timestamp(timestamp)?, None));
                } else if let Some(action) = line.strip_prefix(ACTION) {
                    if let Some((_, slot)) = pending_session.as_mut() {
                        *slot = Some(action.trim().to_string());
                    }
                } else if let Some(outcome) = line.strip_prefix(OUTCOME) {
                    if let Some((timestamp, Some(action))) = pending_session.take() {
                        state.session_history.push(SessionEntry {
                            timestamp,
                            action,
                            outcome: outcome.trim().to_string(),
                        });
                    }
                }
            }
            Section::Unknown => {}
        }
    }

    flush_session(&mut state, pending_session);
    Ok(state)
}

fn parse_task_line(state: &mut WorkingState, line: &str) -> Result<(), MemoryError> {
    if let Some(title) = line.strip_prefix(TITLE) {
        state.current_task = Some(TaskInfo::new(title.trim(), ""));
        return Ok(());
    }

    let Some(task) = state.current_task.as_mut() else {
        return Ok(());
    };
    if let Some(status) = line.strip_prefix(STATUS) {
        task.status = TaskStatus::parse_lenient(status);
    } else if let Some(assigned) = line.strip_prefix(ASSIGNED) {
        task.assigned_at = parse_timestamp(assigned)?;
    } else if let Some(description) = line.strip_prefix(DESCRIPTION) {
        task.description = description.trim().to_string();
    }
    Ok(())
}

fn flush_session(state: &mut WorkingState, pending: Option<(DateTime<Utc>, Option<String>)>) {
    if let Some((timestamp, Some(action))) = pending {
        state.session_history.push(SessionEntry { timestamp, action, outcome: String::new() });
    }
}
