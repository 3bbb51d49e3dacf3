//! Contract with the backend that owns sessions, checkpoints, snapshots and MCP
//! servers. Nothing here talks to a transport; implementors do.

use crate::diff::{CheckpointDiff, SnapshotDiff};
use crate::models::{Checkpoint, McpServer, ServerStatus, Session, Snapshot};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListSessions,
    ListCheckpoints,
    ListSnapshots,
    CheckpointDiff,
    CompareSnapshots,
    CreateCheckpoint,
    RestoreCheckpoint,
    DeleteCheckpoint,
    CreateSnapshot,
    DeleteSnapshot,
    ListServers,
    ServerStatuses,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::ListSessions => "load sessions",
            Operation::ListCheckpoints => "load timeline",
            Operation::ListSnapshots => "load snapshots",
            Operation::CheckpointDiff => "get checkpoint diff",
            Operation::CompareSnapshots => "compare snapshots",
            Operation::CreateCheckpoint => "create checkpoint",
            Operation::RestoreCheckpoint => "restore checkpoint",
            Operation::DeleteCheckpoint => "delete checkpoint",
            Operation::CreateSnapshot => "create snapshot",
            Operation::DeleteSnapshot => "delete snapshot",
            Operation::ListServers => "load servers",
            Operation::ServerStatuses => "load server status",
        };
        f.write_str(s)
    }
}

/// Any transport or server-side failure reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to {operation}: {message}")]
pub struct RemoteOperationError {
    pub operation: Operation,
    pub message: String,
}

impl RemoteOperationError {
    pub fn new(operation: Operation, message: impl Into<String>) -> Self {
        RemoteOperationError {
            operation,
            message: message.into(),
        }
    }
}

pub type ApiResult<T> = Result<T, RemoteOperationError>;

/// Identifies the session a checkpoint or snapshot operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub project_id: String,
    pub project_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckpoint {
    pub context: SessionContext,
    pub message_index: usize,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    pub session_id: String,
    pub project_id: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

pub trait SessionApi {
    fn list_sessions(&self, project_id: &str) -> ApiResult<Vec<Session>>;

    fn list_checkpoints(&self, session_id: &str, project_id: &str) -> ApiResult<Vec<Checkpoint>>;

    fn list_snapshots(&self, session_id: &str, project_id: &str) -> ApiResult<Vec<Snapshot>>;

    fn checkpoint_diff(&self, checkpoint_id: &str) -> ApiResult<CheckpointDiff>;

    fn compare_snapshots(&self, snapshot_a: &str, snapshot_b: &str) -> ApiResult<SnapshotDiff>;

    fn create_checkpoint(&self, request: &NewCheckpoint) -> ApiResult<Checkpoint>;

    fn restore_checkpoint(&self, checkpoint_id: &str, context: &SessionContext) -> ApiResult<()>;

    fn delete_checkpoint(&self, checkpoint_id: &str) -> ApiResult<()>;

    fn create_snapshot(&self, request: &NewSnapshot) -> ApiResult<Snapshot>;

    fn delete_snapshot(&self, snapshot_id: &str) -> ApiResult<()>;

    fn list_servers(&self) -> ApiResult<Vec<McpServer>>;

    fn server_statuses(&self) -> ApiResult<HashMap<String, ServerStatus>>;
}

/// Split comma separated tag input, trimming whitespace and dropping empty entries.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Preset description and tags for one-click snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuickTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
}

pub const QUICK_TEMPLATES: &[QuickTemplate] = &[
    QuickTemplate {
        id: "milestone",
        name: "Milestone",
        description: "Feature complete or a project phase reached",
        tags: &["milestone", "feature"],
    },
    QuickTemplate {
        id: "backup",
        name: "Backup",
        description: "Safety backup before a major change",
        tags: &["backup", "safety"],
    },
    QuickTemplate {
        id: "experiment",
        name: "Experiment",
        description: "Record point before trying a new idea",
        tags: &["experiment", "test"],
    },
    QuickTemplate {
        id: "bugfix",
        name: "Bug fix",
        description: "State after a bug fix landed",
        tags: &["bugfix", "fix"],
    },
];

impl QuickTemplate {
    pub fn find(id: &str) -> Option<&'static QuickTemplate> {
        QUICK_TEMPLATES.iter().find(|t| t.id == id)
    }

    /// Snapshot request from this template. Non-empty custom text replaces the
    /// template's description or tags.
    pub fn request(
        &self,
        session_id: &str,
        project_id: &str,
        custom_description: &str,
        custom_tags: &str,
    ) -> NewSnapshot {
        let tags = if custom_tags.trim().is_empty() {
            self.tags.iter().map(|t| t.to_string()).collect()
        } else {
            parse_tags(custom_tags)
        };
        NewSnapshot {
            session_id: session_id.to_string(),
            project_id: project_id.to_string(),
            description: Some(
                non_empty(custom_description).unwrap_or_else(|| self.description.to_string()),
            ),
            tags,
        }
    }
}

/// Build a checkpoint request from free-text dialog input.
pub fn checkpoint_request(
    context: &SessionContext,
    message_index: usize,
    description: &str,
    tags_input: &str,
) -> NewCheckpoint {
    NewCheckpoint {
        context: context.clone(),
        message_index,
        description: non_empty(description),
        tags: parse_tags(tags_input),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> SessionContext {
        SessionContext {
            session_id: "sess-1".to_string(),
            project_id: "proj-1".to_string(),
            project_path: "/home/user/project".to_string(),
        }
    }

    #[test]
    fn parse_tags_trims_and_drops_empty() {
        assert_eq!(parse_tags("a, b,,c , "), vec!["a", "b", "c"]);
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ,").is_empty());
    }

    #[test]
    fn error_message_names_operation() {
        let err = RemoteOperationError::new(Operation::ListCheckpoints, "connection refused");
        assert_eq!(err.to_string(), "Failed to load timeline: connection refused");
    }

    #[test]
    fn checkpoint_request_from_dialog_input() {
        let req = checkpoint_request(&context(), 12, "  ", "wip, refactor");
        assert_eq!(req.description, None);
        assert_eq!(req.tags, vec!["wip", "refactor"]);
        assert_eq!(req.message_index, 12);

        let req = checkpoint_request(&context(), 0, "before migration", "");
        assert_eq!(req.description.as_deref(), Some("before migration"));
        assert!(req.tags.is_empty());
    }

    #[test]
    fn quick_template_defaults() {
        let tpl = QuickTemplate::find("backup").unwrap();
        let req = tpl.request("s", "p", "", "");
        assert_eq!(req.description.as_deref(), Some(tpl.description));
        assert_eq!(req.tags, vec!["backup", "safety"]);
    }

    #[test]
    fn quick_template_custom_overrides() {
        let tpl = QuickTemplate::find("experiment").unwrap();
        let req = tpl.request("s", "p", "try new parser", "parser, spike");
        assert_eq!(req.description.as_deref(), Some("try new parser"));
        assert_eq!(req.tags, vec!["parser", "spike"]);
    }

    #[test]
    fn quick_template_unknown_id() {
        assert!(QuickTemplate::find("nope").is_none());
        assert_eq!(QUICK_TEMPLATES.len(), 4);
    }
}
