//! View state for the session, timeline, snapshot and server screens. Each struct
//! owns its data, criteria and selection explicitly and recomputes derived lists on
//! demand; nothing lives in globals.

use crate::api::{self, ApiResult, NewSnapshot, QuickTemplate, SessionApi, SessionContext};
use crate::config::ViewConfig;
use crate::diff::{CheckpointDiff, SnapshotDiff};
use crate::filter::{self, FilterCriteria, ServerEntry, SortKey};
use crate::models::{
    Checkpoint, McpServer, ServerState, ServerStatus, Session, Snapshot, truncate_label,
};
use crate::timeline::{ExpansionSet, TimelineNode, ViewMode, build_forest_with, visible_nodes};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

pub const AUTO_SAVE_DESCRIPTION: &str = "Auto-save before restore";

/// Token handed out when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchToken(u64);

/// Counts fetches so a response that arrives after a newer request was issued can
/// be recognised and dropped.
#[derive(Debug, Default)]
pub struct FetchGeneration {
    latest: u64,
}

impl FetchGeneration {
    pub fn begin(&mut self) -> FetchToken {
        self.latest += 1;
        FetchToken(self.latest)
    }

    pub fn is_current(&self, token: FetchToken) -> bool {
        token.0 == self.latest
    }
}

/// Loading flag and dismissible error message shared by every view.
#[derive(Debug, Default)]
pub struct Feedback {
    pub loading: bool,
    error: Option<String>,
}

impl Feedback {
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Keep the value on success; on failure remember the message and return `None`.
    fn record<T>(&mut self, result: ApiResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(operation = %err.operation, message = %err.message, "backend call failed");
                self.error = Some(err.to_string());
                None
            }
        }
    }
}

/// Apply a fetch result unless a newer fetch has started since `token` was issued.
fn finish_fetch<T>(
    generation: &FetchGeneration,
    feedback: &mut Feedback,
    token: FetchToken,
    result: ApiResult<T>,
) -> Option<T> {
    if !generation.is_current(token) {
        warn!(token = token.0, "discarding stale response");
        return None;
    }
    feedback.loading = false;
    feedback.record(result)
}

// ------------------------------------------------------------------
// timeline
// ------------------------------------------------------------------

/// One displayable line of the checkpoint timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRow {
    pub id: String,
    pub depth: usize,
    pub label: String,
    pub has_children: bool,
    pub expanded: bool,
}

pub struct TimelineView {
    pub context: SessionContext,
    pub checkpoints: Vec<Checkpoint>,
    pub expanded: ExpansionSet,
    pub view_mode: ViewMode,
    pub selected: Option<String>,
    pub diff: Option<(String, CheckpointDiff)>,
    pub label_width: usize,
    pub feedback: Feedback,
    generation: FetchGeneration,
}

impl TimelineView {
    pub fn new(context: SessionContext, config: &ViewConfig) -> TimelineView {
        TimelineView {
            context,
            checkpoints: Vec::new(),
            expanded: ExpansionSet::new(),
            view_mode: config.view_mode,
            selected: None,
            diff: None,
            label_width: config.label_width,
            feedback: Feedback::default(),
            generation: FetchGeneration::default(),
        }
    }

    pub fn begin_load(&mut self) -> FetchToken {
        self.feedback.loading = true;
        self.feedback.dismiss_error();
        self.generation.begin()
    }

    /// Returns whether the response was applied.
    pub fn finish_load(&mut self, token: FetchToken, result: ApiResult<Vec<Checkpoint>>) -> bool {
        match finish_fetch(&self.generation, &mut self.feedback, token, result) {
            Some(checkpoints) => {
                debug!(count = checkpoints.len(), "timeline loaded");
                self.checkpoints = checkpoints;
                true
            }
            None => false,
        }
    }

    pub fn load<A: SessionApi + ?Sized>(&mut self, api: &A) {
        let token = self.begin_load();
        let result = api.list_checkpoints(&self.context.session_id, &self.context.project_id);
        self.finish_load(token, result);
    }

    pub fn forest(&self) -> Vec<TimelineNode<'_>> {
        build_forest_with(&self.checkpoints, &self.expanded)
    }

    pub fn toggle_node(&mut self, id: &str) {
        self.expanded = self.expanded.toggle(id);
    }

    pub fn expand_all(&mut self) {
        let expanded = ExpansionSet::expand_all(&self.forest());
        self.expanded = expanded;
    }

    pub fn collapse_all(&mut self) {
        self.expanded = ExpansionSet::new();
    }

    pub fn toggle_view_mode(&mut self) {
        self.view_mode = self.view_mode.toggle();
    }

    /// Rows for the current view mode. Tree mode shows children only under expanded
    /// nodes; linear mode lists every checkpoint flat, in load order.
    pub fn rows(&self) -> Vec<TimelineRow> {
        match self.view_mode {
            ViewMode::Tree => {
                let forest = self.forest();
                visible_nodes(&forest)
                    .into_iter()
                    .map(|node| TimelineRow {
                        id: node.checkpoint.id.clone(),
                        depth: node.depth,
                        label: truncate_label(&node.checkpoint.label(), self.label_width),
                        has_children: node.has_children(),
                        expanded: node.expanded,
                    })
                    .collect()
            }
            ViewMode::Linear => self
                .checkpoints
                .iter()
                .map(|cp| TimelineRow {
                    id: cp.id.clone(),
                    depth: 0,
                    label: truncate_label(&cp.label(), self.label_width),
                    has_children: false,
                    expanded: false,
                })
                .collect(),
        }
    }

    pub fn checkpoint(&self, id: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|cp| cp.id == id)
    }

    /// Create a checkpoint from dialog input and reload the timeline.
    pub fn create_checkpoint<A: SessionApi + ?Sized>(
        &mut self,
        api: &A,
        message_index: usize,
        description: &str,
        tags_input: &str,
    ) -> Option<Checkpoint> {
        let request = api::checkpoint_request(&self.context, message_index, description, tags_input);
        let created = self.feedback.record(api.create_checkpoint(&request))?;
        self.load(api);
        Some(created)
    }

    /// Save the current state as a new checkpoint, then restore `id`. Nothing is
    /// restored if the auto-save fails.
    pub fn restore<A: SessionApi + ?Sized>(
        &mut self,
        api: &A,
        id: &str,
        message_index: usize,
    ) -> bool {
        let auto_save = api::checkpoint_request(&self.context, message_index, AUTO_SAVE_DESCRIPTION, "");
        if self.feedback.record(api.create_checkpoint(&auto_save)).is_none() {
            return false;
        }
        if self
            .feedback
            .record(api.restore_checkpoint(id, &self.context))
            .is_none()
        {
            // reloading clears the error; the restore failure must outlive it
            let failure = self.feedback.error.take();
            self.load(api);
            self.feedback.error = failure;
            return false;
        }
        self.load(api);
        self.selected = Some(id.to_string());
        true
    }

    pub fn delete<A: SessionApi + ?Sized>(&mut self, api: &A, id: &str) -> bool {
        if self.feedback.record(api.delete_checkpoint(id)).is_none() {
            return false;
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.load(api);
        true
    }

    pub fn view_diff<A: SessionApi + ?Sized>(&mut self, api: &A, id: &str) -> Option<&CheckpointDiff> {
        let diff = self.feedback.record(api.checkpoint_diff(id))?;
        self.selected = Some(id.to_string());
        self.diff = Some((id.to_string(), diff));
        self.diff.as_ref().map(|(_, d)| d)
    }

    pub fn close_diff(&mut self) {
        self.diff = None;
    }
}

// ------------------------------------------------------------------
// sessions
// ------------------------------------------------------------------

pub struct SessionBrowser {
    pub project_id: String,
    pub sessions: Vec<Session>,
    pub criteria: FilterCriteria<Session>,
    pub selected: ExpansionSet,
    pub feedback: Feedback,
    generation: FetchGeneration,
}

impl SessionBrowser {
    pub fn new(project_id: &str, config: &ViewConfig) -> SessionBrowser {
        SessionBrowser {
            project_id: project_id.to_string(),
            sessions: Vec::new(),
            criteria: config.criteria(),
            selected: ExpansionSet::new(),
            feedback: Feedback::default(),
            generation: FetchGeneration::default(),
        }
    }

    pub fn begin_load(&mut self) -> FetchToken {
        self.feedback.loading = true;
        self.feedback.dismiss_error();
        self.generation.begin()
    }

    pub fn finish_load(&mut self, token: FetchToken, result: ApiResult<Vec<Session>>) -> bool {
        match finish_fetch(&self.generation, &mut self.feedback, token, result) {
            Some(sessions) => {
                self.sessions = sessions;
                true
            }
            None => false,
        }
    }

    pub fn load<A: SessionApi + ?Sized>(&mut self, api: &A) {
        let token = self.begin_load();
        let result = api.list_sessions(&self.project_id);
        self.finish_load(token, result);
    }

    pub fn filtered(&self) -> Vec<Session> {
        filter::apply(&self.sessions, &self.criteria)
    }

    pub fn filtered_at(&self, now: DateTime<Utc>) -> Vec<Session> {
        filter::apply_at(&self.sessions, &self.criteria, now)
    }

    pub fn set_search(&mut self, text: &str) {
        self.criteria.search_text = text.to_string();
    }

    pub fn cycle_date_range(&mut self) {
        self.criteria.date_range = self.criteria.date_range.next();
    }

    pub fn cycle_date_range_back(&mut self) {
        self.criteria.date_range = self.criteria.date_range.prev();
    }

    pub fn set_sort_key(&mut self, key: SortKey) {
        self.criteria.sort_key = key;
    }

    pub fn toggle_sort_order(&mut self) {
        self.criteria.sort_order = self.criteria.sort_order.toggle();
    }

    pub fn toggle_selection(&mut self, id: &str) {
        self.selected = self.selected.toggle(id);
    }

    /// Select every session currently shown, or clear the selection when all of
    /// them already are.
    pub fn select_all_at(&mut self, now: DateTime<Utc>) {
        let shown = self.filtered_at(now);
        if !shown.is_empty() && shown.iter().all(|s| self.selected.contains(&s.id)) {
            self.selected = ExpansionSet::new();
        } else {
            self.selected = shown.into_iter().map(|s| s.id).collect();
        }
    }

    pub fn select_all(&mut self) {
        self.select_all_at(Utc::now());
    }
}

// ------------------------------------------------------------------
// snapshots
// ------------------------------------------------------------------

pub struct SnapshotBrowser {
    pub session_id: String,
    pub project_id: String,
    pub snapshots: Vec<Snapshot>,
    pub criteria: FilterCriteria<Snapshot>,
    pub compared: Option<(String, String)>,
    pub diff: Option<SnapshotDiff>,
    pub feedback: Feedback,
    generation: FetchGeneration,
}

impl SnapshotBrowser {
    pub fn new(session_id: &str, project_id: &str, config: &ViewConfig) -> SnapshotBrowser {
        SnapshotBrowser {
            session_id: session_id.to_string(),
            project_id: project_id.to_string(),
            snapshots: Vec::new(),
            criteria: config.criteria(),
            compared: None,
            diff: None,
            feedback: Feedback::default(),
            generation: FetchGeneration::default(),
        }
    }

    pub fn begin_load(&mut self) -> FetchToken {
        self.feedback.loading = true;
        self.feedback.dismiss_error();
        self.generation.begin()
    }

    pub fn finish_load(&mut self, token: FetchToken, result: ApiResult<Vec<Snapshot>>) -> bool {
        match finish_fetch(&self.generation, &mut self.feedback, token, result) {
            Some(snapshots) => {
                self.snapshots = snapshots;
                true
            }
            None => false,
        }
    }

    pub fn load<A: SessionApi + ?Sized>(&mut self, api: &A) {
        let token = self.begin_load();
        let result = api.list_snapshots(&self.session_id, &self.project_id);
        self.finish_load(token, result);
    }

    pub fn filtered(&self) -> Vec<Snapshot> {
        filter::apply(&self.snapshots, &self.criteria)
    }

    pub fn all_tags(&self) -> Vec<String> {
        filter::unique_tags(&self.snapshots)
    }

    pub fn set_tag_filter(&mut self, tag: Option<&str>) {
        self.criteria.tag = tag.map(str::to_string);
    }

    fn create<A: SessionApi + ?Sized>(&mut self, api: &A, request: NewSnapshot) -> Option<Snapshot> {
        let created = self.feedback.record(api.create_snapshot(&request))?;
        self.load(api);
        Some(created)
    }

    pub fn create_snapshot<A: SessionApi + ?Sized>(
        &mut self,
        api: &A,
        description: &str,
        tags_input: &str,
    ) -> Option<Snapshot> {
        let description = description.trim();
        let request = NewSnapshot {
            session_id: self.session_id.clone(),
            project_id: self.project_id.clone(),
            description: (!description.is_empty()).then(|| description.to_string()),
            tags: api::parse_tags(tags_input),
        };
        self.create(api, request)
    }

    /// Snapshot from a preset; non-empty custom text overrides its description or tags.
    pub fn quick_snapshot<A: SessionApi + ?Sized>(
        &mut self,
        api: &A,
        template: &QuickTemplate,
        custom_description: &str,
        custom_tags: &str,
    ) -> Option<Snapshot> {
        let request = template.request(
            &self.session_id,
            &self.project_id,
            custom_description,
            custom_tags,
        );
        self.create(api, request)
    }

    pub fn compare<A: SessionApi + ?Sized>(&mut self, api: &A, a: &str, b: &str) -> Option<&SnapshotDiff> {
        let diff = self.feedback.record(api.compare_snapshots(a, b))?;
        self.compared = Some((a.to_string(), b.to_string()));
        self.diff = Some(diff);
        self.diff.as_ref()
    }

    pub fn close_diff(&mut self) {
        self.compared = None;
        self.diff = None;
    }

    pub fn delete<A: SessionApi + ?Sized>(&mut self, api: &A, id: &str) -> bool {
        if self.feedback.record(api.delete_snapshot(id)).is_none() {
            return false;
        }
        self.load(api);
        true
    }
}

// ------------------------------------------------------------------
// MCP servers
// ------------------------------------------------------------------

pub struct ServerBrowser {
    pub entries: Vec<ServerEntry>,
    pub criteria: FilterCriteria<ServerEntry>,
    pub feedback: Feedback,
    generation: FetchGeneration,
}

impl ServerBrowser {
    pub fn new() -> ServerBrowser {
        ServerBrowser {
            entries: Vec::new(),
            criteria: FilterCriteria {
                sort_key: SortKey::Name,
                sort_order: filter::SortOrder::Ascending,
                ..FilterCriteria::default()
            },
            feedback: Feedback::default(),
            generation: FetchGeneration::default(),
        }
    }

    pub fn begin_load(&mut self) -> FetchToken {
        self.feedback.loading = true;
        self.feedback.dismiss_error();
        self.generation.begin()
    }

    /// Apply a server list and status poll issued under `token`. A failed status
    /// poll leaves every server shown as stopped.
    pub fn finish_load(
        &mut self,
        token: FetchToken,
        servers: ApiResult<Vec<McpServer>>,
        statuses: ApiResult<HashMap<String, ServerStatus>>,
    ) -> bool {
        let Some(servers) = finish_fetch(&self.generation, &mut self.feedback, token, servers) else {
            return false;
        };
        let statuses = self.feedback.record(statuses).unwrap_or_default();
        self.entries = ServerEntry::join(&servers, &statuses);
        true
    }

    pub fn load<A: SessionApi + ?Sized>(&mut self, api: &A) {
        let token = self.begin_load();
        let servers = api.list_servers();
        let statuses = api.server_statuses();
        self.finish_load(token, servers, statuses);
    }

    pub fn filtered(&self) -> Vec<ServerEntry> {
        filter::apply(&self.entries, &self.criteria)
    }

    pub fn set_status_filter(&mut self, status: Option<ServerState>) {
        self.criteria.status = status;
    }

    /// Number of servers in each state, over all entries regardless of filters.
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> = ServerState::all_states()
            .iter()
            .map(|s| (s.label(), 0))
            .collect();
        for entry in &self.entries {
            *counts.entry(entry.status.status.label()).or_default() += 1;
        }
        counts
    }
}

impl Default for ServerBrowser {
    fn default() -> Self {
        ServerBrowser::new()
    }
}
