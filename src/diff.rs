//! Shapes diffs handed back by the backend into what the checkpoint and snapshot
//! views show: per-kind file groups, totals and one-line summaries.

use serde::{Deserialize, Serialize};

/// Paths changed between a checkpoint and its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointDiff {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl CheckpointDiff {
    pub fn counts(&self) -> DiffCounts {
        DiffCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            modified: self.modified.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn summary_line(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }
        let c = self.counts();
        format!("+{} -{} ~{}", c.added, c.removed, c.modified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeKind {
    Added,
    Removed,
    Modified,
    Renamed,
}

impl FileChangeKind {
    pub fn label(&self) -> &'static str {
        match self {
            FileChangeKind::Added => "Added",
            FileChangeKind::Removed => "Removed",
            FileChangeKind::Modified => "Modified",
            FileChangeKind::Renamed => "Renamed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Added,
    Removed,
    Unchanged,
    Modified,
}

impl DiffLineKind {
    pub fn prefix(&self) -> char {
        match self {
            DiffLineKind::Added => '+',
            DiffLineKind::Removed => '-',
            DiffLineKind::Modified => '~',
            DiffLineKind::Unchanged => ' ',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: DiffLineKind,
    pub content: String,
    #[serde(default)]
    pub old_line_number: Option<u32>,
    #[serde(default)]
    pub new_line_number: Option<u32>,
}

impl DiffLine {
    /// Prefix character followed by the line content.
    pub fn render(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileChangeKind,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub lines: Vec<DiffLine>,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
    #[serde(default)]
    pub is_binary: bool,
    #[serde(default)]
    pub language: Option<String>,
}

impl FileDiff {
    /// Lines to display; unchanged context is hidden unless `show_unchanged`.
    pub fn visible_lines(&self, show_unchanged: bool) -> impl Iterator<Item = &DiffLine> {
        self.lines
            .iter()
            .filter(move |l| show_unchanged || l.kind != DiffLineKind::Unchanged)
    }

    /// Previous path, only when the file actually moved.
    pub fn renamed_from(&self) -> Option<&str> {
        self.old_path.as_deref().filter(|old| *old != self.path)
    }

    /// "+3 -1", omitting a side that is zero.
    pub fn stat_label(&self) -> String {
        let mut parts = Vec::new();
        if self.additions > 0 {
            parts.push(format!("+{}", self.additions));
        }
        if self.deletions > 0 {
            parts.push(format!("-{}", self.deletions));
        }
        parts.join(" ")
    }

    pub fn extension(&self) -> Option<String> {
        let name = self.path.rsplit('/').next()?;
        let (_, ext) = name.rsplit_once('.')?;
        Some(ext.to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub additions: u32,
    pub deletions: u32,
    pub changes: u32,
    pub files_changed: u32,
}

impl DiffSummary {
    /// Totals recomputed from the per-file entries. `changes` is additions plus deletions.
    /// Counts saturate at `u32::MAX`.
    pub fn from_files(files: &[FileDiff]) -> DiffSummary {
        let additions = files.iter().fold(0u32, |n, f| n.saturating_add(f.additions));
        let deletions = files.iter().fold(0u32, |n, f| n.saturating_add(f.deletions));
        DiffSummary {
            additions,
            deletions,
            changes: additions.saturating_add(deletions),
            files_changed: u32::try_from(files.len()).unwrap_or(u32::MAX),
        }
    }

    pub fn summary_line(&self) -> String {
        let noun = if self.files_changed == 1 { "file" } else { "files" };
        format!(
            "{} {} changed, +{} -{}",
            self.files_changed, noun, self.additions, self.deletions
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffMetadata {
    /// Seconds between the two snapshots.
    pub timespan_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub snapshot_a: String,
    pub snapshot_b: String,
    #[serde(default)]
    pub files: Vec<FileDiff>,
    #[serde(default)]
    pub summary: DiffSummary,
    #[serde(default)]
    pub metadata: Option<DiffMetadata>,
}

impl SnapshotDiff {
    pub fn groups(&self) -> DiffGroups<'_> {
        group_files(&self.files)
    }

    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.path == path)
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiffGroups<'a> {
    pub added: Vec<&'a FileDiff>,
    pub removed: Vec<&'a FileDiff>,
    pub modified: Vec<&'a FileDiff>,
    pub renamed: Vec<&'a FileDiff>,
}

impl<'a> DiffGroups<'a> {
    /// Non-empty sections in display order.
    pub fn sections(&self) -> Vec<(FileChangeKind, &[&'a FileDiff])> {
        [
            (FileChangeKind::Added, self.added.as_slice()),
            (FileChangeKind::Removed, self.removed.as_slice()),
            (FileChangeKind::Modified, self.modified.as_slice()),
            (FileChangeKind::Renamed, self.renamed.as_slice()),
        ]
        .into_iter()
        .filter(|(_, files)| !files.is_empty())
        .collect()
    }
}

/// Bucket files by change kind, keeping input order inside each bucket.
pub fn group_files(files: &[FileDiff]) -> DiffGroups<'_> {
    let mut groups = DiffGroups::default();
    for file in files {
        match file.kind {
            FileChangeKind::Added => groups.added.push(file),
            FileChangeKind::Removed => groups.removed.push(file),
            FileChangeKind::Modified => groups.modified.push(file),
            FileChangeKind::Renamed => groups.renamed.push(file),
        }
    }
    groups
}
