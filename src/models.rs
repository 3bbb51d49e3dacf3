use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use unicode_width::UnicodeWidthChar;

const SHORT_ID_LEN: usize = 8;

/// First eight characters of an id, as shown next to every checkpoint and snapshot.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Truncate `s` so it occupies at most `max_width` terminal columns, appending `...`
/// when anything was cut. Wide characters count as two columns.
pub fn truncate_label(s: &str, max_width: usize) -> String {
    let mut width = 0;
    for (idx, ch) in s.char_indices() {
        let w = ch.width().unwrap_or(0);
        if width + w > max_width {
            return format!("{}...", &s[..idx]);
        }
        width += w;
    }
    s.to_string()
}

/// "3 minutes ago" / "in 2 days" style distance between `t` and `now`.
pub fn relative_time(t: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(t);
    let future = delta < Duration::zero();
    let delta = if future { -delta } else { delta };

    let phrase = if delta.num_minutes() < 1 {
        return "less than a minute ago".to_string();
    } else if delta.num_hours() < 1 {
        plural(delta.num_minutes(), "minute")
    } else if delta.num_days() < 1 {
        plural(delta.num_hours(), "hour")
    } else if delta.num_days() < 30 {
        plural(delta.num_days(), "day")
    } else if delta.num_days() < 365 {
        plural(delta.num_days() / 30, "month")
    } else {
        plural(delta.num_days() / 365, "year")
    };

    if future {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
}

impl Checkpoint {
    /// Description if one was given, otherwise `Checkpoint <short id>`.
    pub fn label(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(d) => d.to_string(),
            None => format!("Checkpoint {}", short_id(&self.id)),
        }
    }

    pub fn timestamp_str(&self) -> String {
        format_timestamp(self.timestamp)
    }

    /// `None` when the count is missing or zero; those cards show no message line.
    pub fn message_count_label(&self) -> Option<String> {
        match self.message_count {
            Some(0) | None => None,
            Some(n) => Some(plural(n.into(), "message")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub message_count: Option<u32>,
    #[serde(default)]
    pub file_count: Option<u32>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
}

impl Snapshot {
    pub fn label(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(d) => d.to_string(),
            None => format!("Snapshot {}", short_id(&self.id)),
        }
    }

    pub fn timestamp_str(&self) -> String {
        format_timestamp(self.timestamp)
    }

    pub fn size_label(&self) -> String {
        match self.size_bytes {
            Some(0) | None => "N/A".to_string(),
            Some(bytes) => format!("{:.1}KB", bytes as f64 / 1024.0),
        }
    }

    /// File name suggested when the snapshot is exported.
    pub fn export_file_name(&self) -> String {
        format!("snapshot-{}.json", short_id(&self.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Archived,
}

impl SessionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Completed => "Completed",
            SessionStatus::Archived => "Archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub first_message: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Session {
    /// First message, or the id when the session has none.
    pub fn label(&self) -> &str {
        match self.first_message.as_deref() {
            Some(m) if !m.is_empty() => m,
            _ => &self.id,
        }
    }

    pub fn timestamp_str(&self) -> String {
        format_timestamp(self.created_at)
    }

    /// Time between creation and the last recorded activity. Clock skew that would
    /// make this negative yields `None`.
    pub fn duration(&self) -> Option<Duration> {
        let last = self.last_activity_at?;
        let d = last.signed_duration_since(self.created_at);
        (d >= Duration::zero()).then_some(d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerState {
    Running,
    #[default]
    Stopped,
    Error,
    Starting,
    Stopping,
}

impl ServerState {
    pub fn label(&self) -> &'static str {
        match self {
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
            ServerState::Error => "error",
            ServerState::Starting => "starting",
            ServerState::Stopping => "stopping",
        }
    }

    pub fn all_states() -> &'static [ServerState] {
        &[
            ServerState::Running,
            ServerState::Stopped,
            ServerState::Error,
            ServerState::Starting,
            ServerState::Stopping,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default)]
    pub status: ServerState,
    #[serde(default)]
    pub uptime_secs: Option<u64>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub connections: Option<u32>,
}

impl ServerStatus {
    pub fn uptime_label(&self) -> String {
        match self.uptime_secs {
            Some(0) | None => "N/A".to_string(),
            Some(secs) => format!("{}m", secs / 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    pub fn label(&self) -> &'static str {
        match self {
            DateRange::All => "All",
            DateRange::Today => "Today",
            DateRange::Week => "Week",
            DateRange::Month => "Month",
        }
    }

    pub fn all_ranges() -> &'static [DateRange] {
        &[
            DateRange::All,
            DateRange::Today,
            DateRange::Week,
            DateRange::Month,
        ]
    }

    /// Largest admitted age in whole days; `None` admits everything.
    pub fn max_days(&self) -> Option<i64> {
        match self {
            DateRange::All => None,
            DateRange::Today => Some(0),
            DateRange::Week => Some(7),
            DateRange::Month => Some(30),
        }
    }

    pub fn next(&self) -> DateRange {
        match self {
            DateRange::All => DateRange::Today,
            DateRange::Today => DateRange::Week,
            DateRange::Week => DateRange::Month,
            DateRange::Month => DateRange::All,
        }
    }

    pub fn prev(&self) -> DateRange {
        match self {
            DateRange::All => DateRange::Month,
            DateRange::Today => DateRange::All,
            DateRange::Week => DateRange::Today,
            DateRange::Month => DateRange::Week,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, h, m, 0).unwrap()
    }

    fn make_checkpoint(id: &str, description: Option<&str>) -> Checkpoint {
        Checkpoint {
            id: id.to_string(),
            parent_id: None,
            timestamp: at(10, 30),
            description: description.map(str::to_string),
            tags: Vec::new(),
            message_count: None,
        }
    }

    // ============================================================
    // label helpers
    // ============================================================

    #[test]
    fn short_id_takes_eight_chars() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
        assert_eq!(short_id("チェックポイント識別子"), "チェックポイント");
    }

    #[test]
    fn truncate_label_ascii() {
        assert_eq!(truncate_label("hello", 10), "hello");
        assert_eq!(truncate_label("hello", 5), "hello");
        assert_eq!(truncate_label("hello world", 5), "hello...");
    }

    #[test]
    fn truncate_label_counts_wide_chars_twice() {
        // each character is two columns wide
        assert_eq!(truncate_label("こんにちは", 6), "こんに...");
        assert_eq!(truncate_label("こんにちは", 5), "こん...");
    }

    #[test]
    fn checkpoint_label_falls_back_to_short_id() {
        let cp = make_checkpoint("abcdef0123456789", None);
        assert_eq!(cp.label(), "Checkpoint abcdef01");
        let cp = make_checkpoint("abcdef0123456789", Some(""));
        assert_eq!(cp.label(), "Checkpoint abcdef01");
        let cp = make_checkpoint("abcdef0123456789", Some("before refactor"));
        assert_eq!(cp.label(), "before refactor");
    }

    #[test]
    fn checkpoint_message_count_label() {
        let mut cp = make_checkpoint("a", None);
        assert_eq!(cp.message_count_label(), None);
        cp.message_count = Some(0);
        assert_eq!(cp.message_count_label(), None);
        cp.message_count = Some(1);
        assert_eq!(cp.message_count_label().as_deref(), Some("1 message"));
        cp.message_count = Some(12);
        assert_eq!(cp.message_count_label().as_deref(), Some("12 messages"));
    }

    #[test]
    fn checkpoint_timestamp_str() {
        assert_eq!(make_checkpoint("a", None).timestamp_str(), "2024-01-15 10:30:00");
    }

    #[test]
    fn snapshot_size_label() {
        let mut snap = Snapshot {
            id: "snap-1234567890".to_string(),
            timestamp: at(9, 0),
            description: None,
            tags: Vec::new(),
            message_count: None,
            file_count: None,
            size_bytes: None,
        };
        assert_eq!(snap.size_label(), "N/A");
        snap.size_bytes = Some(0);
        assert_eq!(snap.size_label(), "N/A");
        snap.size_bytes = Some(1536);
        assert_eq!(snap.size_label(), "1.5KB");
        assert_eq!(snap.label(), "Snapshot snap-123");
        assert_eq!(snap.export_file_name(), "snapshot-snap-123.json");
    }

    #[test]
    fn session_label_and_duration() {
        let mut session = Session {
            id: "sess-1".to_string(),
            project_id: "proj".to_string(),
            created_at: at(10, 0),
            first_message: None,
            status: None,
            last_activity_at: None,
        };
        assert_eq!(session.label(), "sess-1");
        assert_eq!(session.duration(), None);

        session.first_message = Some("fix the parser".to_string());
        session.last_activity_at = Some(at(10, 45));
        assert_eq!(session.label(), "fix the parser");
        assert_eq!(session.duration(), Some(Duration::minutes(45)));

        session.last_activity_at = Some(at(9, 0));
        assert_eq!(session.duration(), None);
    }

    #[test]
    fn server_uptime_label() {
        let mut status = ServerStatus::default();
        assert_eq!(status.status, ServerState::Stopped);
        assert_eq!(status.uptime_label(), "N/A");
        status.uptime_secs = Some(150);
        assert_eq!(status.uptime_label(), "2m");
    }

    #[test]
    fn relative_time_phrases() {
        let now = at(12, 0);
        assert_eq!(relative_time(at(11, 59), now), "1 minute ago");
        assert_eq!(relative_time(now, now), "less than a minute ago");
        assert_eq!(relative_time(at(10, 0), now), "2 hours ago");
        assert_eq!(relative_time(now - Duration::days(3), now), "3 days ago");
        assert_eq!(relative_time(now + Duration::hours(5), now), "in 5 hours");
    }

    // ============================================================
    // DateRange
    // ============================================================

    #[test]
    fn date_range_next_prev_inverse() {
        for &range in DateRange::all_ranges() {
            assert_eq!(range.next().prev(), range);
            assert_eq!(range.prev().next(), range);
        }
    }

    #[test]
    fn date_range_max_days() {
        assert_eq!(DateRange::All.max_days(), None);
        assert_eq!(DateRange::Today.max_days(), Some(0));
        assert_eq!(DateRange::Week.max_days(), Some(7));
        assert_eq!(DateRange::Month.max_days(), Some(30));
    }

    // ============================================================
    // serde
    // ============================================================

    #[test]
    fn checkpoint_deserializes_with_missing_optionals() {
        let cp: Checkpoint = serde_json::from_str(
            r#"{"id":"cp-1","timestamp":"2024-01-15T10:30:00Z"}"#,
        )
        .unwrap();
        assert_eq!(cp.parent_id, None);
        assert!(cp.tags.is_empty());
        assert_eq!(cp.timestamp, at(10, 30));
    }

    #[test]
    fn server_status_deserializes_snake_case_state() {
        let status: ServerStatus =
            serde_json::from_str(r#"{"status":"running","uptime_secs":600}"#).unwrap();
        assert_eq!(status.status, ServerState::Running);
        assert_eq!(status.uptime_label(), "10m");
    }
}
