//! Search, date, tag and status filtering plus sorting for the session, snapshot,
//! checkpoint and MCP server lists. Every item type plugs in through the small
//! capability traits below.

use crate::models::{
    Checkpoint, DateRange, McpServer, ServerState, ServerStatus, Session, SessionStatus, Snapshot,
};
use chrono::{DateTime, Duration, Utc};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::convert::Infallible;
use std::fmt::Debug;
use tracing::debug;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

pub trait Searchable {
    /// Fields the search text is matched against.
    fn search_fields(&self) -> Vec<&str>;
}

pub trait Timestamped {
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    fn duration(&self) -> Option<Duration> {
        None
    }
}

pub trait Labeled {
    /// Label compared by the name sort.
    fn sort_label(&self) -> &str;
}

pub trait Tagged {
    fn tags(&self) -> &[String] {
        &[]
    }
}

pub trait HasStatus {
    type Status: Copy + Eq + Debug;

    fn status(&self) -> Option<Self::Status> {
        None
    }
}

pub trait Filterable: Searchable + Timestamped + Labeled + Tagged + HasStatus {}

impl<T: Searchable + Timestamped + Labeled + Tagged + HasStatus> Filterable for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Name,
    Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    pub fn toggle(&self) -> SortOrder {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive substring.
    #[default]
    Substring,
    Fuzzy,
}

/// One view's filter and sort settings. `tag` and `status` set to `None` mean "all".
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCriteria<T: HasStatus> {
    pub search_text: String,
    pub match_mode: MatchMode,
    pub date_range: DateRange,
    pub tag: Option<String>,
    pub status: Option<T::Status>,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
}

impl<T: HasStatus> Default for FilterCriteria<T> {
    fn default() -> Self {
        FilterCriteria {
            search_text: String::new(),
            match_mode: MatchMode::default(),
            date_range: DateRange::default(),
            tag: None,
            status: None,
            sort_key: SortKey::default(),
            sort_order: SortOrder::default(),
        }
    }
}

/// Filtered and sorted copy of `items`, evaluating date ranges against the current time.
pub fn apply<T: Filterable + Clone>(items: &[T], criteria: &FilterCriteria<T>) -> Vec<T> {
    apply_at(items, criteria, Utc::now())
}

pub fn apply_at<T: Filterable + Clone>(
    items: &[T],
    criteria: &FilterCriteria<T>,
    now: DateTime<Utc>,
) -> Vec<T> {
    let search = SearchMatcher::new(&criteria.search_text, criteria.match_mode);

    let mut filtered: Vec<T> = items
        .iter()
        .filter(|item| search.matches(*item))
        .filter(|item| within_range(item.timestamp(), criteria.date_range, now))
        .filter(|item| match &criteria.tag {
            Some(tag) => item.tags().iter().any(|t| t == tag),
            None => true,
        })
        .filter(|item| match criteria.status {
            Some(status) => item.status() == Some(status),
            None => true,
        })
        .cloned()
        .collect();

    // sort_by is stable, so equal keys keep their input order
    filtered.sort_by(|a, b| {
        let ord = compare(a, b, criteria.sort_key);
        match criteria.sort_order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });

    debug!(
        total = items.len(),
        shown = filtered.len(),
        "applied list filter"
    );
    filtered
}

struct SearchMatcher<'q> {
    query: &'q str,
    lowered: String,
    mode: MatchMode,
    fuzzy: SkimMatcherV2,
}

impl<'q> SearchMatcher<'q> {
    fn new(query: &'q str, mode: MatchMode) -> Self {
        SearchMatcher {
            query,
            lowered: query.to_lowercase(),
            mode,
            fuzzy: SkimMatcherV2::default(),
        }
    }

    fn matches<T: Searchable>(&self, item: &T) -> bool {
        if self.query.is_empty() {
            return true;
        }
        item.search_fields().into_iter().any(|field| match self.mode {
            MatchMode::Substring => field.to_lowercase().contains(&self.lowered),
            MatchMode::Fuzzy => self.fuzzy.fuzzy_match(field, self.query).is_some(),
        })
    }
}

/// Whole days between `ts` and `now`, rounded down. Negative for future timestamps.
pub fn age_in_days(ts: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(ts)
        .num_milliseconds()
        .div_euclid(MILLIS_PER_DAY)
}

/// Items without a timestamp are only admitted by `DateRange::All`. Future timestamps
/// have a negative age and pass every range.
pub fn within_range(ts: Option<DateTime<Utc>>, range: DateRange, now: DateTime<Utc>) -> bool {
    let Some(max_days) = range.max_days() else {
        return true;
    };
    match ts {
        Some(ts) => age_in_days(ts, now) <= max_days,
        None => false,
    }
}

fn compare<T: Filterable>(a: &T, b: &T, key: SortKey) -> Ordering {
    match key {
        SortKey::Date => a.timestamp().cmp(&b.timestamp()),
        SortKey::Name => compare_labels(a.sort_label(), b.sort_label()),
        // a missing duration sorts lowest; ties and all-missing lists use the date
        SortKey::Duration => (a.duration(), a.timestamp()).cmp(&(b.duration(), b.timestamp())),
    }
}

/// Case-insensitive comparison, with the raw strings breaking ties so the order is total.
/// Not locale aware: accented letters order by code point, after plain ASCII.
pub fn compare_labels(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Distinct tags across `items`, in first-seen order.
pub fn unique_tags<T: Tagged>(items: &[T]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = Vec::new();
    for tag in items.iter().flat_map(|item| item.tags()) {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    tags
}

// ------------------------------------------------------------------
// item adapters
// ------------------------------------------------------------------

impl Searchable for Session {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.id.as_str()];
        fields.extend(self.first_message.as_deref());
        fields
    }
}

impl Timestamped for Session {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.created_at)
    }

    fn duration(&self) -> Option<Duration> {
        Session::duration(self)
    }
}

impl Labeled for Session {
    fn sort_label(&self) -> &str {
        self.label()
    }
}

impl Tagged for Session {}

impl HasStatus for Session {
    type Status = SessionStatus;

    fn status(&self) -> Option<SessionStatus> {
        self.status
    }
}

fn description_or_id<'a>(description: &'a Option<String>, id: &'a str) -> &'a str {
    match description.as_deref() {
        Some(d) if !d.is_empty() => d,
        _ => id,
    }
}

impl Searchable for Snapshot {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.id.as_str()];
        fields.extend(self.description.as_deref());
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }
}

impl Timestamped for Snapshot {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

impl Labeled for Snapshot {
    fn sort_label(&self) -> &str {
        description_or_id(&self.description, &self.id)
    }
}

impl Tagged for Snapshot {
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl HasStatus for Snapshot {
    type Status = Infallible;
}

impl Searchable for Checkpoint {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.id.as_str()];
        fields.extend(self.description.as_deref());
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }
}

impl Timestamped for Checkpoint {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        Some(self.timestamp)
    }
}

impl Labeled for Checkpoint {
    fn sort_label(&self) -> &str {
        description_or_id(&self.description, &self.id)
    }
}

impl Tagged for Checkpoint {
    fn tags(&self) -> &[String] {
        &self.tags
    }
}

impl HasStatus for Checkpoint {
    type Status = Infallible;
}

/// An MCP server together with its last reported runtime status.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEntry {
    pub server: McpServer,
    pub status: ServerStatus,
}

impl ServerEntry {
    /// Pair each server with its status by name. Servers with no reported status
    /// are treated as stopped.
    pub fn join(servers: &[McpServer], statuses: &HashMap<String, ServerStatus>) -> Vec<ServerEntry> {
        servers
            .iter()
            .map(|server| ServerEntry {
                server: server.clone(),
                status: statuses.get(&server.name).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

impl Searchable for ServerEntry {
    fn search_fields(&self) -> Vec<&str> {
        vec![self.server.name.as_str(), self.server.command.as_str()]
    }
}

impl Timestamped for ServerEntry {
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        None
    }
}

impl Labeled for ServerEntry {
    fn sort_label(&self) -> &str {
        &self.server.name
    }
}

impl Tagged for ServerEntry {}

impl HasStatus for ServerEntry {
    type Status = ServerState;

    fn status(&self) -> Option<ServerState> {
        Some(self.status.status)
    }
}
