use crate::filter::{FilterCriteria, HasStatus, MatchMode, SortKey, SortOrder};
use crate::models::DateRange;
use crate::timeline::ViewMode;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|c| c.join("session-timeline").join("view.json"))
}

/// Starting values for the list and timeline views. Every field is optional in the
/// file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub date_range: DateRange,
    pub match_mode: MatchMode,
    pub view_mode: ViewMode,
    /// Columns available for a timeline row label.
    pub label_width: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            sort_key: SortKey::Date,
            sort_order: SortOrder::Descending,
            date_range: DateRange::All,
            match_mode: MatchMode::Substring,
            view_mode: ViewMode::Tree,
            label_width: 60,
        }
    }
}

impl ViewConfig {
    /// Read the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(ViewConfig::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Config from the platform config directory, or defaults when there is none.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => ViewConfig::load(&path),
            None => Ok(ViewConfig::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn criteria<T: HasStatus>(&self) -> FilterCriteria<T> {
        FilterCriteria {
            match_mode: self.match_mode,
            date_range: self.date_range,
            sort_key: self.sort_key,
            sort_order: self.sort_order,
            ..FilterCriteria::default()
        }
    }
}
