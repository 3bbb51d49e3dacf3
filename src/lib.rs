pub mod api;
pub mod config;
pub mod diff;
pub mod filter;
pub mod models;
pub mod timeline;
pub mod view;

pub use api::{RemoteOperationError, SessionApi};
pub use filter::{FilterCriteria, SortKey, SortOrder};
pub use timeline::{ExpansionSet, TimelineNode, build_forest, build_forest_with};
