//! # Configuration
//!
//! [`FlowConfig`] holds the typographic rules and host options, deserialized
//! from camelCase JSON with every field optional. [`ColumnGeometry`] is the
//! column box the caller lays out into.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Options recognized by the column renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowConfig {
    /// Where the columns are mounted, e.g. `#Container`.
    pub container_selector: String,
    /// CSS class applied to generated column elements.
    pub column_class_name: String,
    /// Move short leading/trailing word runs across the column break.
    /// Columns may end up taller than the budget when this applies.
    pub protect_against_orphans: bool,
    /// Text runs shorter than this many characters count as orphans.
    pub orphan_length: usize,
    /// Tags that may not end a column.
    pub non_last_tags: Vec<String>,
    /// Tags that are never divided over two columns.
    pub non_split_tags: Vec<String>,
    /// Tag used to wrap untagged top-level text while measuring.
    pub default_tag: String,
    /// Subtracted from the column height to form the fill budget.
    pub extra_height_margin: f64,
    /// Slack allowed when re-measuring columns after images load.
    pub image_height_tolerance: f64,
    /// Pause before restarting an aborted run.
    pub restart_delay_ms: u64,
    /// Height change that makes a resize re-render.
    pub resize_threshold: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            container_selector: "#Container".to_string(),
            column_class_name: "column".to_string(),
            protect_against_orphans: true,
            orphan_length: 60,
            non_last_tags: ["h1", "h2", "h3", "h4", "h5", "h6"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            non_split_tags: ["li", "tr", "div"].iter().map(|t| t.to_string()).collect(),
            default_tag: "p".to_string(),
            extra_height_margin: 0.0,
            image_height_tolerance: 50.0,
            restart_delay_ms: 50,
            resize_threshold: 3.0,
        }
    }
}

impl FlowConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn is_non_last(&self, tag: &str) -> bool {
        self.non_last_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_non_split(&self, tag: &str) -> bool {
        self.non_split_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub(crate) fn measuring_tag(&self) -> Option<&str> {
        Some(self.default_tag.as_str()).filter(|t| !t.is_empty())
    }
}

/// Size of one column, in the oracle's units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnGeometry {
    pub width: f64,
    pub height: f64,
    /// Horizontal margin, padding and border around each column.
    #[serde(default)]
    pub margin: f64,
}

impl ColumnGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            margin: 0.0,
        }
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }
}
