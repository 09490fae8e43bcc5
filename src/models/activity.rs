//! Activity feed entries.

use serde::{Deserialize, Serialize};

/// A read-only activity feed entry. Its identity is its position in the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    /// Tag used by the client to pick a display icon.
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// Display timestamp, shown as-is.
    #[serde(default)]
    pub time: String,
}
