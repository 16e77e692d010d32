//! Category types exchanged with the TaskMaster REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fields;

/// Color used for categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#808080";

/// A user-defined grouping for tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Server-assigned identifier.
    pub id: String,
    /// Display name, unique per user.
    pub name: String,
    /// Color as `#rrggbb`.
    #[serde(default)]
    pub color: Option<String>,
    /// Icon name understood by the client's icon set.
    #[serde(default)]
    pub icon: Option<String>,
    /// Owner, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation time (server clock).
    #[serde(default, with = "fields::timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
}
