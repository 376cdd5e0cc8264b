//! Published app version rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `app_versions` table describing a published client release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDescriptor {
    /// Semantic version string, `MAJOR.MINOR.PATCH`
    pub version: String,
    #[serde(default)]
    pub release_notes: Option<String>,
    /// Release flagged as major regardless of the version numbers
    #[serde(default)]
    pub is_major: bool,
    /// Release that cannot be picked up by a reload alone
    #[serde(default)]
    pub requires_full_update: bool,
    #[serde(default, alias = "created_at")]
    pub published_at: Option<DateTime<Utc>>,
}

impl VersionDescriptor {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            release_notes: None,
            is_major: false,
            requires_full_update: false,
            published_at: None,
        }
    }
}
