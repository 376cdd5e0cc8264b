//! Score badges shown next to ratings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Highest rating a milk test can carry.
pub const MAX_RATING: f64 = 10.0;

/// Qualitative bucket for a 0-10 rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBadge {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreBadge {
    /// 8.5-10 excellent, 7.5-8.49 good, 5.5-7.49 fair, below 5.5 poor.
    pub fn from_rating(rating: f64) -> Self {
        if rating >= 8.5 {
            Self::Excellent
        } else if rating >= 7.5 {
            Self::Good
        } else if rating >= 5.5 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for ScoreBadge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a rating lies on the 0-10 scale.
pub fn is_valid_rating(rating: f64) -> bool {
    rating.is_finite() && (0.0..=MAX_RATING).contains(&rating)
}

/// Format a rating with one decimal, the way the feed shows it.
pub fn format_rating(rating: f64) -> String {
    format!("{rating:.1}/10")
}
