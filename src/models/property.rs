//! Persisted property record and its review status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::field::FieldMap;

/// Reviewer's decision on a listing.
///
/// The status ledger file is the source of truth for this value; the database
/// column is a synced copy. The scrape path never touches it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Unset,
    Yes,
    No,
    Maybe,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Yes => "yes",
            Self::No => "no",
            Self::Maybe => "maybe",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unset" => Some(Self::Unset),
            "yes" => Some(Self::Yes),
            "no" => Some(Self::No),
            "maybe" => Some(Self::Maybe),
            _ => None,
        }
    }

    /// Parse a ledger tag: the text between `[` and `]`, blank meaning unset.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "" => Some(Self::Unset),
            "YES" => Some(Self::Yes),
            "NO" => Some(Self::No),
            "MAYBE" => Some(Self::Maybe),
            _ => None,
        }
    }

    /// Render the ledger tag, e.g. `[YES]` or `[ ]` for unset.
    pub fn to_tag(&self) -> &'static str {
        match self {
            Self::Unset => "[ ]",
            Self::Yes => "[YES]",
            Self::No => "[NO]",
            Self::Maybe => "[MAYBE]",
        }
    }
}

/// A property listing as persisted in the database.
///
/// `id` is assigned once and survives re-scrapes; `url` is the natural key.
#[derive(Debug, Clone)]
pub struct PropertyRecord {
    pub id: String,
    pub url: String,
    pub fields: FieldMap,
    /// Derived on every upsert: precio / metros_cuadrados_totales.
    pub cost_per_area: Option<f64>,
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub scraped_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tag_round_trip() {
        assert_eq!(ReviewStatus::from_tag(""), Some(ReviewStatus::Unset));
        assert_eq!(ReviewStatus::from_tag("  "), Some(ReviewStatus::Unset));
        assert_eq!(ReviewStatus::from_tag("YES"), Some(ReviewStatus::Yes));
        assert_eq!(ReviewStatus::from_tag("maybe"), Some(ReviewStatus::Maybe));
        assert_eq!(ReviewStatus::from_tag("later"), None);

        for status in [
            ReviewStatus::Unset,
            ReviewStatus::Yes,
            ReviewStatus::No,
            ReviewStatus::Maybe,
        ] {
            let tag = status.to_tag();
            let inner = tag.trim_start_matches('[').trim_end_matches(']');
            assert_eq!(ReviewStatus::from_tag(inner), Some(status));
        }
    }

    #[test]
    fn test_status_str_round_trip() {
        assert_eq!(ReviewStatus::from_str("yes"), Some(ReviewStatus::Yes));
        assert_eq!(ReviewStatus::from_str("unset"), Some(ReviewStatus::Unset));
        assert_eq!(ReviewStatus::from_str("YES"), None);
    }
}
