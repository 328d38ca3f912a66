//! Theme catalog data model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which catalog a theme came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Authenticated API catalog, refreshed daily.
    Primary,
    /// Public scraped catalog, refreshed out of band.
    Secondary,
}

impl SourceTag {
    pub const ALL: [SourceTag; 2] = [SourceTag::Primary, SourceTag::Secondary];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Primary => "primary",
            SourceTag::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "a" => Ok(SourceTag::Primary),
            "secondary" | "b" => Ok(SourceTag::Secondary),
            other => Err(format!("unknown catalog source '{}'", other)),
        }
    }
}

/// One instrument inside a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constituent {
    pub code: String,
    pub name: String,
}

impl Constituent {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Theme header as returned by a catalog listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeHeader {
    /// Upstream identifier, if the source has one.
    pub theme_id: Option<String>,
    pub name: String,
    pub fluctuation_pct: f64,
    /// Source-specific locator for the constituent fetch (code or link).
    pub detail: String,
}

impl ThemeHeader {
    /// Identity used to drop headers repeated across listing pages.
    pub(crate) fn dedup_key(&self) -> &str {
        self.theme_id.as_deref().unwrap_or(&self.name)
    }
}

/// A theme with its constituents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeEntry {
    pub theme_id: Option<String>,
    pub name: String,
    pub fluctuation_pct: f64,
    /// Empty when the constituent fetch for this theme failed.
    pub constituents: Vec<Constituent>,
    pub source_tag: SourceTag,
}

/// A complete catalog as of `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub entries: Vec<ThemeEntry>,
}

impl CatalogSnapshot {
    pub fn new(updated_at: DateTime<Utc>, entries: Vec<ThemeEntry>) -> Self {
        Self {
            updated_at,
            count: entries.len(),
            entries,
        }
    }

    /// Placeholder returned when no snapshot has ever been built.
    pub fn empty() -> Self {
        Self::new(DateTime::<Utc>::from(std::time::UNIX_EPOCH), Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A subject found in a theme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub source: SourceTag,
    pub theme_name: String,
    pub fluctuation_pct: f64,
    pub stock_name: String,
    pub stock_code: String,
}

impl fmt::Display for MatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:+.2}%)", self.theme_name, self.fluctuation_pct)
    }
}

/// State of one catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogInfo {
    pub source: SourceTag,
    pub exists: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub count: usize,
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_snapshot_document_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 3, 8, 30, 0).unwrap();
        let snapshot = CatalogSnapshot::new(
            ts,
            vec![ThemeEntry {
                theme_id: Some("141".into()),
                name: "HBM".into(),
                fluctuation_pct: 4.1,
                constituents: vec![Constituent::new("000660", "SK hynix")],
                source_tag: SourceTag::Primary,
            }],
        );

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["updatedAt"], json!("2024-06-03T08:30:00Z"));
        assert_eq!(value["count"], json!(1));
        assert_eq!(value["entries"][0]["sourceTag"], json!("primary"));
        assert_eq!(value["entries"][0]["constituents"][0]["code"], json!("000660"));

        let back: CatalogSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_match_display() {
        let m = MatchResult {
            source: SourceTag::Secondary,
            theme_name: "Robotics".into(),
            fluctuation_pct: -1.5,
            stock_name: "Doosan Robotics".into(),
            stock_code: "454910".into(),
        };
        assert_eq!(m.to_string(), "Robotics(-1.50%)");
    }

    #[test]
    fn test_source_tag_parse() {
        assert_eq!("Primary".parse::<SourceTag>(), Ok(SourceTag::Primary));
        assert_eq!("b".parse::<SourceTag>(), Ok(SourceTag::Secondary));
        assert!("tertiary".parse::<SourceTag>().is_err());
    }

    #[test]
    fn test_header_dedup_key_falls_back_to_name() {
        let header = ThemeHeader {
            theme_id: None,
            name: "Batteries".into(),
            fluctuation_pct: 0.0,
            detail: "/theme/1".into(),
        };
        assert_eq!(header.dedup_key(), "Batteries");
    }
}
