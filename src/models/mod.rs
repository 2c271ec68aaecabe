//! Data models for BCF entities.
//!
//! This module defines the core data structures:
//! - `Topic` - A BCF issue with typed fields, labels, comments and references
//! - `Comment` - A remark attached to a topic, optionally tied to a viewpoint
//! - `TopicInput` - Partial update applied through `Topic::set`
//! - `SchemaVersion` - The BCF schema dialects understood on import/export
//! - `Assignment` - Outcome of a validated field assignment

mod comment;
mod topic;

pub use comment::Comment;
pub use topic::{Topic, TopicInput};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// BCF schema versions supported for import and export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// BCF 2.1: comments and viewpoints are siblings of `<Topic>`
    #[default]
    #[serde(rename = "2.1")]
    V2_1,
    /// BCF 3.0: comments and viewpoints are nested inside `<Topic>`
    #[serde(rename = "3")]
    V3,
}

impl SchemaVersion {
    /// Parse a version identifier as written in `bcf.version`.
    ///
    /// `"3.0"` is accepted as `"3"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "2.1" => Some(Self::V2_1),
            "3" | "3.0" => Some(Self::V3),
            _ => None,
        }
    }

    /// Version identifier written on export.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2_1 => "2.1",
            Self::V3 => "3",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Unsupported BCF version: {}", s))
    }
}

/// Topic fields whose values are checked against the configured vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicField {
    Type,
    Status,
    Priority,
    Stage,
    AssignedTo,
    Label,
}

impl fmt::Display for TopicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopicField::Type => "type",
            TopicField::Status => "status",
            TopicField::Priority => "priority",
            TopicField::Stage => "stage",
            TopicField::AssignedTo => "assigned_to",
            TopicField::Label => "label",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of assigning a vocabulary-checked value.
///
/// Rejections are not errors: a strict configuration simply keeps the old
/// value. The outcome lets callers tell the two cases apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Assignment {
    Accepted,
    Rejected { field: TopicField, value: String },
}

impl Assignment {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Assignment::Accepted)
    }

    pub fn is_rejected(&self) -> bool {
        !self.is_accepted()
    }
}

/// Format a timestamp the way BCF files carry it (UTC, millisecond precision).
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a BCF timestamp.
///
/// Accepts RFC 3339 (with any offset), timestamps without an offset (read as
/// UTC) and plain dates, which some producers use for `DueDate`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compare optional timestamps at millisecond resolution.
pub(crate) fn same_millis(a: Option<&DateTime<Utc>>, b: Option<&DateTime<Utc>>) -> bool {
    a.map(|d| d.timestamp_millis()) == b.map(|d| d.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schema_version_parse() {
        assert_eq!(SchemaVersion::parse("2.1"), Some(SchemaVersion::V2_1));
        assert_eq!(SchemaVersion::parse("3"), Some(SchemaVersion::V3));
        assert_eq!(SchemaVersion::parse(" 3.0 "), Some(SchemaVersion::V3));
        assert_eq!(SchemaVersion::parse("1.0"), None);
        assert_eq!(SchemaVersion::parse("2.0"), None);
        assert!("4".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_schema_version_display() {
        assert_eq!(SchemaVersion::V2_1.to_string(), "2.1");
        assert_eq!(SchemaVersion::V3.to_string(), "3");
    }

    #[test]
    fn test_schema_version_serialization() {
        let json = serde_json::to_string(&SchemaVersion::V3).unwrap();
        assert_eq!(json, r#""3""#);
        let parsed: SchemaVersion = serde_json::from_str(r#""2.1""#).unwrap();
        assert_eq!(parsed, SchemaVersion::V2_1);
    }

    #[test]
    fn test_format_date_millis() {
        let date = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(format_date(&date), "2024-05-06T07:08:09.000Z");
    }

    #[test]
    fn test_parse_date_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(parse_date("2024-05-06T07:08:09Z"), Some(expected));
        assert_eq!(parse_date("2024-05-06T09:08:09+02:00"), Some(expected));
        assert_eq!(parse_date("2024-05-06T07:08:09"), Some(expected));
        assert_eq!(parse_date("2024-05-06T07:08:09.000Z"), Some(expected));
        assert_eq!(
            parse_date("2024-05-06"),
            Some(Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_assignment_serialization() {
        let rejected = Assignment::Rejected {
            field: TopicField::Type,
            value: "Bogus".to_string(),
        };
        let json = serde_json::to_string(&rejected).unwrap();
        assert_eq!(json, r#"{"outcome":"rejected","field":"type","value":"Bogus"}"#);
        assert!(rejected.is_rejected());
        assert!(Assignment::Accepted.is_accepted());
    }
}
