//! KDL schema for the BCF configuration.
//!
//! This module provides:
//! - [`BcfConfig`], the vocabulary and import/export policy a manager runs with
//! - [`ConfigPatch`], the partial form used by `setup` and by config files
//! - Serialization to/from KDL
//!
//! # KDL Schema
//!
//! ```kdl
//! author "jane@example.com"
//! version "3"
//! types "Issue" "Clash" "Remark"
//! statuses "Active" "Closed"
//! priorities "Low" "High"
//! labels "Architecture" "MEP"
//! stages "Design"
//! users "jane@example.com"
//! strict #true
//! include-selection-tag #false
//! update-extensions-on-import #true
//! include-all-extensions-on-export #true
//! ignore-incomplete-topics-on-import #false
//! fallback-version-on-import "2.1"
//! ```

use crate::Result;
use crate::models::{Assignment, SchemaVersion, TopicField};
use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

fn set_of(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Vocabulary and policy flags governing topics, import and export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BcfConfig {
    /// Attribution for new topics and comments
    pub author: String,

    /// Schema version written on export
    pub version: SchemaVersion,

    pub types: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub priorities: BTreeSet<String>,
    pub labels: BTreeSet<String>,
    pub stages: BTreeSet<String>,
    pub users: BTreeSet<String>,

    /// Write `<Selection>` into exported viewpoints
    pub include_selection_tag: bool,

    /// Merge `bcf.extensions` into the vocabulary on import
    pub update_extensions_on_import: bool,

    /// Reject values outside the vocabulary
    pub strict: bool,

    /// Export the vocabulary united with every value in use
    pub include_all_extensions_on_export: bool,

    /// Version assumed when an archive declares none or an unsupported one.
    /// Stored raw so an unusable fallback can be reported verbatim.
    pub fallback_version_on_import: Option<String>,

    /// Skip topics missing any required field on import
    pub ignore_incomplete_topics_on_import: bool,
}

impl Default for BcfConfig {
    fn default() -> Self {
        Self {
            author: "default@example.com".to_string(),
            version: SchemaVersion::V2_1,
            types: set_of(&["Issue", "Clash", "Remark"]),
            statuses: set_of(&["Active", "In Progress", "Done", "In Review", "Closed"]),
            priorities: set_of(&["Low", "Medium", "High"]),
            labels: BTreeSet::new(),
            stages: BTreeSet::new(),
            users: BTreeSet::new(),
            include_selection_tag: false,
            update_extensions_on_import: true,
            strict: false,
            include_all_extensions_on_export: true,
            fallback_version_on_import: Some("2.1".to_string()),
            ignore_incomplete_topics_on_import: false,
        }
    }
}

impl BcfConfig {
    /// The allowed set backing a validated topic field.
    pub fn vocabulary(&self, field: TopicField) -> &BTreeSet<String> {
        match field {
            TopicField::Type => &self.types,
            TopicField::Status => &self.statuses,
            TopicField::Priority => &self.priorities,
            TopicField::Stage => &self.stages,
            TopicField::AssignedTo => &self.users,
            TopicField::Label => &self.labels,
        }
    }

    pub fn vocabulary_mut(&mut self, field: TopicField) -> &mut BTreeSet<String> {
        match field {
            TopicField::Type => &mut self.types,
            TopicField::Status => &mut self.statuses,
            TopicField::Priority => &mut self.priorities,
            TopicField::Stage => &mut self.stages,
            TopicField::AssignedTo => &mut self.users,
            TopicField::Label => &mut self.labels,
        }
    }

    /// Check a value against the vocabulary.
    ///
    /// Strict configurations reject unknown values. Otherwise the value is
    /// accepted and recorded in the vocabulary.
    pub fn admit(&mut self, field: TopicField, value: &str) -> Assignment {
        let strict = self.strict;
        let set = self.vocabulary_mut(field);
        if set.contains(value) {
            return Assignment::Accepted;
        }
        if strict {
            return Assignment::Rejected {
                field,
                value: value.to_string(),
            };
        }
        set.insert(value.to_string());
        Assignment::Accepted
    }

    /// Add values to a vocabulary set. Never removes anything.
    pub fn extend_vocabulary<I, S>(&mut self, field: TopicField, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.vocabulary_mut(field);
        set.extend(values.into_iter().map(Into::into).filter(|v: &String| !v.is_empty()));
    }

    /// Resolve the fallback version, if it names a supported one.
    pub fn fallback_version(&self) -> Option<SchemaVersion> {
        self.fallback_version_on_import
            .as_deref()
            .and_then(SchemaVersion::parse)
    }

    /// Apply every field set in `patch`. Sets are replaced, not merged.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(ref author) = patch.author {
            self.author = author.clone();
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
        if let Some(ref types) = patch.types {
            self.types = types.clone();
        }
        if let Some(ref statuses) = patch.statuses {
            self.statuses = statuses.clone();
        }
        if let Some(ref priorities) = patch.priorities {
            self.priorities = priorities.clone();
        }
        if let Some(ref labels) = patch.labels {
            self.labels = labels.clone();
        }
        if let Some(ref stages) = patch.stages {
            self.stages = stages.clone();
        }
        if let Some(ref users) = patch.users {
            self.users = users.clone();
        }
        if let Some(flag) = patch.include_selection_tag {
            self.include_selection_tag = flag;
        }
        if let Some(flag) = patch.update_extensions_on_import {
            self.update_extensions_on_import = flag;
        }
        if let Some(flag) = patch.strict {
            self.strict = flag;
        }
        if let Some(flag) = patch.include_all_extensions_on_export {
            self.include_all_extensions_on_export = flag;
        }
        if let Some(ref fallback) = patch.fallback_version_on_import {
            self.fallback_version_on_import = fallback.clone();
        }
        if let Some(flag) = patch.ignore_incomplete_topics_on_import {
            self.ignore_incomplete_topics_on_import = flag;
        }
    }

    /// Every field as a patch, e.g. for writing a complete config file.
    pub fn to_patch(&self) -> ConfigPatch {
        ConfigPatch {
            author: Some(self.author.clone()),
            version: Some(self.version),
            types: Some(self.types.clone()),
            statuses: Some(self.statuses.clone()),
            priorities: Some(self.priorities.clone()),
            labels: Some(self.labels.clone()),
            stages: Some(self.stages.clone()),
            users: Some(self.users.clone()),
            include_selection_tag: Some(self.include_selection_tag),
            update_extensions_on_import: Some(self.update_extensions_on_import),
            strict: Some(self.strict),
            include_all_extensions_on_export: Some(self.include_all_extensions_on_export),
            fallback_version_on_import: Some(self.fallback_version_on_import.clone()),
            ignore_incomplete_topics_on_import: Some(self.ignore_incomplete_topics_on_import),
        }
    }
}

/// Partial configuration. Unset fields leave the target untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub author: Option<String>,
    pub version: Option<SchemaVersion>,
    pub types: Option<BTreeSet<String>>,
    pub statuses: Option<BTreeSet<String>>,
    pub priorities: Option<BTreeSet<String>>,
    pub labels: Option<BTreeSet<String>>,
    pub stages: Option<BTreeSet<String>>,
    pub users: Option<BTreeSet<String>>,
    pub include_selection_tag: Option<bool>,
    pub update_extensions_on_import: Option<bool>,
    pub strict: Option<bool>,
    pub include_all_extensions_on_export: Option<bool>,
    /// `Some(None)` disables the fallback
    pub fallback_version_on_import: Option<Option<String>>,
    pub ignore_incomplete_topics_on_import: Option<bool>,
}

const LIST_NODES: [(&str, TopicField); 6] = [
    ("types", TopicField::Type),
    ("statuses", TopicField::Status),
    ("priorities", TopicField::Priority),
    ("labels", TopicField::Label),
    ("stages", TopicField::Stage),
    ("users", TopicField::AssignedTo),
];

impl ConfigPatch {
    /// Create an empty patch with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    fn list_mut(&mut self, field: TopicField) -> &mut Option<BTreeSet<String>> {
        match field {
            TopicField::Type => &mut self.types,
            TopicField::Status => &mut self.statuses,
            TopicField::Priority => &mut self.priorities,
            TopicField::Stage => &mut self.stages,
            TopicField::AssignedTo => &mut self.users,
            TopicField::Label => &mut self.labels,
        }
    }

    fn list(&self, field: TopicField) -> Option<&BTreeSet<String>> {
        match field {
            TopicField::Type => self.types.as_ref(),
            TopicField::Status => self.statuses.as_ref(),
            TopicField::Priority => self.priorities.as_ref(),
            TopicField::Stage => self.stages.as_ref(),
            TopicField::AssignedTo => self.users.as_ref(),
            TopicField::Label => self.labels.as_ref(),
        }
    }

    fn flags_mut(&mut self) -> [(&'static str, &mut Option<bool>); 5] {
        [
            ("strict", &mut self.strict),
            ("include-selection-tag", &mut self.include_selection_tag),
            (
                "update-extensions-on-import",
                &mut self.update_extensions_on_import,
            ),
            (
                "include-all-extensions-on-export",
                &mut self.include_all_extensions_on_export,
            ),
            (
                "ignore-incomplete-topics-on-import",
                &mut self.ignore_incomplete_topics_on_import,
            ),
        ]
    }

    /// Parse a patch from a KDL document.
    ///
    /// Unknown nodes are ignored; malformed values are skipped with a warning.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut patch = Self::new();

        if let Some(s) = first_string(doc, "author") {
            patch.author = Some(s.to_string());
        }

        if let Some(s) = first_string(doc, "version") {
            match SchemaVersion::parse(s) {
                Some(version) => patch.version = Some(version),
                None => tracing::warn!(version = s, "Ignoring unsupported version in config"),
            }
        }

        for (name, field) in LIST_NODES {
            if let Some(node) = doc.get(name) {
                let values = node
                    .entries()
                    .iter()
                    .filter(|entry| entry.name().is_none())
                    .filter_map(|entry| entry.value().as_string())
                    .map(|s| s.to_string())
                    .collect();
                *patch.list_mut(field) = Some(values);
            }
        }

        for (name, slot) in patch.flags_mut() {
            if let Some(node) = doc.get(name) {
                match node.entries().first().and_then(|e| e.value().as_bool()) {
                    Some(value) => *slot = Some(value),
                    None => tracing::warn!(node = name, "Expected a boolean in config"),
                }
            }
        }

        if let Some(node) = doc.get("fallback-version-on-import") {
            if let Some(entry) = node.entries().first() {
                match entry.value() {
                    KdlValue::Null => patch.fallback_version_on_import = Some(None),
                    KdlValue::String(s) => {
                        patch.fallback_version_on_import = Some(Some(s.to_string()))
                    }
                    _ => tracing::warn!("Expected a string for fallback-version-on-import"),
                }
            }
        }

        patch
    }

    /// Convert the patch to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref author) = self.author {
            let mut node = KdlNode::new("author");
            node.push(KdlEntry::new(KdlValue::String(author.clone())));
            doc.nodes_mut().push(node);
        }

        if let Some(version) = self.version {
            let mut node = KdlNode::new("version");
            node.push(KdlEntry::new(KdlValue::String(version.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        for (name, field) in LIST_NODES {
            if let Some(values) = self.list(field) {
                let mut node = KdlNode::new(name);
                for value in values {
                    node.push(KdlEntry::new(KdlValue::String(value.clone())));
                }
                doc.nodes_mut().push(node);
            }
        }

        let flags = [
            ("strict", self.strict),
            ("include-selection-tag", self.include_selection_tag),
            ("update-extensions-on-import", self.update_extensions_on_import),
            (
                "include-all-extensions-on-export",
                self.include_all_extensions_on_export,
            ),
            (
                "ignore-incomplete-topics-on-import",
                self.ignore_incomplete_topics_on_import,
            ),
        ];
        for (name, flag) in flags {
            if let Some(value) = flag {
                let mut node = KdlNode::new(name);
                node.push(KdlEntry::new(KdlValue::Bool(value)));
                doc.nodes_mut().push(node);
            }
        }

        if let Some(ref fallback) = self.fallback_version_on_import {
            let mut node = KdlNode::new("fallback-version-on-import");
            let value = match fallback {
                Some(s) => KdlValue::String(s.clone()),
                None => KdlValue::Null,
            };
            node.push(KdlEntry::new(value));
            doc.nodes_mut().push(node);
        }

        doc
    }

    /// Merge another patch into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &ConfigPatch) {
        if other.author.is_some() {
            self.author = other.author.clone();
        }
        if other.version.is_some() {
            self.version = other.version;
        }
        for (_, field) in LIST_NODES {
            if let Some(values) = other.list(field) {
                *self.list_mut(field) = Some(values.clone());
            }
        }
        if other.include_selection_tag.is_some() {
            self.include_selection_tag = other.include_selection_tag;
        }
        if other.update_extensions_on_import.is_some() {
            self.update_extensions_on_import = other.update_extensions_on_import;
        }
        if other.strict.is_some() {
            self.strict = other.strict;
        }
        if other.include_all_extensions_on_export.is_some() {
            self.include_all_extensions_on_export = other.include_all_extensions_on_export;
        }
        if other.fallback_version_on_import.is_some() {
            self.fallback_version_on_import = other.fallback_version_on_import.clone();
        }
        if other.ignore_incomplete_topics_on_import.is_some() {
            self.ignore_incomplete_topics_on_import = other.ignore_incomplete_topics_on_import;
        }
    }

    /// Read a patch from a KDL file. Returns `None` if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let doc: KdlDocument = content.parse()?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(Some(Self::from_kdl(&doc)))
    }

    /// Write the patch as a KDL file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_kdl().to_string())?;
        Ok(())
    }
}

fn first_string<'a>(doc: &'a KdlDocument, name: &str) -> Option<&'a str> {
    doc.get(name)?.entries().first()?.value().as_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BcfConfig::default();
        assert_eq!(config.author, "default@example.com");
        assert_eq!(config.version, SchemaVersion::V2_1);
        assert_eq!(config.types, set_of(&["Issue", "Clash", "Remark"]));
        assert_eq!(config.statuses.len(), 5);
        assert!(config.statuses.contains("In Review"));
        assert_eq!(config.priorities, set_of(&["Low", "Medium", "High"]));
        assert!(config.labels.is_empty());
        assert!(config.stages.is_empty());
        assert!(config.users.is_empty());
        assert!(!config.strict);
        assert!(!config.include_selection_tag);
        assert!(config.update_extensions_on_import);
        assert!(config.include_all_extensions_on_export);
        assert!(!config.ignore_incomplete_topics_on_import);
        assert_eq!(config.fallback_version(), Some(SchemaVersion::V2_1));
    }

    #[test]
    fn test_admit_strict_rejects_unknown() {
        let mut config = BcfConfig {
            strict: true,
            ..Default::default()
        };
        assert_eq!(config.admit(TopicField::Type, "Clash"), Assignment::Accepted);
        assert_eq!(
            config.admit(TopicField::Type, "Bogus"),
            Assignment::Rejected {
                field: TopicField::Type,
                value: "Bogus".to_string()
            }
        );
        assert!(!config.types.contains("Bogus"));
    }

    #[test]
    fn test_admit_lenient_grows_vocabulary() {
        let mut config = BcfConfig::default();
        assert!(config.admit(TopicField::Stage, "Tender").is_accepted());
        assert!(config.stages.contains("Tender"));
        assert!(config.admit(TopicField::AssignedTo, "x@example.com").is_accepted());
        assert!(config.users.contains("x@example.com"));
    }

    #[test]
    fn test_extend_vocabulary_skips_empty() {
        let mut config = BcfConfig::default();
        config.extend_vocabulary(TopicField::Label, ["A", "", "B"]);
        assert_eq!(config.labels, set_of(&["A", "B"]));
    }

    #[test]
    fn test_apply_patch_replaces_sets() {
        let mut config = BcfConfig::default();
        let patch = ConfigPatch {
            author: Some("me@example.com".to_string()),
            types: Some(set_of(&["Request"])),
            strict: Some(true),
            fallback_version_on_import: Some(None),
            ..Default::default()
        };
        config.apply(&patch);
        assert_eq!(config.author, "me@example.com");
        assert_eq!(config.types, set_of(&["Request"]));
        assert!(config.strict);
        assert_eq!(config.fallback_version_on_import, None);
        // Untouched fields keep their defaults
        assert_eq!(config.priorities.len(), 3);
    }

    #[test]
    fn test_unsupported_fallback() {
        let config = BcfConfig {
            fallback_version_on_import: Some("1.0".to_string()),
            ..Default::default()
        };
        assert_eq!(config.fallback_version(), None);
    }

    #[test]
    fn test_patch_kdl_roundtrip() {
        let original = BcfConfig {
            author: "jane@example.com".to_string(),
            version: SchemaVersion::V3,
            labels: set_of(&["Architecture", "MEP"]),
            strict: true,
            ..Default::default()
        }
        .to_patch();

        let doc = original.to_kdl();
        let parsed = ConfigPatch::from_kdl(&doc);
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_patch_from_kdl_strings() {
        let doc: KdlDocument = r#"
            author "jane@example.com"
            version "3.0"
            types "Issue" "Request"
            fallback-version-on-import "2.1"
        "#
        .parse()
        .unwrap();
        let patch = ConfigPatch::from_kdl(&doc);
        assert_eq!(patch.author.as_deref(), Some("jane@example.com"));
        assert_eq!(patch.version, Some(SchemaVersion::V3));
        assert_eq!(patch.types, Some(set_of(&["Issue", "Request"])));
        assert_eq!(patch.fallback_version_on_import, Some(Some("2.1".to_string())));
        assert!(patch.strict.is_none());
        assert!(patch.labels.is_none());
    }

    #[test]
    fn test_patch_from_kdl_ignores_bad_version() {
        let doc: KdlDocument = r#"version "9""#.parse().unwrap();
        let patch = ConfigPatch::from_kdl(&doc);
        assert!(patch.version.is_none());
    }

    #[test]
    fn test_patch_merge() {
        let mut base = ConfigPatch {
            author: Some("a@example.com".to_string()),
            strict: Some(false),
            ..Default::default()
        };
        let over = ConfigPatch {
            strict: Some(true),
            stages: Some(set_of(&["Design"])),
            ..Default::default()
        };
        base.merge(&over);
        assert_eq!(base.author.as_deref(), Some("a@example.com"));
        assert_eq!(base.strict, Some(true));
        assert_eq!(base.stages, Some(set_of(&["Design"])));
    }

    #[test]
    fn test_patch_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.kdl");
        assert!(ConfigPatch::load(&path).unwrap().is_none());

        let patch = ConfigPatch {
            author: Some("saved@example.com".to_string()),
            users: Some(set_of(&["saved@example.com"])),
            ..Default::default()
        };
        patch.save(&path).unwrap();
        let loaded = ConfigPatch::load(&path).unwrap().unwrap();
        assert_eq!(loaded, patch);
    }

    #[test]
    fn test_patch_load_rejects_invalid_kdl() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.kdl");
        std::fs::write(&path, "author \"unterminated").unwrap();
        assert!(ConfigPatch::load(&path).is_err());
    }
}
