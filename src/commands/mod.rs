//! Command implementations for the bcf CLI.
//!
//! Each command returns a result type implementing [`Output`], which the
//! binary prints as JSON or, with `-H`, as human-readable text.

use crate::config::{BcfConfig, ResolvedConfig};
use crate::models::{Assignment, SchemaVersion, Topic, TopicField, TopicInput};
use crate::topics::{BcfTopics, VOCABULARY_FIELDS};
use crate::viewpoints::MemoryViewpointStore;
use crate::{Error, ImportWarning, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// World name given to viewpoints imported by the CLI.
const CLI_WORLD: &str = "cli";

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    fn to_json(&self) -> String;

    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize output: {}"}}"#, e))
}

/// Parse a `--to` value.
pub fn parse_version(value: &str) -> Result<SchemaVersion> {
    SchemaVersion::parse(value).ok_or_else(|| {
        Error::InvalidInput(format!(
            "Unsupported BCF version '{}' (expected 2.1 or 3)",
            value
        ))
    })
}

fn import(path: &Path, config: BcfConfig) -> Result<(BcfTopics, MemoryViewpointStore, crate::ImportOutcome)> {
    let data = fs::read(path)?;
    let mut manager = BcfTopics::with_config(config);
    let mut store = MemoryViewpointStore::new();
    let outcome = manager.load(&data, &mut store, CLI_WORLD)?;
    tracing::debug!(path = %path.display(), topics = outcome.topics.len(), "Imported archive");
    Ok((manager, store, outcome))
}

fn push_warnings(out: &mut String, warnings: &[ImportWarning]) {
    for warning in warnings {
        let _ = writeln!(out, "  warning: {}", warning);
    }
}

// === Show ===

#[derive(Serialize)]
pub struct ShowResult {
    pub version: SchemaVersion,
    pub topics: Vec<Topic>,
    pub viewpoints: usize,
    pub warnings: Vec<ImportWarning>,
}

impl Output for ShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "{} topic(s), {} viewpoint(s) (BCF {})\n",
            self.topics.len(),
            self.viewpoints,
            self.version
        );
        for topic in &self.topics {
            let _ = writeln!(
                out,
                "\n  {} [{}/{}] {}",
                topic.guid(),
                topic.topic_type(),
                topic.status(),
                topic.title
            );
            let _ = writeln!(
                out,
                "    Created by {} on {}",
                topic.creation_author,
                crate::models::format_date(&topic.creation_date)
            );
            if let Some(priority) = topic.priority() {
                let _ = writeln!(out, "    Priority: {}", priority);
            }
            if let Some(assignee) = topic.assigned_to() {
                let _ = writeln!(out, "    Assigned to: {}", assignee);
            }
            if !topic.labels().is_empty() {
                let labels: Vec<&str> = topic.labels().iter().map(String::as_str).collect();
                let _ = writeln!(out, "    Labels: {}", labels.join(", "));
            }
            if let Some(ref description) = topic.description {
                let _ = writeln!(out, "    {}", description);
            }
            for comment in topic.comments.values() {
                let _ = writeln!(out, "    - {}: {}", comment.author, comment.text());
            }
            if !topic.viewpoints.is_empty() {
                let _ = writeln!(out, "    Viewpoints: {}", topic.viewpoints.len());
            }
        }
        push_warnings(&mut out, &self.warnings);
        out.trim_end().to_string()
    }
}

/// Import an archive and report its topics.
pub fn show(path: &Path, config: BcfConfig) -> Result<ShowResult> {
    let (_manager, _store, outcome) = import(path, config)?;
    Ok(ShowResult {
        version: outcome.version,
        viewpoints: outcome.viewpoints.len(),
        topics: outcome.topics,
        warnings: outcome.warnings,
    })
}

// === Convert ===

#[derive(Serialize)]
pub struct ConvertResult {
    pub input: String,
    pub output: String,
    pub from: SchemaVersion,
    pub to: SchemaVersion,
    pub topics: usize,
    pub viewpoints: usize,
    pub warnings: Vec<ImportWarning>,
}

impl Output for ConvertResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Converted {} (BCF {}) to {} (BCF {}): {} topic(s), {} viewpoint(s)\n",
            self.input, self.from, self.output, self.to, self.topics, self.viewpoints
        );
        push_warnings(&mut out, &self.warnings);
        out.trim_end().to_string()
    }
}

/// Import an archive and write it back out, by default in the version it
/// was read as.
pub fn convert(
    input: &Path,
    output: &Path,
    to: Option<SchemaVersion>,
    config: BcfConfig,
) -> Result<ConvertResult> {
    let (mut manager, store, outcome) = import(input, config)?;
    let target = to.unwrap_or(outcome.version);
    manager.config_mut().version = target;
    let bytes = manager.export(&store, None)?;
    fs::write(output, bytes)?;

    Ok(ConvertResult {
        input: input.display().to_string(),
        output: output.display().to_string(),
        from: outcome.version,
        to: target,
        topics: outcome.topics.len(),
        viewpoints: outcome.viewpoints.len(),
        warnings: outcome.warnings,
    })
}

// === Extensions ===

#[derive(Serialize)]
pub struct ExtensionsResult {
    /// Vocabulary after the import, by field
    pub vocabulary: BTreeMap<String, BTreeSet<String>>,
    /// Values the imported topics actually use, by field
    pub used: BTreeMap<String, BTreeSet<String>>,
}

impl Output for ExtensionsResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = String::new();
        for (field, values) in &self.vocabulary {
            let used = self.used.get(field);
            let listed: Vec<String> = values
                .iter()
                .map(|v| {
                    if used.is_some_and(|u| u.contains(v)) {
                        format!("{}*", v)
                    } else {
                        v.clone()
                    }
                })
                .collect();
            let _ = writeln!(out, "{}: {}", field, listed.join(", "));
        }
        out.push_str("(* = in use)");
        out
    }
}

/// Import an archive and report the resulting vocabulary.
pub fn extensions(path: &Path, config: BcfConfig) -> Result<ExtensionsResult> {
    let (manager, _store, _outcome) = import(path, config)?;
    let mut vocabulary = BTreeMap::new();
    let mut used = BTreeMap::new();
    for field in VOCABULARY_FIELDS {
        vocabulary.insert(field.to_string(), manager.config().vocabulary(field).clone());
        used.insert(field.to_string(), manager.used(field));
    }
    Ok(ExtensionsResult { vocabulary, used })
}

// === New ===

/// Fields of a topic created from the command line.
#[derive(Debug, Clone, Default)]
pub struct NewTopic {
    pub title: String,
    pub topic_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub description: Option<String>,
    pub assigned_to: Option<String>,
    pub labels: Vec<String>,
    pub comments: Vec<String>,
}

#[derive(Serialize)]
pub struct NewResult {
    pub output: String,
    pub guid: String,
    pub title: String,
    pub version: SchemaVersion,
    pub comments: usize,
    /// Values a strict configuration refused
    pub rejected: Vec<Assignment>,
}

impl Output for NewResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let mut out = format!(
            "Created topic {} \"{}\" with {} comment(s) in {} (BCF {})",
            self.guid, self.title, self.comments, self.output, self.version
        );
        for outcome in &self.rejected {
            if let Assignment::Rejected { field, value } = outcome {
                let _ = write!(out, "\n  rejected {}: {}", field, value);
            }
        }
        out
    }
}

/// Create one topic with comments and write it as an archive.
pub fn new_topic(
    output: &Path,
    topic: NewTopic,
    version: Option<SchemaVersion>,
    mut config: BcfConfig,
) -> Result<NewResult> {
    if let Some(version) = version {
        config.version = version;
    }
    let mut manager = BcfTopics::with_config(config);
    let guid = manager.create(None).guid().to_string();

    let input = TopicInput {
        title: Some(topic.title.clone()),
        topic_type: topic.topic_type,
        status: topic.status,
        priority: topic.priority.map(Some),
        description: topic.description.map(Some),
        assigned_to: topic.assigned_to.map(Some),
        labels: (!topic.labels.is_empty()).then(|| topic.labels.into_iter().collect()),
        ..Default::default()
    };
    let rejected: Vec<Assignment> = manager
        .set(&guid, &input)?
        .into_iter()
        .filter(Assignment::is_rejected)
        .collect();

    for text in &topic.comments {
        manager.create_comment(&guid, text, None)?;
    }

    let bytes = manager.export(&MemoryViewpointStore::new(), None)?;
    fs::write(output, bytes)?;

    Ok(NewResult {
        output: output.display().to_string(),
        guid,
        title: topic.title,
        version: manager.config().version,
        comments: topic.comments.len(),
        rejected,
    })
}

// === Config ===

#[derive(Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub resolved: ResolvedConfig,
}

impl Output for ConfigShowResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let resolved = &self.resolved;
        let mut out = String::new();
        let _ = writeln!(out, "author: {} ({})", resolved.author.value, resolved.author.source);
        let _ = writeln!(out, "version: {} ({})", resolved.version.value, resolved.version.source);
        let _ = writeln!(out, "strict: {} ({})", resolved.strict.value, resolved.strict.source);
        let config = &resolved.config;
        let _ = writeln!(
            out,
            "fallback-version-on-import: {}",
            config.fallback_version_on_import.as_deref().unwrap_or("(none)")
        );
        for field in VOCABULARY_FIELDS {
            let values: Vec<&str> = config.vocabulary(field).iter().map(String::as_str).collect();
            let _ = writeln!(out, "{}: {}", field_label(field), values.join(", "));
        }
        if resolved.files.is_empty() {
            out.push_str("files: (none)");
        } else {
            let files: Vec<String> = resolved.files.iter().map(|p| p.display().to_string()).collect();
            let _ = write!(out, "files: {}", files.join(", "));
        }
        out
    }
}

fn field_label(field: TopicField) -> &'static str {
    match field {
        TopicField::Type => "types",
        TopicField::Status => "statuses",
        TopicField::Priority => "priorities",
        TopicField::Stage => "stages",
        TopicField::AssignedTo => "users",
        TopicField::Label => "labels",
    }
}

/// Report the resolved configuration.
pub fn config_show(resolved: ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult { resolved }
}
