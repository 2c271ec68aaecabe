//! BCF-zip import and export.
//!
//! An archive holds `bcf.version`, `bcf.extensions` and one folder per topic
//! with its `markup.bcf`, the `.bcfv` viewpoints it references and a
//! snapshot image per viewpoint. Both operations are methods on
//! [`BcfTopics`]; viewpoints go to and come from a [`ViewpointStore`].

pub mod dialect;
pub mod extensions;
pub mod visinfo;

use crate::config::BcfConfig;
use crate::models::{Assignment, Comment, SchemaVersion, Topic, TopicInput, parse_date};
use crate::topics::{BcfTopics, VOCABULARY_FIELDS};
use crate::viewpoints::ViewpointStore;
use crate::xml::Element;
use crate::{Error, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{Cursor, Read, Write};
use visinfo::VisInfo;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// File extension of exported snapshots.
pub const SNAPSHOT_EXTENSION: &str = "jpeg";

const VERSION_FILE: &str = "bcf.version";
const EXTENSIONS_FILE: &str = "bcf.extensions";
const VERSION_SCHEMA: &str =
    "https://raw.githubusercontent.com/buildingSMART/BCF-XML/release_3_0/Schemas/version.xsd";

/// Topic fields checked when incomplete topics are skipped on import.
const REQUIRED_TOPIC_FIELDS: [&str; 6] = [
    "Guid",
    "TopicType",
    "TopicStatus",
    "Title",
    "CreationDate",
    "CreationAuthor",
];

/// Result of [`BcfTopics::load`].
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    /// Version the archive was read as, after any fallback
    pub version: SchemaVersion,
    pub topics: Vec<Topic>,
    /// Guids of the viewpoints created in the store
    pub viewpoints: Vec<String>,
    pub warnings: Vec<ImportWarning>,
}

/// An archive item that was skipped or trimmed during import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    ViewpointMissingGuid { file: String },
    MissingVisualizationInfo { file: String },
    MalformedViewpoint { file: String, reason: String },
    IncompleteTopic { file: String, missing: Vec<String> },
    UnresolvedViewpoint { topic: String, viewpoint: String },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::ViewpointMissingGuid { file } => {
                write!(f, "Viewpoint {} has no Guid, skipped", file)
            }
            ImportWarning::MissingVisualizationInfo { file } => {
                write!(f, "Viewpoint {} has no VisualizationInfo, skipped", file)
            }
            ImportWarning::MalformedViewpoint { file, reason } => {
                write!(f, "Viewpoint {} could not be read ({}), skipped", file, reason)
            }
            ImportWarning::IncompleteTopic { file, missing } => {
                write!(f, "Topic {} is missing {}, skipped", file, missing.join(", "))
            }
            ImportWarning::UnresolvedViewpoint { topic, viewpoint } => write!(
                f,
                "Topic {} references unknown viewpoint {}, reference dropped",
                topic, viewpoint
            ),
        }
    }
}

/// A topic read from a markup document, before related topics are linked.
#[derive(Debug, Clone)]
pub struct MarkupTopic {
    pub topic: Topic,
    /// Related topic guids, linked once every topic of the archive is known
    pub related_topics: Vec<String>,
    /// Viewpoint references the store does not know
    pub unresolved_viewpoints: Vec<String>,
}

/// What a markup document yielded.
#[derive(Debug, Clone)]
pub enum MarkupRead {
    Topic(MarkupTopic),
    /// Skipped because required fields are missing
    Incomplete { missing: Vec<String> },
}

/// A flat grey JPEG written for viewpoints without a snapshot.
pub fn placeholder_snapshot() -> Result<Vec<u8>> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([200, 200, 200])));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

fn version_xml(version: SchemaVersion) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Version VersionId=\"{}\" \
         xsi:noNamespaceSchemaLocation=\"{}\" \
         xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"></Version>",
        version, VERSION_SCHEMA
    )
}

/// Pick the version to read an archive as.
///
/// The declared version wins when supported; otherwise the configured
/// fallback is used. The error names the declared string, followed by the
/// fallback string when one is configured.
pub fn resolve_version(declared: Option<&str>, config: &BcfConfig) -> Result<SchemaVersion> {
    if let Some(version) = declared.and_then(SchemaVersion::parse) {
        return Ok(version);
    }
    match config.fallback_version() {
        Some(version) => {
            tracing::warn!(
                declared = declared.unwrap_or("(none)"),
                fallback = %version,
                "Archive version missing or unsupported, using fallback"
            );
            Ok(version)
        }
        None => {
            let declared = declared.unwrap_or("(none)");
            Err(Error::UnsupportedVersion(
                match config.fallback_version_on_import.as_deref() {
                    Some(fallback) => format!("{} (fallback {})", declared, fallback),
                    None => declared.to_string(),
                },
            ))
        }
    }
}

/// Read a `markup.bcf` document into a topic.
///
/// Vocabulary-checked fields go through the topic setters, so a strict
/// `config` drops unknown values and a lenient one learns them. Comment
/// viewpoints and topic viewpoint references are kept only when `store`
/// holds the viewpoint.
pub fn read_markup<S>(
    xml: &str,
    version: SchemaVersion,
    config: &mut BcfConfig,
    store: &S,
) -> Result<MarkupRead>
where
    S: ViewpointStore + ?Sized,
{
    let markup = Element::parse(xml)?;
    let Some(node) = markup.child("Topic").filter(|_| markup.name == "Markup") else {
        return Err(Error::InvalidArchive(
            "markup document has no Markup/Topic element".to_string(),
        ));
    };

    if config.ignore_incomplete_topics_on_import {
        let missing: Vec<String> = REQUIRED_TOPIC_FIELDS
            .iter()
            .filter(|field| node.value(field).is_none())
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Ok(MarkupRead::Incomplete { missing });
        }
    }

    let dialect = dialect::for_version(version);
    let text = |name: &str| node.value(name).map(str::to_string);
    let date = |name: &str| node.value(name).and_then(parse_date);

    let input = TopicInput {
        title: text("Title"),
        topic_type: text("TopicType"),
        status: text("TopicStatus"),
        priority: text("Priority").map(Some),
        stage: text("Stage").map(Some),
        assigned_to: text("AssignedTo").map(Some),
        labels: Some(dialect.read_labels(node).into_iter().collect()),
        description: text("Description").map(Some),
        server_assigned_id: text("ServerAssignedId").map(Some),
        due_date: date("DueDate").map(Some),
        index: node
            .value("Index")
            .and_then(|v| v.parse::<i64>().ok())
            .map(Some),
        creation_date: date("CreationDate"),
        creation_author: text("CreationAuthor"),
        modified_date: date("ModifiedDate").map(Some),
        modified_author: text("ModifiedAuthor").map(Some),
    };

    let guid = text("Guid").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut topic = Topic::with_guid(guid, config);
    let rejected = topic
        .set(&input, config)
        .into_iter()
        .filter(Assignment::is_rejected)
        .count();
    if rejected > 0 {
        tracing::debug!(topic = %topic.guid(), rejected, "Dropped values outside the vocabulary");
    }

    for element in dialect.read_comments(&markup) {
        if let Some(comment) = read_comment(element, config, store) {
            topic.insert_comment(comment);
        }
    }

    let mut unresolved_viewpoints = Vec::new();
    for viewpoint in dialect.read_viewpoints(&markup) {
        if store.contains(&viewpoint) {
            topic.viewpoints.insert(viewpoint);
        } else {
            unresolved_viewpoints.push(viewpoint);
        }
    }

    Ok(MarkupRead::Topic(MarkupTopic {
        related_topics: dialect.read_related_topics(node),
        topic,
        unresolved_viewpoints,
    }))
}

/// A comment needs a guid, a date, an author, and text or a viewpoint.
fn read_comment<S>(element: &Element, config: &BcfConfig, store: &S) -> Option<Comment>
where
    S: ViewpointStore + ?Sized,
{
    let guid = element.value("Guid")?;
    let date = element.value("Date").and_then(parse_date)?;
    let author = element.value("Author")?;
    let text = element.child_text("Comment");
    let viewpoint = element.child("Viewpoint").and_then(|v| v.value("Guid"));
    if text.is_none() && viewpoint.is_none() {
        tracing::debug!(comment = %guid, "Comment has neither text nor viewpoint, skipped");
        return None;
    }

    let mut comment = Comment::new(text.unwrap_or_default(), config);
    comment.guid = guid.to_string();
    comment.date = date;
    comment.author = author.to_string();
    comment.viewpoint = viewpoint
        .filter(|guid| store.contains(guid))
        .map(str::to_string);
    comment.modified_author = element.value("ModifiedAuthor").map(str::to_string);
    comment.modified_date = element.value("ModifiedDate").and_then(parse_date);
    Some(comment)
}

fn read_entries(data: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;
        entries.push((name, contents));
    }
    Ok(entries)
}

/// Entry contents as text, without a byte order mark.
fn entry_text(contents: &[u8]) -> String {
    let text = String::from_utf8_lossy(contents);
    text.strip_prefix('\u{feff}').unwrap_or(&*text).to_string()
}

/// File stem of an image entry, e.g. `t/v1.jpeg` -> `v1`.
fn snapshot_stem(name: &str) -> Option<&str> {
    let file = name.rsplit('/').next()?;
    let (stem, extension) = file.rsplit_once('.')?;
    matches!(
        extension.to_ascii_lowercase().as_str(),
        "jpeg" | "jpg" | "png"
    )
    .then_some(stem)
}

fn record(warnings: &mut Vec<ImportWarning>, warning: ImportWarning) {
    tracing::warn!("{}", warning);
    warnings.push(warning);
}

impl BcfTopics {
    /// Build a BCF zip of the given topics (all topics when `None`) in the
    /// configured version. Repeated guids in the filter are written once.
    ///
    /// Viewpoints are taken from `store`; references it does not hold are
    /// left out of the archive.
    pub fn export<S>(&self, store: &S, topics: Option<&[String]>) -> Result<Vec<u8>>
    where
        S: ViewpointStore + ?Sized,
    {
        let selected: Vec<&Topic> = match topics {
            Some(guids) => guids
                .iter()
                .map(String::as_str)
                .collect::<BTreeSet<&str>>()
                .into_iter()
                .map(|guid| {
                    self.list
                        .get(guid)
                        .ok_or_else(|| Error::NotFound(format!("Topic not found: {}", guid)))
                })
                .collect::<Result<_>>()?,
            None => self.list.values().collect(),
        };

        let version = self.config.version;
        let vocabulary = if self.config.include_all_extensions_on_export {
            let mut config = self.config.clone();
            for field in VOCABULARY_FIELDS {
                config.extend_vocabulary(field, self.used(field));
            }
            Cow::Owned(config)
        } else {
            Cow::Borrowed(&self.config)
        };

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(VERSION_FILE, options)?;
        zip.write_all(version_xml(version).as_bytes())?;
        zip.start_file(EXTENSIONS_FILE, options)?;
        zip.write_all(extensions::serialize(&vocabulary).as_bytes())?;

        for &topic in &selected {
            let guid = topic.guid();
            zip.add_directory(format!("{}/", guid), options)?;
            zip.start_file(format!("{}/markup.bcf", guid), options)?;
            zip.write_all(Topic::serialize(topic, version, store).as_bytes())?;

            for viewpoint_guid in &topic.viewpoints {
                let Some(viewpoint) = store.get(viewpoint_guid) else {
                    tracing::debug!(topic = %guid, viewpoint = %viewpoint_guid, "Skipping dangling viewpoint reference");
                    continue;
                };
                zip.start_file(format!("{}/{}.bcfv", guid, viewpoint_guid), options)?;
                zip.write_all(
                    viewpoint
                        .serialize(self.config.include_selection_tag)
                        .as_bytes(),
                )?;

                let snapshot = match store.snapshot(viewpoint_guid) {
                    Some(image) => image,
                    None => placeholder_snapshot()?,
                };
                zip.start_file(
                    format!("{}/{}.{}", guid, viewpoint_guid, SNAPSHOT_EXTENSION),
                    options,
                )?;
                zip.write_all(&snapshot)?;
            }
        }

        let bytes = zip.finish()?.into_inner();
        tracing::debug!(version = %version, topics = selected.len(), bytes = bytes.len(), "Exported BCF archive");
        Ok(bytes)
    }

    /// Import a BCF zip.
    ///
    /// Viewpoints are created in `store` under `world`, topics are added to
    /// (or replace same-guid topics in) this manager, and import subscribers
    /// are notified with the new topics. A failure part-way through leaves
    /// what was already imported in place.
    pub fn load<S>(&mut self, data: &[u8], store: &mut S, world: &S::World) -> Result<ImportOutcome>
    where
        S: ViewpointStore + ?Sized,
    {
        let entries = read_entries(data)?;

        let declared = match entries.iter().find(|(name, _)| name.ends_with(".version")) {
            Some((_, contents)) => Element::parse(&entry_text(contents))?
                .value("VersionId")
                .map(str::to_string),
            None => None,
        };
        let version = resolve_version(declared.as_deref(), &self.config)?;
        tracing::debug!(version = %version, entries = entries.len(), "Loading BCF archive");

        if self.config.update_extensions_on_import {
            if let Some((_, contents)) = entries.iter().find(|(name, _)| name.ends_with(".extensions")) {
                extensions::merge(&entry_text(contents), &mut self.config)?;
            }
        }

        let mut warnings = Vec::new();
        let mut viewpoints = Vec::new();
        for (name, contents) in entries.iter().filter(|(name, _)| name.ends_with(".bcfv")) {
            match visinfo::parse(&entry_text(contents)) {
                Ok(VisInfo::Seed(seed)) => {
                    let guid = store.create(world, seed).guid.clone();
                    tracing::debug!(file = %name, viewpoint = %guid, "Imported viewpoint");
                    viewpoints.push(guid);
                }
                Ok(VisInfo::MissingVisualizationInfo) => record(
                    &mut warnings,
                    ImportWarning::MissingVisualizationInfo { file: name.clone() },
                ),
                Ok(VisInfo::MissingGuid) => record(
                    &mut warnings,
                    ImportWarning::ViewpointMissingGuid { file: name.clone() },
                ),
                Err(e) => record(
                    &mut warnings,
                    ImportWarning::MalformedViewpoint {
                        file: name.clone(),
                        reason: e.to_string(),
                    },
                ),
            }
        }

        for (name, contents) in &entries {
            if let Some(stem) = snapshot_stem(name) {
                if viewpoints.iter().any(|guid| guid == stem) {
                    store.set_snapshot(stem, contents.clone());
                }
            }
        }

        let mut imported = Vec::new();
        let mut related = Vec::new();
        for (name, contents) in entries.iter().filter(|(name, _)| name.ends_with(".bcf")) {
            let read = read_markup(&entry_text(contents), version, &mut self.config, &*store)?;
            let MarkupTopic {
                topic,
                related_topics,
                unresolved_viewpoints,
            } = match read {
                MarkupRead::Topic(read) => read,
                MarkupRead::Incomplete { missing } => {
                    record(
                        &mut warnings,
                        ImportWarning::IncompleteTopic {
                            file: name.clone(),
                            missing,
                        },
                    );
                    continue;
                }
            };

            let guid = topic.guid().to_string();
            for viewpoint in unresolved_viewpoints {
                record(
                    &mut warnings,
                    ImportWarning::UnresolvedViewpoint {
                        topic: guid.clone(),
                        viewpoint,
                    },
                );
            }
            tracing::debug!(file = %name, topic = %guid, "Imported topic");
            self.list.insert(guid.clone(), topic);
            related.push((guid.clone(), related_topics));
            imported.push(guid);
        }

        for (guid, related_guids) in related {
            if let Some(topic) = self.list.get_mut(&guid) {
                for related_guid in &related_guids {
                    topic.add_related_topic(related_guid);
                }
            }
        }

        let topics: Vec<Topic> = imported
            .iter()
            .filter_map(|guid| self.list.get(guid).cloned())
            .collect();
        self.on_imported.trigger(&topics);
        tracing::debug!(
            topics = topics.len(),
            viewpoints = viewpoints.len(),
            warnings = warnings.len(),
            "Loaded BCF archive"
        );

        Ok(ImportOutcome {
            version,
            topics,
            viewpoints,
            warnings,
        })
    }
}
