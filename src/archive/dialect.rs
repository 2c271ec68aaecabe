//! Per-version markup shapes.
//!
//! BCF 2.1 and 3 disagree on where labels, related topics, comments and
//! viewpoint references live inside `markup.bcf`. Each [`MarkupDialect`]
//! implementation reads and writes one version's shape; everything else in
//! the markup is shared.

use super::SNAPSHOT_EXTENSION;
use crate::models::{Comment, SchemaVersion};
use crate::xml::{Element, attr_pair, escape, text_tag};
use std::collections::BTreeSet;

/// Reader and writer for the version-dependent parts of a markup document.
pub trait MarkupDialect: Sync {
    fn version(&self) -> SchemaVersion;

    /// Whether comments and viewpoint references are children of `<Topic>`
    /// rather than of `<Markup>`.
    fn nests_in_topic(&self) -> bool;

    fn write_index(&self, index: Option<i64>) -> String;

    fn write_labels(&self, labels: &BTreeSet<String>) -> String;

    fn write_related_topics(&self, related: &BTreeSet<String>) -> String;

    fn write_comments(&self, comments: &[&Comment]) -> String;

    /// References to viewpoints known to exist.
    fn write_viewpoints(&self, guids: &[&str]) -> String;

    fn read_labels(&self, topic: &Element) -> Vec<String>;

    fn read_related_topics(&self, topic: &Element) -> Vec<String>;

    /// Comment elements of the markup document.
    fn read_comments<'a>(&self, markup: &'a Element) -> Vec<&'a Element>;

    /// Viewpoint guids referenced by the markup document.
    fn read_viewpoints(&self, markup: &Element) -> Vec<String>;
}

/// The dialect for a schema version.
pub fn for_version(version: SchemaVersion) -> &'static dyn MarkupDialect {
    match version {
        SchemaVersion::V2_1 => &Bcf21,
        SchemaVersion::V3 => &Bcf3,
    }
}

/// BCF 2.1: repeated `<Labels>` tags; comments and `<Viewpoints>` under
/// `<Markup>`.
#[derive(Debug, Clone, Copy)]
pub struct Bcf21;

/// BCF 3: wrapped lists nested inside `<Topic>`.
#[derive(Debug, Clone, Copy)]
pub struct Bcf3;

fn viewpoint_files(guid: &str) -> String {
    format!(
        "<Viewpoint>{}.bcfv</Viewpoint><Snapshot>{}.{}</Snapshot>",
        escape(guid),
        escape(guid),
        SNAPSHOT_EXTENSION
    )
}

fn texts<'a>(elements: impl Iterator<Item = &'a Element>) -> Vec<String> {
    elements
        .map(|e| e.text.clone())
        .filter(|text| !text.is_empty())
        .collect()
}

fn guids<'a>(elements: impl Iterator<Item = &'a Element>) -> Vec<String> {
    elements
        .filter_map(|e| e.value("Guid"))
        .map(str::to_string)
        .collect()
}

fn wrap(tag: &str, body: String) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!("<{tag}>{body}</{tag}>")
    }
}

impl MarkupDialect for Bcf21 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V2_1
    }

    fn nests_in_topic(&self) -> bool {
        false
    }

    fn write_index(&self, index: Option<i64>) -> String {
        text_tag("Index", index.map(|i| i.to_string()).as_deref())
    }

    fn write_labels(&self, labels: &BTreeSet<String>) -> String {
        labels
            .iter()
            .map(|label| text_tag("Labels", Some(label)))
            .collect()
    }

    fn write_related_topics(&self, related: &BTreeSet<String>) -> String {
        related
            .iter()
            .map(|guid| format!("<RelatedTopic{}/>", attr_pair("Guid", Some(guid))))
            .collect()
    }

    fn write_comments(&self, comments: &[&Comment]) -> String {
        comments.iter().map(|c| c.serialize()).collect()
    }

    fn write_viewpoints(&self, guids: &[&str]) -> String {
        guids
            .iter()
            .map(|guid| {
                format!(
                    "<Viewpoints{}>{}</Viewpoints>",
                    attr_pair("Guid", Some(guid)),
                    viewpoint_files(guid)
                )
            })
            .collect()
    }

    fn read_labels(&self, topic: &Element) -> Vec<String> {
        texts(topic.children_named("Labels"))
    }

    fn read_related_topics(&self, topic: &Element) -> Vec<String> {
        guids(topic.children_named("RelatedTopic"))
    }

    fn read_comments<'a>(&self, markup: &'a Element) -> Vec<&'a Element> {
        // Some producers wrap 2.1 comments in <Comments>
        let wrapped = markup
            .children_named("Comments")
            .flat_map(|c| c.children_named("Comment"));
        markup.children_named("Comment").chain(wrapped).collect()
    }

    fn read_viewpoints(&self, markup: &Element) -> Vec<String> {
        let mut found = Vec::new();
        for viewpoints in markup.children_named("Viewpoints") {
            match viewpoints.value("Guid") {
                Some(guid) => found.push(guid.to_string()),
                None => found.extend(guids(viewpoints.children_named("ViewPoint"))),
            }
        }
        found
    }
}

impl MarkupDialect for Bcf3 {
    fn version(&self) -> SchemaVersion {
        SchemaVersion::V3
    }

    fn nests_in_topic(&self) -> bool {
        true
    }

    fn write_index(&self, _index: Option<i64>) -> String {
        String::new()
    }

    fn write_labels(&self, labels: &BTreeSet<String>) -> String {
        let body = labels
            .iter()
            .map(|label| text_tag("Label", Some(label)))
            .collect();
        wrap("Labels", body)
    }

    fn write_related_topics(&self, related: &BTreeSet<String>) -> String {
        let body = Bcf21.write_related_topics(related);
        wrap("RelatedTopics", body)
    }

    fn write_comments(&self, comments: &[&Comment]) -> String {
        let body = comments.iter().map(|c| c.serialize()).collect();
        wrap("Comments", body)
    }

    fn write_viewpoints(&self, guids: &[&str]) -> String {
        let body = guids
            .iter()
            .map(|guid| {
                format!(
                    "<ViewPoint{}>{}</ViewPoint>",
                    attr_pair("Guid", Some(guid)),
                    viewpoint_files(guid)
                )
            })
            .collect();
        wrap("Viewpoints", body)
    }

    fn read_labels(&self, topic: &Element) -> Vec<String> {
        texts(
            topic
                .children_named("Labels")
                .flat_map(|l| l.children_named("Label")),
        )
    }

    fn read_related_topics(&self, topic: &Element) -> Vec<String> {
        guids(
            topic
                .children_named("RelatedTopics")
                .flat_map(|r| r.children_named("RelatedTopic")),
        )
    }

    fn read_comments<'a>(&self, markup: &'a Element) -> Vec<&'a Element> {
        markup
            .children_named("Topic")
            .take(1)
            .flat_map(|t| t.children_named("Comments"))
            .flat_map(|c| c.children_named("Comment"))
            .collect()
    }

    fn read_viewpoints(&self, markup: &Element) -> Vec<String> {
        let Some(topic) = markup.child("Topic") else {
            return Vec::new();
        };
        guids(
            topic
                .children_named("Viewpoints")
                .flat_map(|v| v.children_named("ViewPoint")),
        )
    }
}
