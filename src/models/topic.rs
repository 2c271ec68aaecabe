use super::{Assignment, Comment, SchemaVersion, TopicField, format_date};
use crate::archive::dialect;
use crate::config::BcfConfig;
use crate::viewpoints::ViewpointStore;
use crate::xml::{attr_pair, text_tag};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A BCF issue.
///
/// Vocabulary-checked fields (type, status, priority, stage, assignee and
/// labels) are private and only change through setters that consult a
/// [`BcfConfig`]; everything else is plain data.
#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    /// Unique identifier, fixed at construction
    pub(crate) guid: String,

    pub title: String,

    #[serde(rename = "type")]
    topic_type: String,

    status: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,

    labels: BTreeSet<String>,

    pub creation_date: DateTime<Utc>,

    pub creation_author: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_assigned_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    /// Ordering hint, written only in BCF 2.1
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_author: Option<String>,

    /// Comments owned by this topic, keyed by guid
    pub comments: BTreeMap<String, Comment>,

    /// Guids of viewpoints held in a [`ViewpointStore`]
    pub viewpoints: BTreeSet<String>,

    /// Guids of related topics; never contains this topic's guid
    related_topics: BTreeSet<String>,
}

/// Partial topic update applied by [`Topic::set`].
///
/// The outer `Option` means "provided"; for optional topic fields the inner
/// `None` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicInput {
    pub title: Option<String>,
    pub topic_type: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Option<String>>,
    pub stage: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
    pub labels: Option<BTreeSet<String>>,
    pub description: Option<Option<String>>,
    pub server_assigned_id: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub index: Option<Option<i64>>,
    pub creation_date: Option<DateTime<Utc>>,
    pub creation_author: Option<String>,
    pub modified_date: Option<Option<DateTime<Utc>>>,
    pub modified_author: Option<Option<String>>,
}

impl Topic {
    pub const DEFAULT_TITLE: &'static str = "BCF Topic";
    pub const DEFAULT_TYPE: &'static str = "Issue";
    pub const DEFAULT_STATUS: &'static str = "Active";

    /// Create a topic with a fresh guid, authored by the configured author.
    pub fn new(config: &BcfConfig) -> Self {
        Self::with_guid(uuid::Uuid::new_v4().to_string(), config)
    }

    /// Create a topic with a guid taken from imported data.
    pub(crate) fn with_guid(guid: String, config: &BcfConfig) -> Self {
        Self {
            guid,
            title: Self::DEFAULT_TITLE.to_string(),
            topic_type: Self::DEFAULT_TYPE.to_string(),
            status: Self::DEFAULT_STATUS.to_string(),
            priority: None,
            stage: None,
            assigned_to: None,
            labels: BTreeSet::new(),
            creation_date: Utc::now(),
            creation_author: config.author.clone(),
            description: None,
            server_assigned_id: None,
            due_date: None,
            index: None,
            modified_date: None,
            modified_author: None,
            comments: BTreeMap::new(),
            viewpoints: BTreeSet::new(),
            related_topics: BTreeSet::new(),
        }
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn topic_type(&self) -> &str {
        &self.topic_type
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn priority(&self) -> Option<&str> {
        self.priority.as_deref()
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn assigned_to(&self) -> Option<&str> {
        self.assigned_to.as_deref()
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.labels
    }

    pub fn related_topics(&self) -> &BTreeSet<String> {
        &self.related_topics
    }

    pub fn set_type(&mut self, value: &str, config: &mut BcfConfig) -> Assignment {
        let outcome = config.admit(TopicField::Type, value);
        if outcome.is_accepted() {
            self.topic_type = value.to_string();
        }
        outcome
    }

    pub fn set_status(&mut self, value: &str, config: &mut BcfConfig) -> Assignment {
        let outcome = config.admit(TopicField::Status, value);
        if outcome.is_accepted() {
            self.status = value.to_string();
        }
        outcome
    }

    pub fn set_priority(&mut self, value: Option<&str>, config: &mut BcfConfig) -> Assignment {
        set_optional(&mut self.priority, TopicField::Priority, value, config)
    }

    pub fn set_stage(&mut self, value: Option<&str>, config: &mut BcfConfig) -> Assignment {
        set_optional(&mut self.stage, TopicField::Stage, value, config)
    }

    pub fn set_assigned_to(&mut self, value: Option<&str>, config: &mut BcfConfig) -> Assignment {
        set_optional(&mut self.assigned_to, TopicField::AssignedTo, value, config)
    }

    /// Replace the label set. Under a strict configuration unknown labels
    /// are dropped one by one; the rest are kept.
    pub fn set_labels<I, S>(&mut self, labels: I, config: &mut BcfConfig) -> Vec<Assignment>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept = BTreeSet::new();
        let mut outcomes = Vec::new();
        for label in labels {
            let label = label.as_ref();
            let outcome = config.admit(TopicField::Label, label);
            if outcome.is_accepted() {
                kept.insert(label.to_string());
            }
            outcomes.push(outcome);
        }
        self.labels = kept;
        outcomes
    }

    pub fn add_label(&mut self, label: &str, config: &mut BcfConfig) -> Assignment {
        let outcome = config.admit(TopicField::Label, label);
        if outcome.is_accepted() {
            self.labels.insert(label.to_string());
        }
        outcome
    }

    pub fn remove_label(&mut self, label: &str) -> bool {
        self.labels.remove(label)
    }

    /// Relate another topic. A topic cannot relate to itself.
    pub fn add_related_topic(&mut self, guid: &str) -> bool {
        if guid == self.guid {
            return false;
        }
        self.related_topics.insert(guid.to_string())
    }

    pub fn remove_related_topic(&mut self, guid: &str) -> bool {
        self.related_topics.remove(guid)
    }

    /// Apply every provided field.
    ///
    /// Returns one outcome per vocabulary-checked value that was provided.
    pub fn set(&mut self, input: &TopicInput, config: &mut BcfConfig) -> Vec<Assignment> {
        let mut outcomes = Vec::new();

        if let Some(ref title) = input.title {
            self.title = title.clone();
        }
        if let Some(ref value) = input.topic_type {
            outcomes.push(self.set_type(value, config));
        }
        if let Some(ref value) = input.status {
            outcomes.push(self.set_status(value, config));
        }
        if let Some(ref value) = input.priority {
            outcomes.push(self.set_priority(value.as_deref(), config));
        }
        if let Some(ref value) = input.stage {
            outcomes.push(self.set_stage(value.as_deref(), config));
        }
        if let Some(ref value) = input.assigned_to {
            outcomes.push(self.set_assigned_to(value.as_deref(), config));
        }
        if let Some(ref labels) = input.labels {
            outcomes.extend(self.set_labels(labels, config));
        }
        if let Some(ref value) = input.description {
            self.description = value.clone();
        }
        if let Some(ref value) = input.server_assigned_id {
            self.server_assigned_id = value.clone();
        }
        if let Some(value) = input.due_date {
            self.due_date = value;
        }
        if let Some(value) = input.index {
            self.index = value;
        }
        if let Some(value) = input.creation_date {
            self.creation_date = value;
        }
        if let Some(ref value) = input.creation_author {
            self.creation_author = value.clone();
        }
        if let Some(value) = input.modified_date {
            self.modified_date = value;
        }
        if let Some(ref value) = input.modified_author {
            self.modified_author = value.clone();
        }

        outcomes
    }

    /// Add a comment authored by the configured author.
    pub fn create_comment(
        &mut self,
        text: &str,
        viewpoint: Option<&str>,
        config: &BcfConfig,
    ) -> &Comment {
        let mut comment = Comment::new(text, config);
        comment.viewpoint = viewpoint.map(str::to_string);
        comment.topic = Some(self.guid.clone());
        let guid = comment.guid.clone();
        self.comments.entry(guid).or_insert(comment)
    }

    pub fn comment(&self, guid: &str) -> Option<&Comment> {
        self.comments.get(guid)
    }

    pub fn comment_mut(&mut self, guid: &str) -> Option<&mut Comment> {
        self.comments.get_mut(guid)
    }

    /// Replace a comment's text, stamping the modification.
    pub fn update_comment(
        &mut self,
        guid: &str,
        text: &str,
        config: &BcfConfig,
    ) -> Option<&Comment> {
        let comment = self.comments.get_mut(guid)?;
        comment.set_text(text, config);
        Some(&*comment)
    }

    pub fn remove_comment(&mut self, guid: &str) -> Option<Comment> {
        self.comments.remove(guid)
    }

    /// Insert an already built comment, claiming it for this topic.
    pub fn insert_comment(&mut self, mut comment: Comment) {
        comment.topic = Some(self.guid.clone());
        self.comments.insert(comment.guid.clone(), comment);
    }

    /// Serialize as a `markup.bcf` document.
    ///
    /// Viewpoint references missing from `store` are left out.
    pub fn serialize<S>(&self, version: SchemaVersion, store: &S) -> String
    where
        S: ViewpointStore + ?Sized,
    {
        let dialect = dialect::for_version(version);

        let comments: Vec<&Comment> = self.comments.values().collect();
        let viewpoints: Vec<&str> = self
            .viewpoints
            .iter()
            .map(String::as_str)
            .filter(|guid| store.contains(guid))
            .collect();

        let mut topic = String::new();
        topic.push_str(&text_tag("Title", Some(&self.title)));
        topic.push_str(&text_tag(
            "CreationDate",
            Some(&format_date(&self.creation_date)),
        ));
        topic.push_str(&text_tag("CreationAuthor", Some(&self.creation_author)));
        topic.push_str(&text_tag("Priority", self.priority.as_deref()));
        topic.push_str(&dialect.write_index(self.index));
        topic.push_str(&text_tag(
            "ModifiedDate",
            self.modified_date.as_ref().map(format_date).as_deref(),
        ));
        topic.push_str(&text_tag("ModifiedAuthor", self.modified_author.as_deref()));
        topic.push_str(&text_tag(
            "DueDate",
            self.due_date.as_ref().map(format_date).as_deref(),
        ));
        topic.push_str(&text_tag("AssignedTo", self.assigned_to.as_deref()));
        topic.push_str(&text_tag("Description", self.description.as_deref()));
        topic.push_str(&text_tag("Stage", self.stage.as_deref()));
        topic.push_str(&dialect.write_labels(&self.labels));
        topic.push_str(&dialect.write_related_topics(&self.related_topics));

        let mut trailer = String::new();
        if dialect.nests_in_topic() {
            topic.push_str(&dialect.write_comments(&comments));
            topic.push_str(&dialect.write_viewpoints(&viewpoints));
        } else {
            trailer.push_str(&dialect.write_comments(&comments));
            trailer.push_str(&dialect.write_viewpoints(&viewpoints));
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Markup><Topic{}{}{}{}>{}</Topic>{}</Markup>",
            attr_pair("Guid", Some(&self.guid)),
            attr_pair("TopicType", Some(&self.topic_type)),
            attr_pair("TopicStatus", Some(&self.status)),
            attr_pair("ServerAssignedId", self.server_assigned_id.as_deref()),
            topic,
            trailer,
        )
    }
}

fn set_optional(
    slot: &mut Option<String>,
    field: TopicField,
    value: Option<&str>,
    config: &mut BcfConfig,
) -> Assignment {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        *slot = None;
        return Assignment::Accepted;
    };
    let outcome = config.admit(field, value);
    if outcome.is_accepted() {
        *slot = Some(value.to_string());
    }
    outcome
}
