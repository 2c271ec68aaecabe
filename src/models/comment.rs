use super::{format_date, same_millis};
use crate::config::BcfConfig;
use crate::xml::{attr_pair, text_tag};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// A remark attached to a topic.
///
/// The viewpoint and the owning topic are held as guid references; the
/// viewpoint itself lives in a [`crate::ViewpointStore`].
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    /// Unique identifier (UUID v4 unless imported)
    pub guid: String,

    /// Creation timestamp
    pub date: DateTime<Utc>,

    /// Author at creation time
    pub author: String,

    /// Comment body
    text: String,

    /// Guid of the viewpoint this comment refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_author: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_date: Option<DateTime<Utc>>,

    /// Guid of the owning topic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl Comment {
    /// Create a comment authored by the configured author.
    pub fn new(text: impl Into<String>, config: &BcfConfig) -> Self {
        Self {
            guid: uuid::Uuid::new_v4().to_string(),
            date: Utc::now(),
            author: config.author.clone(),
            text: text.into(),
            viewpoint: None,
            modified_author: None,
            modified_date: None,
            topic: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text and stamp the modification.
    pub fn set_text(&mut self, text: impl Into<String>, config: &BcfConfig) {
        self.text = text.into();
        self.touch(config);
    }

    /// Refer this comment to a viewpoint.
    pub fn attach_viewpoint(&mut self, viewpoint: impl Into<String>, config: &BcfConfig) {
        self.viewpoint = Some(viewpoint.into());
        self.touch(config);
    }

    /// Drop the viewpoint reference, if any.
    pub fn detach_viewpoint(&mut self, config: &BcfConfig) {
        self.viewpoint = None;
        self.touch(config);
    }

    pub fn has_viewpoint(&self) -> bool {
        self.viewpoint.is_some()
    }

    pub fn is_modified(&self) -> bool {
        self.modified_date.is_some()
    }

    fn touch(&mut self, config: &BcfConfig) {
        self.modified_date = Some(Utc::now());
        self.modified_author = Some(config.author.clone());
    }

    /// Age of the comment, e.g. `"3 minutes ago"`.
    pub fn time_since_creation(&self) -> String {
        self.time_since(Utc::now())
    }

    fn time_since(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.date).num_seconds().max(0);
        if seconds < 60 {
            format!("{} seconds ago", seconds)
        } else if seconds < 3600 {
            format!("{} minutes ago", seconds / 60)
        } else if seconds < 86400 {
            format!("{} hours ago", seconds / 3600)
        } else {
            format!("{} days ago", seconds / 86400)
        }
    }

    /// Serialize as a BCF `<Comment>` element.
    pub fn serialize(&self) -> String {
        let viewpoint = self
            .viewpoint
            .as_deref()
            .filter(|guid| !guid.trim().is_empty())
            .map(|guid| format!("<Viewpoint{}/>", attr_pair("Guid", Some(guid))))
            .unwrap_or_default();
        format!(
            "<Comment{}>{}{}{}{}{}{}</Comment>",
            attr_pair("Guid", Some(&self.guid)),
            text_tag("Date", Some(&format_date(&self.date))),
            text_tag("Author", Some(&self.author)),
            text_tag("Comment", Some(&self.text)),
            viewpoint,
            text_tag("ModifiedAuthor", self.modified_author.as_deref()),
            text_tag(
                "ModifiedDate",
                self.modified_date.as_ref().map(format_date).as_deref()
            ),
        )
    }
}

impl PartialEq for Comment {
    fn eq(&self, other: &Self) -> bool {
        self.guid == other.guid
            && same_millis(Some(&self.date), Some(&other.date))
            && self.author == other.author
            && self.text == other.text
            && self.viewpoint == other.viewpoint
            && self.modified_author == other.modified_author
            && same_millis(self.modified_date.as_ref(), other.modified_date.as_ref())
            && self.topic == other.topic
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Comment(guid: {}, author: {}, date: {})",
            self.guid,
            self.author,
            format_date(&self.date)
        )
    }
}
