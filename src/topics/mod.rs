//! The topic manager.
//!
//! [`BcfTopics`] owns the topic collection together with the configuration
//! that validates it. Archive import and export live in [`crate::archive`]
//! as further methods on the same type.

use crate::config::{BcfConfig, ConfigPatch};
use crate::events::Event;
use crate::models::{Assignment, Comment, Topic, TopicField, TopicInput};
use crate::viewpoints::ViewpointStore;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Manages BCF topics and the vocabulary they are validated against.
#[derive(Debug, Default)]
pub struct BcfTopics {
    pub(crate) config: BcfConfig,
    pub(crate) list: BTreeMap<String, Topic>,
    is_setup: bool,
    on_setup: Event<()>,
    pub(crate) on_imported: Event<Vec<Topic>>,
    on_disposed: Event<()>,
}

impl BcfTopics {
    /// Create a manager with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager with the given configuration.
    pub fn with_config(config: BcfConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &BcfConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut BcfConfig {
        &mut self.config
    }

    /// Apply a configuration patch. Only the first call has an effect.
    ///
    /// Returns whether the patch was applied.
    pub fn setup(&mut self, patch: &ConfigPatch) -> bool {
        if self.is_setup {
            return false;
        }
        self.config.apply(patch);
        self.is_setup = true;
        self.on_setup.trigger(&());
        true
    }

    pub fn is_setup(&self) -> bool {
        self.is_setup
    }

    pub fn subscribe_setup<F: FnMut(&()) + 'static>(&mut self, handler: F) {
        self.on_setup.subscribe(handler);
    }

    /// Called with every batch of topics created by an import.
    pub fn subscribe_imported<F: FnMut(&Vec<Topic>) + 'static>(&mut self, handler: F) {
        self.on_imported.subscribe(handler);
    }

    pub fn subscribe_disposed<F: FnMut(&()) + 'static>(&mut self, handler: F) {
        self.on_disposed.subscribe(handler);
    }

    /// Create a topic, apply `input` and register it.
    pub fn create(&mut self, input: Option<TopicInput>) -> &Topic {
        let mut topic = Topic::new(&self.config);
        if let Some(ref input) = input {
            let rejected = topic
                .set(input, &mut self.config)
                .into_iter()
                .filter(Assignment::is_rejected)
                .count();
            if rejected > 0 {
                tracing::debug!(guid = %topic.guid(), rejected, "Strict configuration rejected values");
            }
        }
        let guid = topic.guid().to_string();
        tracing::debug!(guid = %guid, "Created topic");
        self.list.entry(guid).or_insert(topic)
    }

    /// Insert or replace a topic.
    pub fn save(&mut self, topic: Topic) -> &Topic {
        let guid = topic.guid().to_string();
        self.list.insert(guid.clone(), topic);
        &self.list[&guid]
    }

    /// Update a registered topic in place.
    pub fn set(&mut self, guid: &str, input: &TopicInput) -> Result<Vec<Assignment>> {
        let topic = self
            .list
            .get_mut(guid)
            .ok_or_else(|| Error::NotFound(format!("Topic not found: {}", guid)))?;
        Ok(topic.set(input, &mut self.config))
    }

    pub fn get(&self, guid: &str) -> Option<&Topic> {
        self.list.get(guid)
    }

    pub fn get_mut(&mut self, guid: &str) -> Option<&mut Topic> {
        self.list.get_mut(guid)
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.list.contains_key(guid)
    }

    /// Remove a topic and, with it, its comments.
    pub fn remove(&mut self, guid: &str) -> Option<Topic> {
        self.list.remove(guid)
    }

    /// Topics ordered by guid.
    pub fn list(&self) -> impl Iterator<Item = &Topic> {
        self.list.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Topic> {
        self.list.values_mut()
    }

    pub fn guids(&self) -> Vec<String> {
        self.list.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Drop every topic and notify disposal subscribers once.
    pub fn dispose(&mut self) {
        self.list.clear();
        self.on_disposed.trigger(&());
        self.on_disposed.reset();
    }

    /// Add a comment to a topic, authored by the configured author.
    pub fn create_comment(
        &mut self,
        topic_guid: &str,
        text: &str,
        viewpoint: Option<&str>,
    ) -> Result<Comment> {
        let config = &self.config;
        let topic = self
            .list
            .get_mut(topic_guid)
            .ok_or_else(|| Error::NotFound(format!("Topic not found: {}", topic_guid)))?;
        Ok(topic.create_comment(text, viewpoint, config).clone())
    }

    /// Replace a comment's text as the configured author.
    pub fn update_comment(
        &mut self,
        topic_guid: &str,
        comment_guid: &str,
        text: &str,
    ) -> Result<Comment> {
        let config = &self.config;
        let topic = self
            .list
            .get_mut(topic_guid)
            .ok_or_else(|| Error::NotFound(format!("Topic not found: {}", topic_guid)))?;
        topic
            .update_comment(comment_guid, text, config)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Comment not found: {}", comment_guid)))
    }

    /// Distinct topic types in use.
    pub fn used_types(&self) -> BTreeSet<String> {
        self.list().map(|t| t.topic_type().to_string()).collect()
    }

    pub fn used_statuses(&self) -> BTreeSet<String> {
        self.list().map(|t| t.status().to_string()).collect()
    }

    pub fn used_priorities(&self) -> BTreeSet<String> {
        self.list()
            .filter_map(|t| t.priority().map(str::to_string))
            .collect()
    }

    pub fn used_stages(&self) -> BTreeSet<String> {
        self.list()
            .filter_map(|t| t.stage().map(str::to_string))
            .collect()
    }

    /// Every author, assignee and modifier across topics and their comments.
    pub fn used_users(&self) -> BTreeSet<String> {
        let mut users = BTreeSet::new();
        for topic in self.list() {
            users.insert(topic.creation_author.clone());
            users.extend(topic.assigned_to().map(str::to_string));
            users.extend(topic.modified_author.clone());
            for comment in topic.comments.values() {
                users.insert(comment.author.clone());
                users.extend(comment.modified_author.clone());
            }
        }
        users.retain(|user| !user.is_empty());
        users
    }

    pub fn used_labels(&self) -> BTreeSet<String> {
        self.list()
            .flat_map(|t| t.labels().iter().cloned())
            .collect()
    }

    /// Values in use for a vocabulary-checked field.
    pub fn used(&self, field: TopicField) -> BTreeSet<String> {
        match field {
            TopicField::Type => self.used_types(),
            TopicField::Status => self.used_statuses(),
            TopicField::Priority => self.used_priorities(),
            TopicField::Stage => self.used_stages(),
            TopicField::AssignedTo => self.used_users(),
            TopicField::Label => self.used_labels(),
        }
    }

    /// Grow the vocabulary so that every value in use is part of it.
    /// Nothing is ever removed.
    pub fn update_extensions(&mut self) {
        for field in VOCABULARY_FIELDS {
            let used = self.used(field);
            self.config.extend_vocabulary(field, used);
        }
    }

    /// Drop topic viewpoint references the store no longer knows.
    ///
    /// Returns the number of references removed.
    pub fn update_viewpoint_references<S>(&mut self, store: &S) -> usize
    where
        S: ViewpointStore + ?Sized,
    {
        let mut removed = 0;
        for topic in self.list.values_mut() {
            let before = topic.viewpoints.len();
            topic.viewpoints.retain(|guid| store.contains(guid));
            removed += before - topic.viewpoints.len();
        }
        if removed > 0 {
            tracing::debug!(removed, "Removed dangling viewpoint references");
        }
        removed
    }
}

/// Every field backed by a vocabulary set.
pub const VOCABULARY_FIELDS: [TopicField; 6] = [
    TopicField::Type,
    TopicField::Status,
    TopicField::Priority,
    TopicField::Label,
    TopicField::Stage,
    TopicField::AssignedTo,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{WORLD, populated_manager, strict_config};
    use crate::viewpoints::{MemoryViewpointStore, ViewpointSeed};
    use std::cell::RefCell;
    use std::rc::Rc;

    // ==================== Setup Tests ====================

    #[test]
    fn test_setup_applies_once() {
        let mut manager = BcfTopics::new();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        manager.subscribe_setup(move |_| *counter.borrow_mut() += 1);

        let first = ConfigPatch {
            author: Some("first@example.com".to_string()),
            ..Default::default()
        };
        assert!(manager.setup(&first));
        assert!(manager.is_setup());

        let second = ConfigPatch {
            author: Some("second@example.com".to_string()),
            ..Default::default()
        };
        assert!(!manager.setup(&second));
        assert_eq!(manager.config().author, "first@example.com");
        assert_eq!(*calls.borrow(), 1);
    }

    // ==================== Collection Tests ====================

    #[test]
    fn test_create_registers_topic() {
        let mut manager = BcfTopics::new();
        manager.config_mut().author = "jane@example.com".to_string();
        let guid = manager
            .create(Some(TopicInput {
                title: Some("Clash A".to_string()),
                ..Default::default()
            }))
            .guid()
            .to_string();
        let topic = manager.get(&guid).unwrap();
        assert_eq!(topic.title, "Clash A");
        assert_eq!(topic.creation_author, "jane@example.com");
        assert_eq!(manager.len(), 1);

        let blank = manager.create(None).guid().to_string();
        assert_eq!(manager.get(&blank).unwrap().title, "BCF Topic");
    }

    #[test]
    fn test_save_upserts() {
        let mut manager = BcfTopics::new();
        let mut topic = Topic::new(manager.config());
        topic.title = "One".to_string();
        let guid = manager.save(topic.clone()).guid().to_string();
        topic.title = "Two".to_string();
        manager.save(topic);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(&guid).unwrap().title, "Two");
    }

    #[test]
    fn test_set_unknown_topic() {
        let mut manager = BcfTopics::new();
        let result = manager.set("missing", &TopicInput::default());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_set_uses_manager_config() {
        let mut manager = BcfTopics::with_config(strict_config());
        let guid = manager.create(None).guid().to_string();
        let outcomes = manager
            .set(
                &guid,
                &TopicInput {
                    topic_type: Some("Bogus".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(outcomes[0].is_rejected());
        assert_eq!(manager.get(&guid).unwrap().topic_type(), "Issue");
    }

    #[test]
    fn test_remove_drops_comments() {
        let (mut manager, _store, guid, _vp) = populated_manager();
        manager.create_comment(&guid, "Check this", None).unwrap();
        let removed = manager.remove(&guid).unwrap();
        assert_eq!(removed.comments.len(), 1);
        assert!(manager.get(&guid).is_none());
    }

    #[test]
    fn test_dispose_clears_and_notifies() {
        let (mut manager, _store, _guid, _vp) = populated_manager();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        manager.subscribe_disposed(move |_| *counter.borrow_mut() += 1);

        manager.dispose();
        manager.dispose();
        assert!(manager.is_empty());
        assert_eq!(*calls.borrow(), 1);
    }

    // ==================== Comment Tests ====================

    #[test]
    fn test_comment_wrappers() {
        let (mut manager, _store, guid, vp) = populated_manager();
        manager.config_mut().author = "writer@example.com".to_string();
        let comment = manager.create_comment(&guid, "Check this", Some(&vp)).unwrap();
        assert_eq!(comment.author, "writer@example.com");
        assert_eq!(comment.viewpoint.as_deref(), Some(vp.as_str()));

        manager.config_mut().author = "editor@example.com".to_string();
        let updated = manager.update_comment(&guid, &comment.guid, "Done").unwrap();
        assert_eq!(updated.text(), "Done");
        assert_eq!(updated.modified_author.as_deref(), Some("editor@example.com"));

        assert!(manager.create_comment("missing", "x", None).is_err());
        assert!(manager.update_comment(&guid, "missing", "x").is_err());
    }

    // ==================== Derived View Tests ====================

    #[test]
    fn test_used_views() {
        let (mut manager, _store, guid, _vp) = populated_manager();
        manager.config_mut().author = "commenter@example.com".to_string();
        manager.create_comment(&guid, "Check this", None).unwrap();
        manager
            .set(
                &guid,
                &TopicInput {
                    assigned_to: Some(Some("alice@example.com".to_string())),
                    stage: Some(Some("Design".to_string())),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(manager.used_types(), BTreeSet::from(["Clash".to_string()]));
        assert_eq!(manager.used_statuses(), BTreeSet::from(["Active".to_string()]));
        assert_eq!(manager.used_priorities(), BTreeSet::from(["High".to_string()]));
        assert_eq!(manager.used_stages(), BTreeSet::from(["Design".to_string()]));
        assert_eq!(
            manager.used_labels(),
            BTreeSet::from(["A".to_string(), "B".to_string()])
        );
        let users = manager.used_users();
        assert!(users.contains("default@example.com"));
        assert!(users.contains("alice@example.com"));
        assert!(users.contains("commenter@example.com"));
    }

    #[test]
    fn test_update_extensions_is_monotonic() {
        let (mut manager, _store, _guid, _vp) = populated_manager();
        manager.config_mut().types.insert("Unused".to_string());
        let before = manager.config().clone();

        manager.update_extensions();
        let after = manager.config();

        for field in VOCABULARY_FIELDS {
            assert!(before.vocabulary(field).is_subset(after.vocabulary(field)));
            assert!(manager.used(field).is_subset(after.vocabulary(field)));
        }
        assert!(after.types.contains("Unused"));
        assert!(after.labels.contains("A"));
    }

    // ==================== Viewpoint Reference Tests ====================

    #[test]
    fn test_update_viewpoint_references_removes_only_dangling() {
        let (mut manager, mut store, guid, vp) = populated_manager();
        let other = store.create(WORLD, ViewpointSeed::default()).guid.clone();
        {
            let topic = manager.get_mut(&guid).unwrap();
            topic.viewpoints.insert(other.clone());
            topic.viewpoints.insert("gone".to_string());
        }

        store.remove(&other);
        let removed = manager.update_viewpoint_references(&store);
        assert_eq!(removed, 2);
        let topic = manager.get(&guid).unwrap();
        assert_eq!(topic.viewpoints, BTreeSet::from([vp]));
    }

    #[test]
    fn test_update_viewpoint_references_on_empty_store() {
        let (mut manager, _store, guid, _vp) = populated_manager();
        let empty = MemoryViewpointStore::new();
        manager.update_viewpoint_references(&empty);
        assert!(manager.get(&guid).unwrap().viewpoints.is_empty());
    }
}
