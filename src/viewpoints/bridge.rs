//! Links topics to the host's live view.
//!
//! The host implements [`ViewProvider`] over its camera, selection and
//! renderer. The functions here capture the current view into a stored
//! viewpoint, restore a stored viewpoint, and keep topic references
//! consistent when viewpoints are deleted.

use super::{Viewpoint, ViewpointCamera, ViewpointSeed, ViewpointStore};
use crate::topics::BcfTopics;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Selected component guids grouped by the fragment (model part) they
/// belong to.
pub type SelectionSnapshot = BTreeMap<String, BTreeSet<String>>;

/// The host's view: current camera, current selection, and the ability to
/// move the view to a viewpoint.
pub trait ViewProvider {
    /// The camera as currently shown, if there is one.
    fn current_camera(&self) -> Option<ViewpointCamera>;

    fn selection(&self) -> SelectionSnapshot;

    /// Move the view to the viewpoint.
    fn go(&mut self, viewpoint: &Viewpoint) -> Result<()>;
}

/// Capture the current view as a new viewpoint and reference it from a topic.
///
/// Returns the new viewpoint's guid.
pub fn create_viewpoint<S, V>(
    topics: &mut BcfTopics,
    topic_guid: &str,
    store: &mut S,
    view: &V,
    world: &S::World,
) -> Result<String>
where
    S: ViewpointStore + ?Sized,
    V: ViewProvider + ?Sized,
{
    let topic = topics
        .get_mut(topic_guid)
        .ok_or_else(|| Error::NotFound(format!("Topic not found: {}", topic_guid)))?;

    let seed = ViewpointSeed {
        camera: view.current_camera(),
        ..Default::default()
    };
    let viewpoint = store.create(world, seed);
    let selection = view.selection();
    if !selection.is_empty() {
        viewpoint.add_components_from_map(&selection);
    }

    let guid = viewpoint.guid.clone();
    topic.viewpoints.insert(guid.clone());
    tracing::debug!(viewpoint = %guid, topic = %topic_guid, "Created viewpoint for topic");
    Ok(guid)
}

/// Move the view to a stored viewpoint.
pub fn apply_viewpoint<S, V>(store: &S, view: &mut V, guid: &str) -> Result<()>
where
    S: ViewpointStore + ?Sized,
    V: ViewProvider + ?Sized,
{
    let viewpoint = store
        .get(guid)
        .ok_or_else(|| Error::NotFound(format!("Viewpoint not found: {}", guid)))?;
    tracing::debug!(viewpoint = %guid, "Applying viewpoint");
    view.go(viewpoint).inspect_err(|e| {
        tracing::error!(viewpoint = %guid, error = %e, "Failed to apply viewpoint");
    })
}

/// Overwrite a stored viewpoint's camera and selection with the current view.
pub fn update_viewpoint<S, V>(store: &mut S, view: &V, guid: &str) -> Result<()>
where
    S: ViewpointStore + ?Sized,
    V: ViewProvider + ?Sized,
{
    let viewpoint = store
        .get_mut(guid)
        .ok_or_else(|| Error::NotFound(format!("Viewpoint not found: {}", guid)))?;
    if let Some(camera) = view.current_camera() {
        viewpoint.camera = Some(camera);
    }
    viewpoint.selection_components.clear();
    viewpoint.add_components_from_map(&view.selection());
    tracing::debug!(viewpoint = %guid, "Updated viewpoint");
    Ok(())
}

/// Delete a viewpoint and every topic or comment reference to it.
pub fn delete_viewpoint<S>(topics: &mut BcfTopics, store: &mut S, guid: &str) -> Option<Viewpoint>
where
    S: ViewpointStore + ?Sized,
{
    for topic in topics.iter_mut() {
        topic.viewpoints.remove(guid);
        for comment in topic.comments.values_mut() {
            if comment.viewpoint.as_deref() == Some(guid) {
                comment.viewpoint = None;
            }
        }
    }
    let removed = store.remove(guid);
    tracing::debug!(viewpoint = %guid, existed = removed.is_some(), "Deleted viewpoint");
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{WORLD, populated_manager};
    use crate::viewpoints::{MemoryViewpointStore, Projection};
    use nalgebra::Vector3;

    #[derive(Default)]
    struct FakeView {
        camera: Option<ViewpointCamera>,
        selection: SelectionSnapshot,
        visited: Vec<String>,
        fail: bool,
    }

    impl ViewProvider for FakeView {
        fn current_camera(&self) -> Option<ViewpointCamera> {
            self.camera.clone()
        }

        fn selection(&self) -> SelectionSnapshot {
            self.selection.clone()
        }

        fn go(&mut self, viewpoint: &Viewpoint) -> Result<()> {
            if self.fail {
                return Err(Error::Other("renderer unavailable".to_string()));
            }
            self.visited.push(viewpoint.guid.clone());
            Ok(())
        }
    }

    fn camera_at(x: f64) -> ViewpointCamera {
        ViewpointCamera::perspective(
            Vector3::new(x, 1.0, 2.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(0.0, 1.0, 0.0),
        )
    }

    fn selection_of(fragment: &str, ids: &[&str]) -> SelectionSnapshot {
        let mut selection = SelectionSnapshot::new();
        selection.insert(
            fragment.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        );
        selection
    }

    #[test]
    fn test_create_viewpoint_captures_view() {
        let (mut topics, mut store, guid, _vp) = populated_manager();
        let view = FakeView {
            camera: Some(camera_at(5.0)),
            selection: selection_of("frag", &["a", "b"]),
            ..Default::default()
        };

        let created = create_viewpoint(&mut topics, &guid, &mut store, &view, WORLD).unwrap();
        let viewpoint = store.get(&created).unwrap();
        assert_eq!(viewpoint.camera, Some(camera_at(5.0)));
        assert_eq!(viewpoint.selection_components.len(), 2);
        assert!(matches!(
            viewpoint.camera.as_ref().map(|c| c.projection),
            Some(Projection::Perspective { .. })
        ));
        assert!(topics.get(&guid).unwrap().viewpoints.contains(&created));
    }

    #[test]
    fn test_create_viewpoint_unknown_topic() {
        let (mut topics, mut store, _guid, _vp) = populated_manager();
        let before = store.len();
        let result = create_viewpoint(&mut topics, "missing", &mut store, &FakeView::default(), WORLD);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn test_apply_viewpoint() {
        let (_topics, store, _guid, vp) = populated_manager();
        let mut view = FakeView::default();
        apply_viewpoint(&store, &mut view, &vp).unwrap();
        assert_eq!(view.visited, vec![vp.clone()]);

        assert!(apply_viewpoint(&store, &mut view, "missing").is_err());

        view.fail = true;
        assert!(apply_viewpoint(&store, &mut view, &vp).is_err());
    }

    #[test]
    fn test_update_viewpoint_replaces_selection() {
        let (_topics, mut store, _guid, vp) = populated_manager();
        store
            .get_mut(&vp)
            .unwrap()
            .selection_components
            .insert("old".to_string());

        let view = FakeView {
            camera: Some(camera_at(9.0)),
            selection: selection_of("frag", &["new"]),
            ..Default::default()
        };
        update_viewpoint(&mut store, &view, &vp).unwrap();

        let viewpoint = store.get(&vp).unwrap();
        assert_eq!(viewpoint.camera, Some(camera_at(9.0)));
        assert_eq!(
            viewpoint.selection_components,
            BTreeSet::from(["new".to_string()])
        );
    }

    #[test]
    fn test_delete_viewpoint_clears_references() {
        let (mut topics, mut store, guid, vp) = populated_manager();
        let comment = topics.create_comment(&guid, "See view", Some(&vp)).unwrap();

        let removed = delete_viewpoint(&mut topics, &mut store, &vp);
        assert!(removed.is_some());
        assert!(!store.contains(&vp));

        let topic = topics.get(&guid).unwrap();
        assert!(topic.viewpoints.is_empty());
        assert!(!topic.comment(&comment.guid).unwrap().has_viewpoint());

        assert!(delete_viewpoint(&mut topics, &mut store, &vp).is_none());
    }
}
