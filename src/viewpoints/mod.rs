//! Viewpoints and the store that owns them.
//!
//! Topics and comments only hold viewpoint guids. The viewpoints themselves
//! live in a [`ViewpointStore`] owned by the host application; the
//! [`MemoryViewpointStore`] is the in-process implementation used by the CLI
//! and the tests.
//!
//! Viewer space is Y-up while BCF is Z-up. [`from_bcf_point`] and
//! [`from_bcf_plane_normal`] convert incoming coordinates, and their inverses
//! are applied when a viewpoint is written back to `.bcfv`.

pub mod bridge;

pub use bridge::{
    SelectionSnapshot, ViewProvider, apply_viewpoint, create_viewpoint, delete_viewpoint,
    update_viewpoint,
};

use crate::xml::{attr_pair, escape};
use nalgebra::Vector3;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Field of view used when a camera declares neither projection.
pub const DEFAULT_FIELD_OF_VIEW: f64 = 45.0;

/// Aspect ratio used when a camera declares none.
pub const DEFAULT_ASPECT_RATIO: f64 = 1.0;

/// Camera projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Projection {
    Perspective { fov: f64 },
    Orthographic { view_to_world_scale: f64 },
}

/// A camera in viewer coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewpointCamera {
    pub position: Vector3<f64>,
    pub direction: Vector3<f64>,
    pub up: Vector3<f64>,
    pub aspect_ratio: f64,
    pub projection: Projection,
}

impl ViewpointCamera {
    pub fn perspective(position: Vector3<f64>, direction: Vector3<f64>, up: Vector3<f64>) -> Self {
        Self {
            position,
            direction,
            up,
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            projection: Projection::Perspective {
                fov: DEFAULT_FIELD_OF_VIEW,
            },
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self.projection, Projection::Orthographic { .. })
    }
}

/// A clipping plane in viewer coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClippingPlane {
    /// A point on the plane
    pub location: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub enabled: bool,
    pub visible: bool,
}

/// A saved view: camera, component states and clipping planes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewpoint {
    pub guid: String,

    /// Identifier of the world (scene) the viewpoint belongs to
    pub world: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<ViewpointCamera>,

    /// Selected component guids
    pub selection_components: BTreeSet<String>,

    /// Components whose visibility is the opposite of `default_visibility`
    pub exception_components: BTreeSet<String>,

    /// Hex color to component guids
    pub component_colors: BTreeMap<String, Vec<String>>,

    pub clipping_planes: Vec<ClippingPlane>,

    pub default_visibility: bool,
}

/// Everything needed to create a viewpoint. An absent guid gets a fresh one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewpointSeed {
    pub guid: Option<String>,
    pub camera: Option<ViewpointCamera>,
    pub selection_components: BTreeSet<String>,
    pub exception_components: BTreeSet<String>,
    pub component_colors: BTreeMap<String, Vec<String>>,
    pub clipping_planes: Vec<ClippingPlane>,
    pub default_visibility: Option<bool>,
}

impl Viewpoint {
    /// Build a viewpoint from a seed.
    pub fn from_seed(world: impl Into<String>, seed: ViewpointSeed) -> Self {
        Self {
            guid: seed
                .guid
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            world: world.into(),
            camera: seed.camera,
            selection_components: seed.selection_components,
            exception_components: seed.exception_components,
            component_colors: seed.component_colors,
            clipping_planes: seed.clipping_planes,
            default_visibility: seed.default_visibility.unwrap_or(true),
        }
    }

    /// Add every component of a fragment-grouped selection.
    pub fn add_components_from_map(&mut self, selection: &SelectionSnapshot) {
        for components in selection.values() {
            self.selection_components.extend(components.iter().cloned());
        }
    }

    /// Serialize as a `.bcfv` document, converting back to BCF coordinates.
    ///
    /// `<Selection>` is written only when `include_selection_tag` is set.
    pub fn serialize(&self, include_selection_tag: bool) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<VisualizationInfo{}>",
            attr_pair("Guid", Some(&self.guid))
        ));

        out.push_str("<Components>");
        if include_selection_tag && !self.selection_components.is_empty() {
            out.push_str("<Selection>");
            out.push_str(&components_xml(self.selection_components.iter()));
            out.push_str("</Selection>");
        }
        out.push_str(&format!(
            "<Visibility DefaultVisibility=\"{}\">",
            self.default_visibility
        ));
        if !self.exception_components.is_empty() {
            out.push_str("<Exceptions>");
            out.push_str(&components_xml(self.exception_components.iter()));
            out.push_str("</Exceptions>");
        }
        out.push_str("</Visibility>");
        if !self.component_colors.is_empty() {
            out.push_str("<Coloring>");
            for (color, guids) in &self.component_colors {
                out.push_str(&format!("<Color{}>", attr_pair("Color", Some(color))));
                out.push_str(&components_xml(guids.iter()));
                out.push_str("</Color>");
            }
            out.push_str("</Coloring>");
        }
        out.push_str("</Components>");

        if let Some(ref camera) = self.camera {
            out.push_str(&camera_xml(camera));
        }

        if !self.clipping_planes.is_empty() {
            out.push_str("<ClippingPlanes>");
            for plane in &self.clipping_planes {
                out.push_str("<ClippingPlane>");
                out.push_str(&vector_xml("Location", &to_bcf_point(&plane.location)));
                out.push_str(&vector_xml("Direction", &to_bcf_plane_normal(&plane.normal)));
                out.push_str("</ClippingPlane>");
            }
            out.push_str("</ClippingPlanes>");
        }

        out.push_str("</VisualizationInfo>");
        out
    }
}

fn components_xml<'a>(guids: impl Iterator<Item = &'a String>) -> String {
    guids
        .map(|guid| format!("<Component IfcGuid=\"{}\"/>", escape(guid)))
        .collect()
}

fn vector_xml(name: &str, v: &Vector3<f64>) -> String {
    format!("<{name}><X>{}</X><Y>{}</Y><Z>{}</Z></{name}>", v.x, v.y, v.z)
}

fn camera_xml(camera: &ViewpointCamera) -> String {
    let (tag, extra) = match camera.projection {
        Projection::Perspective { fov } => {
            ("PerspectiveCamera", format!("<FieldOfView>{}</FieldOfView>", fov))
        }
        Projection::Orthographic {
            view_to_world_scale,
        } => (
            "OrthogonalCamera",
            format!("<ViewToWorldScale>{}</ViewToWorldScale>", view_to_world_scale),
        ),
    };
    format!(
        "<{tag}>{}{}{}{}<AspectRatio>{}</AspectRatio></{tag}>",
        vector_xml("CameraViewPoint", &to_bcf_point(&camera.position)),
        vector_xml("CameraDirection", &to_bcf_point(&camera.direction)),
        vector_xml("CameraUpVector", &to_bcf_point(&camera.up)),
        extra,
        camera.aspect_ratio,
    )
}

/// BCF point, direction or up vector to viewer space: `(X, Y, Z) -> (X, Z, -Y)`.
pub fn from_bcf_point(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, v.z, -v.y)
}

/// Inverse of [`from_bcf_point`].
pub fn to_bcf_point(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, -v.z, v.y)
}

/// BCF clipping-plane direction to viewer space: `(X, Y, Z) -> (X, -Z, Y)`.
pub fn from_bcf_plane_normal(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, -v.z, v.y)
}

/// Inverse of [`from_bcf_plane_normal`].
pub fn to_bcf_plane_normal(v: &Vector3<f64>) -> Vector3<f64> {
    Vector3::new(v.x, v.z, -v.y)
}

/// External owner of viewpoints.
///
/// The world type is whatever the host uses to identify a scene.
pub trait ViewpointStore {
    type World: ?Sized;

    /// Create (or replace, when the seed guid already exists) a viewpoint.
    fn create(&mut self, world: &Self::World, seed: ViewpointSeed) -> &mut Viewpoint;

    fn get(&self, guid: &str) -> Option<&Viewpoint>;

    fn get_mut(&mut self, guid: &str) -> Option<&mut Viewpoint>;

    fn contains(&self, guid: &str) -> bool {
        self.get(guid).is_some()
    }

    fn remove(&mut self, guid: &str) -> Option<Viewpoint>;

    fn guids(&self) -> Vec<String>;

    /// JPEG snapshot of the viewpoint, if the store has one.
    fn snapshot(&self, _guid: &str) -> Option<Vec<u8>> {
        None
    }

    /// Remember a snapshot read from an archive. Stores without snapshot
    /// support ignore it.
    fn set_snapshot(&mut self, _guid: &str, _image: Vec<u8>) {}
}

/// In-memory viewpoint store keyed by guid. Worlds are plain names.
#[derive(Debug, Clone, Default)]
pub struct MemoryViewpointStore {
    viewpoints: BTreeMap<String, Viewpoint>,
    snapshots: BTreeMap<String, Vec<u8>>,
}

impl MemoryViewpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.viewpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Viewpoint> {
        self.viewpoints.values()
    }
}

impl ViewpointStore for MemoryViewpointStore {
    type World = str;

    fn create(&mut self, world: &str, seed: ViewpointSeed) -> &mut Viewpoint {
        let viewpoint = Viewpoint::from_seed(world, seed);
        let guid = viewpoint.guid.clone();
        self.snapshots.remove(&guid);
        tracing::debug!(guid = %guid, world, "Created viewpoint");
        match self.viewpoints.entry(guid) {
            Entry::Occupied(mut slot) => {
                slot.insert(viewpoint);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(viewpoint),
        }
    }

    fn get(&self, guid: &str) -> Option<&Viewpoint> {
        self.viewpoints.get(guid)
    }

    fn get_mut(&mut self, guid: &str) -> Option<&mut Viewpoint> {
        self.viewpoints.get_mut(guid)
    }

    fn remove(&mut self, guid: &str) -> Option<Viewpoint> {
        self.snapshots.remove(guid);
        self.viewpoints.remove(guid)
    }

    fn guids(&self) -> Vec<String> {
        self.viewpoints.keys().cloned().collect()
    }

    fn snapshot(&self, guid: &str) -> Option<Vec<u8>> {
        self.snapshots.get(guid).cloned()
    }

    fn set_snapshot(&mut self, guid: &str, image: Vec<u8>) {
        if self.viewpoints.contains_key(guid) {
            self.snapshots.insert(guid.to_string(), image);
        }
    }
}
