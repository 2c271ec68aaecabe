//! Reader for `.bcfv` visualization documents.

use crate::Result;
use crate::viewpoints::{
    ClippingPlane, DEFAULT_ASPECT_RATIO, DEFAULT_FIELD_OF_VIEW, Projection, ViewpointCamera,
    ViewpointSeed, from_bcf_plane_normal, from_bcf_point,
};
use crate::xml::Element;
use nalgebra::Vector3;
use std::collections::{BTreeMap, BTreeSet};

/// What a `.bcfv` document yielded.
#[derive(Debug, Clone, PartialEq)]
pub enum VisInfo {
    Seed(ViewpointSeed),
    /// The root element is not `<VisualizationInfo>`
    MissingVisualizationInfo,
    MissingGuid,
}

/// Parse a `.bcfv` document into a viewpoint seed in viewer coordinates.
pub fn parse(xml: &str) -> Result<VisInfo> {
    let root = Element::parse(xml)?;
    if root.name != "VisualizationInfo" {
        return Ok(VisInfo::MissingVisualizationInfo);
    }
    let Some(guid) = root.value("Guid") else {
        return Ok(VisInfo::MissingGuid);
    };

    let mut seed = ViewpointSeed {
        guid: Some(guid.to_string()),
        camera: read_camera(&root),
        clipping_planes: read_clipping_planes(&root),
        ..Default::default()
    };

    if let Some(components) = root.child("Components") {
        if let Some(selection) = components.child("Selection") {
            seed.selection_components = component_guids(selection);
        }
        if let Some(visibility) = components.child("Visibility") {
            seed.default_visibility = visibility
                .attr("DefaultVisibility")
                .map(|v| v.eq_ignore_ascii_case("true"));
            if let Some(exceptions) = visibility.child("Exceptions") {
                seed.exception_components = component_guids(exceptions);
            }
        }
        if let Some(coloring) = components.child("Coloring") {
            seed.component_colors = read_colors(coloring);
        }
    }

    Ok(VisInfo::Seed(seed))
}

fn component_guids(parent: &Element) -> BTreeSet<String> {
    parent
        .children_named("Component")
        .filter_map(|c| c.value("IfcGuid"))
        .map(str::to_string)
        .collect()
}

fn read_colors(coloring: &Element) -> BTreeMap<String, Vec<String>> {
    let mut colors: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for color in coloring.children_named("Color") {
        let Some(hex) = color.attr("Color") else {
            continue;
        };
        colors
            .entry(hex.to_string())
            .or_default()
            .extend(component_guids(color));
    }
    colors
}

fn number(parent: &Element, name: &str) -> Option<f64> {
    parent.child_text(name)?.parse().ok()
}

fn vector(parent: &Element, name: &str) -> Option<Vector3<f64>> {
    let element = parent.child(name)?;
    Some(Vector3::new(
        number(element, "X")?,
        number(element, "Y")?,
        number(element, "Z")?,
    ))
}

fn read_camera(root: &Element) -> Option<ViewpointCamera> {
    let camera = root
        .child("OrthogonalCamera")
        .or_else(|| root.child("PerspectiveCamera"))?;

    let position = vector(camera, "CameraViewPoint")?;
    let direction = vector(camera, "CameraDirection")?;
    let up = vector(camera, "CameraUpVector")?;

    let projection = if let Some(scale) = number(camera, "ViewToWorldScale") {
        Projection::Orthographic {
            view_to_world_scale: scale,
        }
    } else {
        Projection::Perspective {
            fov: number(camera, "FieldOfView").unwrap_or(DEFAULT_FIELD_OF_VIEW),
        }
    };

    Some(ViewpointCamera {
        position: from_bcf_point(&position),
        direction: from_bcf_point(&direction),
        up: from_bcf_point(&up),
        aspect_ratio: number(camera, "AspectRatio").unwrap_or(DEFAULT_ASPECT_RATIO),
        projection,
    })
}

fn read_clipping_planes(root: &Element) -> Vec<ClippingPlane> {
    let Some(planes) = root.child("ClippingPlanes") else {
        return Vec::new();
    };
    planes
        .children_named("ClippingPlane")
        .filter_map(|plane| {
            let location = vector(plane, "Location")?;
            let direction = vector(plane, "Direction")?;
            Some(ClippingPlane {
                location: from_bcf_point(&location),
                normal: from_bcf_plane_normal(&direction),
                enabled: false,
                visible: false,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewpoints::Viewpoint;

    fn seed(xml: &str) -> ViewpointSeed {
        match parse(xml).unwrap() {
            VisInfo::Seed(seed) => seed,
            other => panic!("expected a seed, got {:?}", other),
        }
    }

    const PERSPECTIVE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <VisualizationInfo Guid="vp-1">
          <Components>
            <Selection><Component IfcGuid="sel-1"/><Component IfcGuid="sel-2"/></Selection>
            <Visibility DefaultVisibility="false">
              <Exceptions><Component IfcGuid="exc-1"/></Exceptions>
            </Visibility>
            <Coloring>
              <Color Color="FF0000"><Component IfcGuid="red-1"/><Component IfcGuid="red-2"/></Color>
            </Coloring>
          </Components>
          <PerspectiveCamera>
            <CameraViewPoint><X>1</X><Y>2</Y><Z>3</Z></CameraViewPoint>
            <CameraDirection><X>0</X><Y>1</Y><Z>0</Z></CameraDirection>
            <CameraUpVector><X>0</X><Y>0</Y><Z>1</Z></CameraUpVector>
            <FieldOfView>60</FieldOfView>
            <AspectRatio>1.5</AspectRatio>
          </PerspectiveCamera>
          <ClippingPlanes>
            <ClippingPlane>
              <Location><X>1</X><Y>2</Y><Z>3</Z></Location>
              <Direction><X>0</X><Y>0</Y><Z>1</Z></Direction>
            </ClippingPlane>
            <ClippingPlane><Location><X>0</X><Y>0</Y><Z>0</Z></Location></ClippingPlane>
          </ClippingPlanes>
        </VisualizationInfo>"#;

    #[test]
    fn test_parse_perspective_viewpoint() {
        let seed = seed(PERSPECTIVE);
        assert_eq!(seed.guid.as_deref(), Some("vp-1"));
        assert_eq!(seed.selection_components.len(), 2);
        assert_eq!(seed.default_visibility, Some(false));
        assert!(seed.exception_components.contains("exc-1"));
        assert_eq!(seed.component_colors["FF0000"], vec!["red-1", "red-2"]);

        let camera = seed.camera.unwrap();
        assert_eq!(camera.position, Vector3::new(1.0, 3.0, -2.0));
        assert_eq!(camera.direction, Vector3::new(0.0, 0.0, -1.0));
        assert_eq!(camera.up, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(camera.aspect_ratio, 1.5);
        assert_eq!(camera.projection, Projection::Perspective { fov: 60.0 });
    }

    #[test]
    fn test_clipping_planes_are_remapped_and_disabled() {
        let seed = seed(PERSPECTIVE);
        assert_eq!(seed.clipping_planes.len(), 1);
        let plane = &seed.clipping_planes[0];
        assert_eq!(plane.location, Vector3::new(1.0, 3.0, -2.0));
        assert_eq!(plane.normal, Vector3::new(0.0, -1.0, 0.0));
        assert!(!plane.enabled);
        assert!(!plane.visible);
    }

    #[test]
    fn test_orthogonal_camera() {
        let seed = seed(
            r#"<VisualizationInfo Guid="vp-2">
                <OrthogonalCamera>
                  <CameraViewPoint><X>0</X><Y>0</Y><Z>10</Z></CameraViewPoint>
                  <CameraDirection><X>0</X><Y>0</Y><Z>-1</Z></CameraDirection>
                  <CameraUpVector><X>0</X><Y>1</Y><Z>0</Z></CameraUpVector>
                  <ViewToWorldScale>25</ViewToWorldScale>
                </OrthogonalCamera>
              </VisualizationInfo>"#,
        );
        let camera = seed.camera.unwrap();
        assert!(camera.is_orthographic());
        assert_eq!(
            camera.projection,
            Projection::Orthographic {
                view_to_world_scale: 25.0
            }
        );
        assert_eq!(camera.aspect_ratio, DEFAULT_ASPECT_RATIO);
        assert_eq!(seed.default_visibility, None);
    }

    #[test]
    fn test_camera_without_projection_values_defaults_to_perspective() {
        let seed = seed(
            r#"<VisualizationInfo Guid="vp-3">
                <PerspectiveCamera>
                  <CameraViewPoint><X>0</X><Y>0</Y><Z>0</Z></CameraViewPoint>
                  <CameraDirection><X>1</X><Y>0</Y><Z>0</Z></CameraDirection>
                  <CameraUpVector><X>0</X><Y>0</Y><Z>1</Z></CameraUpVector>
                </PerspectiveCamera>
              </VisualizationInfo>"#,
        );
        assert_eq!(
            seed.camera.unwrap().projection,
            Projection::Perspective {
                fov: DEFAULT_FIELD_OF_VIEW
            }
        );
    }

    #[test]
    fn test_missing_root_or_guid() {
        assert_eq!(
            parse("<Markup Guid=\"x\"/>").unwrap(),
            VisInfo::MissingVisualizationInfo
        );
        assert_eq!(
            parse("<VisualizationInfo><Components/></VisualizationInfo>").unwrap(),
            VisInfo::MissingGuid
        );
    }

    #[test]
    fn test_reads_serialized_viewpoint() {
        let original = Viewpoint::from_seed("main", seed(PERSPECTIVE));
        let reread = Viewpoint::from_seed("main", seed(&original.serialize(true)));
        assert_eq!(reread, original);
    }
}
