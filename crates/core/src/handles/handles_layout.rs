use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use gizmo_scene::{EntityKind, ProxyEdit, RingStyle};

use super::{align_y_to, Axis, HandleId, ParentState, RotateAxis, SpaceMode, ToolKind};
use crate::geometry::point_in_oriented_box;
use crate::selection::{LocalTransform, WorldTransform};
use crate::settings::{HandleSettings, RotationSettings};

pub struct LayoutInput<'a> {
    pub world: Option<WorldTransform>,
    pub local: Option<LocalTransform>,
    pub selection_len: usize,
    pub kind: Option<EntityKind>,
    pub space_mode: SpaceMode,
    pub camera_position: Vec3,
    pub active_tool: Option<ToolKind>,
    pub snap_held: bool,
    pub hmd_active: bool,
    pub parent_state: ParentState,
    pub handles: &'a HandleSettings,
    pub rotation: &'a RotationSettings,
}

/// Proxy edits for one frame. Handles a tool shows and hides itself (rails,
/// readout, panels) only get geometry here.
#[derive(Debug, Clone, Default)]
pub struct HandleLayout {
    edits: BTreeMap<HandleId, ProxyEdit>,
    pub rotate_dimension: f32,
    pub camera_inside: bool,
}

impl HandleLayout {
    pub fn edits(&self) -> impl Iterator<Item = (&HandleId, &ProxyEdit)> {
        self.edits.iter()
    }

    pub fn get(&self, handle: HandleId) -> Option<&ProxyEdit> {
        self.edits.get(&handle)
    }

    pub fn visible(&self, handle: HandleId) -> Option<bool> {
        self.get(handle).and_then(|edit| edit.visible)
    }

    fn put(&mut self, handle: HandleId, edit: ProxyEdit) {
        self.edits.insert(handle, edit);
    }
}

fn placed(position: Vec3, rotation: Quat, dimensions: Vec3) -> ProxyEdit {
    ProxyEdit {
        position: Some(position),
        rotation: Some(rotation),
        dimensions: Some(dimensions),
        ..ProxyEdit::default()
    }
}

pub fn layout(input: &LayoutInput<'_>) -> HandleLayout {
    let mut out = HandleLayout::default();
    let Some(world) = input.world.filter(|_| input.selection_len > 0) else {
        for handle in HandleId::ALL {
            out.put(handle, ProxyEdit::visible(false));
        }
        return out;
    };

    let local = input
        .local
        .filter(|_| input.space_mode == SpaceMode::Local && input.selection_len == 1);
    let position = world.position;
    let (rotation, dimensions) = match local {
        Some(local) => (local.rotation, local.dimensions),
        None => (world.rotation, world.dimensions),
    };
    let settings = input.handles;
    let active = input.active_tool;
    let idle = active.is_none();
    let rotating = active.is_some_and(ToolKind::is_rotate);

    let camera_inside = point_in_oriented_box(input.camera_position, position, rotation, dimensions);
    let max_handle_dimension = if input.hmd_active && !camera_inside {
        dimensions.max_element()
    } else {
        0.0
    };
    let camera_distance = input.camera_position.distance(position);
    let rotate_dimension =
        max_handle_dimension.max(camera_distance * settings.ring_camera_distance_multiple);
    let relative = |multiple: f32| rotate_dimension * multiple / settings.ring_camera_distance_multiple;
    out.rotate_dimension = rotate_dimension;
    out.camera_inside = camera_inside;

    // Rotation rings.
    let ring_dimensions = Vec3::splat(rotate_dimension);
    for axis in RotateAxis::ALL {
        let ring_rotation = rotation * align_y_to(axis.axis());
        let selected = active == Some(ToolKind::Rotate(axis));
        let ring = RingStyle {
            inner_radius: if selected {
                input.rotation.selected_inner_radius
            } else {
                input.rotation.idle_inner_radius
            },
            major_tick_marks_angle: if selected && input.snap_held {
                input.rotation.snap_tick_marks_angle
            } else {
                input.rotation.tick_marks_angle
            },
            ..RingStyle::default()
        };
        let mut edit = placed(position, ring_rotation, ring_dimensions);
        edit.ring = Some(ring);
        edit.visible = Some(idle || selected);
        out.put(HandleId::RotateRing(axis), edit);
    }
    out.put(
        HandleId::RotateCurrentRing,
        ProxyEdit {
            dimensions: Some(ring_dimensions),
            ..ProxyEdit::default()
        },
    );

    // Translation arrows.
    let cylinder_dimension = relative(settings.arrow_cylinder_camera_distance_multiple);
    let cylinder_dimensions = Vec3::new(
        cylinder_dimension,
        cylinder_dimension * settings.arrow_cylinder_length_multiple,
        cylinder_dimension,
    );
    let cylinder_offset = relative(settings.arrow_cylinder_offset);
    let cone_dimensions = Vec3::splat(relative(settings.arrow_cone_camera_distance_multiple));
    for axis in Axis::ALL {
        let direction = rotation * axis.unit();
        let arrow_rotation = rotation * align_y_to(axis);
        let cylinder_position = position + direction * cylinder_offset;
        let cone_position =
            cylinder_position + direction * (cylinder_dimensions.y * settings.arrow_cone_offset_multiple);
        let visible = idle || active == Some(ToolKind::TranslateAxis(axis));
        let mut cylinder = placed(cylinder_position, arrow_rotation, cylinder_dimensions);
        cylinder.visible = Some(visible);
        out.put(HandleId::TranslateCylinder(axis), cylinder);
        let mut cone = placed(cone_position, arrow_rotation, cone_dimensions);
        cone.visible = Some(visible);
        out.put(HandleId::TranslateCone(axis), cone);
    }

    // Stretch and scale are local-space single-selection affordances.
    let show_scale_stretch = idle && input.selection_len == 1 && local.is_some();
    let stretch_offset = relative(settings.stretch_cube_offset);
    let stretch_dimensions = Vec3::splat(relative(settings.stretch_cube_camera_distance_multiple));
    for axis in Axis::ALL {
        let mut cube = placed(
            position + rotation * (axis.unit() * stretch_offset),
            rotation,
            stretch_dimensions,
        );
        cube.visible = Some(show_scale_stretch || active == Some(ToolKind::Stretch(axis)));
        out.put(HandleId::StretchCube(axis), cube);

        let half = dimensions * 0.5;
        let (offset, panel_dimensions) = match axis {
            Axis::X => (
                Vec3::new(half.x, 0.0, 0.0),
                Vec3::new(settings.stretch_panel_width, dimensions.y, dimensions.z),
            ),
            Axis::Y => (
                Vec3::new(0.0, half.y, 0.0),
                Vec3::new(dimensions.x, settings.stretch_panel_width, dimensions.z),
            ),
            Axis::Z => (
                Vec3::new(0.0, 0.0, half.z),
                Vec3::new(dimensions.x, dimensions.y, settings.stretch_panel_width),
            ),
        };
        out.put(
            HandleId::StretchPanel(axis),
            placed(position + rotation * offset, rotation, panel_dimensions),
        );
    }

    let scale_dimensions = Vec3::splat(relative(settings.scale_cube_camera_distance_multiple));
    let mut scale = placed(position, rotation, scale_dimensions);
    scale.visible = Some(
        show_scale_stretch || matches!(active, Some(ToolKind::Scale | ToolKind::Stretch(_))),
    );
    out.put(HandleId::ScaleCube, scale);

    let mut bounding = placed(position, rotation, dimensions);
    bounding.color = Some(input.parent_state.bounding_color());
    bounding.visible = Some(
        (input.kind == Some(EntityKind::Zone) && input.selection_len == 1) || !rotating,
    );
    out.put(HandleId::BoundingBox, bounding);

    let mut selection_box = placed(position, rotation, dimensions);
    selection_box.visible = Some(!rotating && !camera_inside);
    out.put(HandleId::SelectionBox, selection_box);

    let icon_visible = input.kind.is_some_and(EntityKind::uses_icon_selection) && !rotating && camera_inside;
    out.put(
        HandleId::IconSelectionBox,
        ProxyEdit {
            position: Some(position),
            rotation: Some(rotation),
            visible: Some(icon_visible),
            ..ProxyEdit::default()
        },
    );

    let mut duplicator = placed(
        position + rotation * (settings.duplicator_offset * rotate_dimension),
        rotation,
        scale_dimensions,
    );
    duplicator.visible = Some(
        (idle && input.hmd_active && settings.duplicator_in_hmd)
            || active == Some(ToolKind::Duplicate),
    );
    out.put(HandleId::Duplicator, duplicator);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> (WorldTransform, LocalTransform) {
        (
            WorldTransform {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                dimensions: Vec3::ONE,
            },
            LocalTransform {
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                dimensions: Vec3::ONE,
                registration_point: Vec3::splat(0.5),
            },
        )
    }

    fn input<'a>(
        handles: &'a HandleSettings,
        rotation: &'a RotationSettings,
        active_tool: Option<ToolKind>,
    ) -> LayoutInput<'a> {
        let (world, local) = unit_box();
        LayoutInput {
            world: Some(world),
            local: Some(local),
            selection_len: 1,
            kind: Some(EntityKind::Box),
            space_mode: SpaceMode::Local,
            camera_position: Vec3::new(0.0, 0.0, 10.0),
            active_tool,
            snap_held: false,
            hmd_active: false,
            parent_state: ParentState::None,
            handles,
            rotation,
        }
    }

    #[test]
    fn sizes_scale_with_camera_distance() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let out = layout(&input(&handles, &rotation, None));
        assert!((out.rotate_dimension - 1.5).abs() < 1.0e-5);
        let cylinder = out.get(HandleId::TranslateCylinder(Axis::X)).expect("cylinder");
        let position = cylinder.position.expect("position");
        assert!((position.x - 1.0).abs() < 1.0e-5);
        let dims = cylinder.dimensions.expect("dims");
        assert!((dims.y - 0.375).abs() < 1.0e-5);
        let cone = out.get(HandleId::TranslateCone(Axis::X)).and_then(|e| e.position).expect("cone");
        assert!((cone.x - (1.0 + 0.375 * 0.83)).abs() < 1.0e-4);
        assert_eq!(out.visible(HandleId::ScaleCube), Some(true));
        assert_eq!(out.visible(HandleId::Duplicator), Some(false));
    }

    #[test]
    fn active_translate_shows_only_its_axis() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let out = layout(&input(&handles, &rotation, Some(ToolKind::TranslateAxis(Axis::Y))));
        assert_eq!(out.visible(HandleId::TranslateCone(Axis::Y)), Some(true));
        assert_eq!(out.visible(HandleId::TranslateCone(Axis::X)), Some(false));
        assert_eq!(out.visible(HandleId::RotateRing(RotateAxis::Yaw)), Some(false));
        assert_eq!(out.visible(HandleId::StretchCube(Axis::Y)), Some(false));
        assert_eq!(out.visible(HandleId::BoundingBox), Some(true));
    }

    #[test]
    fn rotating_hides_boxes_and_marks_selected_ring() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let mut layout_input = input(&handles, &rotation, Some(ToolKind::Rotate(RotateAxis::Yaw)));
        layout_input.snap_held = true;
        let out = layout(&layout_input);
        assert_eq!(out.visible(HandleId::BoundingBox), Some(false));
        assert_eq!(out.visible(HandleId::SelectionBox), Some(false));
        let ring = out
            .get(HandleId::RotateRing(RotateAxis::Yaw))
            .and_then(|edit| edit.ring)
            .expect("ring");
        assert_eq!(ring.major_tick_marks_angle, 22.5);
        assert_eq!(ring.inner_radius, 0.9);
        assert_eq!(out.visible(HandleId::RotateRing(RotateAxis::Pitch)), Some(false));

        layout_input.kind = Some(EntityKind::Zone);
        let out = layout(&layout_input);
        assert_eq!(out.visible(HandleId::BoundingBox), Some(true));
    }

    #[test]
    fn camera_inside_swaps_selection_box_for_icon_box() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let mut layout_input = input(&handles, &rotation, None);
        layout_input.camera_position = Vec3::new(0.1, 0.0, 0.0);
        layout_input.kind = Some(EntityKind::Light);
        let out = layout(&layout_input);
        assert!(out.camera_inside);
        assert_eq!(out.visible(HandleId::SelectionBox), Some(false));
        assert_eq!(out.visible(HandleId::IconSelectionBox), Some(true));
    }

    #[test]
    fn ring_normals_follow_their_axes() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let out = layout(&input(&handles, &rotation, None));
        for axis in RotateAxis::ALL {
            let ring_rotation = out
                .get(HandleId::RotateRing(axis))
                .and_then(|edit| edit.rotation)
                .expect("rotation");
            let normal = ring_rotation * Vec3::Y;
            assert!((normal - axis.axis().unit()).length() < 1.0e-5, "{axis:?}");
        }
    }

    #[test]
    fn multi_selection_hides_stretch_and_uses_world_box() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let mut layout_input = input(&handles, &rotation, None);
        layout_input.selection_len = 2;
        layout_input.local = None;
        layout_input.parent_state = ParentState::Children;
        let out = layout(&layout_input);
        assert_eq!(out.visible(HandleId::StretchCube(Axis::X)), Some(false));
        assert_eq!(out.visible(HandleId::ScaleCube), Some(false));
        assert_eq!(
            out.get(HandleId::BoundingBox).and_then(|edit| edit.color),
            Some(super::super::COLOR_BOUNDING_EDGE_CHILDREN)
        );
    }

    #[test]
    fn empty_selection_hides_everything() {
        let handles = HandleSettings::default();
        let rotation = RotationSettings::default();
        let mut layout_input = input(&handles, &rotation, None);
        layout_input.selection_len = 0;
        let out = layout(&layout_input);
        assert!(HandleId::ALL
            .iter()
            .all(|handle| out.visible(*handle) == Some(false)));
    }
}
