use glam::{Quat, Vec3};
use gizmo_scene::{EditorHost, ProxyEdit, Ray, RingStyle};

use super::{show_debug_pick_plane, update_selections_rotation, ToolEnv};
use crate::geometry::{normalize_degrees, oriented_angle, ray_plane_intersection, snap_angle_down};
use crate::handles::{align_y_to, HandleId, RotateAxis, SpaceMode};

/// Drag around one ring. The angle is measured from the first pick on the ring plane.
pub(super) struct RotateDrag {
    normal: Vec3,
    center: Vec3,
    zero: Option<Vec3>,
    display_position: Vec3,
}

impl RotateDrag {
    pub(super) fn begin<H: EditorHost + ?Sized>(
        host: &mut H,
        env: &mut ToolEnv<'_>,
        axis: RotateAxis,
        ray: &Ray,
    ) -> Option<Self> {
        let world = env.selection.world_transform()?;
        let initial_rotation = match (env.space_mode, env.selection.local_transform()) {
            (SpaceMode::Local, Some(local)) if env.selection.len() == 1 => local.rotation,
            _ => world.rotation,
        };
        let normal = initial_rotation * axis.axis().unit();
        let center = world.position;

        let current_ring = ProxyEdit {
            position: Some(center),
            rotation: Some(initial_rotation * align_y_to(axis.axis())),
            ring: Some(RingStyle {
                start_at: 0.0,
                end_at: 0.0,
                ..RingStyle::default()
            }),
            visible: Some(true),
            ..ProxyEdit::default()
        };
        env.handles.edit(host, HandleId::RotateCurrentRing, &current_ring);

        // A ray parallel to the ring plane leaves no zero reference; moves are then ignored.
        let zero = ray_plane_intersection(ray, center, normal);
        if zero.is_none() {
            tracing::debug!("rotate: pick ray misses the {axis:?} ring plane");
        }
        let display_position = match zero {
            Some(zero) => center + (zero - center) * env.settings.handles.rotate_display_distance_multiple,
            None => center,
        };
        let drag = Self {
            normal,
            center,
            zero,
            display_position,
        };
        drag.update_display(host, env, 0.0);
        env.handles.set_visible(host, HandleId::RotationDegreesDisplay, true);
        show_debug_pick_plane(host, env, center, normal);
        Some(drag)
    }

    pub(super) fn on_move<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>, ray: &Ray) {
        let Some(zero) = self.zero else {
            return;
        };
        let Some(pick) = ray_plane_intersection(ray, self.center, self.normal) else {
            return;
        };
        let step = if env.snap_held {
            env.settings.rotation.snap_angle
        } else {
            env.settings.rotation.default_snap_angle
        };
        let angle = snap_angle_down(
            oriented_angle(zero - self.center, pick - self.center, self.normal),
            step,
        );
        let change = Quat::from_axis_angle(self.normal.normalize_or_zero(), angle.to_radians());
        update_selections_rotation(host, env.selection, change, self.center);
        self.update_display(host, env, angle);

        let sweep = -angle;
        let (start_at, end_at) = if sweep < 0.0 {
            (360.0 + sweep, 360.0)
        } else {
            (0.0, sweep)
        };
        let ring = ProxyEdit {
            ring: Some(RingStyle {
                start_at,
                end_at,
                ..RingStyle::default()
            }),
            ..ProxyEdit::default()
        };
        env.handles.edit(host, HandleId::RotateCurrentRing, &ring);
    }

    pub(super) fn on_end<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>) {
        env.handles.set_visible(host, HandleId::RotationDegreesDisplay, false);
        env.handles.set_visible(host, HandleId::RotateCurrentRing, false);
    }

    fn update_display<H: EditorHost + ?Sized>(&self, host: &mut H, env: &ToolEnv<'_>, angle: f32) {
        let settings = &env.settings.handles;
        let distance = host.camera_position().distance(self.display_position);
        let [width, height] = settings.rotate_display_size;
        let edit = ProxyEdit {
            position: Some(self.display_position),
            dimensions: Some(Vec3::new(
                distance * width,
                distance * height,
                distance * settings.rotate_display_line_height,
            )),
            text: Some(format!("{}°", normalize_degrees(angle))),
            ..ProxyEdit::default()
        };
        env.handles.edit(host, HandleId::RotationDegreesDisplay, &edit);
    }
}
