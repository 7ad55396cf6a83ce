use glam::{Quat, Vec3};
use gizmo_scene::{EditorHost, EntityEdit, ProxyEdit, Ray};

use super::{edit_unparented, show_debug_pick_plane, ToolEnv};
use crate::geometry::{
    elevation, ray_plane_intersection, ray_plane_intersection_forward, use_previous_pick_ray,
    MIN_ANGULAR_SIZE, MIN_ELEVATION,
};
use crate::handles::{Axis, HandleId, SpaceMode};
use crate::input::PointerEvent;

/// Drag along one selection axis on the plane that contains the axis and faces the camera.
pub(super) struct TranslateAxisDrag {
    axis_vector: Vec3,
    plane_point: Vec3,
    plane_normal: Vec3,
    initial_pick: Option<Vec3>,
    previous_ray: Ray,
}

impl TranslateAxisDrag {
    pub(super) fn begin<H: EditorHost + ?Sized>(
        host: &mut H,
        env: &mut ToolEnv<'_>,
        axis: Axis,
        ray: &Ray,
    ) -> Option<Self> {
        let world = env.selection.world_transform()?;
        let rotation = match (env.space_mode, env.selection.local_transform()) {
            (SpaceMode::Local, Some(local)) => local.rotation,
            _ => world.rotation,
        };
        let axis_vector = rotation * axis.unit();
        let plane_normal = ray.direction.cross(axis_vector).cross(axis_vector);
        let plane_point = world.position;
        let initial_pick = ray_plane_intersection(ray, plane_point, plane_normal);
        if initial_pick.is_none() {
            tracing::debug!("translate: pick ray runs along the {axis:?} axis");
        }
        show_debug_pick_plane(host, env, plane_point, plane_normal);
        Some(Self {
            axis_vector,
            plane_point,
            plane_normal,
            initial_pick,
            previous_ray: *ray,
        })
    }

    pub(super) fn on_move<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>, ray: &Ray) {
        let Some(initial_pick) = self.initial_pick else {
            return;
        };
        let ray = if use_previous_pick_ray(ray.direction, self.previous_ray.direction, self.plane_normal) {
            self.previous_ray
        } else {
            *ray
        };
        let Some(pick) = ray_plane_intersection(&ray, self.plane_point, self.plane_normal) else {
            return;
        };
        let vector = self.axis_vector * (pick - initial_pick).dot(self.axis_vector);
        let origin = env.grid.origin;
        let vector = env.grid.snap_to_grid(vector + origin, false) - origin;

        edit_unparented(host, env.selection, |saved| EntityEdit::position(saved.position + vector));
        self.previous_ray = ray;
    }
}

/// Drag on the horizontal plane through the picked point.
pub(super) struct TranslateXzDrag {
    plane_point: Vec3,
    start_position: Vec3,
    start_dimensions: Vec3,
    greatest_dimension: f32,
    starting_elevation: f32,
    initial_pick: Option<Vec3>,
    constrained: bool,
}

impl TranslateXzDrag {
    pub(super) fn begin<H: EditorHost + ?Sized>(
        host: &mut H,
        env: &mut ToolEnv<'_>,
        ray: &Ray,
        hit_point: Vec3,
    ) -> Option<Self> {
        let world = env.selection.world_transform()?;
        let initial_pick = ray_plane_intersection(ray, hit_point, Vec3::Y);
        show_debug_pick_plane(host, env, hit_point, Vec3::Y);
        Some(Self {
            plane_point: hit_point,
            start_position: world.position,
            start_dimensions: world.dimensions,
            greatest_dimension: world.dimensions.max_element(),
            starting_elevation: elevation(ray.origin, hit_point),
            initial_pick,
            constrained: false,
        })
    }

    pub(super) fn on_move<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        env: &mut ToolEnv<'_>,
        event: &PointerEvent,
        ray: &Ray,
    ) {
        let Some(initial_pick) = self.initial_pick else {
            return;
        };
        // Behind the ray: the pointer crossed the horizon from the starting side.
        let Some(pick) = ray_plane_intersection_forward(ray, self.plane_point, Vec3::Y) else {
            return;
        };
        let mut vector = pick - initial_pick;

        let pick_elevation = elevation(ray.origin, pick);
        if (self.starting_elevation > 0.0 && pick_elevation < MIN_ELEVATION)
            || (self.starting_elevation < 0.0 && pick_elevation > -MIN_ELEVATION)
        {
            return;
        }
        if self.greatest_dimension > 0.0 {
            let angular_size = (self.greatest_dimension / ray.origin.distance(pick)).atan();
            if angular_size < MIN_ANGULAR_SIZE {
                return;
            }
        }

        if event.modifiers.shift {
            if vector.x.abs() > vector.z.abs() {
                vector.z = 0.0;
            } else {
                vector.x = 0.0;
            }
            if !self.constrained {
                self.show_rails(host, env);
                self.constrained = true;
            }
        } else if self.constrained {
            self.hide_rails(host, env);
            self.constrained = false;
        }

        let major_only = event.modifiers.control;
        let corner = self.start_position - 0.5 * self.start_dimensions;
        let vector = env.grid.snap_to_grid(corner + vector, major_only) - corner;

        edit_unparented(host, env.selection, |saved| {
            EntityEdit::position(saved.position + Vec3::new(vector.x, 0.0, vector.z))
        });
    }

    pub(super) fn on_end<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>) {
        if self.constrained {
            self.hide_rails(host, env);
            self.constrained = false;
        }
    }

    fn show_rails<H: EditorHost + ?Sized>(&self, host: &mut H, env: &ToolEnv<'_>) {
        let length = env.settings.handles.rail_axis_length;
        for (handle, direction) in [(HandleId::XRail, Vec3::X), (HandleId::ZRail, Vec3::Z)] {
            let edit = ProxyEdit {
                position: Some(self.start_position - direction * length),
                rotation: Some(Quat::IDENTITY),
                end: Some(self.start_position + direction * length),
                visible: Some(true),
                ..ProxyEdit::default()
            };
            env.handles.edit(host, handle, &edit);
        }
    }

    fn hide_rails<H: EditorHost + ?Sized>(&self, host: &mut H, env: &ToolEnv<'_>) {
        env.handles.set_visible(host, HandleId::XRail, false);
        env.handles.set_visible(host, HandleId::ZRail, false);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Rig;
    use super::super::ToolMachine;
    use super::*;
    use crate::handles::ToolKind;
    use crate::input::Modifiers;
    use gizmo_scene::{EntityKind, EntityProperties};

    fn drag_axis(rig: &mut Rig, axis: Axis, from: Vec3, to: Vec3) {
        let camera = Vec3::new(0.0, 0.0, 10.0);
        let mut machine = ToolMachine::new();
        let (scene, mut env) = rig.split();
        assert!(machine.begin(
            scene,
            &mut env,
            ToolKind::TranslateAxis(axis),
            &Ray::new(camera, from - camera),
            from,
            Vec::new(),
        ));
        machine.on_move(
            scene,
            &mut env,
            &PointerEvent::default(),
            &Ray::new(camera, to - camera),
        );
        machine.end(scene, &mut env);
    }

    #[test]
    fn axis_drag_snaps_to_grid() {
        let mut rig = Rig::new();
        rig.grid.minor_spacing = 0.5;
        rig.grid.enabled = true;
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag_axis(&mut rig, Axis::X, Vec3::new(1.3, 0.0, 0.0), Vec3::new(3.6, 0.0, 0.0));
        let position = rig.scene.entity(id).map(|p| p.position).expect("entity");
        assert!((position - Vec3::new(2.5, 0.0, 0.0)).length() < 1.0e-4);
    }

    #[test]
    fn axis_drag_ignores_off_axis_motion() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag_axis(&mut rig, Axis::Y, Vec3::new(0.0, 1.3, 0.0), Vec3::new(0.7, 2.0, 0.0));
        let position = rig.scene.entity(id).map(|p| p.position).expect("entity");
        assert!(position.x.abs() < 1.0e-4);
        assert!((position.y - 0.7).abs() < 1.0e-4);
    }

    #[test]
    fn children_follow_without_their_own_edit() {
        let mut rig = Rig::new();
        let parent = rig.add_box(Vec3::ZERO, Vec3::ONE);
        let mut child = EntityProperties::new(EntityKind::Box, "child");
        child.parent_id = Some(parent);
        child.position = Vec3::new(0.0, 1.0, 0.0);
        let child = rig.scene.insert(child);
        rig.select(&[parent, child]);
        rig.scene.clear_edit_log();
        drag_axis(&mut rig, Axis::X, Vec3::new(1.3, 0.0, 0.0), Vec3::new(2.3, 0.0, 0.0));
        assert_eq!(rig.scene.edit_count(parent), 1);
        assert_eq!(rig.scene.edit_count(child), 0);
        let child_position = rig.scene.entity(child).map(|p| p.position).expect("child");
        assert!((child_position - Vec3::new(1.0, 1.0, 0.0)).length() < 1.0e-4);
    }

    #[test]
    fn xz_drag_constrains_with_shift_and_stays_level() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        let camera = Vec3::new(0.0, 5.0, 5.0);
        let start = Vec3::new(0.0, 0.5, 0.0);
        let target = Vec3::new(2.0, 0.5, 0.5);
        let mut machine = ToolMachine::new();
        let (scene, mut env) = rig.split();
        assert!(machine.begin(
            scene,
            &mut env,
            ToolKind::TranslateXz,
            &Ray::new(camera, start - camera),
            start,
            Vec::new(),
        ));
        let shift = PointerEvent::default().with_modifiers(Modifiers {
            shift: true,
            ..Modifiers::default()
        });
        machine.on_move(scene, &mut env, &shift, &Ray::new(camera, target - camera));
        assert!(env.handles.is_visible(&*scene, HandleId::XRail));
        machine.end(scene, &mut env);
        assert!(!env.handles.is_visible(&*scene, HandleId::ZRail));

        let position = rig.scene.entity(id).map(|p| p.position).expect("entity");
        assert!((position - Vec3::new(2.0, 0.0, 0.0)).length() < 1.0e-4);
    }

    #[test]
    fn xz_drag_stops_past_the_horizon() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        let camera = Vec3::new(0.0, 5.0, 5.0);
        let start = Vec3::new(0.0, 0.5, 0.0);
        let mut machine = ToolMachine::new();
        let (scene, mut env) = rig.split();
        machine.begin(
            scene,
            &mut env,
            ToolKind::TranslateXz,
            &Ray::new(camera, start - camera),
            start,
            Vec::new(),
        );
        machine.on_move(scene, &mut env, &PointerEvent::default(), &Ray::new(camera, Vec3::Z));
        machine.on_move(
            scene,
            &mut env,
            &PointerEvent::default(),
            &Ray::new(camera, Vec3::new(0.0, -0.01, -1.0)),
        );
        machine.end(scene, &mut env);
        assert_eq!(rig.scene.entity(id).map(|p| p.position), Some(Vec3::ZERO));
    }
}
