use glam::{Quat, Vec3};
use gizmo_scene::{CollisionGroups, EditorHost, EntityEdit, EntityId, Ray};

use super::{show_debug_pick_plane, ToolEnv};
use crate::geometry::{ray_plane_intersection, use_previous_pick_ray};
use crate::handles::{Axis, HandleId};

fn average(v: Vec3) -> f32 {
    (v.x + v.y + v.z) / 3.0
}

/// Per-component sign that keeps zero at zero.
fn strict_sign(v: Vec3) -> Vec3 {
    Vec3::select(v.abs().cmpgt(Vec3::ZERO), v.signum(), Vec3::ZERO)
}

/// Stops the avatar from being pushed by an entity that grows into it.
/// Returns true when the flag was removed and must be put back.
fn ignore_my_avatar<H: EditorHost + ?Sized>(host: &mut H, id: EntityId) -> bool {
    let Some(props) = host.entity_properties(id) else {
        return false;
    };
    if !props.collides_with.contains(CollisionGroups::MY_AVATAR) {
        return false;
    }
    host.edit_entity(
        id,
        &EntityEdit {
            collides_with: Some(props.collides_with.without(CollisionGroups::MY_AVATAR)),
            ..EntityEdit::default()
        },
    )
}

fn restore_collisions<H: EditorHost + ?Sized>(host: &mut H, env: &ToolEnv<'_>, id: EntityId) {
    let Some(saved) = env.selection.saved(id) else {
        return;
    };
    let edit = EntityEdit {
        collides_with: Some(saved.collides_with),
        ..EntityEdit::default()
    };
    if !host.edit_entity(id, &edit) {
        tracing::debug!("stretch: {id} gone before collisions were restored");
    }
}

/// Drags one face of the first selected entity; the opposite face stays put.
pub(super) struct StretchDrag {
    entity: EntityId,
    axis: Axis,
    axis_vector: Vec3,
    initial_position: Vec3,
    initial_dimensions: Vec3,
    rotation: Quat,
    signs: Vec3,
    mask: Vec3,
    delta_pivot: Vec3,
    plane_point: Vec3,
    plane_normal: Vec3,
    initial_pick: Option<Vec3>,
    previous_ray: Ray,
    restore_collisions: bool,
}

impl StretchDrag {
    pub(super) fn begin<H: EditorHost + ?Sized>(
        host: &mut H,
        env: &mut ToolEnv<'_>,
        axis: Axis,
        ray: &Ray,
    ) -> Option<Self> {
        let entity = *env.selection.ids().first()?;
        let local = env.selection.local_transform()?;
        let direction = -axis.unit();
        let rotation = local.rotation;
        let axis_vector = rotation * axis.unit();
        let signs = strict_sign(direction);
        let mask = Vec3::select(direction.abs().cmpgt(Vec3::ZERO), Vec3::ONE, Vec3::ZERO);

        let centered_registration = local.registration_point - Vec3::splat(0.5);
        let delta_pivot = centered_registration - 0.5 * direction;
        let offset_registration = 0.5 * -direction - centered_registration;

        let plane_point = local.position + rotation * (local.dimensions * offset_registration);
        let plane_normal = ray.direction.cross(axis_vector).cross(axis_vector);
        let initial_pick = ray_plane_intersection(ray, plane_point, plane_normal);

        let restore_collisions = ignore_my_avatar(host, entity);
        env.handles.set_visible(host, HandleId::StretchPanel(axis), true);
        show_debug_pick_plane(host, env, plane_point, plane_normal);
        Some(Self {
            entity,
            axis,
            axis_vector,
            initial_position: local.position,
            initial_dimensions: local.dimensions,
            rotation,
            signs,
            mask,
            delta_pivot,
            plane_point,
            plane_normal,
            initial_pick,
            previous_ray: *ray,
            restore_collisions,
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

        let along = self.axis_vector * (pick - initial_pick).dot(self.axis_vector);
        let local_change = (self.rotation.inverse() * along) * self.mask;
        let mut change = -(self.signs * env.grid.snap_to_spacing(local_change));

        let minimum = host.minimum_dimension();
        let mut dimensions = self.initial_dimensions + change;
        for i in 0..3 {
            if dimensions[i] < minimum {
                dimensions[i] = minimum;
                change[i] = minimum - self.initial_dimensions[i];
            }
        }
        let position = self.initial_position + self.rotation * (self.delta_pivot * change);

        let edit = EntityEdit {
            position: Some(position),
            dimensions: Some(dimensions),
            ..EntityEdit::default()
        };
        if !host.edit_entity(self.entity, &edit) {
            tracing::debug!("stretch: {} vanished mid-drag", self.entity);
        }
        self.previous_ray = ray;
    }

    pub(super) fn on_end<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>) {
        if self.restore_collisions {
            restore_collisions(host, env, self.entity);
            self.restore_collisions = false;
        }
        env.handles.set_visible(host, HandleId::StretchPanel(self.axis), false);
    }
}

/// Uniform scale of the first selected entity, driven by motion on a camera facing plane.
pub(super) struct ScaleDrag {
    entity: EntityId,
    initial_position: Vec3,
    initial_dimensions: Vec3,
    plane_normal: Vec3,
    initial_pick: Option<Vec3>,
    previous_ray: Ray,
    restore_collisions: bool,
}

impl ScaleDrag {
    pub(super) fn begin<H: EditorHost + ?Sized>(host: &mut H, env: &mut ToolEnv<'_>, ray: &Ray) -> Option<Self> {
        let entity = *env.selection.ids().first()?;
        let local = env.selection.local_transform()?;
        let plane_normal = ray.origin - local.position;
        let initial_pick = ray_plane_intersection(ray, local.position, plane_normal);
        let restore_collisions = ignore_my_avatar(host, entity);
        show_debug_pick_plane(host, env, local.position, plane_normal);
        Some(Self {
            entity,
            initial_position: local.position,
            initial_dimensions: local.dimensions,
            plane_normal,
            initial_pick,
            previous_ray: *ray,
            restore_collisions,
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
        let Some(pick) = ray_plane_intersection(&ray, self.initial_position, self.plane_normal) else {
            return;
        };

        let screen_change = host.camera_orientation().inverse() * (pick - initial_pick);
        let distance = host.camera_position().distance(self.initial_position);
        let change = env.grid.snap_to_spacing(screen_change)
            * distance
            * env.settings.handles.scale_dimensions_camera_distance_multiple;

        let initial_average = average(self.initial_dimensions);
        if initial_average == 0.0 {
            return;
        }
        let percent = average(change) / initial_average + 1.0;
        let dimensions = (percent * self.initial_dimensions)
            .abs()
            .max(Vec3::splat(host.minimum_dimension()));

        let edit = EntityEdit {
            dimensions: Some(dimensions),
            ..EntityEdit::default()
        };
        if !host.edit_entity(self.entity, &edit) {
            tracing::debug!("scale: {} vanished mid-drag", self.entity);
        }
        self.previous_ray = ray;
    }

    pub(super) fn on_end<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>) {
        if self.restore_collisions {
            restore_collisions(host, env, self.entity);
            self.restore_collisions = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Rig;
    use super::super::ToolMachine;
    use super::*;
    use crate::handles::ToolKind;
    use crate::input::PointerEvent;

    fn drag(rig: &mut Rig, kind: ToolKind, from: Vec3, to: Vec3) {
        let camera = rig.scene.camera.position;
        let mut machine = ToolMachine::new();
        let (scene, mut env) = rig.split();
        assert!(machine.begin(scene, &mut env, kind, &Ray::new(camera, from - camera), from, Vec::new()));
        machine.on_move(scene, &mut env, &PointerEvent::default(), &Ray::new(camera, to - camera));
        machine.end(scene, &mut env);
    }

    #[test]
    fn stretch_keeps_the_opposite_face() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag(
            &mut rig,
            ToolKind::Stretch(Axis::X),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        );
        let props = rig.scene.entity(id).expect("entity");
        assert!((props.dimensions - Vec3::new(1.5, 1.0, 1.0)).length() < 1.0e-4);
        assert!((props.position - Vec3::new(0.25, 0.0, 0.0)).length() < 1.0e-4);
    }

    #[test]
    fn stretch_clamps_to_minimum_dimension() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag(
            &mut rig,
            ToolKind::Stretch(Axis::X),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(-1.5, 0.0, 0.0),
        );
        let props = rig.scene.entity(id).expect("entity");
        assert!((props.dimensions.x - 0.001).abs() < 1.0e-6);
        assert!((props.position.x + 0.4995).abs() < 1.0e-4);
    }

    #[test]
    fn stretch_lifts_avatar_collisions_only_while_dragging() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        let camera = rig.scene.camera.position;
        let from = Vec3::new(0.5, 0.0, 0.0);
        let mut machine = ToolMachine::new();
        let (scene, mut env) = rig.split();
        machine.begin(
            scene,
            &mut env,
            ToolKind::Stretch(Axis::X),
            &Ray::new(camera, from - camera),
            from,
            Vec::new(),
        );
        let during = scene.entity(id).map(|p| p.collides_with).expect("entity");
        assert!(!during.contains(CollisionGroups::MY_AVATAR));
        assert!(env.handles.is_visible(&*scene, HandleId::StretchPanel(Axis::X)));
        machine.end(scene, &mut env);
        assert!(!env.handles.is_visible(&*scene, HandleId::StretchPanel(Axis::X)));
        let after = rig.scene.entity(id).map(|p| p.collides_with).expect("entity");
        assert_eq!(after, CollisionGroups::ALL);
    }

    #[test]
    fn scale_grows_uniformly() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag(
            &mut rig,
            ToolKind::Scale,
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(0.8, 0.8, 0.0),
        );
        let props = rig.scene.entity(id).expect("entity");
        assert!((props.dimensions - Vec3::splat(2.0)).length() < 1.0e-3);
        assert_eq!(props.position, Vec3::ZERO);
    }

    #[test]
    fn scale_never_goes_below_minimum() {
        let mut rig = Rig::new();
        let id = rig.add_box(Vec3::ZERO, Vec3::ONE);
        rig.select(&[id]);
        drag(
            &mut rig,
            ToolKind::Scale,
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(0.2, 0.2, 0.0),
        );
        let props = rig.scene.entity(id).expect("entity");
        assert!(props.dimensions.min_element() >= 0.001);
    }
}
