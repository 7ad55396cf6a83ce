use glam::{Quat, Vec3};
use gizmo_scene::{EditorHost, EntityEdit, EntityId, EntityKind, EntityProperties, SceneService};

use super::{reject, EditError, EditorSession};
use crate::geometry::world_bounds_contain;
use crate::history::CreatedEntity;

const MIN_POLL_INTERVAL: f32 = 1.0e-3;

/// Pushes `position` back along `direction` until the oriented box lies behind it.
pub fn adjust_position_per_bounding_box(
    position: Vec3,
    direction: Vec3,
    registration_point: Vec3,
    dimensions: Vec3,
    orientation: Quat,
) -> Vec3 {
    let mut distance = 0.0f32;
    for index in 0..8u32 {
        let corner = Vec3::new(
            ((index >> 2) & 1) as f32,
            ((index >> 1) & 1) as f32,
            (index & 1) as f32,
        );
        let corner = orientation * ((corner - registration_point) * dimensions);
        distance = distance.min(corner.dot(direction));
    }
    position + direction * distance
}

fn pre_adjusted(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Box
            | EntityKind::Sphere
            | EntityKind::Shape
            | EntityKind::Text
            | EntityKind::Image
            | EntityKind::Web
    )
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LoadPhase {
    Loading { checks: u32 },
    Settling { checks: u32, initial: Vec3 },
}

/// A created model waiting for its asset, then for its final dimensions.
#[derive(Debug, Clone)]
pub(super) struct PendingLoad {
    id: EntityId,
    position: Vec3,
    direction: Vec3,
    phase: LoadPhase,
    elapsed: f32,
}

impl PendingLoad {
    fn new(id: EntityId, position: Vec3, direction: Vec3) -> Self {
        Self {
            id,
            position,
            direction,
            phase: LoadPhase::Loading { checks: 0 },
            elapsed: 0.0,
        }
    }
}

impl EditorSession {
    /// Spawn point in front of the camera, pushed out by `extra`. `None` outside the world.
    pub(super) fn position_to_create<S: SceneService + ?Sized>(&self, scene: &S, extra: f32) -> Option<Vec3> {
        let forward = scene.camera_orientation() * Vec3::NEG_Z;
        let position =
            scene.camera_position() + forward * (self.settings.loading.create_distance + extra);
        world_bounds_contain(position).then_some(position)
    }

    fn snap_for_creation(&self, position: Vec3, dimensions: Vec3, registration_point: Vec3) -> Vec3 {
        let snapped = self.grid.snap_to_grid(position, false);
        self.grid.snap_to_surface(snapped, dimensions, registration_point)
    }

    /// Adds an entity in front of the camera and selects it. `direction` points from the
    /// spawn point back towards the viewer; box-like kinds are pushed behind it.
    pub fn create_entity<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        properties: EntityProperties,
        direction: Vec3,
    ) -> Option<EntityId> {
        if !self.ready("create") {
            return None;
        }
        let mut properties = properties;
        let kind = properties.kind;
        let Some(mut position) = self.position_to_create(&*host, 0.0) else {
            reject(host, EditError::OutOfBounds(kind));
            return None;
        };
        let direction = direction.normalize_or_zero();
        if pre_adjusted(kind) {
            position = adjust_position_per_bounding_box(
                position,
                direction,
                properties.registration_point,
                properties.dimensions,
                properties.rotation,
            );
        }
        position = self.snap_for_creation(position, properties.dimensions, properties.registration_point);
        properties.position = position;
        properties.grabbable = properties.grabbable && kind.grabbable_on_create();
        if kind.waits_for_load() {
            properties.visible = false;
        }

        let Some(id) = host.add_entity(properties.clone()) else {
            tracing::warn!("session: host refused a new {kind:?}");
            return None;
        };
        properties.id = id;
        tracing::debug!("session: created {kind:?} {id} at {position}");
        if kind.waits_for_load() {
            self.pending_loads.push(PendingLoad::new(id, position, direction));
        }

        self.selection.add_entity(&*host, id, false, None);
        self.selection.save_properties(&*host);
        self.push_command_for_selections(&*host, vec![CreatedEntity::leaf(properties)], Vec::new(), true);
        self.selection.clear(&*host, None);
        self.selection.set_selections(&*host, &[id], None);
        self.refresh(host);
        Some(id)
    }

    pub(super) fn poll_loads<H: EditorHost + ?Sized>(&mut self, host: &mut H, dt: f32) {
        if self.pending_loads.is_empty() {
            return;
        }
        let mut loads = std::mem::take(&mut self.pending_loads);
        loads.retain_mut(|load| !self.advance_load(host, load, dt));
        loads.append(&mut self.pending_loads);
        self.pending_loads = loads;
    }

    /// Runs every check that fell due. Returns true once the record is finished.
    fn advance_load<H: EditorHost + ?Sized>(&mut self, host: &mut H, load: &mut PendingLoad, dt: f32) -> bool {
        load.elapsed += dt;
        loop {
            let interval = match load.phase {
                LoadPhase::Loading { .. } => self.settings.loading.loaded_check_interval,
                LoadPhase::Settling { .. } => self.settings.loading.dimensions_check_interval,
            }
            .max(MIN_POLL_INTERVAL);
            if load.elapsed < interval {
                return false;
            }
            load.elapsed -= interval;
            if self.check_load(host, load) {
                return true;
            }
        }
    }

    fn check_load<H: EditorHost + ?Sized>(&mut self, host: &mut H, load: &mut PendingLoad) -> bool {
        let Some(properties) = host.entity_properties(load.id) else {
            tracing::debug!("session: {} removed while loading", load.id);
            return true;
        };
        let loading = self.settings.loading.clone();
        match load.phase {
            LoadPhase::Loading { checks } => {
                let checks = checks + 1;
                let loaded = host.is_loaded(load.id);
                if !loaded && checks < loading.max_loaded_checks {
                    load.phase = LoadPhase::Loading { checks };
                    return false;
                }
                let dimensions = properties.natural_dimensions.unwrap_or(properties.dimensions);
                if !loaded {
                    tracing::warn!(
                        "session: model {} not loaded after {checks} checks, using dimensions {dimensions}",
                        load.id
                    );
                }
                let edit = EntityEdit {
                    visible: Some(true),
                    dimensions: Some(dimensions),
                    ..EntityEdit::default()
                };
                host.edit_entity(load.id, &edit);
                self.selection.clear(&*host, None);
                self.selection.set_selections(&*host, &[load.id], None);
                load.phase = LoadPhase::Settling {
                    checks: 0,
                    initial: dimensions,
                };
                false
            }
            LoadPhase::Settling { checks, initial } => {
                let checks = checks + 1;
                if properties.dimensions != initial {
                    let position = adjust_position_per_bounding_box(
                        load.position,
                        load.direction,
                        properties.registration_point,
                        properties.dimensions,
                        properties.rotation,
                    );
                    let position =
                        self.snap_for_creation(position, properties.dimensions, properties.registration_point);
                    host.edit_entity(load.id, &EntityEdit::position(position));
                    self.selection.update(&*host, false, None);
                    tracing::debug!("session: {} resized, moved to {position}", load.id);
                    return true;
                }
                if checks >= loading.max_dimensions_checks {
                    tracing::debug!("session: {} kept its dimensions", load.id);
                    return true;
                }
                load.phase = LoadPhase::Settling { checks, initial };
                false
            }
        }
    }
}
