use std::collections::BTreeMap;

use glam::{Quat, Vec2, Vec3};

use crate::entity::{EntityEdit, EntityId, EntityProperties};
use crate::proxy::{ProxyEdit, ProxyId, ProxyProperties, ProxyShape, Ray, RayHit};
use crate::service::{ControllerPose, Hand, SceneService, UserFeedback};

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Rejection,
    Confirmation,
    Action,
    Message(String),
    EditError(String),
}

/// Pinhole camera used to turn screen coordinates into pick rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRig {
    pub position: Vec3,
    pub orientation: Quat,
    pub fov_y_degrees: f32,
    pub viewport: Vec2,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 10.0),
            orientation: Quat::IDENTITY,
            fov_y_degrees: 45.0,
            viewport: Vec2::new(1920.0, 1080.0),
        }
    }
}

impl CameraRig {
    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let mut rig = Self {
            position,
            ..Self::default()
        };
        rig.look_at(target);
        rig
    }

    pub fn look_at(&mut self, target: Vec3) {
        let forward = (target - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        self.orientation = Quat::from_rotation_arc(Vec3::NEG_Z, forward);
    }

    fn half_extent(&self) -> Vec2 {
        let tan = (self.fov_y_degrees.to_radians() * 0.5).tan();
        let aspect = if self.viewport.y > 0.0 {
            self.viewport.x / self.viewport.y
        } else {
            1.0
        };
        Vec2::new(tan * aspect, tan)
    }

    pub fn pick_ray(&self, x: f32, y: f32) -> Ray {
        let ndc = Vec2::new(
            2.0 * x / self.viewport.x.max(1.0) - 1.0,
            1.0 - 2.0 * y / self.viewport.y.max(1.0),
        );
        let extent = self.half_extent();
        let local = Vec3::new(ndc.x * extent.x, ndc.y * extent.y, -1.0);
        Ray::new(self.position, self.orientation * local)
    }

    /// Screen coordinates of a world point, `None` when it is behind the camera.
    pub fn screen_point(&self, target: Vec3) -> Option<Vec2> {
        let local = self.orientation.inverse() * (target - self.position);
        if local.z >= -1.0e-6 {
            return None;
        }
        let extent = self.half_extent();
        let ndc = Vec2::new(
            local.x / -local.z / extent.x,
            local.y / -local.z / extent.y,
        );
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - ndc.y) * 0.5 * self.viewport.y,
        ))
    }

    pub fn ray_towards(&self, target: Vec3) -> Ray {
        Ray::new(self.position, target - self.position)
    }
}

/// In-memory host used by tests and the replay tool.
#[derive(Debug, Clone)]
pub struct MemoryScene {
    entities: BTreeMap<EntityId, EntityProperties>,
    proxies: BTreeMap<ProxyId, ProxyProperties>,
    next_entity: u64,
    next_proxy: u64,
    pub camera: CameraRig,
    controllers: [ControllerPose; 2],
    pending_loads: BTreeMap<EntityId, f32>,
    load_delay: f32,
    minimum_dimension: f32,
    hmd_active: bool,
    is_mac: bool,
    edit_log: Vec<(EntityId, EntityEdit)>,
    notifications: Vec<Notification>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
            proxies: BTreeMap::new(),
            next_entity: 1,
            next_proxy: 1,
            camera: CameraRig::default(),
            controllers: [ControllerPose::default(); 2],
            pending_loads: BTreeMap::new(),
            load_delay: 0.0,
            minimum_dimension: 0.001,
            hmd_active: false,
            is_mac: false,
            edit_log: Vec::new(),
            notifications: Vec::new(),
        }
    }

    pub fn insert(&mut self, properties: EntityProperties) -> EntityId {
        let id = EntityId::from_raw(self.next_entity);
        self.next_entity += 1;
        let mut properties = properties;
        properties.id = id;
        if properties.kind.waits_for_load() && self.load_delay > 0.0 {
            self.pending_loads.insert(id, self.load_delay);
        }
        tracing::debug!("scene: added {id} ({:?})", properties.kind);
        self.entities.insert(id, properties);
        id
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityProperties> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityProperties> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn proxies(&self) -> impl Iterator<Item = (ProxyId, &ProxyProperties)> {
        self.proxies.iter().map(|(id, props)| (*id, props))
    }

    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    pub fn set_controller(&mut self, hand: Hand, pose: ControllerPose) {
        self.controllers[hand_index(hand)] = pose;
    }

    pub fn set_hmd_active(&mut self, active: bool) {
        self.hmd_active = active;
    }

    pub fn set_mac(&mut self, is_mac: bool) {
        self.is_mac = is_mac;
    }

    pub fn set_minimum_dimension(&mut self, minimum: f32) {
        self.minimum_dimension = minimum;
    }

    /// Seconds a newly added model takes to report as loaded.
    pub fn set_load_delay(&mut self, seconds: f32) {
        self.load_delay = seconds.max(0.0);
    }

    pub fn advance(&mut self, dt: f32) {
        self.pending_loads.retain(|_, remaining| {
            *remaining -= dt;
            *remaining > 0.0
        });
    }

    /// Explicit entity edits in the order they were received.
    pub fn edit_log(&self) -> &[(EntityId, EntityEdit)] {
        &self.edit_log
    }

    pub fn edit_count(&self, id: EntityId) -> usize {
        self.edit_log.iter().filter(|(edited, _)| *edited == id).count()
    }

    pub fn clear_edit_log(&mut self) {
        self.edit_log.clear();
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.notifications.iter().filter_map(|note| match note {
            Notification::Message(text) | Notification::EditError(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn rejections(&self) -> usize {
        self.notifications
            .iter()
            .filter(|note| matches!(note, Notification::Rejection))
            .count()
    }

    fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            for child in self.children(current) {
                if !out.contains(&child) {
                    out.push(child);
                    stack.push(child);
                }
            }
        }
        out
    }

    fn carry_descendants(&mut self, id: EntityId, from: (Vec3, Quat), to: (Vec3, Quat)) {
        let delta_rotation = to.1 * from.1.inverse();
        for child in self.descendants(id) {
            if let Some(props) = self.entities.get_mut(&child) {
                props.position = to.0 + delta_rotation * (props.position - from.0);
                props.rotation = (delta_rotation * props.rotation).normalize();
            }
        }
    }
}

fn hand_index(hand: Hand) -> usize {
    match hand {
        Hand::Left => 0,
        Hand::Right => 1,
    }
}

fn ray_box_distance(ray: &Ray, props: &ProxyProperties) -> Option<f32> {
    let inverse = props.rotation.inverse();
    let origin = inverse * (ray.origin - props.position);
    let direction = inverse * ray.direction;
    let half = props.dimensions.abs() * 0.5;
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1.0e-8 {
            if o < -half[axis] || o > half[axis] {
                return None;
            }
            continue;
        }
        let t1 = (-half[axis] - o) / d;
        let t2 = (half[axis] - o) / d;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
    }
    if t_max < t_min || t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}

fn ray_ring_distance(ray: &Ray, props: &ProxyProperties) -> Option<f32> {
    let normal = props.rotation * Vec3::Y;
    let denom = normal.dot(ray.direction);
    if denom.abs() <= 1.0e-6 {
        return None;
    }
    let t = normal.dot(props.position - ray.origin) / denom;
    if t < 0.0 {
        return None;
    }
    let style = props.ring.unwrap_or_default();
    let radius = props.dimensions.x.abs() * 0.5;
    let distance = (ray.at(t) - props.position).length();
    (distance >= radius * style.inner_radius && distance <= radius * style.outer_radius).then_some(t)
}

impl SceneService for MemoryScene {
    fn create_proxy(&mut self, properties: ProxyProperties) -> ProxyId {
        let id = ProxyId::from_raw(self.next_proxy);
        self.next_proxy += 1;
        self.proxies.insert(id, properties);
        id
    }

    fn edit_proxy(&mut self, id: ProxyId, edit: &ProxyEdit) {
        if let Some(props) = self.proxies.get_mut(&id) {
            props.apply(edit);
        }
    }

    fn delete_proxy(&mut self, id: ProxyId) {
        self.proxies.remove(&id);
    }

    fn proxy(&self, id: ProxyId) -> Option<&ProxyProperties> {
        self.proxies.get(&id)
    }

    fn ray_intersect(&self, ray: &Ray, include: &[ProxyId]) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for (id, props) in &self.proxies {
            if !include.is_empty() && !include.contains(id) {
                continue;
            }
            if !props.visible || !props.pickable {
                continue;
            }
            let distance = match props.shape {
                ProxyShape::Ring => ray_ring_distance(ray, props),
                ProxyShape::Line => None,
                _ => ray_box_distance(ray, props),
            };
            let Some(distance) = distance else {
                continue;
            };
            if best.map_or(true, |hit| distance < hit.distance) {
                best = Some(RayHit {
                    proxy: *id,
                    point: ray.at(distance),
                    distance,
                });
            }
        }
        best
    }

    fn entity_properties(&self, id: EntityId) -> Option<EntityProperties> {
        let mut props = self.entities.get(&id)?.clone();
        if self.pending_loads.contains_key(&id) {
            props.natural_dimensions = None;
        }
        Some(props)
    }

    fn edit_entity(&mut self, id: EntityId, edit: &EntityEdit) -> bool {
        let Some(props) = self.entities.get_mut(&id) else {
            return false;
        };
        let before = (props.position, props.rotation);
        props.apply(edit);
        let after = (props.position, props.rotation);
        self.edit_log.push((id, edit.clone()));
        if edit.moves() && before != after {
            self.carry_descendants(id, before, after);
        }
        true
    }

    fn delete_entity(&mut self, id: EntityId) {
        let mut doomed = self.descendants(id);
        doomed.push(id);
        for entity in doomed {
            if self.entities.remove(&entity).is_some() {
                tracing::debug!("scene: deleted {entity}");
            }
            self.pending_loads.remove(&entity);
        }
    }

    fn add_entity(&mut self, properties: EntityProperties) -> Option<EntityId> {
        if let Some(parent) = properties.parent_id {
            if !self.entities.contains_key(&parent) {
                tracing::warn!("scene: parent {parent} missing for new entity");
            }
        }
        Some(self.insert(properties))
    }

    fn children(&self, id: EntityId) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|props| props.parent_id == Some(id))
            .map(|props| props.id)
            .collect()
    }

    fn is_loaded(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id) && !self.pending_loads.contains_key(&id)
    }

    fn camera_position(&self) -> Vec3 {
        self.camera.position
    }

    fn camera_orientation(&self) -> Quat {
        self.camera.orientation
    }

    fn camera_pick_ray(&self, x: f32, y: f32) -> Ray {
        self.camera.pick_ray(x, y)
    }

    fn controller_pose(&self, hand: Hand) -> ControllerPose {
        self.controllers[hand_index(hand)]
    }

    fn minimum_dimension(&self) -> f32 {
        self.minimum_dimension
    }

    fn hmd_active(&self) -> bool {
        self.hmd_active
    }

    fn is_mac(&self) -> bool {
        self.is_mac
    }
}

impl UserFeedback for MemoryScene {
    fn rejection(&mut self) {
        self.notifications.push(Notification::Rejection);
    }

    fn confirmation(&mut self) {
        self.notifications.push(Notification::Confirmation);
    }

    fn action(&mut self) {
        self.notifications.push(Notification::Action);
    }

    fn notify(&mut self, message: &str) {
        tracing::info!("notice: {message}");
        self.notifications.push(Notification::Message(message.to_string()));
    }

    fn notify_edit_error(&mut self, message: &str) {
        tracing::warn!("edit error: {message}");
        self.notifications
            .push(Notification::EditError(message.to_string()));
    }
}
