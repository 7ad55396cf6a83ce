use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityEdit, EntityId, EntityProperties};
use crate::proxy::{ProxyEdit, ProxyId, ProxyProperties, Ray, RayHit};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn other(self) -> Hand {
        match self {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerPose {
    pub position: Vec3,
    pub rotation: Quat,
    pub valid: bool,
}

impl Default for ControllerPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            valid: false,
        }
    }
}

/// The host engine as seen by the editor: overlay proxies, entities, camera and
/// controllers.
pub trait SceneService {
    fn create_proxy(&mut self, properties: ProxyProperties) -> ProxyId;
    fn edit_proxy(&mut self, id: ProxyId, edit: &ProxyEdit);
    fn delete_proxy(&mut self, id: ProxyId);
    fn proxy(&self, id: ProxyId) -> Option<&ProxyProperties>;
    /// Nearest hit among `include`; an empty slice means every pickable proxy.
    fn ray_intersect(&self, ray: &Ray, include: &[ProxyId]) -> Option<RayHit>;

    fn entity_properties(&self, id: EntityId) -> Option<EntityProperties>;
    /// Returns false when the entity does not exist.
    fn edit_entity(&mut self, id: EntityId, edit: &EntityEdit) -> bool;
    fn delete_entity(&mut self, id: EntityId);
    fn add_entity(&mut self, properties: EntityProperties) -> Option<EntityId>;
    fn children(&self, id: EntityId) -> Vec<EntityId>;
    fn is_loaded(&self, id: EntityId) -> bool;

    fn camera_position(&self) -> Vec3;
    fn camera_orientation(&self) -> Quat;
    fn camera_pick_ray(&self, x: f32, y: f32) -> Ray;
    fn controller_pose(&self, hand: Hand) -> ControllerPose;

    fn minimum_dimension(&self) -> f32 {
        0.001
    }

    fn hmd_active(&self) -> bool {
        false
    }

    fn is_mac(&self) -> bool {
        false
    }
}

/// On-screen notices and audio cues.
pub trait UserFeedback {
    fn rejection(&mut self);
    fn confirmation(&mut self);
    fn action(&mut self);
    fn notify(&mut self, message: &str);
    fn notify_edit_error(&mut self, message: &str);
}

pub trait EditorHost: SceneService + UserFeedback {}

impl<T: SceneService + UserFeedback + ?Sized> EditorHost for T {}
