mod entity;
mod memory;
mod proxy;
mod service;

pub use entity::{
    Aabb, CollisionGroups, EntityEdit, EntityHost, EntityId, EntityKind, EntityProperties,
};
pub use memory::{CameraRig, MemoryScene, Notification};
pub use proxy::{Color, ProxyEdit, ProxyId, ProxyProperties, ProxyShape, Ray, RayHit, RingStyle};
pub use service::{ControllerPose, EditorHost, Hand, SceneService, UserFeedback};
