use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EntityId(u64);

impl EntityId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityKind {
    #[default]
    Box,
    Sphere,
    Shape,
    Model,
    Light,
    ParticleEffect,
    Zone,
    Text,
    Web,
    Image,
}

impl EntityKind {
    /// Kinds that are picked through a small icon instead of their bounds.
    pub fn uses_icon_selection(self) -> bool {
        matches!(self, EntityKind::ParticleEffect | EntityKind::Light)
    }

    pub fn grabbable_on_create(self) -> bool {
        !matches!(
            self,
            EntityKind::Zone | EntityKind::Light | EntityKind::ParticleEffect | EntityKind::Web
        )
    }

    pub fn waits_for_load(self) -> bool {
        matches!(self, EntityKind::Model)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityHost {
    #[default]
    Domain,
    Avatar,
    Local,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollisionGroups(u8);

impl CollisionGroups {
    pub const NONE: Self = Self(0);
    pub const STATIC: Self = Self(1);
    pub const DYNAMIC: Self = Self(1 << 1);
    pub const KINEMATIC: Self = Self(1 << 2);
    pub const MY_AVATAR: Self = Self(1 << 3);
    pub const OTHER_AVATAR: Self = Self(1 << 4);
    pub const ALL: Self = Self(0b1_1111);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl Default for CollisionGroups {
    fn default() -> Self {
        Self::ALL
    }
}

/// Axis-aligned box in world space.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Aabb {
            min: first,
            max: first,
        };
        for point in iter {
            bounds.min = bounds.min.min(point);
            bounds.max = bounds.max.max(point);
        }
        Some(bounds)
    }

    pub fn union(self, other: Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.min + self.dimensions() * 0.5
    }

    pub fn dimensions(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityProperties {
    pub id: EntityId,
    pub kind: EntityKind,
    pub host: EntityHost,
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub dimensions: Vec3,
    pub registration_point: Vec3,
    pub parent_id: Option<EntityId>,
    pub locked: bool,
    pub dynamic: bool,
    pub visible: bool,
    pub grabbable: bool,
    pub collides_with: CollisionGroups,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub natural_dimensions: Option<Vec3>,
}

impl Default for EntityProperties {
    fn default() -> Self {
        Self {
            id: EntityId::default(),
            kind: EntityKind::Box,
            host: EntityHost::Domain,
            name: String::new(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            dimensions: Vec3::splat(0.1),
            registration_point: Vec3::splat(0.5),
            parent_id: None,
            locked: false,
            dynamic: false,
            visible: true,
            grabbable: false,
            collides_with: CollisionGroups::ALL,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            natural_dimensions: None,
        }
    }
}

impl EntityProperties {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Center of the oriented box, taking the registration point into account.
    pub fn center(&self) -> Vec3 {
        let offset = (Vec3::splat(0.5) - self.registration_point) * self.dimensions;
        self.position + self.rotation * offset
    }

    pub fn bounding_box(&self) -> Aabb {
        let corners = (0..8).map(|index| {
            let corner = Vec3::new(
                (index & 1) as f32,
                ((index >> 1) & 1) as f32,
                ((index >> 2) & 1) as f32,
            );
            let local = (corner - self.registration_point) * self.dimensions;
            self.position + self.rotation * local
        });
        Aabb::from_points(corners).unwrap_or(Aabb {
            min: self.position,
            max: self.position,
        })
    }

    pub fn apply(&mut self, edit: &EntityEdit) {
        if let Some(name) = &edit.name {
            self.name = name.clone();
        }
        if let Some(position) = edit.position {
            self.position = position;
        }
        if let Some(rotation) = edit.rotation {
            self.rotation = rotation;
        }
        if let Some(dimensions) = edit.dimensions {
            self.dimensions = dimensions;
        }
        if let Some(registration_point) = edit.registration_point {
            self.registration_point = registration_point;
        }
        if let Some(parent_id) = edit.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(locked) = edit.locked {
            self.locked = locked;
        }
        if let Some(dynamic) = edit.dynamic {
            self.dynamic = dynamic;
        }
        if let Some(visible) = edit.visible {
            self.visible = visible;
        }
        if let Some(grabbable) = edit.grabbable {
            self.grabbable = grabbable;
        }
        if let Some(collides_with) = edit.collides_with {
            self.collides_with = collides_with;
        }
        if let Some(velocity) = edit.velocity {
            self.velocity = velocity;
        }
        if let Some(angular_velocity) = edit.angular_velocity {
            self.angular_velocity = angular_velocity;
        }
    }
}

/// A property delta. Unset fields are left untouched by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityEdit {
    pub name: Option<String>,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub dimensions: Option<Vec3>,
    pub registration_point: Option<Vec3>,
    pub parent_id: Option<Option<EntityId>>,
    pub locked: Option<bool>,
    pub dynamic: Option<bool>,
    pub visible: Option<bool>,
    pub grabbable: Option<bool>,
    pub collides_with: Option<CollisionGroups>,
    pub velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
}

impl EntityEdit {
    pub fn position(position: Vec3) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn rotation(rotation: Quat) -> Self {
        Self {
            rotation: Some(rotation),
            ..Self::default()
        }
    }

    pub fn parent(parent_id: Option<EntityId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::default()
        }
    }

    /// Delta that puts every editable field back to `properties`.
    pub fn restore(properties: &EntityProperties) -> Self {
        Self {
            name: Some(properties.name.clone()),
            position: Some(properties.position),
            rotation: Some(properties.rotation),
            dimensions: Some(properties.dimensions),
            registration_point: Some(properties.registration_point),
            parent_id: Some(properties.parent_id),
            locked: Some(properties.locked),
            dynamic: Some(properties.dynamic),
            visible: Some(properties.visible),
            grabbable: Some(properties.grabbable),
            collides_with: Some(properties.collides_with),
            velocity: Some(properties.velocity),
            angular_velocity: Some(properties.angular_velocity),
        }
    }

    pub fn moves(&self) -> bool {
        self.position.is_some() || self.rotation.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_follows_registration_point() {
        let mut props = EntityProperties::new(EntityKind::Box, "crate");
        props.dimensions = Vec3::new(2.0, 1.0, 1.0);
        props.registration_point = Vec3::ZERO;
        let bounds = props.bounding_box();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(2.0, 1.0, 1.0));
        assert_eq!(props.center(), Vec3::new(1.0, 0.5, 0.5));
    }

    #[test]
    fn rotated_box_grows_its_bounds() {
        let mut props = EntityProperties::new(EntityKind::Box, "tilted");
        props.dimensions = Vec3::ONE;
        props.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        let dims = props.bounding_box().dimensions();
        assert!((dims.x - std::f32::consts::SQRT_2).abs() < 1.0e-5);
        assert!((dims.y - 1.0).abs() < 1.0e-5);
    }

    #[test]
    fn restore_edit_round_trips_properties() {
        let mut original = EntityProperties::new(EntityKind::Sphere, "ball");
        original.position = Vec3::new(1.0, 2.0, 3.0);
        original.locked = true;
        let mut changed = original.clone();
        changed.apply(&EntityEdit::position(Vec3::ZERO));
        changed.apply(&EntityEdit {
            locked: Some(false),
            ..EntityEdit::default()
        });
        assert_ne!(changed, original);
        changed.apply(&EntityEdit::restore(&original));
        assert_eq!(changed, original);
    }

    #[test]
    fn collision_groups_remove_my_avatar() {
        let groups = CollisionGroups::ALL.without(CollisionGroups::MY_AVATAR);
        assert!(!groups.contains(CollisionGroups::MY_AVATAR));
        assert!(groups.contains(CollisionGroups::STATIC));
        assert_eq!(groups.with(CollisionGroups::MY_AVATAR), CollisionGroups::ALL);
    }
}
