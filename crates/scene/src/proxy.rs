use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

pub type Color = [u8; 3];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct ProxyId(u64);

impl ProxyId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProxyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy#{}", self.0)
    }
}

/// Overlay primitive drawn by the host on top of the world.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyShape {
    Cone,
    Cylinder,
    Cube,
    Ring,
    WireBox,
    Line,
    Text,
}

/// Ring parameters in degrees; radii are fractions of the ring dimension.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingStyle {
    pub start_at: f32,
    pub end_at: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub major_tick_marks_angle: f32,
    pub minor_tick_marks_angle: f32,
}

impl Default for RingStyle {
    fn default() -> Self {
        Self {
            start_at: 0.0,
            end_at: 360.0,
            inner_radius: 0.92,
            outer_radius: 1.0,
            major_tick_marks_angle: 5.0,
            minor_tick_marks_angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyProperties {
    pub shape: ProxyShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub dimensions: Vec3,
    pub color: Color,
    pub alpha: f32,
    pub visible: bool,
    /// Excluded from ray picks when false.
    pub pickable: bool,
    pub ignore_depth: bool,
    pub ring: Option<RingStyle>,
    /// Line end point for `ProxyShape::Line`.
    pub end: Option<Vec3>,
    pub text: Option<String>,
}

impl ProxyProperties {
    pub fn new(shape: ProxyShape) -> Self {
        Self {
            shape,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            dimensions: Vec3::ONE,
            color: [255, 255, 255],
            alpha: 1.0,
            visible: false,
            pickable: true,
            ignore_depth: true,
            ring: matches!(shape, ProxyShape::Ring).then(RingStyle::default),
            end: None,
            text: None,
        }
    }

    pub fn apply(&mut self, edit: &ProxyEdit) {
        if let Some(position) = edit.position {
            self.position = position;
        }
        if let Some(rotation) = edit.rotation {
            self.rotation = rotation;
        }
        if let Some(dimensions) = edit.dimensions {
            self.dimensions = dimensions;
        }
        if let Some(color) = edit.color {
            self.color = color;
        }
        if let Some(alpha) = edit.alpha {
            self.alpha = alpha;
        }
        if let Some(visible) = edit.visible {
            self.visible = visible;
        }
        if let Some(ring) = edit.ring {
            self.ring = Some(ring);
        }
        if let Some(end) = edit.end {
            self.end = Some(end);
        }
        if let Some(text) = &edit.text {
            self.text = Some(text.clone());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProxyEdit {
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub dimensions: Option<Vec3>,
    pub color: Option<Color>,
    pub alpha: Option<f32>,
    pub visible: Option<bool>,
    pub ring: Option<RingStyle>,
    pub end: Option<Vec3>,
    pub text: Option<String>,
}

impl ProxyEdit {
    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Self::default()
        }
    }

    pub fn color(color: Color) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RayHit {
    pub proxy: ProxyId,
    pub point: Vec3,
    pub distance: f32,
}
