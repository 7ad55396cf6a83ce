use glam::Vec3;

use crate::settings::GridSettings;

/// Placement grid. When disabled every snap is the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub origin: Vec3,
    pub minor_spacing: f32,
    pub major_every: u32,
    pub enabled: bool,
}

impl Default for Grid {
    fn default() -> Self {
        Self::from_settings(&GridSettings::default())
    }
}

impl Grid {
    pub fn from_settings(settings: &GridSettings) -> Self {
        Self {
            origin: Vec3::ZERO,
            minor_spacing: settings.minor_spacing,
            major_every: settings.major_every.max(1),
            enabled: settings.snap_enabled,
        }
    }

    pub fn major_spacing(&self) -> f32 {
        self.minor_spacing * self.major_every as f32
    }

    fn spacing(&self, major_only: bool) -> f32 {
        if major_only {
            self.major_spacing()
        } else {
            self.minor_spacing
        }
    }

    pub fn snap_to_grid(&self, position: Vec3, major_only: bool) -> Vec3 {
        let spacing = self.spacing(major_only);
        if !self.enabled || spacing <= 0.0 {
            return position;
        }
        self.origin + ((position - self.origin) / spacing).round() * spacing
    }

    pub fn snap_to_spacing(&self, delta: Vec3) -> Vec3 {
        if !self.enabled || self.minor_spacing <= 0.0 {
            return delta;
        }
        (delta / self.minor_spacing).round() * self.minor_spacing
    }

    /// Rests the box bottom on the grid plane for the given registration point.
    pub fn snap_to_surface(&self, position: Vec3, dimensions: Vec3, registration_point: Vec3) -> Vec3 {
        if !self.enabled {
            return position;
        }
        Vec3::new(
            position.x,
            self.origin.y + registration_point.y * dimensions.y,
            position.z,
        )
    }
}
