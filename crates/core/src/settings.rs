use std::fmt;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

pub const SETTINGS_VERSION: u32 = 1;

#[derive(Debug)]
pub enum SettingsError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::Io(message) => write!(f, "settings io error: {message}"),
            SettingsError::Parse(message) => write!(f, "settings parse error: {message}"),
            SettingsError::Invalid(message) => write!(f, "invalid settings: {message}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    pub version: u32,
    pub grid: GridSettings,
    pub rotation: RotationSettings,
    pub handles: HandleSettings,
    pub loading: LoadSettings,
    pub history: HistorySettings,
    pub input: InputSettings,
    pub debug_pick_plane: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            grid: GridSettings::default(),
            rotation: RotationSettings::default(),
            handles: HandleSettings::default(),
            loading: LoadSettings::default(),
            history: HistorySettings::default(),
            input: InputSettings::default(),
            debug_pick_plane: false,
        }
    }
}

impl EditorSettings {
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        let settings: EditorSettings =
            serde_json::from_str(text).map_err(|err| SettingsError::Parse(err.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| SettingsError::Io(format!("{}: {err}", path.display())))?;
        let settings = Self::from_json(&text)?;
        tracing::info!("settings: loaded {:?}", path);
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|err| SettingsError::Parse(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.grid.minor_spacing > 0.0) {
            return Err(SettingsError::Invalid(
                "grid.minor_spacing must be positive".to_string(),
            ));
        }
        if self.rotation.snap_angle <= 0.0 || self.rotation.default_snap_angle <= 0.0 {
            return Err(SettingsError::Invalid(
                "rotation snap angles must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.input.trigger_on_value) {
            return Err(SettingsError::Invalid(
                "input.trigger_on_value must be within 0..=1".to_string(),
            ));
        }
        if self.handles.ring_camera_distance_multiple <= 0.0 {
            return Err(SettingsError::Invalid(
                "handles.ring_camera_distance_multiple must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub minor_spacing: f32,
    pub major_every: u32,
    pub snap_enabled: bool,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            minor_spacing: 1.0,
            major_every: 5,
            snap_enabled: false,
        }
    }
}

/// Angles are in degrees.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    pub snap_angle: f32,
    pub default_snap_angle: f32,
    pub snap_tick_marks_angle: f32,
    pub tick_marks_angle: f32,
    pub idle_inner_radius: f32,
    pub selected_inner_radius: f32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            snap_angle: 22.5,
            default_snap_angle: 1.0,
            snap_tick_marks_angle: 22.5,
            tick_marks_angle: 5.0,
            idle_inner_radius: 0.92,
            selected_inner_radius: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleSettings {
    pub ring_camera_distance_multiple: f32,
    pub arrow_cylinder_camera_distance_multiple: f32,
    pub arrow_cylinder_length_multiple: f32,
    pub arrow_cylinder_offset: f32,
    pub arrow_cone_camera_distance_multiple: f32,
    pub arrow_cone_offset_multiple: f32,
    pub stretch_cube_camera_distance_multiple: f32,
    pub stretch_cube_offset: f32,
    pub stretch_panel_width: f32,
    pub scale_cube_camera_distance_multiple: f32,
    pub scale_dimensions_camera_distance_multiple: f32,
    pub bounding_edge_offset: f32,
    pub duplicator_offset: Vec3,
    pub rail_axis_length: f32,
    pub rotate_display_distance_multiple: f32,
    pub rotate_display_size: [f32; 2],
    pub rotate_display_line_height: f32,
    /// The duplicator handle is only offered in HMD mode, and only when enabled.
    pub duplicator_in_hmd: bool,
}

impl Default for HandleSettings {
    fn default() -> Self {
        Self {
            ring_camera_distance_multiple: 0.15,
            arrow_cylinder_camera_distance_multiple: 0.005,
            arrow_cylinder_length_multiple: 7.5,
            arrow_cylinder_offset: 0.1,
            arrow_cone_camera_distance_multiple: 0.025,
            arrow_cone_offset_multiple: 0.83,
            stretch_cube_camera_distance_multiple: 0.02,
            stretch_cube_offset: 0.06,
            stretch_panel_width: 0.01,
            scale_cube_camera_distance_multiple: 0.02,
            scale_dimensions_camera_distance_multiple: 0.5,
            bounding_edge_offset: 0.5,
            duplicator_offset: Vec3::new(0.6, 0.0, 0.6),
            rail_axis_length: 10000.0,
            rotate_display_distance_multiple: 2.0,
            rotate_display_size: [0.2, 0.09],
            rotate_display_line_height: 0.07,
            duplicator_in_hmd: false,
        }
    }
}

/// Polling cadence for freshly created models, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub loaded_check_interval: f32,
    pub max_loaded_checks: u32,
    pub dimensions_check_interval: f32,
    pub max_dimensions_checks: u32,
    pub create_distance: f32,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            loaded_check_interval: 0.1,
            max_loaded_checks: 100,
            dimensions_check_interval: 0.2,
            max_dimensions_checks: 10,
            create_distance: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// When set, commands pushed for fresh creations carry no edit payloads.
    pub honor_skip_edit_properties: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub trigger_on_value: f32,
    pub max_tool_chain_depth: u32,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            trigger_on_value: 0.15,
            max_tool_chain_depth: 4,
        }
    }
}
