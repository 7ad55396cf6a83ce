mod geometry;
mod grid;
mod handles;
mod history;
mod input;
mod selection;
mod session;
mod settings;
mod tools;

pub use geometry::{
    dominant_axis, elevation, normalize_degrees, oriented_angle, point_in_oriented_box,
    ray_plane_intersection, ray_plane_intersection_forward, snap_angle_down, use_previous_pick_ray,
    world_bounds_contain, MIN_ANGULAR_SIZE, MIN_ELEVATION, WORLD_HALF_EXTENT,
};
pub use grid::Grid;
pub use handles::{
    layout, Axis, HandleId, HandleLayout, HandleRegistry, LayoutInput, ParentState, RotateAxis,
    SpaceMode, SpaceModeState, ToolKind,
};
pub use history::{BatchApplier, Command, CommandHistory, CreatedEntity, EditEntry, EntityBatch};
pub use input::{InputAdapter, Key, KeyEvent, Modifiers, PointerEvent, TriggerAction};
pub use selection::{
    is_descendant_of, top_parent, CallerId, LocalTransform, SelectionEvent, SelectionSet,
    Subscription, WorldTransform,
};
pub use session::{adjust_position_per_bounding_box, Clipboard, EditError, EditorSession};
pub use settings::{
    EditorSettings, GridSettings, HandleSettings, HistorySettings, InputSettings, LoadSettings,
    RotationSettings, SettingsError, SETTINGS_VERSION,
};
pub use tools::{update_selections_rotation, GestureEnd, ToolEnv, ToolMachine};
