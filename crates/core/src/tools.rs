use glam::{Quat, Vec3};
use gizmo_scene::{EditorHost, EntityEdit, EntityProperties, ProxyEdit, Ray, SceneService};

use crate::grid::Grid;
use crate::handles::{HandleId, HandleRegistry, SpaceMode, ToolKind};
use crate::history::CreatedEntity;
use crate::input::PointerEvent;
use crate::selection::SelectionSet;
use crate::settings::EditorSettings;

mod tools_rotate;
mod tools_stretch;
mod tools_translate;

use tools_rotate::RotateDrag;
use tools_stretch::{ScaleDrag, StretchDrag};
use tools_translate::{TranslateAxisDrag, TranslateXzDrag};

const DEBUG_PICK_PLANE_EXTENT: f32 = 1000.0;

/// Everything a drag reads or writes besides the host.
pub struct ToolEnv<'a> {
    pub selection: &'a mut SelectionSet,
    pub handles: &'a HandleRegistry,
    pub grid: &'a Grid,
    pub settings: &'a EditorSettings,
    pub space_mode: SpaceMode,
    pub snap_held: bool,
}

enum Drag {
    TranslateAxis(TranslateAxisDrag),
    TranslateXz(TranslateXzDrag),
    Rotate(RotateDrag),
    Stretch(StretchDrag),
    Scale(ScaleDrag),
}

struct Gesture {
    kind: ToolKind,
    drag: Drag,
    duplicated: Vec<CreatedEntity>,
}

/// What a finished gesture leaves for the history.
#[derive(Debug)]
pub struct GestureEnd {
    pub kind: ToolKind,
    pub duplicated: Vec<CreatedEntity>,
}

/// Idle, or exactly one active drag.
#[derive(Default)]
pub struct ToolMachine {
    active: Option<Gesture>,
}

impl ToolMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_kind(&self) -> Option<ToolKind> {
        self.active.as_ref().map(|gesture| gesture.kind)
    }

    /// Starts a drag. Clones made for this gesture must already be the selection.
    pub fn begin<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        env: &mut ToolEnv<'_>,
        kind: ToolKind,
        ray: &Ray,
        hit_point: Vec3,
        duplicated: Vec<CreatedEntity>,
    ) -> bool {
        if self.active.is_some() {
            tracing::debug!("tools: {} already active", kind.name());
            return false;
        }
        env.selection.save_properties(&*host);
        let drag = match kind {
            ToolKind::TranslateAxis(axis) => {
                TranslateAxisDrag::begin(host, env, axis, ray).map(Drag::TranslateAxis)
            }
            ToolKind::TranslateXz | ToolKind::Duplicate => {
                TranslateXzDrag::begin(host, env, ray, hit_point).map(Drag::TranslateXz)
            }
            ToolKind::Rotate(axis) => RotateDrag::begin(host, env, axis, ray).map(Drag::Rotate),
            ToolKind::Stretch(axis) => StretchDrag::begin(host, env, axis, ray).map(Drag::Stretch),
            ToolKind::Scale => ScaleDrag::begin(host, env, ray).map(Drag::Scale),
        };
        let Some(drag) = drag else {
            tracing::debug!("tools: {} could not start", kind.name());
            return false;
        };
        tracing::debug!("tools: begin {}", kind.name());
        self.active = Some(Gesture {
            kind,
            drag,
            duplicated,
        });
        true
    }

    pub fn on_move<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        env: &mut ToolEnv<'_>,
        event: &PointerEvent,
        ray: &Ray,
    ) {
        let Some(gesture) = self.active.as_mut() else {
            return;
        };
        match &mut gesture.drag {
            Drag::TranslateAxis(drag) => drag.on_move(host, env, ray),
            Drag::TranslateXz(drag) => drag.on_move(host, env, event, ray),
            Drag::Rotate(drag) => drag.on_move(host, env, ray),
            Drag::Stretch(drag) => drag.on_move(host, env, ray),
            Drag::Scale(drag) => drag.on_move(host, env, ray),
        }
        env.selection.update(&*host, false, None);
    }

    /// Release always commits.
    pub fn end<H: EditorHost + ?Sized>(&mut self, host: &mut H, env: &mut ToolEnv<'_>) -> Option<GestureEnd> {
        let mut gesture = self.active.take()?;
        match &mut gesture.drag {
            Drag::TranslateAxis(_) => {}
            Drag::TranslateXz(drag) => drag.on_end(host, env),
            Drag::Rotate(drag) => drag.on_end(host, env),
            Drag::Stretch(drag) => drag.on_end(host, env),
            Drag::Scale(drag) => drag.on_end(host, env),
        }
        hide_debug_pick_plane(host, env);
        tracing::debug!("tools: end {}", gesture.kind.name());
        Some(GestureEnd {
            kind: gesture.kind,
            duplicated: gesture.duplicated,
        })
    }
}

/// Writes `edit(saved)` to every member whose parent is not also selected.
pub(crate) fn edit_unparented<S: SceneService + ?Sized>(
    scene: &mut S,
    selection: &SelectionSet,
    edit: impl Fn(&EntityProperties) -> EntityEdit,
) {
    for id in selection.members_without_selected_parent() {
        let Some(saved) = selection.saved(id) else {
            continue;
        };
        if !scene.edit_entity(id, &edit(saved)) {
            tracing::debug!("tools: {id} vanished mid-edit");
        }
    }
}

/// Applies `change` on top of each saved rotation. With more than one member the
/// positions orbit `center` too.
pub fn update_selections_rotation<S: SceneService + ?Sized>(
    scene: &mut S,
    selection: &SelectionSet,
    change: Quat,
    center: Vec3,
) {
    let reposition = selection.len() > 1;
    edit_unparented(scene, selection, |saved| {
        let mut edit = EntityEdit::rotation((change * saved.rotation).normalize());
        if reposition {
            edit.position = Some(center + change * (saved.position - center));
        }
        edit
    });
}

pub(crate) fn show_debug_pick_plane<S: SceneService + ?Sized>(
    scene: &mut S,
    env: &ToolEnv<'_>,
    point: Vec3,
    normal: Vec3,
) {
    if !env.settings.debug_pick_plane {
        return;
    }
    let normal = normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        return;
    }
    let edit = ProxyEdit {
        position: Some(point),
        rotation: Some(Quat::from_rotation_arc(Vec3::Y, normal)),
        dimensions: Some(Vec3::new(DEBUG_PICK_PLANE_EXTENT, 0.001, DEBUG_PICK_PLANE_EXTENT)),
        visible: Some(true),
        ..ProxyEdit::default()
    };
    env.handles.edit(scene, HandleId::DebugPickPlane, &edit);
}

fn hide_debug_pick_plane<S: SceneService + ?Sized>(scene: &mut S, env: &ToolEnv<'_>) {
    if env.settings.debug_pick_plane {
        env.handles.set_visible(scene, HandleId::DebugPickPlane, false);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use glam::Vec3;
    use gizmo_scene::{EntityId, EntityKind, EntityProperties, MemoryScene};

    use crate::grid::Grid;
    use crate::handles::{HandleRegistry, SpaceMode};
    use crate::selection::SelectionSet;
    use crate::settings::EditorSettings;

    use super::ToolEnv;

    pub(crate) struct Rig {
        pub scene: MemoryScene,
        pub selection: SelectionSet,
        pub handles: HandleRegistry,
        pub grid: Grid,
        pub settings: EditorSettings,
        pub space_mode: SpaceMode,
        pub snap_held: bool,
    }

    impl Rig {
        pub fn new() -> Self {
            let mut scene = MemoryScene::new();
            let handles = HandleRegistry::new(&mut scene);
            let settings = EditorSettings::default();
            Self {
                scene,
                selection: SelectionSet::new(),
                handles,
                grid: Grid::from_settings(&settings.grid),
                settings,
                space_mode: SpaceMode::Local,
                snap_held: false,
            }
        }

        pub fn add_box(&mut self, position: Vec3, dimensions: Vec3) -> EntityId {
            let mut props = EntityProperties::new(EntityKind::Box, "box");
            props.position = position;
            props.dimensions = dimensions;
            self.scene.insert(props)
        }

        pub fn select(&mut self, ids: &[EntityId]) {
            self.selection.set_selections(&self.scene, ids, None);
        }

        pub fn split(&mut self) -> (&mut MemoryScene, ToolEnv<'_>) {
            (
                &mut self.scene,
                ToolEnv {
                    selection: &mut self.selection,
                    handles: &self.handles,
                    grid: &self.grid,
                    settings: &self.settings,
                    space_mode: self.space_mode,
                    snap_held: self.snap_held,
                },
            )
        }
    }
}
