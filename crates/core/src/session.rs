use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;
use gizmo_scene::{EditorHost, EntityHost, EntityId, EntityKind, Hand, Ray, SceneService};

use crate::grid::Grid;
use crate::handles::{layout, Axis, HandleRegistry, LayoutInput, ParentState, SpaceMode, SpaceModeState, ToolKind};
use crate::history::{BatchApplier, CommandHistory, CreatedEntity, EditEntry, EntityBatch};
use crate::input::{InputAdapter, Key, KeyEvent, Modifiers, PointerEvent, TriggerAction};
use crate::selection::{SelectionEvent, SelectionSet, Subscription};
use crate::settings::EditorSettings;
use crate::tools::{ToolEnv, ToolMachine};

macro_rules! tool_env {
    ($session:expr) => {
        ToolEnv {
            selection: &mut $session.selection,
            handles: &$session.handles,
            grid: &$session.grid,
            settings: &$session.settings,
            space_mode: $session.space.mode(),
            snap_held: $session.input.snap_held(),
        }
    };
}

mod session_clipboard;
mod session_create;
mod session_ops;

#[cfg(test)]
mod tests;

pub use session_clipboard::Clipboard;
pub use session_create::adjust_position_per_bounding_box;
use session_create::PendingLoad;

/// Reasons an editor operation is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditError {
    NothingSelected,
    NothingSelectedOrLocked,
    SelectionLocked,
    FamilyLocked,
    ParentNeedsMultiple,
    AlreadyParented,
    UnparentNeedsSelection,
    NoParent { multiple: bool },
    OutOfBounds(EntityKind),
    EmptyClipboard,
}

impl EditError {
    /// Informational refusals go through `notify` instead of the edit-error channel.
    fn is_notice(self) -> bool {
        matches!(self, EditError::AlreadyParented | EditError::NoParent { .. })
    }
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::NothingSelected => write!(f, "You have nothing selected."),
            EditError::NothingSelectedOrLocked => {
                write!(f, "You have nothing selected or the selection has locked entities.")
            }
            EditError::SelectionLocked => write!(f, "You have nothing selected, or the selection is locked."),
            EditError::FamilyLocked => write!(
                f,
                "At least one of the selected entities or one of their children are locked."
            ),
            EditError::ParentNeedsMultiple => {
                write!(f, "You must have multiple entities selected in order to parent them")
            }
            EditError::AlreadyParented => write!(f, "Entities are already parented to last"),
            EditError::UnparentNeedsSelection => {
                write!(f, "You must have an entity selected in order to unparent it.")
            }
            EditError::NoParent { multiple: false } => write!(f, "Selected Entity does not have a parent"),
            EditError::NoParent { multiple: true } => write!(f, "Selected Entities have no parents"),
            EditError::OutOfBounds(kind) => write!(f, "Can't create {kind:?}: {kind:?} would be out of bounds."),
            EditError::EmptyClipboard => write!(f, "Nothing to paste."),
        }
    }
}

impl std::error::Error for EditError {}

fn reject<H: EditorHost + ?Sized>(host: &mut H, error: EditError) {
    tracing::debug!("session: refused: {error}");
    host.rejection();
    let message = error.to_string();
    if error.is_notice() {
        host.notify(&message);
    } else {
        host.notify_edit_error(&message);
    }
}

/// One editing session: selection, handles, the active drag and the undo history.
pub struct EditorSession {
    settings: EditorSettings,
    grid: Grid,
    selection: SelectionSet,
    handles: HandleRegistry,
    tools: ToolMachine,
    history: CommandHistory,
    applier: BatchApplier,
    input: InputAdapter,
    space: SpaceModeState,
    clipboard: Clipboard,
    pending_loads: Vec<PendingLoad>,
    selection_notice: Rc<Cell<Option<bool>>>,
    subscription: Option<Subscription>,
    active: bool,
}

impl EditorSession {
    pub fn new<S: SceneService + ?Sized>(scene: &mut S, settings: EditorSettings) -> Self {
        let selection = SelectionSet::new();
        let selection_notice = Rc::new(Cell::new(None));
        let sink = Rc::clone(&selection_notice);
        let subscription = selection.subscribe(move |event: &SelectionEvent| {
            let updated = sink.get().unwrap_or(false) || event.selection_updated;
            sink.set(Some(updated));
        });
        let handles = HandleRegistry::new(scene);
        tracing::info!("session: started");
        Self {
            grid: Grid::from_settings(&settings.grid),
            input: InputAdapter::new(settings.input.trigger_on_value),
            settings,
            selection,
            handles,
            tools: ToolMachine::new(),
            history: CommandHistory::new(),
            applier: BatchApplier::new(),
            space: SpaceModeState::default(),
            clipboard: Clipboard::default(),
            pending_loads: Vec::new(),
            selection_notice,
            subscription: Some(subscription),
            active: true,
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Direct access for hierarchy selection helpers; handles follow on the next `update`.
    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut CommandHistory {
        &mut self.history
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn set_grid(&mut self, grid: Grid) {
        self.grid = grid;
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn space_mode(&self) -> SpaceMode {
        self.space.mode()
    }

    pub fn active_tool(&self) -> Option<ToolKind> {
        self.tools.active_kind()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pending_loads(&self) -> usize {
        self.pending_loads.len()
    }

    pub fn input_mut(&mut self) -> &mut InputAdapter {
        &mut self.input
    }

    /// Replaces the selection and refreshes the handles.
    pub fn select<H: EditorHost + ?Sized>(&mut self, host: &mut H, ids: &[EntityId]) {
        self.selection.set_selections(&*host, ids, None);
        self.refresh(host);
    }

    pub fn clear_selection<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        self.selection.clear(&*host, None);
        self.refresh(host);
    }

    /// Starts a gesture when the pointer lands on a handle. Returns whether a tool began.
    pub fn mouse_press<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &PointerEvent) -> bool {
        if !self.active || self.tools.is_active() {
            return false;
        }
        if !event.left_button && !self.input.triggered() {
            return false;
        }
        if event.modifiers.alt && !host.is_mac() {
            return false;
        }
        self.input.record_event(*event);
        let ray = self.input.pick_ray(event, &*host);
        let Some((handle, hit)) = self.handles.hit_test(&*host, &ray) else {
            return false;
        };
        let Some(kind) = handle.tool() else {
            tracing::error!("session: hit {handle:?}, which starts no tool");
            return false;
        };
        self.handles.reset_highlight(host);
        let started = self.begin_tool(host, kind, event, &ray, hit.point, Vec::new(), 0);
        self.refresh(host);
        started
    }

    fn begin_tool<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        kind: ToolKind,
        event: &PointerEvent,
        ray: &Ray,
        hit_point: Vec3,
        duplicated: Vec<CreatedEntity>,
        depth: u32,
    ) -> bool {
        if depth > self.settings.input.max_tool_chain_depth {
            tracing::error!(
                "session: tool chain deeper than {} at {}",
                self.settings.input.max_tool_chain_depth,
                kind.name()
            );
            return false;
        }
        if !self.selection.has_selection() {
            reject(host, EditError::NothingSelected);
            return false;
        }
        if !self.selection.has_unlocked_selection(&*host) {
            reject(host, EditError::SelectionLocked);
            return false;
        }

        let mut duplicated = duplicated;
        let duplicate_modifier = if host.is_mac() {
            event.modifiers.alt
        } else {
            event.modifiers.control
        };
        let translating = matches!(kind, ToolKind::TranslateAxis(_) | ToolKind::TranslateXz);
        if duplicated.is_empty() && (kind == ToolKind::Duplicate || (translating && duplicate_modifier)) {
            match self.duplicate_into_selection(host) {
                Some(created) => duplicated = created,
                None => return false,
            }
        }
        if kind == ToolKind::Duplicate {
            return self.begin_tool(host, ToolKind::TranslateXz, event, ray, hit_point, duplicated, depth + 1);
        }

        self.sync_space_mode();
        let fallback = duplicated.clone();
        let mut env = tool_env!(self);
        let started = self.tools.begin(host, &mut env, kind, ray, hit_point, duplicated);
        if !started && !fallback.is_empty() {
            self.push_command_for_selections(&*host, fallback, Vec::new(), false);
        }
        started
    }

    /// Drives the active drag, or hover highlighting while idle. Returns whether a drag consumed it.
    pub fn mouse_move<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &PointerEvent) -> bool {
        if !self.active {
            return false;
        }
        self.input.record_event(*event);
        let ray = self.input.pick_ray(event, &*host);
        if self.tools.is_active() {
            let mut env = tool_env!(self);
            self.tools.on_move(host, &mut env, event, &ray);
            self.refresh(host);
            return true;
        }
        let hovered = self.handles.hit_test(&*host, &ray).map(|(handle, _)| handle);
        self.handles.highlight(host, hovered);
        false
    }

    /// Ends the active drag and records it. Returns whether a gesture was committed.
    pub fn mouse_release<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &PointerEvent) -> bool {
        self.input.record_event(*event);
        let mut env = tool_env!(self);
        let Some(end) = self.tools.end(host, &mut env) else {
            return false;
        };
        self.push_command_for_selections(&*host, end.duplicated, Vec::new(), false);
        self.selection.update(&*host, false, None);
        self.refresh(host);
        true
    }

    pub fn trigger_clicked<H: EditorHost + ?Sized>(&mut self, host: &mut H, hand: Hand, clicked: bool) -> bool {
        match self.input.trigger_clicked(hand, clicked) {
            Some(TriggerAction::Press) => self.mouse_press(host, &PointerEvent::synthetic()),
            Some(TriggerAction::Release) => self.mouse_release(host, &PointerEvent::synthetic()),
            None => false,
        }
    }

    pub fn trigger_pressed<H: EditorHost + ?Sized>(&mut self, host: &mut H, hand: Hand, value: f32) {
        if self.input.trigger_pressed(hand, value) {
            let ray = self.input.pick_ray(&PointerEvent::synthetic(), &*host);
            let hovered = self.handles.hit_test(&*host, &ray).map(|(handle, _)| handle);
            self.handles.highlight(host, hovered);
        } else if !self.tools.is_active() {
            self.handles.reset_highlight(host);
        }
    }

    pub fn key_press<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &KeyEvent) {
        if event.key == Key::Control {
            self.input.set_snap_held(true);
        }
        self.replay_modifiers(host, event.modifiers);
        self.refresh(host);
    }

    /// Releases run the editor shortcuts. Returns whether a shortcut fired.
    pub fn key_release<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &KeyEvent) -> bool {
        if event.key == Key::Control {
            self.input.set_snap_held(false);
        }
        self.replay_modifiers(host, event.modifiers);
        self.refresh(host);
        if !self.active || self.tools.is_active() {
            return false;
        }
        self.shortcut(host, event)
    }

    fn shortcut<H: EditorHost + ?Sized>(&mut self, host: &mut H, event: &KeyEvent) -> bool {
        let control = event.modifiers.control;
        let shift = event.modifiers.shift;
        match event.key {
            Key::Delete => self.delete_selected(host),
            Key::Character(c) => match (c.to_ascii_lowercase(), control, shift) {
                ('t', false, _) => self.toggle_space_mode(host),
                ('7', false, _) => self.rotate_selection_90(host, Axis::X),
                ('8', false, _) => self.rotate_selection_90(host, Axis::Y),
                ('9', false, _) => self.rotate_selection_90(host, Axis::Z),
                ('x', true, _) => self.cut(host),
                ('c', true, _) => self.copy(host),
                ('v', true, _) => self.paste(host),
                ('d', true, _) => self.duplicate_selected(host),
                ('z', true, false) => self.undo(host),
                ('z', true, true) | ('y', true, _) => self.redo(host),
                ('p', true, false) => self.parent_selected(host),
                ('p', true, true) => self.unparent_selected(host),
                _ => false,
            },
            _ => false,
        }
    }

    fn replay_modifiers<H: EditorHost + ?Sized>(&mut self, host: &mut H, modifiers: Modifiers) {
        if !self.tools.is_active() {
            return;
        }
        let Some(event) = self.input.modifiers_changed(modifiers) else {
            return;
        };
        let ray = self.input.pick_ray(&event, &*host);
        let mut env = tool_env!(self);
        self.tools.on_move(host, &mut env, &event, &ray);
    }

    /// Per-frame work: controller motion, pending loads, handle layout.
    pub fn update<H: EditorHost + ?Sized>(&mut self, host: &mut H, dt: f32) {
        if !self.active {
            return;
        }
        if let Some(hand) = self.input.triggered_hand() {
            let pose = host.controller_pose(hand);
            if self.input.controller_moved(hand, pose) && self.selection.has_selection() {
                self.mouse_move(host, &PointerEvent::synthetic());
            }
        }
        self.poll_loads(host, dt);
        self.refresh(host);
    }

    pub fn undo<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("undo") {
            return false;
        }
        if self.tools.is_active() {
            tracing::debug!("session: undo ignored during a gesture");
            return false;
        }
        let applier = &mut self.applier;
        let mut selected = None;
        let done = self.history.undo(|batch| selected = Some(applier.apply(&mut *host, batch)));
        if let Some(ids) = selected {
            self.select_after_replay(host, ids);
        }
        done
    }

    pub fn redo<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("redo") {
            return false;
        }
        if self.tools.is_active() {
            tracing::debug!("session: redo ignored during a gesture");
            return false;
        }
        let applier = &mut self.applier;
        let mut selected = None;
        let done = self.history.redo(|batch| selected = Some(applier.apply(&mut *host, batch)));
        if let Some(ids) = selected {
            self.select_after_replay(host, ids);
        }
        done
    }

    /// Editing operations are refused while the session is suspended.
    fn ready(&self, operation: &str) -> bool {
        if !self.active {
            tracing::debug!("session: {operation} ignored while inactive");
        }
        self.active
    }

    fn select_after_replay<H: EditorHost + ?Sized>(&mut self, host: &mut H, mut ids: Vec<EntityId>) {
        ids.retain(|id| host.entity_properties(*id).is_some());
        if self.active {
            self.selection.set_selections(&*host, &ids, None);
            self.selection.save_properties(&*host);
        }
        self.refresh(host);
    }

    /// Records the selection's snapshot-to-live change plus created and deleted trees.
    pub(crate) fn push_command_for_selections<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        created: Vec<CreatedEntity>,
        deleted: Vec<CreatedEntity>,
        skip_edit_properties: bool,
    ) {
        let skip = skip_edit_properties && self.settings.history.honor_skip_edit_properties;
        let created_ids: Vec<EntityId> = created.iter().map(|entity| entity.id).collect();
        let deleted_ids: Vec<EntityId> = deleted.iter().map(|entity| entity.id).collect();
        let mut undo = EntityBatch {
            create_entities: deleted,
            delete_entities: created_ids,
            select_created: true,
            ..EntityBatch::default()
        };
        let mut redo = EntityBatch {
            create_entities: created,
            delete_entities: deleted_ids,
            select_created: true,
            ..EntityBatch::default()
        };
        for id in self.selection.ids() {
            let Some(initial) = self.selection.saved(*id) else {
                continue;
            };
            let (before, after) = if skip {
                (None, None)
            } else {
                (Some(initial.clone()), scene.entity_properties(*id))
            };
            undo.edit_entities.push(EditEntry {
                id: *id,
                properties: before,
            });
            redo.edit_entities.push(EditEntry {
                id: *id,
                properties: after,
            });
        }
        self.history.push_command(undo, redo);
    }

    fn sync_space_mode(&mut self) {
        if let Some(updated) = self.selection_notice.take() {
            self.space.sync(self.selection.len(), updated);
        }
    }

    fn parent_state<S: SceneService + ?Sized>(&self, scene: &S) -> ParentState {
        let Some(first) = self.selection.ids().first() else {
            return ParentState::None;
        };
        let is_child = scene
            .entity_properties(*first)
            .is_some_and(|props| props.parent_id.is_some());
        let is_parent = scene.children(*first).into_iter().any(|child| {
            scene
                .entity_properties(child)
                .is_some_and(|props| props.host == EntityHost::Domain)
        });
        ParentState::from_flags(is_parent, is_child)
    }

    /// Lays the handles out around the current selection.
    fn refresh<S: SceneService + ?Sized>(&mut self, scene: &mut S) {
        self.sync_space_mode();
        let parent_state = self.parent_state(&*scene);
        let input = LayoutInput {
            world: self.selection.world_transform(),
            local: self.selection.local_transform(),
            selection_len: self.selection.len(),
            kind: self.selection.entity_kind(),
            space_mode: self.space.mode(),
            camera_position: scene.camera_position(),
            active_tool: self.tools.active_kind(),
            snap_held: self.input.snap_held(),
            hmd_active: scene.hmd_active(),
            parent_state,
            handles: &self.settings.handles,
            rotation: &self.settings.rotation,
        };
        let handle_layout = layout(&input);
        self.handles.apply_layout(scene, &handle_layout);
    }

    /// Suspends or resumes editing. Deactivating commits any drag and drops the selection.
    pub fn set_active<H: EditorHost + ?Sized>(&mut self, host: &mut H, active: bool) {
        if self.active == active {
            return;
        }
        if !active {
            let mut env = tool_env!(self);
            if let Some(end) = self.tools.end(host, &mut env) {
                self.push_command_for_selections(&*host, end.duplicated, Vec::new(), false);
            }
            self.handles.reset_highlight(host);
            self.input.reset();
            self.selection.clear(&*host, None);
        }
        self.active = active;
        self.history.set_enabled(active);
        self.refresh(host);
        tracing::info!("session: {}", if active { "activated" } else { "deactivated" });
    }

    /// Deletes every handle proxy and drops the selection listener.
    pub fn shutdown<H: EditorHost + ?Sized>(&mut self, host: &mut H) {
        self.set_active(host, false);
        self.handles.cleanup(host);
        self.subscription = None;
        self.pending_loads.clear();
        tracing::info!("session: shut down");
    }
}
