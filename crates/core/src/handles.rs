use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use gizmo_scene::{Color, ProxyEdit, ProxyId, ProxyProperties, ProxyShape, Ray, RayHit, SceneService};
use serde::{Deserialize, Serialize};

mod handles_layout;

pub use handles_layout::{layout, HandleLayout, LayoutInput};

pub const COLOR_RED: Color = [255, 0, 0];
pub const COLOR_GREEN: Color = [0, 160, 52];
pub const COLOR_BLUE: Color = [0, 52, 255];
pub const COLOR_HOVER: Color = [255, 220, 82];
pub const COLOR_DUPLICATOR: Color = [162, 0, 255];
pub const COLOR_ROTATE_CURRENT_RING: Color = [255, 99, 9];
pub const COLOR_BOUNDING_EDGE: Color = [160, 160, 160];
pub const COLOR_BOUNDING_EDGE_PARENT: Color = [194, 123, 0];
pub const COLOR_BOUNDING_EDGE_PARENT_AND_CHILDREN: Color = [179, 0, 134];
pub const COLOR_BOUNDING_EDGE_CHILDREN: Color = [0, 168, 214];
pub const COLOR_SCALE_CUBE: Color = [192, 192, 192];
pub const COLOR_DEBUG_PICK_PLANE: Color = [255, 255, 255];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Axis::X => COLOR_RED,
            Axis::Y => COLOR_GREEN,
            Axis::Z => COLOR_BLUE,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RotateAxis {
    Pitch,
    Yaw,
    Roll,
}

impl RotateAxis {
    pub const ALL: [RotateAxis; 3] = [RotateAxis::Pitch, RotateAxis::Yaw, RotateAxis::Roll];

    pub fn axis(self) -> Axis {
        match self {
            RotateAxis::Pitch => Axis::X,
            RotateAxis::Yaw => Axis::Y,
            RotateAxis::Roll => Axis::Z,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ToolKind {
    TranslateAxis(Axis),
    TranslateXz,
    Duplicate,
    Rotate(RotateAxis),
    Stretch(Axis),
    Scale,
}

impl ToolKind {
    pub fn is_rotate(self) -> bool {
        matches!(self, ToolKind::Rotate(_))
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::TranslateAxis(Axis::X) => "TRANSLATE_X",
            ToolKind::TranslateAxis(Axis::Y) => "TRANSLATE_Y",
            ToolKind::TranslateAxis(Axis::Z) => "TRANSLATE_Z",
            ToolKind::TranslateXz => "TRANSLATE_XZ",
            ToolKind::Duplicate => "DUPLICATE",
            ToolKind::Rotate(RotateAxis::Pitch) => "ROTATE_PITCH",
            ToolKind::Rotate(RotateAxis::Yaw) => "ROTATE_YAW",
            ToolKind::Rotate(RotateAxis::Roll) => "ROTATE_ROLL",
            ToolKind::Stretch(Axis::X) => "STRETCH_X",
            ToolKind::Stretch(Axis::Y) => "STRETCH_Y",
            ToolKind::Stretch(Axis::Z) => "STRETCH_Z",
            ToolKind::Scale => "SCALE",
        }
    }
}

/// Turns a Y-aligned primitive (arrow, ring normal) onto `axis`.
pub(crate) fn align_y_to(axis: Axis) -> Quat {
    match axis {
        Axis::X => Quat::from_rotation_z(-90f32.to_radians()),
        Axis::Y => Quat::IDENTITY,
        Axis::Z => Quat::from_rotation_x(90f32.to_radians()),
    }
}

/// Catalog entry for every overlay the manipulator owns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandleId {
    TranslateCone(Axis),
    TranslateCylinder(Axis),
    RotateRing(RotateAxis),
    RotateCurrentRing,
    StretchCube(Axis),
    StretchPanel(Axis),
    ScaleCube,
    Duplicator,
    BoundingBox,
    SelectionBox,
    IconSelectionBox,
    XRail,
    ZRail,
    RotationDegreesDisplay,
    DebugPickPlane,
}

impl HandleId {
    pub const ALL: [HandleId; 25] = [
        HandleId::TranslateCone(Axis::X),
        HandleId::TranslateCone(Axis::Y),
        HandleId::TranslateCone(Axis::Z),
        HandleId::TranslateCylinder(Axis::X),
        HandleId::TranslateCylinder(Axis::Y),
        HandleId::TranslateCylinder(Axis::Z),
        HandleId::RotateRing(RotateAxis::Pitch),
        HandleId::RotateRing(RotateAxis::Yaw),
        HandleId::RotateRing(RotateAxis::Roll),
        HandleId::RotateCurrentRing,
        HandleId::StretchCube(Axis::X),
        HandleId::StretchCube(Axis::Y),
        HandleId::StretchCube(Axis::Z),
        HandleId::StretchPanel(Axis::X),
        HandleId::StretchPanel(Axis::Y),
        HandleId::StretchPanel(Axis::Z),
        HandleId::ScaleCube,
        HandleId::Duplicator,
        HandleId::BoundingBox,
        HandleId::SelectionBox,
        HandleId::IconSelectionBox,
        HandleId::XRail,
        HandleId::ZRail,
        HandleId::RotationDegreesDisplay,
        HandleId::DebugPickPlane,
    ];

    pub fn tool(self) -> Option<ToolKind> {
        match self {
            HandleId::TranslateCone(axis) | HandleId::TranslateCylinder(axis) => {
                Some(ToolKind::TranslateAxis(axis))
            }
            HandleId::RotateRing(axis) => Some(ToolKind::Rotate(axis)),
            HandleId::StretchCube(axis) => Some(ToolKind::Stretch(axis)),
            HandleId::ScaleCube => Some(ToolKind::Scale),
            HandleId::Duplicator => Some(ToolKind::Duplicate),
            HandleId::SelectionBox | HandleId::IconSelectionBox => Some(ToolKind::TranslateXz),
            _ => None,
        }
    }

    pub fn shape(self) -> ProxyShape {
        match self {
            HandleId::TranslateCone(_) => ProxyShape::Cone,
            HandleId::TranslateCylinder(_) => ProxyShape::Cylinder,
            HandleId::RotateRing(_) | HandleId::RotateCurrentRing => ProxyShape::Ring,
            HandleId::BoundingBox | HandleId::SelectionBox | HandleId::IconSelectionBox => {
                ProxyShape::WireBox
            }
            HandleId::XRail | HandleId::ZRail => ProxyShape::Line,
            HandleId::RotationDegreesDisplay => ProxyShape::Text,
            _ => ProxyShape::Cube,
        }
    }

    /// Layered handles draw in front and win hit-tests over the selection boxes.
    pub fn layered(self) -> bool {
        !matches!(self, HandleId::SelectionBox | HandleId::IconSelectionBox)
    }

    /// Cone and cylinder of one arrow highlight together.
    pub fn partner(self) -> Option<HandleId> {
        match self {
            HandleId::TranslateCone(axis) => Some(HandleId::TranslateCylinder(axis)),
            HandleId::TranslateCylinder(axis) => Some(HandleId::TranslateCone(axis)),
            _ => None,
        }
    }

    fn initial_properties(self) -> ProxyProperties {
        let mut props = ProxyProperties::new(self.shape());
        props.color = match self {
            HandleId::TranslateCone(axis)
            | HandleId::TranslateCylinder(axis)
            | HandleId::StretchCube(axis)
            | HandleId::StretchPanel(axis) => axis.color(),
            HandleId::RotateRing(axis) => axis.axis().color(),
            HandleId::RotateCurrentRing => COLOR_ROTATE_CURRENT_RING,
            HandleId::ScaleCube => COLOR_SCALE_CUBE,
            HandleId::Duplicator => COLOR_DUPLICATOR,
            HandleId::BoundingBox => COLOR_BOUNDING_EDGE,
            HandleId::SelectionBox | HandleId::IconSelectionBox => COLOR_RED,
            HandleId::XRail => COLOR_RED,
            HandleId::ZRail => COLOR_BLUE,
            HandleId::RotationDegreesDisplay => [255, 255, 255],
            HandleId::DebugPickPlane => COLOR_DEBUG_PICK_PLANE,
        };
        match self {
            HandleId::SelectionBox | HandleId::IconSelectionBox => props.alpha = 0.0,
            HandleId::StretchPanel(_) => props.alpha = 0.5,
            HandleId::DebugPickPlane => props.alpha = 0.25,
            _ => {}
        }
        if self == HandleId::IconSelectionBox {
            props.dimensions = Vec3::splat(0.3);
        }
        if self == HandleId::RotateCurrentRing {
            if let Some(ring) = props.ring.as_mut() {
                ring.end_at = 0.0;
            }
        }
        props.pickable = !matches!(
            self,
            HandleId::BoundingBox
                | HandleId::StretchPanel(_)
                | HandleId::XRail
                | HandleId::ZRail
                | HandleId::RotationDegreesDisplay
                | HandleId::DebugPickPlane
        );
        props.ignore_depth = self.layered();
        props
    }
}

/// Aggregate parent/child state of the selection; drives the bounding box colour.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum ParentState {
    #[default]
    None,
    Parent,
    Children,
    ParentAndChildren,
}

impl ParentState {
    pub fn from_flags(is_parent: bool, is_child: bool) -> Self {
        match (is_parent, is_child) {
            (true, true) => ParentState::ParentAndChildren,
            (true, false) => ParentState::Parent,
            (false, true) => ParentState::Children,
            (false, false) => ParentState::None,
        }
    }

    pub fn bounding_color(self) -> Color {
        match self {
            ParentState::None => COLOR_BOUNDING_EDGE,
            ParentState::Parent => COLOR_BOUNDING_EDGE_PARENT,
            ParentState::Children => COLOR_BOUNDING_EDGE_CHILDREN,
            ParentState::ParentAndChildren => COLOR_BOUNDING_EDGE_PARENT_AND_CHILDREN,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpaceMode {
    Local,
    World,
}

/// The mode in effect plus the mode the user asked for. Multi-selections force
/// world space without forgetting the request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SpaceModeState {
    mode: SpaceMode,
    desired: SpaceMode,
}

impl Default for SpaceModeState {
    fn default() -> Self {
        Self {
            mode: SpaceMode::Local,
            desired: SpaceMode::Local,
        }
    }
}

impl SpaceModeState {
    pub fn mode(&self) -> SpaceMode {
        self.mode
    }

    pub fn desired(&self) -> SpaceMode {
        self.desired
    }

    pub fn toggle(&mut self, selection_len: usize) -> bool {
        if self.mode == SpaceMode::World && selection_len > 1 {
            tracing::debug!("space mode: local editing is not available with multiple selections");
            return false;
        }
        let next = match self.mode {
            SpaceMode::Local => SpaceMode::World,
            SpaceMode::World => SpaceMode::Local,
        };
        self.mode = next;
        self.desired = next;
        true
    }

    /// Re-derives the effective mode after the selection changed.
    pub fn sync(&mut self, selection_len: usize, selection_updated: bool) {
        if selection_len > 1 {
            self.mode = SpaceMode::World;
        } else if selection_len == 1 && selection_updated {
            self.mode = self.desired;
        }
    }
}

/// Owns the overlay proxies of the handle catalog.
#[derive(Debug)]
pub struct HandleRegistry {
    proxies: BTreeMap<HandleId, ProxyId>,
    handles: BTreeMap<ProxyId, HandleId>,
    hovered: Option<(HandleId, Color)>,
}

impl HandleRegistry {
    pub fn new<S: SceneService + ?Sized>(scene: &mut S) -> Self {
        let mut proxies = BTreeMap::new();
        let mut handles = BTreeMap::new();
        for handle in HandleId::ALL {
            let proxy = scene.create_proxy(handle.initial_properties());
            proxies.insert(handle, proxy);
            handles.insert(proxy, handle);
        }
        tracing::debug!("handles: created {} proxies", proxies.len());
        Self {
            proxies,
            handles,
            hovered: None,
        }
    }

    pub fn cleanup<S: SceneService + ?Sized>(&mut self, scene: &mut S) {
        for proxy in self.proxies.values() {
            scene.delete_proxy(*proxy);
        }
        self.proxies.clear();
        self.handles.clear();
        self.hovered = None;
    }

    pub fn proxy(&self, handle: HandleId) -> Option<ProxyId> {
        self.proxies.get(&handle).copied()
    }

    pub fn handle_for(&self, proxy: ProxyId) -> Option<HandleId> {
        self.handles.get(&proxy).copied()
    }

    pub fn edit<S: SceneService + ?Sized>(&self, scene: &mut S, handle: HandleId, edit: &ProxyEdit) {
        if let Some(proxy) = self.proxy(handle) {
            scene.edit_proxy(proxy, edit);
        }
    }

    pub fn set_visible<S: SceneService + ?Sized>(&self, scene: &mut S, handle: HandleId, visible: bool) {
        self.edit(scene, handle, &ProxyEdit::visible(visible));
    }

    pub fn is_visible<S: SceneService + ?Sized>(&self, scene: &S, handle: HandleId) -> bool {
        self.proxy(handle)
            .and_then(|proxy| scene.proxy(proxy))
            .is_some_and(|props| props.visible)
    }

    pub fn apply_layout<S: SceneService + ?Sized>(&self, scene: &mut S, layout: &HandleLayout) {
        for (handle, edit) in layout.edits() {
            self.edit(scene, *handle, edit);
        }
    }

    /// Layered handles first, then the selection boxes underneath them.
    pub fn hit_test<S: SceneService + ?Sized>(&self, scene: &S, ray: &Ray) -> Option<(HandleId, RayHit)> {
        let layered: Vec<ProxyId> = self
            .proxies
            .iter()
            .filter(|(handle, _)| handle.layered())
            .map(|(_, proxy)| *proxy)
            .collect();
        let underneath: Vec<ProxyId> = self
            .proxies
            .iter()
            .filter(|(handle, _)| !handle.layered())
            .map(|(_, proxy)| *proxy)
            .collect();
        let hit = scene
            .ray_intersect(ray, &layered)
            .or_else(|| scene.ray_intersect(ray, &underneath))?;
        match self.handle_for(hit.proxy) {
            Some(handle) => Some((handle, hit)),
            None => {
                tracing::error!("handles: hit {} which is not a handle", hit.proxy);
                None
            }
        }
    }

    pub fn hovered(&self) -> Option<HandleId> {
        self.hovered.map(|(handle, _)| handle)
    }

    /// Recolours the hovered handle and its partner, restoring the previous one.
    pub fn highlight<S: SceneService + ?Sized>(&mut self, scene: &mut S, handle: Option<HandleId>) {
        let handle = handle.filter(|handle| handle.layered() && handle.tool().is_some());
        if self.hovered() == handle {
            return;
        }
        self.reset_highlight(scene);
        let Some(handle) = handle else {
            return;
        };
        let Some(color) = self
            .proxy(handle)
            .and_then(|proxy| scene.proxy(proxy))
            .map(|props| props.color)
        else {
            return;
        };
        self.edit(scene, handle, &ProxyEdit::color(COLOR_HOVER));
        if let Some(partner) = handle.partner() {
            self.edit(scene, partner, &ProxyEdit::color(COLOR_HOVER));
        }
        self.hovered = Some((handle, color));
    }

    pub fn reset_highlight<S: SceneService + ?Sized>(&mut self, scene: &mut S) {
        if let Some((handle, color)) = self.hovered.take() {
            self.edit(scene, handle, &ProxyEdit::color(color));
            if let Some(partner) = handle.partner() {
                self.edit(scene, partner, &ProxyEdit::color(color));
            }
        }
    }
}
