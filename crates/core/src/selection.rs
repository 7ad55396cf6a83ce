use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use glam::{Quat, Vec3};
use gizmo_scene::{Aabb, EditorHost, EntityHost, EntityId, EntityKind, EntityProperties, SceneService};

/// Identifies who triggered a selection change so a listener can ignore its own echo.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CallerId(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub selection_updated: bool,
    pub caller: Option<CallerId>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub dimensions: Vec3,
    pub registration_point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub dimensions: Vec3,
}

type Listener = Box<dyn FnMut(&SelectionEvent)>;

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
    dispatching: bool,
    removed: Vec<u64>,
}

impl ListenerRegistry {
    fn remove(&mut self, id: u64) {
        if self.dispatching {
            self.removed.push(id);
        } else {
            self.listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }
}

/// Keeps a selection listener registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<RefCell<ListenerRegistry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            match registry.try_borrow_mut() {
                Ok(mut registry) => registry.remove(self.id),
                Err(_) => tracing::warn!(
                    "selection: listener {} dropped during notification, still registered",
                    self.id
                ),
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// The set of selected entities with cached aggregate transforms.
pub struct SelectionSet {
    ids: Vec<EntityId>,
    saved: BTreeMap<EntityId, EntityProperties>,
    local: Option<LocalTransform>,
    world: Option<WorldTransform>,
    kind: Option<EntityKind>,
    registry: Rc<RefCell<ListenerRegistry>>,
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionSet {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            saved: BTreeMap::new(),
            local: None,
            world: None,
            kind: None,
            registry: Rc::new(RefCell::new(ListenerRegistry::default())),
        }
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn has_selection(&self) -> bool {
        !self.ids.is_empty()
    }

    pub fn local_transform(&self) -> Option<LocalTransform> {
        self.local
    }

    pub fn world_transform(&self) -> Option<WorldTransform> {
        self.world
    }

    /// Kind of the first member.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        self.kind
    }

    pub fn saved(&self, id: EntityId) -> Option<&EntityProperties> {
        self.saved.get(&id)
    }

    pub fn saved_properties(&self) -> &BTreeMap<EntityId, EntityProperties> {
        &self.saved
    }

    pub fn subscribe(&self, callback: impl FnMut(&SelectionEvent) + 'static) -> Subscription {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Box::new(callback)));
        Subscription {
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    pub fn set_selections<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        ids: &[EntityId],
        caller: Option<CallerId>,
    ) {
        self.ids.clear();
        for id in ids {
            if !self.ids.contains(id) {
                self.ids.push(*id);
            }
        }
        self.update(scene, true, caller);
    }

    pub fn add_entity<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        id: EntityId,
        toggle: bool,
        caller: Option<CallerId>,
    ) {
        match self.ids.iter().position(|member| *member == id) {
            None => self.ids.push(id),
            Some(index) if toggle => {
                self.ids.remove(index);
            }
            Some(_) => {}
        }
        self.update(scene, true, caller);
    }

    pub fn remove_entity<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        id: EntityId,
        caller: Option<CallerId>,
    ) {
        self.ids.retain(|member| *member != id);
        self.update(scene, true, caller);
    }

    pub fn remove_entities<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        ids: &[EntityId],
        caller: Option<CallerId>,
    ) {
        self.ids.retain(|member| !ids.contains(member));
        self.update(scene, true, caller);
    }

    pub fn clear<S: SceneService + ?Sized>(&mut self, scene: &S, caller: Option<CallerId>) {
        self.ids.clear();
        self.update(scene, true, caller);
    }

    /// Replaces the snapshot with the current properties of every member.
    pub fn save_properties<S: SceneService + ?Sized>(&mut self, scene: &S) {
        self.saved = self
            .ids
            .iter()
            .filter_map(|id| scene.entity_properties(*id).map(|props| (*id, props)))
            .collect();
    }

    pub fn has_unlocked_selection<S: SceneService + ?Sized>(&self, scene: &S) -> bool {
        self.ids.iter().all(|id| {
            scene
                .entity_properties(*id)
                .map_or(true, |props| !props.locked)
        })
    }

    /// Members whose saved parent is not itself selected; editing a parent already
    /// carries its children.
    pub fn members_without_selected_parent(&self) -> Vec<EntityId> {
        self.ids
            .iter()
            .copied()
            .filter(|id| match self.saved.get(id) {
                Some(props) => props.parent_id.map_or(true, |parent| !self.ids.contains(&parent)),
                None => false,
            })
            .collect()
    }

    pub fn update<S: SceneService + ?Sized>(
        &mut self,
        scene: &S,
        selection_updated: bool,
        caller: Option<CallerId>,
    ) {
        let members: Vec<EntityProperties> = self
            .ids
            .iter()
            .filter_map(|id| scene.entity_properties(*id))
            .collect();

        self.kind = members.first().map(|props| props.kind);
        self.local = None;
        self.world = None;
        if members.len() != self.ids.len() {
            tracing::debug!(
                "selection: {} of {} members missing from scene",
                self.ids.len() - members.len(),
                self.ids.len()
            );
        }

        if self.ids.len() == 1 {
            if let Some(props) = members.first() {
                self.local = Some(LocalTransform {
                    position: props.position,
                    rotation: props.rotation,
                    dimensions: props.dimensions,
                    registration_point: props.registration_point,
                });
            }
        }

        let bounds = members
            .iter()
            .map(EntityProperties::bounding_box)
            .reduce(Aabb::union);
        self.world = bounds.map(|bounds| WorldTransform {
            position: bounds.center(),
            rotation: Quat::IDENTITY,
            dimensions: bounds.dimensions(),
        });

        self.notify(SelectionEvent {
            selection_updated,
            caller,
        });
    }

    fn notify(&self, event: SelectionEvent) {
        let mut listeners = {
            let mut registry = self.registry.borrow_mut();
            registry.dispatching = true;
            std::mem::take(&mut registry.listeners)
        };
        for (_, listener) in listeners.iter_mut() {
            listener(&event);
        }
        let mut registry = self.registry.borrow_mut();
        registry.dispatching = false;
        let removed = std::mem::take(&mut registry.removed);
        listeners.retain(|(id, _)| !removed.contains(id));
        let added = std::mem::take(&mut registry.listeners);
        listeners.extend(added);
        registry.listeners = listeners;
    }

    fn reject_empty<H: EditorHost + ?Sized>(&self, host: &mut H) -> bool {
        if self.has_selection() {
            return false;
        }
        host.rejection();
        host.notify_edit_error("You have nothing selected.");
        true
    }

    pub fn select_parent<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Option<CallerId>,
    ) -> bool {
        if self.reject_empty(host) {
            return false;
        }
        let parents: Vec<EntityId> = self
            .ids
            .iter()
            .filter_map(|id| host.entity_properties(*id).and_then(|props| props.parent_id))
            .collect();
        self.set_selections(&*host, &parents, caller);
        true
    }

    pub fn select_top_parent<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Option<CallerId>,
    ) -> bool {
        if self.reject_empty(host) {
            return false;
        }
        let tops: Vec<EntityId> = self
            .ids
            .iter()
            .filter_map(|id| top_parent(&*host, *id))
            .collect();
        self.set_selections(&*host, &tops, caller);
        true
    }

    /// Appends every domain-hosted descendant of the current members.
    pub fn add_children_to_selection<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Option<CallerId>,
    ) -> bool {
        if self.reject_empty(host) {
            return false;
        }
        let mut ids = self.ids.clone();
        let mut cursor = 0;
        while cursor < ids.len() {
            for child in host.children(ids[cursor]) {
                let domain = host
                    .entity_properties(child)
                    .is_some_and(|props| props.host == EntityHost::Domain);
                if domain && !ids.contains(&child) {
                    ids.push(child);
                }
            }
            cursor += 1;
        }
        self.set_selections(&*host, &ids, caller);
        true
    }

    pub fn select_family<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Option<CallerId>,
    ) -> bool {
        self.select_parent(host, caller) && self.add_children_to_selection(host, caller)
    }

    pub fn select_top_family<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
        caller: Option<CallerId>,
    ) -> bool {
        self.select_top_parent(host, caller) && self.add_children_to_selection(host, caller)
    }
}

pub fn top_parent<S: SceneService + ?Sized>(scene: &S, id: EntityId) -> Option<EntityId> {
    let mut current = scene.entity_properties(id)?;
    let mut guard = 0;
    while let Some(parent) = current.parent_id {
        match scene.entity_properties(parent) {
            Some(props) if guard < 256 => {
                current = props;
                guard += 1;
            }
            _ => break,
        }
    }
    Some(current.id)
}

/// True when `ancestor` appears anywhere on `id`'s parent chain.
pub fn is_descendant_of<S: SceneService + ?Sized>(scene: &S, id: EntityId, ancestor: EntityId) -> bool {
    let mut current = scene.entity_properties(id).and_then(|props| props.parent_id);
    let mut guard = 0;
    while let Some(parent) = current {
        if parent == ancestor {
            return true;
        }
        guard += 1;
        if guard > 256 {
            return false;
        }
        current = scene.entity_properties(parent).and_then(|props| props.parent_id);
    }
    false
}
