use std::collections::BTreeMap;

use gizmo_scene::{EntityEdit, EntityId, EntityProperties, SceneService};
use serde::{Deserialize, Serialize};

const MAX_PARENT_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEntry {
    pub id: EntityId,
    /// `None` leaves the entity untouched.
    pub properties: Option<EntityProperties>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedEntity {
    pub id: EntityId,
    pub properties: EntityProperties,
    #[serde(default)]
    pub children: Vec<CreatedEntity>,
}

impl CreatedEntity {
    pub fn leaf(properties: EntityProperties) -> Self {
        Self {
            id: properties.id,
            properties,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBatch {
    pub edit_entities: Vec<EditEntry>,
    pub create_entities: Vec<CreatedEntity>,
    pub delete_entities: Vec<EntityId>,
    pub select_created: bool,
}

impl EntityBatch {
    pub fn is_empty(&self) -> bool {
        self.edit_entities.is_empty()
            && self.create_entities.is_empty()
            && self.delete_entities.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub undo: EntityBatch,
    pub redo: EntityBatch,
}

/// Linear undo/redo history of entity batches.
#[derive(Debug)]
pub struct CommandHistory {
    past: Vec<Command>,
    future: Vec<Command>,
    enabled: bool,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            enabled: true,
        }
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push_command(&mut self, undo: EntityBatch, redo: EntityBatch) {
        if !self.enabled {
            return;
        }
        self.future.clear();
        self.past.push(Command { undo, redo });
    }

    pub fn can_undo(&self) -> bool {
        self.enabled && !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.enabled && !self.future.is_empty()
    }

    /// Number of commands before the cursor.
    pub fn position(&self) -> usize {
        self.past.len()
    }

    pub fn len(&self) -> usize {
        self.past.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn undo(&mut self, mut apply: impl FnMut(&EntityBatch)) -> bool {
        if !self.can_undo() {
            tracing::warn!("Cannot undo action");
            return false;
        }
        let Some(command) = self.past.pop() else {
            return false;
        };
        apply(&command.undo);
        self.future.push(command);
        true
    }

    pub fn redo(&mut self, mut apply: impl FnMut(&EntityBatch)) -> bool {
        if !self.can_redo() {
            tracing::warn!("Cannot redo action");
            return false;
        }
        let Some(command) = self.future.pop() else {
            return false;
        };
        apply(&command.redo);
        self.past.push(command);
        true
    }
}

/// Replays batches against the scene. Entities recreated by a replay get fresh ids;
/// the remap table redirects older commands to them.
#[derive(Debug, Default)]
pub struct BatchApplier {
    remap: BTreeMap<EntityId, EntityId>,
}

impl BatchApplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, id: EntityId) -> EntityId {
        let mut current = id;
        while let Some(next) = self.remap.get(&current) {
            if *next == current {
                break;
            }
            current = *next;
        }
        current
    }

    pub fn remap_len(&self) -> usize {
        self.remap.len()
    }

    /// Creates, then deletes, then edits. Returns the ids that should become the selection.
    pub fn apply<S: SceneService + ?Sized>(&mut self, scene: &mut S, batch: &EntityBatch) -> Vec<EntityId> {
        let mut selected = Vec::new();
        let select_edits = batch.create_entities.is_empty() || !batch.select_created;

        for created in &batch.create_entities {
            let mut properties = created.properties.clone();
            properties.parent_id = properties.parent_id.map(|parent| self.resolve(parent));
            let Some(new_id) = scene.add_entity(properties) else {
                tracing::warn!("history: failed to recreate {}", created.id);
                continue;
            };
            self.remap.insert(created.id, new_id);
            self.add_children(scene, new_id, &created.children);
            if batch.select_created {
                selected.push(new_id);
            }
        }

        for id in &batch.delete_entities {
            let id = self.resolve(*id);
            scene.delete_entity(id);
            selected.retain(|selected_id| *selected_id != id);
        }

        for entry in self.ancestors_first(&*scene, &batch.edit_entities) {
            let id = self.resolve(entry.id);
            if let Some(properties) = &entry.properties {
                if !scene.edit_entity(id, &EntityEdit::restore(properties)) {
                    tracing::debug!("history: edit target {id} is gone");
                }
            }
        }
        if select_edits {
            selected.extend(batch.edit_entities.iter().map(|entry| self.resolve(entry.id)));
        }

        selected
    }

    /// Restoring a parent carries its children, so parents must be written first.
    /// Depth follows the restored parent links, falling back to the live scene.
    fn ancestors_first<'a, S: SceneService + ?Sized>(
        &self,
        scene: &S,
        entries: &'a [EditEntry],
    ) -> Vec<&'a EditEntry> {
        let restored: BTreeMap<EntityId, Option<EntityId>> = entries
            .iter()
            .filter_map(|entry| {
                let properties = entry.properties.as_ref()?;
                Some((
                    self.resolve(entry.id),
                    properties.parent_id.map(|parent| self.resolve(parent)),
                ))
            })
            .collect();
        let parent_of = |id: EntityId| match restored.get(&id) {
            Some(parent) => *parent,
            None => scene.entity_properties(id).and_then(|props| props.parent_id),
        };
        let depth = |id: EntityId| {
            let mut depth = 0usize;
            let mut current = id;
            while let Some(parent) = parent_of(current) {
                depth += 1;
                if depth >= MAX_PARENT_DEPTH {
                    break;
                }
                current = parent;
            }
            depth
        };

        let mut ordered: Vec<(usize, &EditEntry)> = entries
            .iter()
            .map(|entry| (depth(self.resolve(entry.id)), entry))
            .collect();
        ordered.sort_by_key(|(depth, _)| *depth);
        ordered.into_iter().map(|(_, entry)| entry).collect()
    }

    fn add_children<S: SceneService + ?Sized>(
        &mut self,
        scene: &mut S,
        parent: EntityId,
        children: &[CreatedEntity],
    ) {
        for child in children {
            let mut properties = child.properties.clone();
            properties.parent_id = Some(parent);
            let Some(new_id) = scene.add_entity(properties) else {
                continue;
            };
            self.remap.insert(child.id, new_id);
            self.add_children(scene, new_id, &child.children);
        }
    }
}
