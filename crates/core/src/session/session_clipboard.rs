use std::collections::BTreeMap;

use glam::Vec3;
use gizmo_scene::{Aabb, EditorHost, EntityId, EntityProperties, SceneService};

use super::session_ops::collect_children;
use super::{reject, EditError, EditorSession};
use crate::history::{CreatedEntity, EditEntry, EntityBatch};

/// Copied entities, parents before children, with the bounds of the whole copy.
#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    entities: Vec<EntityProperties>,
    position: Vec3,
    dimensions: Vec3,
}

impl Clipboard {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[EntityProperties] {
        &self.entities
    }

    /// Center of the union of every copied bounding box.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn dimensions(&self) -> Vec3 {
        self.dimensions
    }

    fn capture<S: SceneService + ?Sized>(scene: &S, ids: &[EntityId]) -> Self {
        let mut remaining = BTreeMap::new();
        for id in ids {
            let Some(properties) = scene.entity_properties(*id) else {
                continue;
            };
            let mut stack = collect_children(scene, *id, properties.host);
            remaining.insert(*id, properties);
            while let Some(child) = stack.pop() {
                stack.extend(child.children);
                remaining.entry(child.id).or_insert(child.properties);
            }
        }

        let mut entities = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let ready: Vec<EntityId> = remaining
                .values()
                .filter(|props| props.parent_id.map_or(true, |parent| !remaining.contains_key(&parent)))
                .map(|props| props.id)
                .collect();
            if ready.is_empty() {
                tracing::error!("clipboard: parent cycle among {} entities", remaining.len());
                entities.extend(std::mem::take(&mut remaining).into_values());
                break;
            }
            for id in ready {
                if let Some(properties) = remaining.remove(&id) {
                    entities.push(properties);
                }
            }
        }

        let bounds = entities
            .iter()
            .map(EntityProperties::bounding_box)
            .reduce(Aabb::union);
        let (position, dimensions) = bounds.map_or((Vec3::ZERO, Vec3::ZERO), |bounds| {
            (bounds.center(), bounds.dimensions())
        });
        Self {
            entities,
            position,
            dimensions,
        }
    }
}

impl EditorSession {
    pub fn copy<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("copy") {
            return false;
        }
        if !self.selection.has_selection() {
            reject(host, EditError::NothingSelected);
            return false;
        }
        self.clipboard = Clipboard::capture(&*host, self.selection.ids());
        tracing::debug!("session: copied {} entities", self.clipboard.len());
        true
    }

    pub fn cut<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        self.copy(host) && self.delete_selected(host)
    }

    /// Recreates the clipboard in front of the camera and selects the copies.
    pub fn paste<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("paste") {
            return false;
        }
        if self.clipboard.is_empty() {
            reject(host, EditError::EmptyClipboard);
            return false;
        }
        let extra = self.clipboard.dimensions.max_element();
        let Some(target) = self.position_to_create(&*host, extra) else {
            let kind = self.clipboard.entities[0].kind;
            reject(host, EditError::OutOfBounds(kind));
            return false;
        };
        let delta = target - self.clipboard.position;
        let previous = self.selection.ids().to_vec();

        let mut copies = BTreeMap::new();
        let mut created = Vec::new();
        for original in &self.clipboard.entities {
            let mut properties = original.clone();
            properties.position += delta;
            properties.parent_id = properties.parent_id.and_then(|parent| copies.get(&parent).copied());
            let Some(id) = host.add_entity(properties.clone()) else {
                tracing::warn!("session: host refused pasted {}", original.id);
                continue;
            };
            copies.insert(original.id, id);
            properties.id = id;
            created.push(CreatedEntity::leaf(properties));
        }
        if created.is_empty() {
            return false;
        }

        let ids: Vec<EntityId> = created.iter().map(|entity| entity.id).collect();
        self.selection.set_selections(&*host, &ids, None);
        let undo = EntityBatch {
            delete_entities: ids,
            edit_entities: previous
                .into_iter()
                .map(|id| EditEntry { id, properties: None })
                .collect(),
            ..EntityBatch::default()
        };
        let redo = EntityBatch {
            create_entities: created,
            select_created: true,
            ..EntityBatch::default()
        };
        self.history.push_command(undo, redo);
        tracing::debug!("session: pasted {} entities", copies.len());
        self.refresh(host);
        true
    }
}
