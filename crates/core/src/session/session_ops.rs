use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use gizmo_scene::{EditorHost, EntityEdit, EntityHost, EntityId, SceneService};

use super::{reject, EditError, EditorSession};
use crate::handles::{Axis, SpaceMode};
use crate::history::CreatedEntity;
use crate::selection::is_descendant_of;
use crate::tools::{edit_unparented, update_selections_rotation};

/// "name" becomes "name (2)"; "name (n)" becomes "name (n+1)".
pub(super) fn duplicate_name(name: &str) -> String {
    let numbered = name
        .strip_suffix(')')
        .and_then(|stem| stem.rsplit_once(" ("))
        .and_then(|(base, number)| number.parse::<u32>().ok().map(|n| (base, n)));
    match numbered {
        Some((base, n)) => format!("{base} ({})", n.saturating_add(1)),
        None => format!("{name} (2)"),
    }
}

/// Descendant trees of `id` hosted the same way as their root.
pub(super) fn collect_children<S: SceneService + ?Sized>(
    scene: &S,
    id: EntityId,
    host: EntityHost,
) -> Vec<CreatedEntity> {
    scene
        .children(id)
        .into_iter()
        .filter_map(|child| {
            let properties = scene.entity_properties(child)?;
            if properties.host != host {
                return None;
            }
            Some(CreatedEntity {
                id: child,
                children: collect_children(scene, child, host),
                properties,
            })
        })
        .collect()
}

/// Same as [`collect_children`], flattened parents first into `out`.
pub(super) fn append_descendants<S: SceneService + ?Sized>(
    scene: &S,
    id: EntityId,
    host: EntityHost,
    out: &mut Vec<EntityId>,
) {
    for child in scene.children(id) {
        let same_host = scene
            .entity_properties(child)
            .is_some_and(|props| props.host == host);
        if !same_host || out.contains(&child) {
            continue;
        }
        out.push(child);
        append_descendants(scene, child, host, out);
    }
}

/// Drops members that descend from another member.
fn top_level_members<S: SceneService + ?Sized>(scene: &S, ids: &[EntityId]) -> Vec<EntityId> {
    ids.iter()
        .copied()
        .filter(|id| {
            !ids
                .iter()
                .any(|other| other != id && is_descendant_of(scene, *id, *other))
        })
        .collect()
}

fn delete_tree<S: SceneService + ?Sized>(scene: &mut S, entities: &[CreatedEntity]) {
    for entity in entities {
        delete_tree(scene, &entity.children);
        scene.delete_entity(entity.id);
    }
}

impl EditorSession {
    /// Deletes the unlocked selected entities with their descendants, as one command.
    pub fn delete_selected<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("delete") {
            return false;
        }
        if !self.selection.has_selection() {
            reject(host, EditError::NothingSelected);
            return false;
        }
        self.selection.save_properties(&*host);
        let mut deleted = Vec::new();
        for id in top_level_members(&*host, self.selection.ids()) {
            let Some(properties) = host.entity_properties(id) else {
                continue;
            };
            if properties.locked {
                tracing::debug!("session: {id} is locked, keeping it");
                continue;
            }
            let children = collect_children(&*host, id, properties.host);
            delete_tree(host, &children);
            host.delete_entity(id);
            deleted.push(CreatedEntity {
                id,
                properties,
                children,
            });
        }
        if deleted.is_empty() {
            reject(host, EditError::NothingSelectedOrLocked);
            return false;
        }
        tracing::debug!("session: deleted {} entities", deleted.len());
        self.selection.clear(&*host, None);
        self.push_command_for_selections(&*host, Vec::new(), deleted, false);
        self.refresh(host);
        true
    }

    /// Clones the selection and its same-host descendants. Locked entities block the whole copy.
    fn duplicate_entities<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> Option<Vec<CreatedEntity>> {
        self.selection.save_properties(&*host);
        let mut originals: Vec<EntityId> = Vec::new();
        for id in self.selection.ids() {
            if !originals.contains(id) {
                originals.push(*id);
            }
            let entity_host = self.selection.saved(*id).map(|props| props.host).unwrap_or_default();
            append_descendants(&*host, *id, entity_host, &mut originals);
        }
        let locked = originals
            .iter()
            .any(|id| host.entity_properties(*id).is_some_and(|props| props.locked));
        if locked {
            reject(host, EditError::FamilyLocked);
            return None;
        }

        let mut clones = BTreeMap::new();
        let mut created = Vec::new();
        for original in &originals {
            let properties = match self.selection.saved(*original) {
                Some(saved) => Some(saved.clone()),
                None => host.entity_properties(*original),
            };
            let Some(mut properties) = properties else {
                continue;
            };
            properties.name = duplicate_name(&properties.name);
            properties.velocity = Vec3::ZERO;
            properties.angular_velocity = Vec3::ZERO;
            let Some(id) = host.add_entity(properties.clone()) else {
                tracing::warn!("session: host refused a copy of {original}");
                continue;
            };
            properties.id = id;
            clones.insert(*original, id);
            created.push(properties);
        }
        for properties in &mut created {
            let Some(parent) = properties.parent_id.and_then(|old| clones.get(&old).copied()) else {
                continue;
            };
            host.edit_entity(properties.id, &EntityEdit::parent(Some(parent)));
            properties.parent_id = Some(parent);
        }
        host.confirmation();
        tracing::debug!("session: duplicated {} entities", created.len());
        Some(created.into_iter().map(CreatedEntity::leaf).collect())
    }

    /// Duplicates and selects the clones.
    pub(super) fn duplicate_into_selection<H: EditorHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Option<Vec<CreatedEntity>> {
        let created = self.duplicate_entities(host)?;
        let ids: Vec<EntityId> = created.iter().map(|entity| entity.id).collect();
        self.selection.set_selections(&*host, &ids, None);
        Some(created)
    }

    pub fn duplicate_selected<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("duplicate") {
            return false;
        }
        if !self.selection.has_selection() {
            reject(host, EditError::NothingSelected);
            return false;
        }
        let Some(created) = self.duplicate_into_selection(host) else {
            return false;
        };
        if created.is_empty() {
            return false;
        }
        self.selection.save_properties(&*host);
        self.push_command_for_selections(&*host, created, Vec::new(), false);
        self.refresh(host);
        true
    }

    fn require_unlocked<H: EditorHost + ?Sized>(&self, host: &mut H, error: EditError) -> bool {
        if self.selection.has_selection() && self.selection.has_unlocked_selection(&*host) {
            return true;
        }
        reject(host, error);
        false
    }

    /// Parents every selected entity to the last one selected.
    pub fn parent_selected<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("parent") {
            return false;
        }
        if !self.require_unlocked(host, EditError::NothingSelectedOrLocked) {
            return false;
        }
        let ids = self.selection.ids().to_vec();
        let Some((&last, rest)) = ids.split_last().filter(|(_, rest)| !rest.is_empty()) else {
            reject(host, EditError::ParentNeedsMultiple);
            return false;
        };
        self.selection.save_properties(&*host);
        let mut changed = false;
        for id in rest {
            if is_descendant_of(&*host, last, *id) {
                tracing::warn!("session: {last} descends from {id}, not parenting");
                continue;
            }
            let current = host.entity_properties(*id).and_then(|props| props.parent_id);
            if current != Some(last) {
                changed = true;
                host.edit_entity(*id, &EntityEdit::parent(Some(last)));
            }
        }
        if !changed {
            reject(host, EditError::AlreadyParented);
            return false;
        }
        host.confirmation();
        host.notify("Entities parented");
        self.push_command_for_selections(&*host, Vec::new(), Vec::new(), false);
        self.selection.update(&*host, false, None);
        self.refresh(host);
        true
    }

    pub fn unparent_selected<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("unparent") {
            return false;
        }
        if !self.require_unlocked(host, EditError::NothingSelectedOrLocked) {
            return false;
        }
        let ids = self.selection.ids().to_vec();
        if ids.is_empty() {
            reject(host, EditError::UnparentNeedsSelection);
            return false;
        }
        self.selection.save_properties(&*host);
        let mut changed = false;
        for id in &ids {
            if host.entity_properties(*id).is_some_and(|props| props.parent_id.is_some()) {
                changed = true;
                host.edit_entity(*id, &EntityEdit::parent(None));
            }
        }
        let multiple = ids.len() > 1;
        if !changed {
            reject(host, EditError::NoParent { multiple });
            return false;
        }
        host.confirmation();
        host.notify(if multiple {
            "Entities unparented"
        } else {
            "Entity unparented"
        });
        self.push_command_for_selections(&*host, Vec::new(), Vec::new(), false);
        self.selection.update(&*host, false, None);
        self.refresh(host);
        true
    }

    /// Quarter turn about a selection axis through the selection center.
    pub fn rotate_selection_90<H: EditorHost + ?Sized>(&mut self, host: &mut H, axis: Axis) -> bool {
        if !self.ready("rotate") {
            return false;
        }
        if !self.require_unlocked(host, EditError::SelectionLocked) {
            return false;
        }
        let Some(world) = self.selection.world_transform() else {
            return false;
        };
        self.sync_space_mode();
        self.selection.save_properties(&*host);
        let current = match (self.space.mode(), self.selection.local_transform()) {
            (SpaceMode::Local, Some(local)) if self.selection.len() == 1 => local.rotation,
            _ => world.rotation,
        };
        let direction = match axis {
            Axis::X => current * Vec3::X,
            Axis::Y => current * Vec3::Y,
            Axis::Z => current * Vec3::NEG_Z,
        };
        let change = Quat::from_axis_angle(direction.normalize_or_zero(), FRAC_PI_2);
        update_selections_rotation(host, &self.selection, change, world.position);
        self.selection.update(&*host, false, None);
        self.push_command_for_selections(&*host, Vec::new(), Vec::new(), false);
        host.action();
        self.refresh(host);
        true
    }

    /// Moves the selection so its bounding box center lands on `target`.
    pub fn move_selection_to<H: EditorHost + ?Sized>(&mut self, host: &mut H, target: Vec3) -> bool {
        if !self.ready("move") {
            return false;
        }
        if !self.require_unlocked(host, EditError::NothingSelectedOrLocked) {
            return false;
        }
        let Some(world) = self.selection.world_transform() else {
            return false;
        };
        self.selection.save_properties(&*host);
        let offset = target - world.position;
        edit_unparented(host, &self.selection, |saved| EntityEdit::position(saved.position + offset));
        self.selection.update(&*host, false, None);
        self.push_command_for_selections(&*host, Vec::new(), Vec::new(), false);
        self.refresh(host);
        true
    }

    /// Sets the rotation of a single entity, or turns a multi-selection about its center.
    pub fn rotate_selection<H: EditorHost + ?Sized>(&mut self, host: &mut H, rotation: Quat) -> bool {
        if !self.ready("rotate") {
            return false;
        }
        if !self.require_unlocked(host, EditError::NothingSelectedOrLocked) {
            return false;
        }
        let Some(world) = self.selection.world_transform() else {
            return false;
        };
        self.selection.save_properties(&*host);
        match self.selection.ids() {
            [only] => {
                host.edit_entity(*only, &EntityEdit::rotation(rotation.normalize()));
            }
            _ => update_selections_rotation(host, &self.selection, rotation.normalize(), world.position),
        }
        self.selection.update(&*host, false, None);
        self.push_command_for_selections(&*host, Vec::new(), Vec::new(), false);
        self.refresh(host);
        true
    }

    /// Flips between local and world handles. Refused silently for multi-selections in world mode.
    pub fn toggle_space_mode<H: EditorHost + ?Sized>(&mut self, host: &mut H) -> bool {
        if !self.ready("space toggle") {
            return false;
        }
        self.sync_space_mode();
        let toggled = self.space.toggle(self.selection.len());
        if toggled {
            tracing::debug!("session: space mode now {:?}", self.space.mode());
            self.refresh(host);
        }
        toggled
    }
}
