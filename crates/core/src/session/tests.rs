use glam::{Quat, Vec3};
use gizmo_scene::{CameraRig, EntityId, EntityKind, EntityProperties, MemoryScene, Notification, SceneService};

use super::{EditError, EditorSession};
use crate::handles::{Axis, HandleId, SpaceMode, ToolKind};
use crate::input::{Key, KeyEvent, Modifiers, PointerEvent};
use crate::settings::EditorSettings;

fn session_with(settings: EditorSettings) -> (MemoryScene, EditorSession) {
    let mut scene = MemoryScene::new();
    let session = EditorSession::new(&mut scene, settings);
    (scene, session)
}

fn add_box(scene: &mut MemoryScene, position: Vec3) -> EntityId {
    let mut props = EntityProperties::new(EntityKind::Box, "box");
    props.position = position;
    props.dimensions = Vec3::ONE;
    scene.insert(props)
}

fn pointer_at(scene: &MemoryScene, target: Vec3) -> PointerEvent {
    let point = scene.camera.screen_point(target).expect("target on screen");
    PointerEvent::left(point.x, point.y)
}

fn drag(session: &mut EditorSession, scene: &mut MemoryScene, from: PointerEvent, to: Vec3) -> bool {
    if !session.mouse_press(scene, &from) {
        return false;
    }
    let end = pointer_at(scene, to);
    session.mouse_move(scene, &end);
    session.mouse_release(scene, &end)
}

fn position(scene: &MemoryScene, id: EntityId) -> Vec3 {
    scene.entity(id).map(|props| props.position).expect("entity")
}

fn key(c: char, control: bool, shift: bool) -> KeyEvent {
    KeyEvent {
        key: Key::Character(c),
        modifiers: Modifiers {
            control,
            shift,
            ..Modifiers::default()
        },
    }
}

#[test]
fn axis_drag_snaps_and_undoes_as_one_command() {
    let mut settings = EditorSettings::default();
    settings.grid.minor_spacing = 0.5;
    settings.grid.snap_enabled = true;
    let (mut scene, mut session) = session_with(settings);
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);

    let press = pointer_at(&scene, Vec3::new(1.0, 0.0, 0.0));
    assert!(session.mouse_press(&mut scene, &press));
    assert_eq!(session.active_tool(), Some(ToolKind::TranslateAxis(Axis::X)));
    let end = pointer_at(&scene, Vec3::new(3.3, 0.0, 0.0));
    session.mouse_move(&mut scene, &end);
    assert!(session.mouse_release(&mut scene, &end));

    assert!((position(&scene, id) - Vec3::new(2.5, 0.0, 0.0)).length() < 1.0e-3);
    assert_eq!(session.history().len(), 1);
    assert!(session.active_tool().is_none());

    assert!(session.undo(&mut scene));
    assert!(position(&scene, id).length() < 1.0e-5);
    assert!(session.redo(&mut scene));
    assert!((position(&scene, id) - Vec3::new(2.5, 0.0, 0.0)).length() < 1.0e-3);
}

#[test]
fn duplicate_without_selection_is_rejected() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    add_box(&mut scene, Vec3::ZERO);
    assert!(!session.duplicate_selected(&mut scene));
    assert_eq!(scene.entity_count(), 1);
    assert_eq!(scene.rejections(), 1);
    assert!(session.history().is_empty());
    assert!(!session.key_release(&mut scene, &key('d', true, false)));
    assert_eq!(scene.rejections(), 2);
}

#[test]
fn delete_skips_locked_members() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let a = add_box(&mut scene, Vec3::ZERO);
    let b = add_box(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    let mut locked = EntityProperties::new(EntityKind::Box, "locked");
    locked.locked = true;
    let c = scene.insert(locked);
    session.select(&mut scene, &[a, b, c]);

    assert!(session.delete_selected(&mut scene));
    assert!(scene.entity(a).is_none());
    assert!(scene.entity(b).is_none());
    assert!(scene.entity(c).is_some());
    assert!(session.selection().is_empty());
    assert_eq!(session.history().len(), 1);

    assert!(session.undo(&mut scene));
    assert_eq!(scene.entity_count(), 3);
    assert_eq!(session.selection().len(), 2);
}

#[test]
fn ring_drag_snaps_while_control_held() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    scene.camera = CameraRig::looking_at(Vec3::new(0.0, 10.0, 3.0), Vec3::ZERO);
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);
    session.key_press(
        &mut scene,
        &KeyEvent {
            key: Key::Control,
            modifiers: Modifiers::default(),
        },
    );

    let zero = Vec3::new(0.53, 0.0, 0.53);
    let press = pointer_at(&scene, zero);
    let target = Quat::from_rotation_y(100f32.to_radians()) * zero;
    assert!(drag(&mut session, &mut scene, press, target));

    let rotation = scene.entity(id).map(|props| props.rotation).expect("entity");
    assert!(rotation.angle_between(Quat::from_rotation_y(90f32.to_radians())) < 1.0e-2);
    assert!(!session.handles().is_visible(&scene, HandleId::RotationDegreesDisplay));
    assert_eq!(session.history().len(), 1);
}

#[test]
fn control_drag_moves_a_copy() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);

    let press = pointer_at(&scene, Vec3::new(1.0, 0.0, 0.0)).with_modifiers(Modifiers {
        control: true,
        ..Modifiers::default()
    });
    assert!(drag(&mut session, &mut scene, press, Vec3::new(3.0, 0.0, 0.0)));

    assert_eq!(scene.entity_count(), 2);
    assert!(position(&scene, id).length() < 1.0e-5);
    let copy = session.selection().ids()[0];
    assert_ne!(copy, id);
    assert!((position(&scene, copy) - Vec3::new(2.0, 0.0, 0.0)).length() < 1.0e-3);
    assert_eq!(scene.entity(copy).map(|props| props.name.as_str()), Some("box (2)"));
    assert_eq!(session.history().len(), 1);

    assert!(session.undo(&mut scene));
    assert_eq!(scene.entity_count(), 1);
    assert!(session.redo(&mut scene));
    assert_eq!(scene.entity_count(), 2);
    let copy = session.selection().ids()[0];
    assert!((position(&scene, copy) - Vec3::new(2.0, 0.0, 0.0)).length() < 1.0e-3);
}

#[test]
fn locked_selection_refuses_gestures() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let mut props = EntityProperties::new(EntityKind::Box, "locked");
    props.dimensions = Vec3::ONE;
    props.locked = true;
    let id = scene.insert(props);
    session.select(&mut scene, &[id]);

    let press = pointer_at(&scene, Vec3::new(1.0, 0.0, 0.0));
    assert!(!session.mouse_press(&mut scene, &press));
    assert_eq!(scene.rejections(), 1);
    let expected = EditError::SelectionLocked.to_string();
    assert!(scene.messages().any(|message| message == expected));
    assert!(session.history().is_empty());
}

#[test]
fn paste_places_copies_in_front_of_the_camera() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let parent = add_box(&mut scene, Vec3::ZERO);
    let mut child = EntityProperties::new(EntityKind::Box, "child");
    child.position = Vec3::new(0.0, 1.0, 0.0);
    child.dimensions = Vec3::ONE;
    child.parent_id = Some(parent);
    scene.insert(child);
    session.select(&mut scene, &[parent]);

    assert!(session.copy(&mut scene));
    assert_eq!(session.clipboard().len(), 2);
    assert_eq!(session.clipboard().entities()[0].id, parent);
    assert!(session.paste(&mut scene));
    assert_eq!(scene.entity_count(), 4);

    let pasted = session.selection().ids().to_vec();
    assert_eq!(pasted.len(), 2);
    let root = scene.entity(pasted[0]).cloned().expect("pasted root");
    let leaf = scene.entity(pasted[1]).cloned().expect("pasted child");
    assert!((root.position - Vec3::new(0.0, -0.5, 6.0)).length() < 1.0e-4);
    assert!((leaf.position - Vec3::new(0.0, 0.5, 6.0)).length() < 1.0e-4);
    assert_eq!(leaf.parent_id, Some(root.id));

    assert!(session.undo(&mut scene));
    assert_eq!(scene.entity_count(), 2);
    assert_eq!(session.selection().ids(), &[parent]);
}

#[test]
fn paste_with_empty_clipboard_is_rejected() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    assert!(!session.paste(&mut scene));
    assert_eq!(scene.rejections(), 1);
}

#[test]
fn parenting_is_undoable() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let a = add_box(&mut scene, Vec3::ZERO);
    let b = add_box(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    session.select(&mut scene, &[a, b]);

    assert!(session.key_release(&mut scene, &key('p', true, false)));
    assert_eq!(scene.entity(a).and_then(|props| props.parent_id), Some(b));
    assert!(scene.messages().any(|message| message == "Entities parented"));

    assert!(!session.parent_selected(&mut scene));
    let already = EditError::AlreadyParented.to_string();
    assert!(scene.messages().any(|message| message == already));

    assert!(session.undo(&mut scene));
    assert_eq!(scene.entity(a).and_then(|props| props.parent_id), None);
}

#[test]
fn unparent_reports_missing_parents() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let a = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[a]);
    assert!(!session.unparent_selected(&mut scene));
    assert!(scene
        .messages()
        .any(|message| message == "Selected Entity does not have a parent"));

    let b = add_box(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    scene.edit_entity(a, &gizmo_scene::EntityEdit::parent(Some(b)));
    assert!(session.unparent_selected(&mut scene));
    assert_eq!(scene.entity(a).and_then(|props| props.parent_id), None);
    assert!(scene.messages().any(|message| message == "Entity unparented"));
}

#[test]
fn quarter_turn_about_local_axis() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);
    assert!(session.key_release(&mut scene, &key('8', false, false)));
    let rotation = scene.entity(id).map(|props| props.rotation).expect("entity");
    assert!(rotation.angle_between(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)) < 1.0e-4);
    assert!(scene
        .notifications()
        .iter()
        .any(|note| matches!(note, Notification::Action)));
    assert_eq!(session.history().len(), 1);
}

#[test]
fn undo_follows_recreated_ids() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);
    assert!(session.move_selection_to(&mut scene, Vec3::new(3.0, 0.0, 0.0)));
    assert!(session.delete_selected(&mut scene));

    assert!(session.undo(&mut scene));
    let recreated = session.selection().ids()[0];
    assert_ne!(recreated, id);
    assert!((position(&scene, recreated) - Vec3::new(3.0, 0.0, 0.0)).length() < 1.0e-5);

    assert!(session.key_release(&mut scene, &key('z', true, false)));
    assert!(position(&scene, recreated).length() < 1.0e-5);
    assert!(session.key_release(&mut scene, &key('y', true, false)));
    assert!((position(&scene, recreated) - Vec3::new(3.0, 0.0, 0.0)).length() < 1.0e-5);
}

#[test]
fn model_becomes_visible_once_loaded() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    scene.set_load_delay(0.35);
    let mut model = EntityProperties::new(EntityKind::Model, "model");
    model.natural_dimensions = Some(Vec3::new(1.0, 3.0, 1.0));
    let id = session.create_entity(&mut scene, model, Vec3::Z).expect("created");

    assert_eq!(scene.entity(id).map(|props| props.visible), Some(false));
    assert_eq!(session.pending_loads(), 1);
    assert_eq!(session.selection().ids(), &[id]);
    assert_eq!(session.history().len(), 1);

    for _ in 0..3 {
        scene.advance(0.1);
        session.update(&mut scene, 0.1);
    }
    assert_eq!(scene.entity(id).map(|props| props.visible), Some(false));

    scene.advance(0.1);
    session.update(&mut scene, 0.1);
    let props = scene.entity(id).cloned().expect("model");
    assert!(props.visible);
    assert_eq!(props.dimensions, Vec3::new(1.0, 3.0, 1.0));

    for _ in 0..25 {
        session.update(&mut scene, 0.1);
    }
    assert_eq!(session.pending_loads(), 0);
}

#[test]
fn model_load_gives_up_with_fallback_dimensions() {
    let mut settings = EditorSettings::default();
    settings.loading.max_loaded_checks = 3;
    let (mut scene, mut session) = session_with(settings);
    scene.set_load_delay(1000.0);
    let model = EntityProperties::new(EntityKind::Model, "model");
    let id = session.create_entity(&mut scene, model, Vec3::Z).expect("created");

    for _ in 0..3 {
        session.update(&mut scene, 0.1);
    }
    let props = scene.entity(id).cloned().expect("model");
    assert!(props.visible);
    assert_eq!(props.dimensions, Vec3::splat(0.1));
}

#[test]
fn created_box_rests_behind_the_spawn_point() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let mut props = EntityProperties::new(EntityKind::Box, "box");
    props.dimensions = Vec3::splat(2.0);
    let id = session.create_entity(&mut scene, props, Vec3::Z).expect("created");
    assert!((position(&scene, id) - Vec3::new(0.0, 0.0, 7.0)).length() < 1.0e-4);
    assert_eq!(session.pending_loads(), 0);

    assert!(session.undo(&mut scene));
    assert!(scene.entity(id).is_none());
}

#[test]
fn create_outside_the_world_is_rejected() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    scene.camera.position = Vec3::new(0.0, 0.0, 20000.0);
    let props = EntityProperties::new(EntityKind::Light, "light");
    assert!(session.create_entity(&mut scene, props, Vec3::Z).is_none());
    let expected = EditError::OutOfBounds(EntityKind::Light).to_string();
    assert_eq!(expected, "Can't create Light: Light would be out of bounds.");
    assert!(scene.messages().any(|message| message == expected));
    assert_eq!(scene.entity_count(), 0);
}

#[test]
fn space_mode_toggle_is_refused_for_multi_selection() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let a = add_box(&mut scene, Vec3::ZERO);
    let b = add_box(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    session.select(&mut scene, &[a]);
    assert!(session.key_release(&mut scene, &key('t', false, false)));
    assert_eq!(session.space_mode(), SpaceMode::World);
    assert!(session.toggle_space_mode(&mut scene));
    assert_eq!(session.space_mode(), SpaceMode::Local);

    session.select(&mut scene, &[a, b]);
    assert_eq!(session.space_mode(), SpaceMode::World);
    assert!(!session.toggle_space_mode(&mut scene));

    session.select(&mut scene, &[b]);
    assert_eq!(session.space_mode(), SpaceMode::Local);
}

#[test]
fn deactivating_clears_selection_and_hides_handles() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);
    assert!(session.handles().is_visible(&scene, HandleId::SelectionBox));

    session.set_active(&mut scene, false);
    assert!(session.selection().is_empty());
    assert!(!session.handles().is_visible(&scene, HandleId::SelectionBox));
    let press = pointer_at(&scene, Vec3::ZERO);
    assert!(!session.mouse_press(&mut scene, &press));
}

#[test]
fn shutdown_releases_proxies_and_listeners() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    assert!(scene.proxy_count() > 0);
    assert_eq!(session.selection().listener_count(), 1);
    session.shutdown(&mut scene);
    assert_eq!(scene.proxy_count(), 0);
    assert_eq!(session.selection().listener_count(), 0);
}

fn snapshot(scene: &MemoryScene) -> Vec<EntityProperties> {
    let mut entities: Vec<EntityProperties> = scene
        .entities()
        .cloned()
        .map(|mut props| {
            props.id = EntityId::default();
            props
        })
        .collect();
    entities.sort_by(|a, b| a.name.cmp(&b.name).then(a.position.x.total_cmp(&b.position.x)));
    entities
}

#[test]
fn inactive_session_neither_replays_nor_records() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let id = add_box(&mut scene, Vec3::ZERO);
    session.select(&mut scene, &[id]);
    assert!(session.move_selection_to(&mut scene, Vec3::new(3.0, 0.0, 0.0)));

    session.set_active(&mut scene, false);
    assert!(!session.history().is_enabled());
    assert!(!session.undo(&mut scene));
    assert!((position(&scene, id) - Vec3::new(3.0, 0.0, 0.0)).length() < 1.0e-5);
    session.selection_mut().set_selections(&scene, &[id], None);
    assert!(!session.move_selection_to(&mut scene, Vec3::new(6.0, 0.0, 0.0)));
    assert!(!session.delete_selected(&mut scene));
    assert_eq!(scene.entity_count(), 1);
    assert_eq!(session.history().len(), 1);

    session.set_active(&mut scene, true);
    assert!(session.history().is_enabled());
    assert!(session.undo(&mut scene));
    assert!(position(&scene, id).length() < 1.0e-5);
}

#[test]
fn child_listed_before_parent_undoes_cleanly() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let parent = add_box(&mut scene, Vec3::ZERO);
    let mut cup = EntityProperties::new(EntityKind::Box, "cup");
    cup.position = Vec3::new(0.0, 2.0, 0.0);
    cup.dimensions = Vec3::ONE;
    cup.parent_id = Some(parent);
    let child = scene.insert(cup);
    session.select(&mut scene, &[child, parent]);

    assert!(session.move_selection_to(&mut scene, Vec3::new(5.0, 1.0, 0.0)));
    assert!((position(&scene, parent) - Vec3::new(5.0, 0.0, 0.0)).length() < 1.0e-5);
    assert!((position(&scene, child) - Vec3::new(5.0, 2.0, 0.0)).length() < 1.0e-5);

    assert!(session.undo(&mut scene));
    assert!(position(&scene, parent).length() < 1.0e-5);
    assert!((position(&scene, child) - Vec3::new(0.0, 2.0, 0.0)).length() < 1.0e-5);
    assert!(session.redo(&mut scene));
    assert!((position(&scene, child) - Vec3::new(5.0, 2.0, 0.0)).length() < 1.0e-5);
}

#[test]
fn several_gestures_undo_and_redo_to_identical_scenes() {
    let (mut scene, mut session) = session_with(EditorSettings::default());
    let solo = add_box(&mut scene, Vec3::ZERO);
    let mut table = EntityProperties::new(EntityKind::Box, "table");
    table.position = Vec3::new(4.0, 0.0, -5.0);
    table.dimensions = Vec3::ONE;
    let parent = scene.insert(table);
    let mut cup = EntityProperties::new(EntityKind::Box, "cup");
    cup.position = Vec3::new(4.0, 2.0, -5.0);
    cup.dimensions = Vec3::ONE;
    cup.parent_id = Some(parent);
    let child = scene.insert(cup);

    let mut states = vec![snapshot(&scene)];

    session.select(&mut scene, &[solo]);
    let press = pointer_at(&scene, Vec3::new(1.0, 0.0, 0.0)).with_modifiers(Modifiers {
        control: true,
        ..Modifiers::default()
    });
    assert!(drag(&mut session, &mut scene, press, Vec3::new(3.0, 0.0, 0.0)));
    assert_eq!(scene.entity_count(), 4);
    states.push(snapshot(&scene));

    session.select(&mut scene, &[child, parent]);
    assert!(session.move_selection_to(&mut scene, Vec3::new(-2.0, 1.0, -6.0)));
    states.push(snapshot(&scene));

    assert!(session.rotate_selection_90(&mut scene, Axis::Y));
    states.push(snapshot(&scene));
    assert_eq!(session.history().len(), 3);

    for expected in states.iter().rev().skip(1) {
        assert!(session.undo(&mut scene));
        assert_eq!(&snapshot(&scene), expected);
    }
    assert!(!session.history().can_undo());
    for expected in states.iter().skip(1) {
        assert!(session.redo(&mut scene));
        assert_eq!(&snapshot(&scene), expected);
    }
    assert!(!session.history().can_redo());
}
