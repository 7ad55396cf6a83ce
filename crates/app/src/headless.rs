use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use glam::{Quat, Vec3};
use gizmo_core::{Axis, EditorSession, EditorSettings, Key, KeyEvent, Modifiers, PointerEvent};
use gizmo_scene::{CameraRig, EntityId, EntityKind, EntityProperties, MemoryScene};
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use crate::logging::parse_level;

#[derive(Debug, Deserialize)]
struct Script {
    #[serde(default)]
    camera: Option<ScriptCamera>,
    #[serde(default)]
    hmd_active: bool,
    #[serde(default)]
    mac: bool,
    #[serde(default)]
    load_delay: f32,
    #[serde(default)]
    entities: Vec<ScriptEntity>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct ScriptCamera {
    position: Vec3,
    #[serde(default)]
    target: Vec3,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptEntity {
    name: String,
    #[serde(default)]
    kind: EntityKind,
    #[serde(default)]
    position: Vec3,
    #[serde(default = "default_dimensions")]
    dimensions: Vec3,
    /// Euler angles in degrees, applied yaw (Y), pitch (X), roll (Z).
    #[serde(default)]
    rotation: Vec3,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    locked: bool,
    #[serde(default)]
    natural_dimensions: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Target {
    Screen([f32; 2]),
    World(Vec3),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Press {
        target: Target,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Move {
        target: Target,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Release {
        target: Target,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Key {
        key: Key,
        #[serde(default)]
        modifiers: Modifiers,
    },
    Undo,
    Redo,
    Delete,
    Duplicate,
    Copy,
    Cut,
    Paste,
    Parent,
    Unparent,
    Rotate90 {
        axis: Axis,
    },
    Select {
        names: Vec<String>,
    },
    Create {
        entity: ScriptEntity,
        #[serde(default = "default_create_direction")]
        direction: Vec3,
    },
    Tick {
        seconds: f32,
        #[serde(default = "default_tick_count")]
        count: u32,
    },
}

#[derive(Debug, Serialize)]
struct Report {
    entities: Vec<EntityRow>,
    selection: Vec<String>,
    history: HistoryRow,
    rejections: usize,
    messages: Vec<String>,
}

#[derive(Debug, Serialize)]
struct EntityRow {
    id: EntityId,
    name: String,
    kind: EntityKind,
    position: Vec3,
    rotation_degrees: Vec3,
    dimensions: Vec3,
    parent: Option<String>,
    locked: bool,
    visible: bool,
}

#[derive(Debug, Serialize)]
struct HistoryRow {
    len: usize,
    position: usize,
    can_undo: bool,
    can_redo: bool,
}

pub(crate) struct ReplayArgs {
    script_path: Option<PathBuf>,
    settings_path: Option<PathBuf>,
    pub(crate) log_level: LevelFilter,
    print: bool,
}

pub(crate) fn parse_args(args: &[String]) -> Result<ReplayArgs, String> {
    let mut script_path = None;
    let mut settings_path = None;
    let mut log_level = LevelFilter::INFO;
    let mut print = false;
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--script" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--script requires a path".to_string())?;
                script_path = Some(PathBuf::from(value));
            }
            "--settings" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--settings requires a path".to_string())?;
                settings_path = Some(PathBuf::from(value));
            }
            "--log-level" => {
                let value = iter
                    .next()
                    .ok_or_else(|| "--log-level requires a level".to_string())?;
                log_level = parse_level(value)?;
            }
            "--print" => {
                print = true;
            }
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }

    Ok(ReplayArgs {
        script_path,
        settings_path,
        log_level,
        print,
    })
}

pub(crate) fn print_help() {
    println!(
        "Usage: gizmo --script <path> [options]\n  --settings <path>\n  --log-level <error|warn|info|debug|trace>\n  --print"
    );
}

pub(crate) fn run(args: &ReplayArgs) -> Result<(), String> {
    let settings = match &args.settings_path {
        Some(path) => EditorSettings::load(path).map_err(|err| err.to_string())?,
        None => EditorSettings::default(),
    };
    let script_path = args
        .script_path
        .as_deref()
        .ok_or_else(|| "--script is required".to_string())?;
    let script = load_script(script_path)?;

    let report = replay(&script, settings)?;
    if args.print {
        let json = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
        println!("{json}");
    }
    tracing::info!("replay: completed {} steps", script.steps.len());
    Ok(())
}

fn load_script(path: &Path) -> Result<Script, String> {
    let data = std::fs::read(path).map_err(|err| format!("{}: {err}", path.display()))?;
    serde_json::from_slice(&data).map_err(|err| format!("{}: {err}", path.display()))
}

fn replay(script: &Script, settings: EditorSettings) -> Result<Report, String> {
    let mut scene = MemoryScene::new();
    if let Some(camera) = &script.camera {
        scene.camera = CameraRig::looking_at(camera.position, camera.target);
    }
    scene.set_hmd_active(script.hmd_active);
    scene.set_mac(script.mac);
    scene.set_load_delay(script.load_delay);

    let mut names = HashMap::new();
    for entity in &script.entities {
        let parent = resolve_parent(&names, entity)?;
        let id = scene.insert(entity_properties(entity, parent));
        names.insert(entity.name.clone(), id);
    }

    let mut session = EditorSession::new(&mut scene, settings);
    for (index, step) in script.steps.iter().enumerate() {
        let handled = apply_step(&mut session, &mut scene, step)
            .map_err(|err| format!("step {index}: {err}"))?;
        tracing::debug!("replay: step {index} {step:?} -> {handled}");
    }

    let report = build_report(&scene, &session);
    session.shutdown(&mut scene);
    Ok(report)
}

fn resolve_parent(names: &HashMap<String, EntityId>, entity: &ScriptEntity) -> Result<Option<EntityId>, String> {
    let Some(parent) = &entity.parent else {
        return Ok(None);
    };
    names
        .get(parent)
        .copied()
        .map(Some)
        .ok_or_else(|| format!("{} names parent {parent} before it is defined", entity.name))
}

fn entity_properties(entity: &ScriptEntity, parent_id: Option<EntityId>) -> EntityProperties {
    let mut properties = EntityProperties::new(entity.kind, entity.name.clone());
    properties.position = entity.position;
    properties.dimensions = entity.dimensions;
    properties.rotation = euler_degrees(entity.rotation);
    properties.parent_id = parent_id;
    properties.locked = entity.locked;
    properties.natural_dimensions = entity.natural_dimensions;
    properties
}

fn euler_degrees(degrees: Vec3) -> Quat {
    Quat::from_euler(
        glam::EulerRot::YXZ,
        degrees.y.to_radians(),
        degrees.x.to_radians(),
        degrees.z.to_radians(),
    )
}

fn pointer(scene: &MemoryScene, target: Target, modifiers: Modifiers) -> Result<PointerEvent, String> {
    let point = match target {
        Target::Screen([x, y]) => glam::Vec2::new(x, y),
        Target::World(position) => scene
            .camera
            .screen_point(position)
            .ok_or_else(|| format!("{position} is behind the camera"))?,
    };
    Ok(PointerEvent::left(point.x, point.y).with_modifiers(modifiers))
}

/// Entity currently carrying `name`. Names survive undo and redo even when ids do not.
fn lookup(scene: &MemoryScene, name: &str) -> Result<EntityId, String> {
    scene
        .entities()
        .find(|props| props.name == name)
        .map(|props| props.id)
        .ok_or_else(|| format!("no entity named {name}"))
}

fn apply_step(session: &mut EditorSession, scene: &mut MemoryScene, step: &Step) -> Result<bool, String> {
    let handled = match step {
        Step::Press { target, modifiers } => {
            let event = pointer(scene, *target, *modifiers)?;
            session.mouse_press(scene, &event)
        }
        Step::Move { target, modifiers } => {
            let event = pointer(scene, *target, *modifiers)?;
            session.mouse_move(scene, &event)
        }
        Step::Release { target, modifiers } => {
            let mut event = pointer(scene, *target, *modifiers)?;
            event.left_button = false;
            session.mouse_release(scene, &event)
        }
        Step::Key { key, modifiers } => {
            let event = KeyEvent {
                key: *key,
                modifiers: *modifiers,
            };
            session.key_press(scene, &event);
            session.key_release(scene, &event)
        }
        Step::Undo => session.undo(scene),
        Step::Redo => session.redo(scene),
        Step::Delete => session.delete_selected(scene),
        Step::Duplicate => session.duplicate_selected(scene),
        Step::Copy => session.copy(scene),
        Step::Cut => session.cut(scene),
        Step::Paste => session.paste(scene),
        Step::Parent => session.parent_selected(scene),
        Step::Unparent => session.unparent_selected(scene),
        Step::Rotate90 { axis } => session.rotate_selection_90(scene, *axis),
        Step::Select { names } => {
            let ids = names
                .iter()
                .map(|name| lookup(scene, name))
                .collect::<Result<Vec<_>, _>>()?;
            session.select(scene, &ids);
            true
        }
        Step::Create { entity, direction } => {
            let properties = entity_properties(entity, None);
            session.create_entity(scene, properties, *direction).is_some()
        }
        Step::Tick { seconds, count } => {
            for _ in 0..*count {
                scene.advance(*seconds);
                session.update(scene, *seconds);
            }
            true
        }
    };
    Ok(handled)
}

fn build_report(scene: &MemoryScene, session: &EditorSession) -> Report {
    let name_of = |id: EntityId| scene.entity(id).map(|props| props.name.clone());
    let entities = scene
        .entities()
        .map(|props| {
            let (y, x, z) = props.rotation.to_euler(glam::EulerRot::YXZ);
            EntityRow {
                id: props.id,
                name: props.name.clone(),
                kind: props.kind,
                position: props.position,
                rotation_degrees: Vec3::new(x.to_degrees(), y.to_degrees(), z.to_degrees()),
                dimensions: props.dimensions,
                parent: props.parent_id.and_then(name_of),
                locked: props.locked,
                visible: props.visible,
            }
        })
        .collect();
    let history = session.history();
    Report {
        entities,
        selection: session
            .selection()
            .ids()
            .iter()
            .filter_map(|id| name_of(*id))
            .collect(),
        history: HistoryRow {
            len: history.len(),
            position: history.position(),
            can_undo: history.can_undo(),
            can_redo: history.can_redo(),
        },
        rejections: scene.rejections(),
        messages: scene.messages().map(str::to_string).collect(),
    }
}

fn default_dimensions() -> Vec3 {
    Vec3::ONE
}

fn default_create_direction() -> Vec3 {
    Vec3::Z
}

fn default_tick_count() -> u32 {
    1
}
