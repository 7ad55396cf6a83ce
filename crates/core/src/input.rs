use glam::Vec3;
use gizmo_scene::{ControllerPose, Hand, Ray, SceneService};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
    pub meta: bool,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    pub left_button: bool,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn left(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            left_button: true,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Event raised on behalf of a controller; the pick ray comes from the pose.
    pub fn synthetic() -> Self {
        Self::default()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Control,
    Shift,
    Alt,
    Meta,
    Delete,
    Character(char),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TriggerAction {
    Press,
    Release,
}

fn hand_index(hand: Hand) -> usize {
    match hand {
        Hand::Left => 0,
        Hand::Right => 1,
    }
}

/// Folds mouse and controller input into one pick ray and button stream.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    trigger_on_value: f32,
    triggered_hand: Option<Hand>,
    pressed_hand: Option<Hand>,
    pointing_at_ui: [bool; 2],
    last_poses: [ControllerPose; 2],
    last_event: Option<PointerEvent>,
    snap_held: bool,
}

impl InputAdapter {
    pub fn new(trigger_on_value: f32) -> Self {
        Self {
            trigger_on_value,
            triggered_hand: None,
            pressed_hand: None,
            pointing_at_ui: [false; 2],
            last_poses: [ControllerPose::default(); 2],
            last_event: None,
            snap_held: false,
        }
    }

    pub fn triggered(&self) -> bool {
        self.triggered_hand.is_some()
    }

    pub fn triggered_hand(&self) -> Option<Hand> {
        self.triggered_hand
    }

    pub fn pressed_hand(&self) -> Option<Hand> {
        self.pressed_hand
    }

    /// Hand whose laser currently points at a desktop window or the tablet.
    pub fn set_pointing_at_ui(&mut self, hand: Hand, pointing: bool) {
        self.pointing_at_ui[hand_index(hand)] = pointing;
    }

    /// Full trigger click. Only one hand may drive a gesture at a time.
    pub fn trigger_clicked(&mut self, hand: Hand, clicked: bool) -> Option<TriggerAction> {
        if let Some(active) = self.triggered_hand {
            if active != hand {
                return None;
            }
        }
        if self.triggered_hand.is_none() && clicked && !self.pointing_at_ui[hand_index(hand)] {
            self.triggered_hand = Some(hand);
            Some(TriggerAction::Press)
        } else if self.triggered_hand.is_some() && !clicked {
            self.triggered_hand = None;
            Some(TriggerAction::Release)
        } else {
            None
        }
    }

    /// Analog trigger value. Returns true when the hand starts hovering handles.
    pub fn trigger_pressed(&mut self, hand: Hand, value: f32) -> bool {
        if value >= self.trigger_on_value
            && !self.triggered()
            && !self.pointing_at_ui[hand_index(hand)]
        {
            self.pressed_hand = Some(hand);
            true
        } else {
            self.pressed_hand = None;
            false
        }
    }

    pub fn pick_ray<S: SceneService + ?Sized>(&self, event: &PointerEvent, scene: &S) -> Ray {
        if let Some(hand) = self.triggered_hand.or(self.pressed_hand) {
            let pose = scene.controller_pose(hand);
            if pose.valid {
                return Ray::new(pose.position, pose.rotation * Vec3::Y);
            }
        }
        scene.camera_pick_ray(event.x, event.y)
    }

    /// Records the pose and reports whether the triggering controller moved since the last call.
    pub fn controller_moved(&mut self, hand: Hand, pose: ControllerPose) -> bool {
        let last = &mut self.last_poses[hand_index(hand)];
        let moved = pose.valid
            && last.valid
            && self.triggered_hand == Some(hand)
            && (pose.position != last.position || pose.rotation != last.rotation);
        *last = pose;
        moved
    }

    pub fn record_event(&mut self, event: PointerEvent) {
        self.last_event = Some(event);
    }

    pub fn last_event(&self) -> Option<PointerEvent> {
        self.last_event
    }

    /// Folds new modifier state into the last pointer event. Returns that event when
    /// any modifier differs, so the active tool can be re-run without pointer motion.
    pub fn modifiers_changed(&mut self, modifiers: Modifiers) -> Option<PointerEvent> {
        let last = self.last_event.as_mut()?;
        let changed = last.modifiers != modifiers;
        last.modifiers = modifiers;
        changed.then_some(*last)
    }

    pub fn set_snap_held(&mut self, held: bool) {
        self.snap_held = held;
    }

    /// Control key state; drives rotation snapping and tick marks.
    pub fn snap_held(&self) -> bool {
        self.snap_held
    }

    pub fn reset(&mut self) {
        self.triggered_hand = None;
        self.pressed_hand = None;
        self.last_event = None;
        self.snap_held = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use gizmo_scene::MemoryScene;

    #[test]
    fn other_hand_is_ignored_while_triggered() {
        let mut input = InputAdapter::new(0.15);
        assert_eq!(input.trigger_clicked(Hand::Right, true), Some(TriggerAction::Press));
        assert_eq!(input.trigger_clicked(Hand::Left, true), None);
        assert_eq!(input.trigger_clicked(Hand::Left, false), None);
        assert!(input.triggered());
        assert_eq!(input.trigger_clicked(Hand::Right, false), Some(TriggerAction::Release));
        assert!(!input.triggered());
    }

    #[test]
    fn pointing_at_ui_blocks_trigger() {
        let mut input = InputAdapter::new(0.15);
        input.set_pointing_at_ui(Hand::Left, true);
        assert_eq!(input.trigger_clicked(Hand::Left, true), None);
        assert!(!input.trigger_pressed(Hand::Left, 0.9));
        assert!(input.trigger_pressed(Hand::Right, 0.15));
        assert!(!input.trigger_pressed(Hand::Right, 0.1));
        assert_eq!(input.pressed_hand(), None);
    }

    #[test]
    fn controller_ray_uses_pose_up_vector() {
        let mut scene = MemoryScene::new();
        let pose = ControllerPose {
            position: Vec3::new(1.0, 1.5, 0.0),
            rotation: Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            valid: true,
        };
        scene.set_controller(Hand::Left, pose);
        let mut input = InputAdapter::new(0.15);
        let camera_ray = input.pick_ray(&PointerEvent::left(960.0, 540.0), &scene);
        assert!((camera_ray.direction - Vec3::NEG_Z).length() < 1.0e-5);

        input.trigger_clicked(Hand::Left, true);
        let ray = input.pick_ray(&PointerEvent::synthetic(), &scene);
        assert_eq!(ray.origin, pose.position);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1.0e-5);
    }

    #[test]
    fn controller_motion_needs_two_valid_poses() {
        let mut input = InputAdapter::new(0.15);
        input.trigger_clicked(Hand::Right, true);
        let mut pose = ControllerPose {
            valid: true,
            ..ControllerPose::default()
        };
        assert!(!input.controller_moved(Hand::Right, pose));
        assert!(!input.controller_moved(Hand::Right, pose));
        pose.position.x += 0.1;
        assert!(input.controller_moved(Hand::Right, pose));
    }

    #[test]
    fn modifier_change_replays_last_event() {
        let mut input = InputAdapter::new(0.15);
        assert!(input.modifiers_changed(Modifiers::default()).is_none());
        input.record_event(PointerEvent::left(10.0, 20.0));
        let shift = Modifiers {
            shift: true,
            ..Modifiers::default()
        };
        let replay = input.modifiers_changed(shift).expect("changed");
        assert_eq!((replay.x, replay.y), (10.0, 20.0));
        assert!(replay.modifiers.shift);
        assert!(input.modifiers_changed(shift).is_none());
    }
}
