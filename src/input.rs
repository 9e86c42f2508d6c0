use std::collections::HashSet;

use bevy::prelude::*;
use bevy::window::WindowFocused;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Left,
    Right,
    Up,
    Down,
    Jump,
    Interact,
    Confirm,
    Pause,
    Back,
    Stats,
    Leaderboard,
}

impl Action {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Action::Left),
            "right" => Some(Action::Right),
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            "jump" => Some(Action::Jump),
            "interact" | "search" => Some(Action::Interact),
            "confirm" => Some(Action::Confirm),
            "pause" => Some(Action::Pause),
            "back" => Some(Action::Back),
            "stats" => Some(Action::Stats),
            "leaderboard" => Some(Action::Leaderboard),
            _ => None,
        }
    }
}

const KEY_BINDINGS: [(KeyCode, Action); 15] = [
    (KeyCode::KeyA, Action::Left),
    (KeyCode::ArrowLeft, Action::Left),
    (KeyCode::KeyD, Action::Right),
    (KeyCode::ArrowRight, Action::Right),
    (KeyCode::KeyW, Action::Up),
    (KeyCode::ArrowUp, Action::Up),
    (KeyCode::KeyS, Action::Down),
    (KeyCode::ArrowDown, Action::Down),
    (KeyCode::Space, Action::Jump),
    (KeyCode::KeyE, Action::Interact),
    (KeyCode::Enter, Action::Confirm),
    (KeyCode::Escape, Action::Pause),
    (KeyCode::Backspace, Action::Back),
    (KeyCode::Tab, Action::Stats),
    (KeyCode::KeyL, Action::Leaderboard),
];

/// Abstraction layer between raw input and the simulation.
/// Both the keyboard (windowed) and scripted inputs (headless) write to this.
///
/// `just_pressed` is latched: presses accumulate until a fixed tick consumes them, so a
/// tap is never lost on a frame that runs no tick and never seen twice.
#[derive(Resource, Default, Clone, Debug)]
pub struct VirtualInput {
    pub active: HashSet<Action>,
    pub just_pressed: HashSet<Action>,
    pub pointer: Option<Vec2>,
    pub mouse_pressed: bool,
}

impl VirtualInput {
    pub fn pressed(&self, action: Action) -> bool {
        self.active.contains(&action)
    }

    pub fn just_pressed(&self, action: Action) -> bool {
        self.just_pressed.contains(&action)
    }

    pub fn clear_frame(&mut self) {
        self.just_pressed.clear();
    }

    /// Drops every held key and pending press.
    pub fn clear_all(&mut self) {
        self.active.clear();
        self.just_pressed.clear();
        self.mouse_pressed = false;
    }

    #[cfg(test)]
    pub fn holding(actions: &[Action]) -> Self {
        Self {
            active: actions.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn tapping(actions: &[Action]) -> Self {
        Self {
            active: actions.iter().copied().collect(),
            just_pressed: actions.iter().copied().collect(),
            ..Default::default()
        }
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_event::<WindowFocused>()
            .add_systems(
                PreUpdate,
                (
                    clear_on_focus_loss,
                    keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
                    mouse_to_virtual.run_if(resource_exists::<ButtonInput<MouseButton>>),
                )
                    .chain()
                    .after(bevy::input::InputSystem),
            );
    }
}

/// Losing focus swallows key-up events, so everything held is released.
fn clear_on_focus_loss(
    mut focus: EventReader<WindowFocused>,
    keys: Option<ResMut<ButtonInput<KeyCode>>>,
    mut vinput: ResMut<VirtualInput>,
) {
    if !focus.read().any(|ev| !ev.focused) {
        return;
    }
    vinput.clear_all();
    if let Some(mut keys) = keys {
        keys.reset_all();
    }
    debug!("[Robotower input] Focus lost; cleared held input");
}

fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.active.clear();
    for (key, action) in KEY_BINDINGS {
        if keyboard.pressed(key) {
            vinput.active.insert(action);
        }
        if keyboard.just_pressed(key) {
            vinput.just_pressed.insert(action);
        }
    }
}

/// A left click confirms menus; the pointer is kept for observers.
fn mouse_to_virtual(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    mut vinput: ResMut<VirtualInput>,
) {
    vinput.mouse_pressed = buttons.pressed(MouseButton::Left);
    if buttons.just_pressed(MouseButton::Left) {
        vinput.just_pressed.insert(Action::Confirm);
    }
    vinput.pointer = windows.iter().next().and_then(Window::cursor_position);
}
