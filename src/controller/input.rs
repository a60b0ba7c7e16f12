/// Platform-agnostic keyboard handling
use std::collections::HashSet;

/// Platform-independent input events
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    KeyDown(String),
    KeyUp(String),
    FocusLost,
    VisibilityChanged { visible: bool },
}

/// Anything that can answer "is this key held right now?"
pub trait InputSource {
    fn is_pressed(&self, key: &str) -> bool;
}

/// Level-triggered key state, fed by keydown/keyup events
#[derive(Debug, Default)]
pub struct InputState {
    pub pressed_keys: HashSet<String>,
    pub show_overlay: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an input event and update state
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::KeyDown(key) => {
                self.pressed_keys.insert(key.clone());
            }
            InputEvent::KeyUp(key) => {
                self.pressed_keys.remove(key.as_str());
            }
            InputEvent::FocusLost | InputEvent::VisibilityChanged { .. } => {
                self.clear_keys();
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    pub fn clear_keys(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn toggle_overlay(&mut self) {
        self.show_overlay = !self.show_overlay;
    }
}

impl InputSource for InputState {
    fn is_pressed(&self, key: &str) -> bool {
        self.is_key_pressed(key)
    }
}

impl InputSource for HashSet<String> {
    fn is_pressed(&self, key: &str) -> bool {
        self.contains(key)
    }
}

/// Key mapping configuration
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub jump: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub toggle_overlay: String,
    pub escape: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        let keys = |names: &[&str]| names.iter().map(|k| k.to_string()).collect();
        Self {
            jump: keys(&["ArrowUp", "w", " "]),
            left: keys(&["ArrowLeft", "a"]),
            right: keys(&["ArrowRight", "d"]),
            toggle_overlay: "F3".to_string(),
            escape: "Escape".to_string(),
        }
    }
}

/// Which way the player wants to walk this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizontal {
    Left,
    Right,
}

/// High-level input processor
#[derive(Debug, Clone, Default)]
pub struct InputProcessor {
    bindings: KeyBindings,
}

impl InputProcessor {
    pub fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    fn any_pressed(input: &impl InputSource, keys: &[String]) -> bool {
        keys.iter().any(|k| input.is_pressed(k))
    }

    pub fn is_jumping(&self, input: &impl InputSource) -> bool {
        Self::any_pressed(input, &self.bindings.jump)
    }

    pub fn is_moving_left(&self, input: &impl InputSource) -> bool {
        Self::any_pressed(input, &self.bindings.left)
    }

    pub fn is_moving_right(&self, input: &impl InputSource) -> bool {
        Self::any_pressed(input, &self.bindings.right)
    }

    /// Right wins when both directions are held.
    pub fn horizontal_intent(&self, input: &impl InputSource) -> Option<Horizontal> {
        if self.is_moving_right(input) {
            Some(Horizontal::Right)
        } else if self.is_moving_left(input) {
            Some(Horizontal::Left)
        } else {
            None
        }
    }

    pub fn wants_to_toggle_overlay(&self, key: &str) -> bool {
        key == self.bindings.toggle_overlay
    }

    pub fn is_escape(&self, key: &str) -> bool {
        key == self.bindings.escape
    }

    /// Keys the game consumes; the browser should not scroll on them
    pub fn is_game_key(&self, key: &str) -> bool {
        self.bindings
            .jump
            .iter()
            .chain(&self.bindings.left)
            .chain(&self.bindings.right)
            .any(|k| k == key)
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::*;
    use web_sys::KeyboardEvent;

    pub fn keyboard_event_to_input(e: &KeyboardEvent, is_down: bool) -> InputEvent {
        let key = e.key();
        if is_down {
            InputEvent::KeyDown(key)
        } else {
            InputEvent::KeyUp(key)
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::*;
    use winit::event::ElementState;
    use winit::keyboard::KeyCode;

    /// Map physical keys onto the browser `KeyboardEvent.key` names the bindings use
    pub fn key_name(code: KeyCode) -> Option<&'static str> {
        Some(match code {
            KeyCode::ArrowUp => "ArrowUp",
            KeyCode::ArrowDown => "ArrowDown",
            KeyCode::ArrowLeft => "ArrowLeft",
            KeyCode::ArrowRight => "ArrowRight",
            KeyCode::KeyW => "w",
            KeyCode::KeyA => "a",
            KeyCode::KeyS => "s",
            KeyCode::KeyD => "d",
            KeyCode::Space => " ",
            KeyCode::F3 => "F3",
            KeyCode::Escape => "Escape",
            _ => return None,
        })
    }

    pub fn key_to_input(code: KeyCode, state: ElementState) -> Option<InputEvent> {
        let key = key_name(code)?.to_string();
        Some(match state {
            ElementState::Pressed => InputEvent::KeyDown(key),
            ElementState::Released => InputEvent::KeyUp(key),
        })
    }
}
