//! Keyboard and mouse state, with both level-triggered (held) and
//! edge-triggered (just pressed/released) queries.
//!
//! Movement is level-triggered: the walk vector is derived every frame from
//! whichever keys are currently down. Jump is also level-triggered (holding
//! the key keeps requesting a jump; grounding gates the impulse). Edge
//! triggers are used for one-shot actions such as toggling the overlay and
//! firing UI buttons, and are cleared at the end of every rendered frame.

use glam::Vec2;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    W,
    A,
    S,
    D,
    Space,
    Escape,
    F3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    mouse_held: HashSet<MouseBtn>,
    mouse_just_released: HashSet<MouseBtn>,
    pub mouse_position: (f64, f64),
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_just_released: HashSet::new(),
            mouse_position: (0.0, 0.0),
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.held.remove(&key);
    }

    pub fn mouse_down(&mut self, btn: MouseBtn) {
        self.mouse_held.insert(btn);
    }

    pub fn mouse_up(&mut self, btn: MouseBtn) {
        if self.mouse_held.remove(&btn) {
            self.mouse_just_released.insert(btn);
        }
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_mouse_just_released(&self, btn: MouseBtn) -> bool {
        self.mouse_just_released.contains(&btn)
    }

    /// Raw 4-directional movement intent from WASD/arrows. Not normalized;
    /// callers normalize before applying speed so diagonals are not faster.
    pub fn movement_axis(&self) -> Vec2 {
        let mut axis = Vec2::ZERO;
        if self.is_held(Key::A) || self.is_held(Key::Left) {
            axis.x -= 1.0;
        }
        if self.is_held(Key::D) || self.is_held(Key::Right) {
            axis.x += 1.0;
        }
        if self.is_held(Key::W) || self.is_held(Key::Up) {
            axis.y += 1.0;
        }
        if self.is_held(Key::S) || self.is_held(Key::Down) {
            axis.y -= 1.0;
        }
        axis
    }

    /// Whether an upward/jump input is active this frame.
    pub fn jump_held(&self) -> bool {
        self.is_held(Key::Space) || self.is_held(Key::W) || self.is_held(Key::Up)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.mouse_just_released.clear();
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}
