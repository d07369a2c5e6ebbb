//! Client input with change detection
//!
//! Keys are sampled once per frame and compared with the previous frame.
//! Only changes are reported, so a held key produces a single action.

use macroquad::prelude::{is_key_down, KeyCode};

/// Key state sampled for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    pub up: bool,
    pub down: bool,
    pub ready: bool,
    pub quit: bool,
}

impl KeySnapshot {
    /// Samples the keyboard (W/S or arrow keys, Space, Escape).
    pub fn sample() -> Self {
        Self {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            ready: is_key_down(KeyCode::Space),
            quit: is_key_down(KeyCode::Escape),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    MovingUp(bool),
    MovingDown(bool),
    ToggleReady,
    Quit,
}

/// Turns per-frame key state into edge events
#[derive(Debug, Default)]
pub struct InputManager {
    previous: KeySnapshot,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples the keyboard and returns what changed since the last frame.
    pub fn update(&mut self) -> Vec<InputAction> {
        self.update_from(KeySnapshot::sample())
    }

    pub fn update_from(&mut self, keys: KeySnapshot) -> Vec<InputAction> {
        let mut actions = Vec::new();

        if keys.up != self.previous.up {
            actions.push(InputAction::MovingUp(keys.up));
        }
        if keys.down != self.previous.down {
            actions.push(InputAction::MovingDown(keys.down));
        }
        // Press edges only
        if keys.ready && !self.previous.ready {
            actions.push(InputAction::ToggleReady);
        }
        if keys.quit && !self.previous.quit {
            actions.push(InputAction::Quit);
        }

        self.previous = keys;
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert_eq!(input_manager.previous, KeySnapshot::default());
    }

    #[test]
    fn test_held_key_reports_once() {
        let mut input = InputManager::new();
        let held = KeySnapshot {
            up: true,
            ..Default::default()
        };

        assert_eq!(input.update_from(held), vec![InputAction::MovingUp(true)]);
        assert!(input.update_from(held).is_empty());
        assert_eq!(
            input.update_from(KeySnapshot::default()),
            vec![InputAction::MovingUp(false)]
        );
    }

    #[test]
    fn test_up_and_down_are_independent() {
        let mut input = InputManager::new();
        let both = KeySnapshot {
            up: true,
            down: true,
            ..Default::default()
        };

        assert_eq!(
            input.update_from(both),
            vec![InputAction::MovingUp(true), InputAction::MovingDown(true)]
        );
    }

    #[test]
    fn test_ready_toggles_on_press_only() {
        let mut input = InputManager::new();
        let pressed = KeySnapshot {
            ready: true,
            ..Default::default()
        };

        assert_eq!(input.update_from(pressed), vec![InputAction::ToggleReady]);
        assert!(input.update_from(pressed).is_empty());
        assert!(input.update_from(KeySnapshot::default()).is_empty());
        assert_eq!(input.update_from(pressed), vec![InputAction::ToggleReady]);
    }
}
