use serde::{Deserialize, Serialize};

/// State of a button as seen by one simulation step.
///
/// Short presses that begin and end between two input samples are kept
/// as `PressedAndReleased` so the server still sees them once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyState {
    #[default]
    Up,
    Down,
    JustPressed,
    PressedAndReleased,
}

impl KeyState {
    /// True if the button counts as pressed during this step.
    pub fn is_active(self) -> bool {
        !matches!(self, KeyState::Up)
    }

    /// Collapses edge states after they have been consumed.
    fn settle(&mut self) {
        *self = match *self {
            KeyState::JustPressed => KeyState::Down,
            KeyState::PressedAndReleased => KeyState::Up,
            other => other,
        };
    }
}

/// Controller snapshot sampled by a client for one or more physics steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub fire1: KeyState,
    pub fire2: KeyState,
    pub fire3: KeyState,
    pub action1: KeyState,
    pub action2: KeyState,
    pub action3: KeyState,
    pub delta_yaw: f32,
    pub delta_pitch: f32,
}

impl PlayerInput {
    /// Returns true if nothing is pressed and the view did not move.
    pub fn is_null(&self) -> bool {
        *self == PlayerInput::default()
    }

    pub fn clear(&mut self) {
        *self = PlayerInput::default();
    }

    /// Turns edge-triggered button states into their steady counterparts.
    ///
    /// Called once the simulation has seen a sample, so a single click
    /// does not fire again on the following step.
    pub fn clear_released(&mut self) {
        for key in [
            &mut self.fire1,
            &mut self.fire2,
            &mut self.fire3,
            &mut self.action1,
            &mut self.action2,
            &mut self.action3,
        ] {
            key.settle();
        }
    }

    /// Movement intent as `(x, y)` with each axis in `-1.0..=1.0`.
    pub fn movement_axes(&self) -> (f32, f32) {
        let axis = |positive: bool, negative: bool| match (positive, negative) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        };
        (axis(self.right, self.left), axis(self.up, self.down))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_input_is_null() {
        let mut input = PlayerInput::default();
        assert!(input.is_null());

        input.delta_yaw = 0.5;
        assert!(!input.is_null());

        input.clear();
        assert!(input.is_null());
    }

    #[test]
    fn test_clear_released_settles_edges() {
        let mut input = PlayerInput {
            fire1: KeyState::JustPressed,
            fire2: KeyState::PressedAndReleased,
            action1: KeyState::Down,
            ..Default::default()
        };

        input.clear_released();

        assert_eq!(input.fire1, KeyState::Down);
        assert_eq!(input.fire2, KeyState::Up);
        assert_eq!(input.action1, KeyState::Down);
        assert_eq!(input.fire3, KeyState::Up);
    }

    #[test]
    fn test_movement_axes() {
        let input = PlayerInput {
            up: true,
            left: true,
            ..Default::default()
        };
        assert_eq!(input.movement_axes(), (-1.0, 1.0));

        let opposed = PlayerInput {
            left: true,
            right: true,
            ..Default::default()
        };
        assert_eq!(opposed.movement_axes(), (0.0, 0.0));
    }

    #[test]
    fn test_key_state_activity() {
        assert!(!KeyState::Up.is_active());
        assert!(KeyState::Down.is_active());
        assert!(KeyState::JustPressed.is_active());
        assert!(KeyState::PressedAndReleased.is_active());
    }

    #[test]
    fn test_clear_released_keeps_view_deltas() {
        let mut input = PlayerInput {
            fire1: KeyState::PressedAndReleased,
            delta_yaw: 0.25,
            delta_pitch: -0.1,
            ..Default::default()
        };

        input.clear_released();

        assert_approx_eq!(input.delta_yaw, 0.25, 1e-6);
        assert_approx_eq!(input.delta_pitch, -0.1, 1e-6);
        assert!(!input.is_null());
    }
}
