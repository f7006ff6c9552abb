use crate::game::{Replicable, Steppable};
use serde::{Deserialize, Serialize};
use shared::{GameObjectId, KeyState, PlayerInput, StateKind};
use std::net::SocketAddr;

/// Speed below which a body counts as resting.
const SLEEP_SPEED: f32 = 0.05;
/// Resting steps before a body is put to sleep.
const SLEEP_STEPS: u32 = 30;

///Represents a vector in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    ///Value along the x-axis.
    pub x: f32,
    ///Value along the y-axis.
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the normalized vector, or zero for the zero vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            self.scale(1.0 / mag)
        }
    }

    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2::new(self.x * scalar, self.y * scalar)
    }

    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

/// Frequently changing part of a body's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoreState {
    pub position: Vector2,
    pub velocity: Vector2,
}

/// Rarely changing part of a body's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraState {
    pub hit_points: u8,
    pub shots_fired: u16,
}

/// A simple top-down body driven by player input.
#[derive(Debug, Clone)]
pub struct RigidBody {
    id: GameObjectId,
    type_name: String,
    owner: Option<SocketAddr>,
    controllable: bool,
    pub position: Vector2,
    pub velocity: Vector2,
    pub max_speed: f32,
    pub acceleration: f32,
    /// Fraction of velocity lost per second.
    pub damping: f32,
    input: PlayerInput,
    extra: ExtraState,
    dirty: bool,
    sleeping: bool,
    resting_steps: u32,
    scheduled_for_deletion: bool,
}

impl RigidBody {
    pub fn new(type_name: impl Into<String>, position: Vector2) -> Self {
        Self {
            id: 0,
            type_name: type_name.into(),
            owner: None,
            controllable: false,
            position,
            velocity: Vector2::ZERO,
            max_speed: 8.0,
            acceleration: 30.0,
            damping: 2.0,
            input: PlayerInput::default(),
            extra: ExtraState {
                hit_points: 100,
                shots_fired: 0,
            },
            dirty: false,
            sleeping: false,
            resting_steps: 0,
            scheduled_for_deletion: false,
        }
    }

    /// A body players can be bound to.
    pub fn controllable(type_name: impl Into<String>, position: Vector2) -> Self {
        Self {
            controllable: true,
            ..Self::new(type_name, position)
        }
    }

    pub fn input(&self) -> &PlayerInput {
        &self.input
    }

    pub fn extra_state(&self) -> ExtraState {
        self.extra
    }

    pub fn register_shot(&mut self) {
        self.extra.shots_fired = self.extra.shots_fired.wrapping_add(1);
        self.dirty = true;
    }

    pub fn set_hit_points(&mut self, hit_points: u8) {
        if self.extra.hit_points != hit_points {
            self.extra.hit_points = hit_points;
            self.dirty = true;
        }
    }

    pub fn core_state(&self) -> CoreState {
        CoreState {
            position: self.position,
            velocity: self.velocity,
        }
    }

    fn wake(&mut self) {
        self.sleeping = false;
        self.resting_steps = 0;
    }
}

impl Steppable for RigidBody {
    fn step(&mut self, dt: f32) {
        if self.sleeping {
            return;
        }

        let (x, y) = self.input.movement_axes();
        let thrust = Vector2::new(x, y).normalize().scale(self.acceleration);
        self.velocity = self.velocity.add(&thrust.scale(dt));
        self.velocity = self.velocity.scale((1.0 - self.damping * dt).max(0.0));

        // Clamp velocity to max_speed
        let speed = self.velocity.magnitude();
        if speed > self.max_speed {
            self.velocity = self.velocity.normalize().scale(self.max_speed);
        }

        self.position = self.position.add(&self.velocity.scale(dt));

        if matches!(
            self.input.fire1,
            KeyState::JustPressed | KeyState::PressedAndReleased
        ) {
            self.register_shot();
        }
        self.input.clear_released();

        if self.input.is_null() && self.velocity.magnitude() < SLEEP_SPEED {
            self.resting_steps += 1;
            if self.resting_steps >= SLEEP_STEPS {
                self.sleeping = true;
                self.velocity = Vector2::ZERO;
            }
        } else {
            self.resting_steps = 0;
        }
    }
}

impl Replicable for RigidBody {
    fn id(&self) -> GameObjectId {
        self.id
    }

    fn set_id(&mut self, id: GameObjectId) {
        self.id = id;
    }

    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn owner(&self) -> Option<SocketAddr> {
        self.owner
    }

    fn set_owner(&mut self, owner: Option<SocketAddr>) {
        self.owner = owner;
    }

    fn is_controllable(&self) -> bool {
        self.controllable
    }

    fn set_player_input(&mut self, input: &PlayerInput) {
        self.input = input.clone();
        if !input.is_null() {
            self.wake();
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    fn is_scheduled_for_deletion(&self) -> bool {
        self.scheduled_for_deletion
    }

    fn schedule_for_deletion(&mut self) {
        self.scheduled_for_deletion = true;
    }

    fn write_init_values(&self) -> Vec<u8> {
        bincode::serialize(&(self.controllable, self.max_speed)).unwrap_or_default()
    }

    fn write_state(&self, kind: StateKind) -> Vec<u8> {
        let encoded = match kind {
            StateKind::Core => bincode::serialize(&self.core_state()),
            StateKind::Extra => bincode::serialize(&self.extra),
            StateKind::Both => bincode::serialize(&(self.core_state(), self.extra)),
        };
        encoded.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vector_math() {
        let v = Vector2::new(3.0, 4.0);
        assert_approx_eq!(v.magnitude(), 5.0);
        assert_approx_eq!(v.normalize().magnitude(), 1.0);
        assert_eq!(Vector2::ZERO.normalize(), Vector2::ZERO);
        assert_eq!(v.add(&Vector2::new(1.0, 1.0)), Vector2::new(4.0, 5.0));
    }

    #[test]
    fn test_input_accelerates_body() {
        let mut body = RigidBody::controllable("tank", Vector2::ZERO);
        body.set_player_input(&PlayerInput {
            right: true,
            ..Default::default()
        });

        for _ in 0..10 {
            body.step(1.0 / 60.0);
        }

        assert!(body.velocity.x > 0.0);
        assert!(body.position.x > 0.0);
        assert_approx_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut body = RigidBody::controllable("tank", Vector2::ZERO);
        body.acceleration = 1000.0;
        body.set_player_input(&PlayerInput {
            up: true,
            ..Default::default()
        });

        for _ in 0..60 {
            body.step(1.0 / 60.0);
        }
        assert!(body.velocity.magnitude() <= body.max_speed + 1e-4);
    }

    #[test]
    fn test_body_falls_asleep_and_wakes_on_input() {
        let mut body = RigidBody::new("crate", Vector2::ZERO);
        for _ in 0..SLEEP_STEPS {
            body.step(1.0 / 60.0);
        }
        assert!(body.is_sleeping());

        body.set_player_input(&PlayerInput {
            left: true,
            ..Default::default()
        });
        assert!(!body.is_sleeping());
    }

    #[test]
    fn test_extra_changes_mark_dirty() {
        let mut body = RigidBody::controllable("tank", Vector2::ZERO);
        assert!(!body.is_dirty());

        body.register_shot();
        assert!(body.is_dirty());
        body.clear_dirty();

        body.set_hit_points(100);
        assert!(!body.is_dirty());
        body.set_hit_points(60);
        assert!(body.is_dirty());
    }

    #[test]
    fn test_state_blobs_decode() {
        let mut body = RigidBody::controllable("tank", Vector2::new(1.0, 2.0));
        body.register_shot();

        let core: CoreState = bincode::deserialize(&body.write_state(StateKind::Core)).unwrap();
        assert_eq!(core.position, Vector2::new(1.0, 2.0));

        let (core, extra): (CoreState, ExtraState) =
            bincode::deserialize(&body.write_state(StateKind::Both)).unwrap();
        assert_eq!(core, body.core_state());
        assert_eq!(extra.shots_fired, 1);
    }

    #[test]
    fn test_edge_presses_fire_once() {
        let mut body = RigidBody::controllable("tank", Vector2::ZERO);
        body.set_player_input(&PlayerInput {
            fire1: KeyState::JustPressed,
            ..Default::default()
        });
        body.step(1.0 / 60.0);
        body.step(1.0 / 60.0);

        assert_eq!(body.input().fire1, KeyState::Down);
        assert_eq!(body.extra_state().shots_fired, 1);
        assert!(body.is_dirty());
    }
}
