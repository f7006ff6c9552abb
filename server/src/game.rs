//! Replicated world state.

use log::{debug, info};
use shared::{GameObjectId, PlayerInput, StateKind};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Anything the fixed-step simulation advances.
pub trait Steppable {
    fn step(&mut self, dt: f32);
}

/// A game object whose state is mirrored to clients.
///
/// Core state changes every step and is streamed unreliably. Extra state
/// changes rarely; objects flag it dirty so it goes out reliably once.
pub trait Replicable: Steppable + Send {
    fn id(&self) -> GameObjectId;
    fn set_id(&mut self, id: GameObjectId);
    /// Type name clients use to construct a matching object.
    fn type_name(&self) -> &str;

    fn owner(&self) -> Option<SocketAddr>;
    fn set_owner(&mut self, owner: Option<SocketAddr>);

    fn is_controllable(&self) -> bool {
        false
    }

    fn set_player_input(&mut self, _input: &PlayerInput) {}

    fn is_dirty(&self) -> bool;
    fn clear_dirty(&mut self);
    fn is_sleeping(&self) -> bool;

    fn is_scheduled_for_deletion(&self) -> bool;
    fn schedule_for_deletion(&mut self);

    /// Construction parameters sent once with the object's creation.
    fn write_init_values(&self) -> Vec<u8>;
    fn write_state(&self, kind: StateKind) -> Vec<u8>;
}

pub struct GameState {
    pub tick: u32,
    objects: BTreeMap<GameObjectId, Box<dyn Replicable>>,
    next_id: GameObjectId,
}

impl GameState {
    pub fn new() -> Self {
        Self {
            tick: 0,
            objects: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Takes ownership of an object and assigns it a fresh id.
    pub fn add_object(&mut self, mut object: Box<dyn Replicable>) -> GameObjectId {
        let id = self.allocate_id();
        object.set_id(id);
        debug!("Added {} as object {}", object.type_name(), id);
        self.objects.insert(id, object);
        id
    }

    fn allocate_id(&mut self) -> GameObjectId {
        while self.next_id == 0 || self.objects.contains_key(&self.next_id) {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn remove_object(&mut self, id: GameObjectId) -> Option<Box<dyn Replicable>> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: GameObjectId) -> Option<&dyn Replicable> {
        self.objects.get(&id).map(|object| object.as_ref())
    }

    pub fn get_mut(&mut self, id: GameObjectId) -> Option<&mut (dyn Replicable + 'static)> {
        self.objects.get_mut(&id).map(|object| object.as_mut())
    }

    pub fn contains(&self, id: GameObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &dyn Replicable> {
        self.objects.values().map(|object| object.as_ref())
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut (dyn Replicable + 'static)> {
        self.objects.values_mut().map(|object| object.as_mut())
    }

    pub fn scheduled_for_deletion(&self) -> Vec<GameObjectId> {
        self.objects
            .values()
            .filter(|object| object.is_scheduled_for_deletion())
            .map(|object| object.id())
            .collect()
    }

    /// Advances every object by `dt` and returns the ids of objects that
    /// fell asleep during this step.
    pub fn step(&mut self, dt: f32) -> Vec<GameObjectId> {
        let mut fell_asleep = Vec::new();
        for (id, object) in self.objects.iter_mut() {
            let was_sleeping = object.is_sleeping();
            object.step(dt);
            if !was_sleeping && object.is_sleeping() {
                fell_asleep.push(*id);
            }
        }
        self.tick = self.tick.wrapping_add(1);
        fell_asleep
    }

    /// Drops every object, e.g. before a new level is loaded.
    pub fn reset(&mut self) {
        info!("Resetting game state with {} objects", self.objects.len());
        self.objects.clear();
        self.next_id = 1;
        self.tick = 0;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{RigidBody, Vector2};

    fn body() -> Box<dyn Replicable> {
        Box::new(RigidBody::new("crate", Vector2::default()))
    }

    #[test]
    fn test_game_state_creation() {
        let state = GameState::new();
        assert_eq!(state.tick, 0);
        assert!(state.is_empty());
    }

    #[test]
    fn test_add_object_assigns_ids() {
        let mut state = GameState::new();
        let first = state.add_object(body());
        let second = state.add_object(body());

        assert_ne!(first, second);
        assert_eq!(state.get(first).map(|o| o.id()), Some(first));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_remove_object() {
        let mut state = GameState::new();
        let id = state.add_object(body());

        assert!(state.remove_object(id).is_some());
        assert!(state.remove_object(id).is_none());
        assert!(!state.contains(id));
    }

    #[test]
    fn test_scheduled_for_deletion() {
        let mut state = GameState::new();
        let keep = state.add_object(body());
        let doomed = state.add_object(body());
        state.get_mut(doomed).unwrap().schedule_for_deletion();

        assert_eq!(state.scheduled_for_deletion(), vec![doomed]);
        assert!(state.contains(keep));
    }

    #[test]
    fn test_step_reports_objects_falling_asleep() {
        let mut state = GameState::new();
        let mut moving = RigidBody::new("crate", Vector2::default());
        moving.velocity = Vector2 { x: 0.01, y: 0.0 };
        let id = state.add_object(Box::new(moving));

        let mut reported = Vec::new();
        for _ in 0..200 {
            reported.extend(state.step(1.0 / 60.0));
        }

        assert_eq!(reported, vec![id]);
        assert_eq!(state.tick, 200);
    }

    #[test]
    fn test_reset() {
        let mut state = GameState::new();
        state.add_object(body());
        state.step(0.1);

        state.reset();
        assert!(state.is_empty());
        assert_eq!(state.tick, 0);
        assert_eq!(state.add_object(body()), 1);
    }
}
