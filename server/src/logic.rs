//! Pluggable game rules.
//!
//! The driver owns the world and the roster; a [`GameLogic`] decides what
//! happens in them. Logic code never talks to the network directly. It
//! mutates the world through a [`LogicContext`] and records side effects
//! that need to be announced, which the driver applies after the call.

use crate::error::LogicError;
use crate::game::GameState;
use crate::physics::{RigidBody, Vector2};
use log::{debug, info};
use shared::{GameObjectId, KeyState, PlayerInput};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Side effect requested by game logic.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicAction {
    /// A new object was added to the world and must be announced.
    ObjectAdded(GameObjectId),
    SetControllable {
        player: SocketAddr,
        object: Option<GameObjectId>,
    },
    RequestReady(SocketAddr),
    Custom {
        target: Option<SocketAddr>,
        kind: u8,
        payload: Vec<u8>,
    },
}

/// World access handed to game logic for the duration of one call.
pub struct LogicContext<'a> {
    game_state: &'a mut GameState,
    actions: Vec<LogicAction>,
}

impl<'a> LogicContext<'a> {
    pub fn new(game_state: &'a mut GameState) -> Self {
        Self {
            game_state,
            actions: Vec::new(),
        }
    }

    pub fn game_state(&mut self) -> &mut GameState {
        self.game_state
    }

    /// Adds an object to the world and schedules its announcement.
    pub fn spawn(&mut self, object: Box<dyn crate::game::Replicable>) -> GameObjectId {
        let id = self.game_state.add_object(object);
        self.actions.push(LogicAction::ObjectAdded(id));
        id
    }

    pub fn set_controllable(&mut self, player: SocketAddr, object: Option<GameObjectId>) {
        self.actions
            .push(LogicAction::SetControllable { player, object });
    }

    pub fn request_ready(&mut self, player: SocketAddr) {
        self.actions.push(LogicAction::RequestReady(player));
    }

    /// Sends a game specific command to one player, or to all if `target` is None.
    pub fn send_custom(&mut self, target: Option<SocketAddr>, kind: u8, payload: Vec<u8>) {
        self.actions.push(LogicAction::Custom {
            target,
            kind,
            payload,
        });
    }

    pub fn into_actions(self) -> Vec<LogicAction> {
        self.actions
    }
}

/// Game rules plugged into the replication driver.
///
/// Every hook has a do-nothing default so rules only implement what
/// they care about.
pub trait GameLogic: Send {
    fn type_name(&self) -> &str;

    fn load_level(&mut self, _ctx: &mut LogicContext<'_>, _level_name: &str) -> Result<(), LogicError> {
        Ok(())
    }

    /// Called for each player when they join and again for everyone
    /// after a level (re)load, with `newly_connected` false.
    fn add_player(
        &mut self,
        _ctx: &mut LogicContext<'_>,
        _player: SocketAddr,
        _newly_connected: bool,
    ) -> Result<(), LogicError> {
        Ok(())
    }

    fn remove_player(&mut self, _ctx: &mut LogicContext<'_>, _player: SocketAddr) -> Result<(), LogicError> {
        Ok(())
    }

    fn on_game_object_added(
        &mut self,
        _ctx: &mut LogicContext<'_>,
        _object: GameObjectId,
    ) -> Result<(), LogicError> {
        Ok(())
    }

    /// Sees every accepted input sample as soon as it arrives, before it
    /// is queued for replay.
    fn handle_input(
        &mut self,
        _ctx: &mut LogicContext<'_>,
        _player: SocketAddr,
        _input: &PlayerInput,
    ) -> Result<(), LogicError> {
        Ok(())
    }

    fn execute_custom_command(
        &mut self,
        _ctx: &mut LogicContext<'_>,
        _player: SocketAddr,
        _kind: u8,
        _payload: &[u8],
    ) -> Result<(), LogicError> {
        Ok(())
    }
}

type LogicConstructor = fn() -> Box<dyn GameLogic>;

/// Creates game logic instances by type name.
pub struct LogicFactory {
    constructors: BTreeMap<String, LogicConstructor>,
}

impl LogicFactory {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A factory that knows the built-in rule sets.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register(SANDBOX_LOGIC, create_sandbox);
        factory
    }

    pub fn register(&mut self, type_name: &str, constructor: LogicConstructor) {
        self.constructors.insert(type_name.to_string(), constructor);
    }

    pub fn create(&self, type_name: &str) -> Result<Box<dyn GameLogic>, LogicError> {
        self.constructors
            .get(type_name)
            .map(|constructor| constructor())
            .ok_or_else(|| LogicError::new(format!("unknown game logic type '{}'", type_name)))
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }
}

impl Default for LogicFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

pub const SANDBOX_LOGIC: &str = "Sandbox";

/// Object type of player bodies spawned by [`SandboxLogic`].
pub const PLAYER_BODY_TYPE: &str = "tank";
/// Object type of static props spawned by [`SandboxLogic`].
pub const PROP_TYPE: &str = "crate";

fn create_sandbox() -> Box<dyn GameLogic> {
    Box::new(SandboxLogic::default())
}

/// Minimal rule set: every player gets a body, firing is counted.
#[derive(Debug, Default)]
pub struct SandboxLogic {
    level_name: String,
    bodies: BTreeMap<SocketAddr, GameObjectId>,
    spawn_count: u32,
}

impl SandboxLogic {
    fn spawn_point(&mut self) -> Vector2 {
        self.spawn_count += 1;
        let angle = self.spawn_count as f32 * 1.3;
        Vector2::new(angle.cos() * 10.0, angle.sin() * 10.0)
    }

    pub fn body_of(&self, player: SocketAddr) -> Option<GameObjectId> {
        self.bodies.get(&player).copied()
    }
}

impl GameLogic for SandboxLogic {
    fn type_name(&self) -> &str {
        SANDBOX_LOGIC
    }

    fn load_level(&mut self, ctx: &mut LogicContext<'_>, level_name: &str) -> Result<(), LogicError> {
        if level_name.trim().is_empty() {
            return Err(LogicError::new("level name is empty"));
        }
        self.level_name = level_name.to_string();
        self.bodies.clear();
        ctx.spawn(Box::new(RigidBody::new(PROP_TYPE, Vector2::ZERO)));
        info!("Sandbox level '{}' ready", level_name);
        Ok(())
    }

    fn add_player(
        &mut self,
        ctx: &mut LogicContext<'_>,
        player: SocketAddr,
        newly_connected: bool,
    ) -> Result<(), LogicError> {
        let position = self.spawn_point();
        let id = ctx.spawn(Box::new(RigidBody::controllable(PLAYER_BODY_TYPE, position)));
        self.bodies.insert(player, id);
        ctx.set_controllable(player, Some(id));
        debug!(
            "Spawned body {} for {} (new connection: {})",
            id, player, newly_connected
        );
        Ok(())
    }

    fn remove_player(&mut self, ctx: &mut LogicContext<'_>, player: SocketAddr) -> Result<(), LogicError> {
        if let Some(id) = self.bodies.remove(&player) {
            if let Some(object) = ctx.game_state().get_mut(id) {
                object.schedule_for_deletion();
            }
        }
        Ok(())
    }

    fn handle_input(
        &mut self,
        ctx: &mut LogicContext<'_>,
        player: SocketAddr,
        input: &PlayerInput,
    ) -> Result<(), LogicError> {
        if input.fire1 != KeyState::JustPressed && input.fire1 != KeyState::PressedAndReleased {
            return Ok(());
        }
        let Some(id) = self.bodies.get(&player).copied() else {
            return Ok(());
        };
        ctx.send_custom(None, CUSTOM_SHOT_FIRED, id.to_le_bytes().to_vec());
        Ok(())
    }

    fn execute_custom_command(
        &mut self,
        ctx: &mut LogicContext<'_>,
        player: SocketAddr,
        kind: u8,
        payload: &[u8],
    ) -> Result<(), LogicError> {
        match kind {
            CUSTOM_RESPAWN => {
                if let Some(old) = self.bodies.remove(&player) {
                    if let Some(object) = ctx.game_state().get_mut(old) {
                        object.schedule_for_deletion();
                    }
                }
                self.add_player(ctx, player, false)
            }
            CUSTOM_PING => {
                ctx.send_custom(Some(player), CUSTOM_PING, payload.to_vec());
                Ok(())
            }
            other => Err(LogicError::new(format!(
                "unknown custom command {} from {}",
                other, player
            ))),
        }
    }
}

/// Client asks for a fresh body.
pub const CUSTOM_RESPAWN: u8 = 1;
/// Echoed back to the sender unchanged.
pub const CUSTOM_PING: u8 = 2;
/// Broadcast whenever a player fires.
pub const CUSTOM_SHOT_FIRED: u8 = 3;
