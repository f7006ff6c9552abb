//! Authoritative replication driver
//!
//! The driver is the single owner of the roster, the world and the active
//! game logic. The network layer feeds it decoded packets and calls its
//! periodic entry points:
//!
//! - `handle_packet` for every datagram, at the network drain rate
//! - `frame_move` once per physics step
//! - `send_game_state` at the state broadcast rate
//!
//! Every command the driver emits is pushed as an [`Outgoing`] frame onto
//! an unbounded channel; broadcasts are expanded to one frame per
//! recipient before they leave the driver.

use crate::config::ServerConfig;
use crate::error::{AdmissionError, LogicError};
use crate::game::{GameState, Replicable};
use crate::logic::{GameLogic, LogicAction, LogicContext, LogicFactory};
use crate::registry::{Recipients, SessionRegistry};
use crate::session::Session;
use crate::utils::{get_timestamp, is_valid_player_name};
use log::{debug, error, info, warn};
use shared::codec::{Direction, Frame};
use shared::{
    ClientCommand, GameObjectId, NetworkOptions, PlayerInput, SequenceNumber, ServerCommand,
    StateKind, StringMessageKind, TrafficStats, VersionInfo, DEFAULT_PLAYER_NAME,
};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// A frame ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub addr: SocketAddr,
    pub frame: Vec<u8>,
    pub options: NetworkOptions,
}

/// Notable things that happened while processing, drained by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    PlayerJoined(SocketAddr),
    PlayerLeft(SocketAddr),
    LevelLoaded {
        level_name: String,
        logic_type: String,
    },
    ExceptionCaught(LogicError),
}

/// Millisecond clock stamped on timestamped commands.
pub type Clock = Box<dyn Fn() -> u32 + Send>;

pub struct ReplicationDriver {
    config: ServerConfig,
    registry: SessionRegistry,
    game_state: GameState,
    logic: Option<Box<dyn GameLogic>>,
    logic_factory: LogicFactory,
    level_name: String,
    logic_type: String,
    outbox: mpsc::UnboundedSender<Outgoing>,
    events: Vec<ServerEvent>,
    clock: Clock,
    traffic: TrafficStats,
    traffic_since: Instant,
}

impl ReplicationDriver {
    pub fn new(
        config: ServerConfig,
        logic_factory: LogicFactory,
        outbox: mpsc::UnboundedSender<Outgoing>,
    ) -> Self {
        Self {
            registry: SessionRegistry::new(config.max_connections),
            config,
            game_state: GameState::new(),
            logic: None,
            logic_factory,
            level_name: String::new(),
            logic_type: String::new(),
            outbox,
            events: Vec::new(),
            clock: Box::new(get_timestamp),
            traffic: TrafficStats::new(),
            traffic_since: Instant::now(),
        }
    }

    /// Replaces the wall clock, e.g. with a fixed one in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn game_state(&self) -> &GameState {
        &self.game_state
    }

    pub fn game_state_mut(&mut self) -> &mut GameState {
        &mut self.game_state
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    pub fn logic_type(&self) -> &str {
        &self.logic_type
    }

    pub fn is_level_loaded(&self) -> bool {
        !self.level_name.is_empty()
    }

    pub fn traffic(&self) -> &TrafficStats {
        &self.traffic
    }

    pub fn take_events(&mut self) -> Vec<ServerEvent> {
        std::mem::take(&mut self.events)
    }

    fn now(&self) -> u32 {
        (self.clock)()
    }

    /// Decodes and executes one datagram from `addr`.
    ///
    /// Malformed or unknown packets are logged and dropped. A failing
    /// command is logged and recorded as [`ServerEvent::ExceptionCaught`];
    /// it never stops processing of later packets.
    pub fn handle_packet(&mut self, addr: SocketAddr, data: &[u8]) {
        self.traffic.account(Direction::Incoming, data);

        let command = match ClientCommand::decode(data) {
            Ok(Some(command)) => command,
            Ok(None) => {
                let tag = Frame::split(data).map(|frame| frame.tag).unwrap_or_default();
                warn!("Ignoring packet with unexpected id {:#04x} from {}", tag, addr);
                return;
            }
            Err(e) => {
                warn!("Ignoring malformed packet from {}: {}", addr, e);
                return;
            }
        };

        if let Some(session) = self.registry.get_mut(addr) {
            session.refresh_last_seen();
        }

        if let Err(e) = self.dispatch(addr, command) {
            self.record_exception(e.with_history(format!("handling packet from {}", addr)));
        }
    }

    fn dispatch(&mut self, addr: SocketAddr, command: ClientCommand) -> Result<(), LogicError> {
        match command {
            ClientCommand::VersionInfo(version) => {
                self.handle_version_info(addr, version);
                Ok(())
            }
            ClientCommand::Disconnect => {
                info!("{} disconnected", addr);
                self.remove_player(addr);
                Ok(())
            }
            ClientCommand::PlayerInput {
                timestamp,
                sequence,
                input,
            } => self.handle_input(addr, timestamp, sequence, input),
            ClientCommand::Rcon { command } => {
                self.rcon(addr, &command);
                Ok(())
            }
            ClientCommand::Chat { message } => {
                self.chat(addr, &message);
                Ok(())
            }
            ClientCommand::SetPlayerData {
                name,
                ranking_id,
                session_key,
            } => {
                self.set_player_data(addr, &name, ranking_id, session_key);
                Ok(())
            }
            ClientCommand::Custom { kind, payload } => {
                self.execute_custom_command(addr, kind, &payload)
            }
            ClientCommand::Ready => {
                self.player_ready(addr);
                Ok(())
            }
        }
    }

    pub(crate) fn record_exception(&mut self, error: LogicError) {
        error!("{}", error);
        self.events.push(ServerEvent::ExceptionCaught(error));
    }

    fn handle_version_info(&mut self, addr: SocketAddr, version: VersionInfo) {
        let ours = VersionInfo::current();
        self.send(&ServerCommand::VersionInfo(ours.clone()), Recipients::Single(addr));

        if !ours.is_compatible(&version) {
            warn!(
                "{} runs {} {}.{}, expected {} {}.x",
                addr, version.game, version.major, version.minor, ours.game, ours.major
            );
            self.deny(addr, AdmissionError::VersionMismatch);
            return;
        }

        if let Err(e) = self.add_player(addr) {
            self.deny(addr, e);
        }
    }

    fn deny(&mut self, addr: SocketAddr, reason: AdmissionError) {
        self.send(
            &ServerCommand::ConnectionDenied {
                reason: reason.to_string(),
            },
            Recipients::Single(addr),
        );
    }

    /// Admits a new player and brings them up to date.
    ///
    /// The newcomer receives the level, every existing object and every
    /// existing player before anyone else learns about them. Nothing is
    /// mutated when admission is refused.
    pub fn add_player(&mut self, id: SocketAddr) -> Result<(), AdmissionError> {
        if let Err(e) = self.registry.check_admission(id, self.is_level_loaded()) {
            warn!("Refusing {}: {}", id, e);
            return Err(e);
        }

        if self.registry.contains(id) {
            info!("Replacing stale session of {}", id);
            self.remove_player(id);
        }

        for command in self.snapshot() {
            self.send(&command, Recipients::Single(id));
        }

        self.registry
            .insert(Session::new(id, self.config.queue_policy()))?;
        self.request_player_ready(id);
        self.send(
            &ServerCommand::CreatePlayer { player: id },
            Recipients::All { except: Some(id) },
        );

        if let Err(e) = self.with_logic(|logic, ctx| logic.add_player(ctx, id, true)) {
            self.record_exception(e.with_history(format!("adding player {}", id)));
        }

        info!("Player {} joined ({} connected)", id, self.registry.len());
        self.events.push(ServerEvent::PlayerJoined(id));
        Ok(())
    }

    fn snapshot(&self) -> Vec<ServerCommand> {
        let now = self.now();
        let mut commands = vec![ServerCommand::LoadLevel {
            level_name: self.level_name.clone(),
            logic_type: self.logic_type.clone(),
        }];

        commands.extend(
            self.game_state
                .objects()
                .map(|object| create_object_command(object, now)),
        );

        for session in self.registry.iter() {
            commands.push(ServerCommand::CreatePlayer { player: session.id });
            if let Some(object) = session.controlled_object() {
                commands.push(ServerCommand::SetControllable {
                    player: session.id,
                    object: Some(object),
                });
            }
            if !session.name().is_empty() {
                commands.push(ServerCommand::StringMessage {
                    kind: StringMessageKind::PlayerName,
                    message: session.name().to_string(),
                    player: Some(session.id),
                });
            }
        }
        commands
    }

    /// Removes a player. Unknown identities are ignored.
    pub fn remove_player(&mut self, id: SocketAddr) {
        if !self.registry.contains(id) {
            debug!("Ignoring removal of unknown player {}", id);
            return;
        }

        if let Err(e) = self.with_logic(|logic, ctx| logic.remove_player(ctx, id)) {
            self.record_exception(e.with_history(format!("removing player {}", id)));
        }

        self.send(
            &ServerCommand::DeletePlayer { player: id },
            Recipients::All { except: Some(id) },
        );

        if let Some(session) = self.registry.remove(id) {
            if let Some(object) = session
                .controlled_object()
                .and_then(|object| self.game_state.get_mut(object))
            {
                object.set_player_input(&PlayerInput::default());
                object.set_owner(None);
            }
        }

        self.events.push(ServerEvent::PlayerLeft(id));
    }

    /// Drops players that have not been heard from within the configured timeout.
    pub fn remove_timed_out(&mut self) -> Vec<SocketAddr> {
        let timed_out = self.registry.check_timeouts(self.config.client_timeout());
        for id in &timed_out {
            info!("Player {} timed out", id);
            self.remove_player(*id);
        }
        timed_out
    }

    /// Binds `id` to `object`, or unbinds it with `None`.
    ///
    /// Everybody is told before the binding changes. The previously
    /// controlled object loses its owner and its input is cleared.
    pub fn set_controllable(&mut self, id: SocketAddr, object: Option<GameObjectId>) {
        let Some(current) = self.registry.get(id).map(Session::controlled_object) else {
            warn!("Cannot set controllable of unknown player {}", id);
            return;
        };

        if object.is_some() && current == object {
            warn!("{} already controls {:?}", id, object);
            return;
        }

        if let Some(new_id) = object {
            match self.game_state.get(new_id) {
                None => {
                    warn!("Cannot give {} nonexistent object {}", id, new_id);
                    return;
                }
                Some(target) if !target.is_controllable() => {
                    warn!("Object {} ({}) is not controllable", new_id, target.type_name());
                    return;
                }
                Some(_) => {}
            }
            if let Some(other) = self.registry.find_by_controllable(new_id) {
                self.set_controllable(other, None);
            }
        }

        self.send(
            &ServerCommand::SetControllable { player: id, object },
            Recipients::All { except: None },
        );

        if let Some(previous) = current.and_then(|previous| self.game_state.get_mut(previous)) {
            previous.set_player_input(&PlayerInput::default());
            previous.set_owner(None);
        }
        if let Some(session) = self.registry.get_mut(id) {
            session.bind_controllable(object);
        }
        if let Some(target) = object.and_then(|new_id| self.game_state.get_mut(new_id)) {
            target.set_owner(Some(id));
        }
    }

    /// Adds an object to the world and announces it to every session.
    pub fn add_game_object(&mut self, object: Box<dyn Replicable>) -> GameObjectId {
        let id = self.game_state.add_object(object);
        self.announce_game_object(id);
        id
    }

    fn announce_game_object(&mut self, id: GameObjectId) {
        let now = self.now();
        let Some(command) = self
            .game_state
            .get(id)
            .map(|object| create_object_command(object, now))
        else {
            return;
        };
        self.send(&command, Recipients::All { except: None });

        if let Err(e) = self.with_logic(|logic, ctx| logic.on_game_object_added(ctx, id)) {
            self.record_exception(e.with_history(format!("announcing object {}", id)));
        }
    }

    fn delete_scheduled_objects(&mut self) {
        for id in self.game_state.scheduled_for_deletion() {
            while let Some(player) = self.registry.find_by_controllable(id) {
                self.set_controllable(player, None);
            }
            self.game_state.remove_object(id);
            self.send(
                &ServerCommand::DeleteGameObject { id },
                Recipients::All { except: None },
            );
        }
    }

    /// Runs one physics step.
    ///
    /// Each controlling session replays the next input sample onto its
    /// object, corrections are sent with the state valid before the step,
    /// then the world is advanced by `dt`.
    pub fn frame_move(&mut self, dt: f32) {
        self.delete_scheduled_objects();

        let mut corrections = Vec::new();
        for session in self.registry.iter_mut() {
            let Some(object_id) = session.controlled_object() else {
                continue;
            };
            if session.input_queue().is_empty() {
                continue;
            }

            let outcome = session.advance_input();
            let Some(object) = self.game_state.get_mut(object_id) else {
                continue;
            };

            if outcome.consumed {
                if let Some(sample) = session.input_queue().front() {
                    object.set_player_input(&sample.input);
                }
            }

            if let (true, Some(sequence)) = (outcome.correction_due, outcome.front_sequence) {
                corrections.push((
                    session.id,
                    ServerCommand::SetControllableState {
                        sequence,
                        state: object.write_state(StateKind::Core),
                    },
                ));
            }
        }

        for (addr, command) in corrections {
            self.send(&command, Recipients::Single(addr));
        }

        for id in self.game_state.step(dt) {
            self.send_full_state(id);
        }
    }

    // Objects going to sleep stop streaming, so their final state must arrive.
    fn send_full_state(&mut self, id: GameObjectId) {
        let timestamp = self.now();
        let Some(object) = self.game_state.get(id) else {
            return;
        };
        let command = ServerCommand::SetGameObjectState {
            timestamp,
            kind: StateKind::Both,
            id,
            state: object.write_state(StateKind::Both),
        };
        self.send(&command, Recipients::All { except: None });
    }

    /// Broadcasts object state for this network frame.
    ///
    /// Dirty extra state goes to everyone reliably. Core state of every
    /// awake object streams to synchronized sessions, skipping the owner
    /// of a controllable, who receives corrections instead.
    pub fn send_game_state(&mut self) {
        let timestamp = self.now();
        let mut updates = Vec::new();

        for object in self.game_state.objects_mut() {
            let id = object.id();
            if object.is_dirty() {
                updates.push((
                    ServerCommand::SetGameObjectState {
                        timestamp,
                        kind: StateKind::Extra,
                        id,
                        state: object.write_state(StateKind::Extra),
                    },
                    Recipients::All { except: None },
                ));
                object.clear_dirty();
            }

            if object.is_sleeping() {
                continue;
            }

            let except = if object.is_controllable() {
                object.owner()
            } else {
                None
            };
            updates.push((
                ServerCommand::SetGameObjectState {
                    timestamp,
                    kind: StateKind::Core,
                    id,
                    state: object.write_state(StateKind::Core),
                },
                Recipients::Ready { except },
            ));
        }

        for (command, recipients) in updates {
            self.send(&command, recipients);
        }
    }

    /// Accepts an input sample from `id` and queues it for replay.
    pub fn handle_input(
        &mut self,
        id: SocketAddr,
        timestamp: u32,
        sequence: SequenceNumber,
        input: PlayerInput,
    ) -> Result<(), LogicError> {
        let now = self.now();
        let Some(session) = self.registry.get_mut(id) else {
            debug!("Input from unknown player {}", id);
            return Ok(());
        };

        let age = now.wrapping_sub(timestamp) as i32;
        if age > 0 {
            session.set_network_delay(age as f32 * 0.001);
        }

        // Input for a previous controllable may still be in flight.
        let Some(object_id) = session.controlled_object() else {
            return Ok(());
        };

        self.with_logic(|logic, ctx| logic.handle_input(ctx, id, &input))?;

        let Some(session) = self.registry.get_mut(id) else {
            return Ok(());
        };
        let was_empty = session.input_queue().is_empty();
        let accepted = session.enqueue_input(sequence, input.clone());

        // The first sample after a (re)bind drives the object right away.
        if accepted && was_empty && session.controlled_object() == Some(object_id) {
            if let Some(object) = self.game_state.get_mut(object_id) {
                object.set_player_input(&input);
            }
        }
        Ok(())
    }

    /// Replaces the current level and game logic.
    ///
    /// On failure the server is left reset with no level loaded.
    pub fn load_level(&mut self, level_name: &str, logic_type: &str) -> Result<(), LogicError> {
        self.reset();

        let context = format!("loading level {} ({})", level_name, logic_type);
        let logic = self
            .logic_factory
            .create(logic_type)
            .map_err(|e| e.with_history(context.clone()))?;

        info!("Loading level {} with {} rules", level_name, logic_type);
        self.logic = Some(logic);
        self.level_name = level_name.to_string();
        self.logic_type = logic_type.to_string();

        self.send(
            &ServerCommand::LoadLevel {
                level_name: self.level_name.clone(),
                logic_type: self.logic_type.clone(),
            },
            Recipients::All { except: None },
        );
        for id in self.registry.ids() {
            self.request_player_ready(id);
        }

        if let Err(e) = self.with_logic(|logic, ctx| logic.load_level(ctx, level_name)) {
            self.reset();
            return Err(e.with_history(context));
        }

        for id in self.registry.ids() {
            if let Err(e) = self.with_logic(|logic, ctx| logic.add_player(ctx, id, false)) {
                self.record_exception(e.with_history(format!("re-adding player {}", id)));
            }
        }

        self.events.push(ServerEvent::LevelLoaded {
            level_name: self.level_name.clone(),
            logic_type: self.logic_type.clone(),
        });
        Ok(())
    }

    /// Drops the level, the world and the game logic.
    pub fn reset(&mut self) {
        for session in self.registry.iter_mut() {
            session.bind_controllable(None);
        }
        self.game_state.reset();
        self.logic = None;
        self.level_name.clear();
        self.logic_type.clear();
        self.send(&ServerCommand::ResetGame, Recipients::All { except: None });
    }

    fn with_logic<F>(&mut self, call: F) -> Result<(), LogicError>
    where
        F: FnOnce(&mut dyn GameLogic, &mut LogicContext<'_>) -> Result<(), LogicError>,
    {
        let Some(logic) = self.logic.as_mut() else {
            return Ok(());
        };
        let mut ctx = LogicContext::new(&mut self.game_state);
        let result = call(logic.as_mut(), &mut ctx);
        let actions = ctx.into_actions();
        self.apply_logic_actions(actions);
        result
    }

    fn apply_logic_actions(&mut self, actions: Vec<LogicAction>) {
        for action in actions {
            match action {
                LogicAction::ObjectAdded(id) => self.announce_game_object(id),
                LogicAction::SetControllable { player, object } => {
                    self.set_controllable(player, object)
                }
                LogicAction::RequestReady(player) => self.request_player_ready(player),
                LogicAction::Custom {
                    target,
                    kind,
                    payload,
                } => {
                    let recipients = match target {
                        Some(addr) => Recipients::Single(addr),
                        None => Recipients::All { except: None },
                    };
                    self.send(&ServerCommand::Custom { kind, payload }, recipients);
                }
            }
        }
    }

    pub fn execute_custom_command(
        &mut self,
        id: SocketAddr,
        kind: u8,
        payload: &[u8],
    ) -> Result<(), LogicError> {
        if !self.registry.contains(id) {
            warn!("Custom command {} from unknown player {}", kind, id);
            return Ok(());
        }
        self.with_logic(|logic, ctx| logic.execute_custom_command(ctx, id, kind, payload))
    }

    pub fn request_player_ready(&mut self, id: SocketAddr) {
        let Some(session) = self.registry.get_mut(id) else {
            warn!("Cannot request readiness of unknown player {}", id);
            return;
        };
        session.request_ready();
        self.send(&ServerCommand::RequestReady, Recipients::Single(id));
    }

    pub fn player_ready(&mut self, id: SocketAddr) {
        let Some(session) = self.registry.get_mut(id) else {
            warn!("Readiness from unknown player {}", id);
            return;
        };
        if session.acknowledge_ready() {
            debug!("{} is synchronized", id);
        } else {
            debug!("{} still owes {} acknowledgments", id, session.pending_readies());
        }
    }

    /// Relays a chat line from `id` to everyone else.
    pub fn chat(&mut self, id: SocketAddr, message: &str) {
        let Some(session) = self.registry.get_mut(id) else {
            warn!("Dropping chat from unknown peer {}", id);
            return;
        };
        if !session.allow_annoying_request() {
            warn!("Blocking chat flood from {} ({})", session.name(), id);
            return;
        }
        session.inc_annoying_requests();
        info!("[chat] {}: {}", session.name(), message);

        self.send(
            &ServerCommand::StringMessage {
                kind: StringMessageKind::Chat,
                message: message.to_string(),
                player: Some(id),
            },
            Recipients::All { except: Some(id) },
        );
    }

    /// Broadcasts a chat line from the server itself.
    pub fn say(&mut self, message: &str) {
        info!("[chat] server: {}", message);
        self.send(
            &ServerCommand::StringMessage {
                kind: StringMessageKind::Chat,
                message: message.to_string(),
                player: None,
            },
            Recipients::All { except: None },
        );
    }

    /// Applies a player's name and authentication data.
    ///
    /// Invalid names fall back to the previous one, or to the default for
    /// players who never had one. Everybody is told when the name changes.
    pub fn set_player_data(&mut self, id: SocketAddr, name: &str, ranking_id: u32, session_key: u32) {
        if !self.is_level_loaded() {
            return;
        }
        let Some(previous) = self.registry.get(id).map(|s| s.name().to_string()) else {
            warn!("Player data from unknown peer {}", id);
            return;
        };

        let desired = if is_valid_player_name(name) {
            name.to_string()
        } else if previous.is_empty() {
            DEFAULT_PLAYER_NAME.to_string()
        } else {
            previous.clone()
        };
        let unique = self.registry.unique_name(&desired, id);

        if let Some(session) = self.registry.get_mut(id) {
            session.set_name(unique.clone());
            session.set_auth_data(ranking_id, session_key);
        }

        if unique == previous {
            return;
        }
        info!("{} is now known as {}", id, unique);
        self.send(
            &ServerCommand::StringMessage {
                kind: StringMessageKind::PlayerName,
                message: unique,
                player: Some(id),
            },
            Recipients::All { except: None },
        );
    }

    /// Handles a remote administration line from `id`.
    pub fn rcon(&mut self, id: SocketAddr, line: &str) {
        let Some(session) = self.registry.get_mut(id) else {
            warn!("Rcon from unknown peer {}", id);
            return;
        };
        if !session.allow_annoying_request() {
            warn!("Blocking rcon flood from {}", id);
            return;
        }
        session.inc_annoying_requests();

        let line = line.trim();
        let mut words = line.splitn(2, char::is_whitespace);
        if words.next() == Some("passwd") {
            let password = words.next().map(str::trim).unwrap_or("");
            let granted = self.config.rcon_enabled() && password == self.config.rcon_password;
            session.set_rcon_authorized(granted);
            let response = if granted {
                info!("{} authorized for rcon", id);
                "authorization successful."
            } else {
                warn!("{} failed rcon authorization", id);
                "wrong password, authorization failed."
            };
            self.send_rcon_response(id, response.to_string());
            return;
        }

        if !session.is_rcon_authorized() {
            self.send_rcon_response(
                id,
                "You are not authorized to execute rcon commands.\nSet password with rcon passwd."
                    .to_string(),
            );
            return;
        }

        info!("{} executes rcon '{}'", id, line);
        let response = self.execute_console(line);
        if self.registry.contains(id) {
            self.send_rcon_response(id, response);
        }
    }

    fn send_rcon_response(&mut self, id: SocketAddr, message: String) {
        self.send(
            &ServerCommand::StringMessage {
                kind: StringMessageKind::RconResponse,
                message,
                player: None,
            },
            Recipients::Single(id),
        );
    }

    /// Lets every session make one more flood-limited request.
    pub fn decay_annoying_requests(&mut self) {
        for session in self.registry.iter_mut() {
            session.dec_annoying_requests();
        }
    }

    /// Disconnects a player. Returns false if they are not connected.
    pub fn kick(&mut self, id: SocketAddr) -> bool {
        if !self.registry.contains(id) {
            return false;
        }
        info!("Kicking {}", id);
        self.send(&ServerCommand::Kick, Recipients::Single(id));
        self.remove_player(id);
        true
    }

    pub fn execute_console(&mut self, line: &str) -> String {
        crate::console::execute(self, line)
    }

    pub fn list_connections(&self) -> String {
        if self.registry.is_empty() {
            return "No players connected.".to_string();
        }
        self.registry
            .iter()
            .map(|session| {
                format!(
                    "{} '{}' ping {:.0} ms, input delay {:.0} ms{}, queued {}, object {}{}\n",
                    session.id,
                    session.name(),
                    session.network_delay() * 1000.0,
                    session.total_input_delay() * 1000.0,
                    if session.is_rcon_authorized() { ", rcon" } else { "" },
                    session.input_queue().len(),
                    session
                        .controlled_object()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    if session.is_synchronized() { "" } else { " (loading)" }
                )
            })
            .collect()
    }

    /// Traffic per packet type since the previous summary.
    pub fn net_summary(&mut self) -> String {
        let summary = self
            .traffic
            .summary(self.traffic_since.elapsed().as_secs_f32());
        self.traffic.reset();
        self.traffic_since = Instant::now();
        summary
    }

    fn send(&mut self, command: &ServerCommand, recipients: Recipients) {
        let frame = match command.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode {:?}: {}", command.tag(), e);
                return;
            }
        };
        let options = command.network_options();

        for addr in self.registry.recipients(recipients) {
            self.traffic.account(Direction::Outgoing, &frame);
            let outgoing = Outgoing {
                addr,
                frame: frame.clone(),
                options,
            };
            if self.outbox.send(outgoing).is_err() {
                warn!("Outgoing queue closed, dropping {:?}", command.tag());
                return;
            }
        }
    }
}

fn create_object_command(object: &dyn Replicable, timestamp: u32) -> ServerCommand {
    ServerCommand::CreateGameObject {
        timestamp,
        id: object.id(),
        type_name: object.type_name().to_string(),
        init_values: object.write_init_values(),
        state: object.write_state(StateKind::Both),
    }
}
