//! Typed protocol commands exchanged between server and clients.
//!
//! Each command knows its packet tag, its delivery options and how to
//! write itself into a frame. Decoding returns `Ok(None)` for tags that
//! the receiving side does not understand so callers can log and move on.

use crate::codec::{check_string, clamp_string, CodecError, Frame, FrameWriter};
use crate::input::PlayerInput;
use crate::sequence::SequenceNumber;
use crate::{GameObjectId, GAME_NAME, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    Unreliable,
    Reliable,
    ReliableOrdered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Ordering channel. Ordered commands on the same channel arrive in the
/// order they were sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    DontCare = 0,
    Chat = 1,
    GameState = 2,
}

/// Delivery contract of a command, handed to the transport with each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOptions {
    pub reliability: Reliability,
    pub priority: Priority,
    pub channel: Channel,
}

impl NetworkOptions {
    pub const fn new(reliability: Reliability, priority: Priority, channel: Channel) -> Self {
        Self {
            reliability,
            priority,
            channel,
        }
    }

    pub fn is_reliable(&self) -> bool {
        self.reliability != Reliability::Unreliable
    }

    pub fn is_ordered(&self) -> bool {
        self.reliability == Reliability::ReliableOrdered
    }
}

const UNRELIABLE_LOW: NetworkOptions =
    NetworkOptions::new(Reliability::Unreliable, Priority::Low, Channel::DontCare);
const RELIABLE_LOW: NetworkOptions =
    NetworkOptions::new(Reliability::Reliable, Priority::Low, Channel::DontCare);
const ORDERED_GAMESTATE: NetworkOptions = NetworkOptions::new(
    Reliability::ReliableOrdered,
    Priority::Medium,
    Channel::GameState,
);

/// One byte packet identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PacketTag {
    Chat = 0x40,
    VersionInfo,
    ConnectionDenied,
    Disconnect,
    LoadLevel,
    SetPlayerData,
    CreatePlayer,
    DeletePlayer,
    SetControllable,
    SetControllableState,
    CreateGameObject,
    DeleteGameObject,
    SetGameObjectStateCore,
    SetGameObjectStateExtra,
    SetGameObjectStateBoth,
    PlayerInput,
    ResetGame,
    RconCommand,
    StringMessage,
    RequestReady,
    Ready,
    Kick,
    CustomServer,
    CustomClient,
}

impl PacketTag {
    const ALL: [PacketTag; 24] = [
        PacketTag::Chat,
        PacketTag::VersionInfo,
        PacketTag::ConnectionDenied,
        PacketTag::Disconnect,
        PacketTag::LoadLevel,
        PacketTag::SetPlayerData,
        PacketTag::CreatePlayer,
        PacketTag::DeletePlayer,
        PacketTag::SetControllable,
        PacketTag::SetControllableState,
        PacketTag::CreateGameObject,
        PacketTag::DeleteGameObject,
        PacketTag::SetGameObjectStateCore,
        PacketTag::SetGameObjectStateExtra,
        PacketTag::SetGameObjectStateBoth,
        PacketTag::PlayerInput,
        PacketTag::ResetGame,
        PacketTag::RconCommand,
        PacketTag::StringMessage,
        PacketTag::RequestReady,
        PacketTag::Ready,
        PacketTag::Kick,
        PacketTag::CustomServer,
        PacketTag::CustomClient,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        let first = PacketTag::Chat as u8;
        value
            .checked_sub(first)
            .and_then(|index| Self::ALL.get(index as usize))
            .copied()
    }
}

/// Which portion of an object's state a state update carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateKind {
    /// Frequently changing simulation state, sent unreliably.
    Core,
    /// Rarely changing state, sent reliably when dirty.
    Extra,
    Both,
}

impl StateKind {
    fn tag(self) -> PacketTag {
        match self {
            StateKind::Core => PacketTag::SetGameObjectStateCore,
            StateKind::Extra => PacketTag::SetGameObjectStateExtra,
            StateKind::Both => PacketTag::SetGameObjectStateBoth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StringMessageKind {
    Chat,
    TeamChat,
    PlayerName,
    RconResponse,
}

/// Protocol version exchanged during the connection handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub game: String,
    pub major: u16,
    pub minor: u16,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            game: GAME_NAME.to_string(),
            major: PROTOCOL_MAJOR,
            minor: PROTOCOL_MINOR,
        }
    }

    /// Peers can talk if they run the same game with the same major version.
    pub fn is_compatible(&self, other: &VersionInfo) -> bool {
        self.game == other.game && self.major == other.major
    }
}

/// Commands sent from a client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    VersionInfo(VersionInfo),
    Disconnect,
    PlayerInput {
        timestamp: u32,
        sequence: SequenceNumber,
        input: PlayerInput,
    },
    Rcon {
        command: String,
    },
    Chat {
        message: String,
    },
    SetPlayerData {
        name: String,
        ranking_id: u32,
        session_key: u32,
    },
    Custom {
        kind: u8,
        payload: Vec<u8>,
    },
    Ready,
}

impl ClientCommand {
    pub fn tag(&self) -> PacketTag {
        match self {
            ClientCommand::VersionInfo(_) => PacketTag::VersionInfo,
            ClientCommand::Disconnect => PacketTag::Disconnect,
            ClientCommand::PlayerInput { .. } => PacketTag::PlayerInput,
            ClientCommand::Rcon { .. } => PacketTag::RconCommand,
            ClientCommand::Chat { .. } => PacketTag::Chat,
            ClientCommand::SetPlayerData { .. } => PacketTag::SetPlayerData,
            ClientCommand::Custom { .. } => PacketTag::CustomClient,
            ClientCommand::Ready => PacketTag::Ready,
        }
    }

    pub fn network_options(&self) -> NetworkOptions {
        match self {
            ClientCommand::PlayerInput { .. } => UNRELIABLE_LOW,
            ClientCommand::Rcon { .. }
            | ClientCommand::Chat { .. }
            | ClientCommand::SetPlayerData { .. } => RELIABLE_LOW,
            ClientCommand::VersionInfo(_) => NetworkOptions::new(
                Reliability::ReliableOrdered,
                Priority::High,
                Channel::GameState,
            ),
            ClientCommand::Disconnect | ClientCommand::Custom { .. } | ClientCommand::Ready => {
                ORDERED_GAMESTATE
            }
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let tag = self.tag();
        match self {
            ClientCommand::VersionInfo(version) => FrameWriter::new(tag).payload(version),
            ClientCommand::Disconnect | ClientCommand::Ready => Ok(FrameWriter::new(tag).finish()),
            ClientCommand::PlayerInput {
                timestamp,
                sequence,
                input,
            } => FrameWriter::with_timestamp(*timestamp, tag).payload(&(sequence, input)),
            ClientCommand::Rcon { command } => FrameWriter::new(tag).payload(clamp_string(command)),
            ClientCommand::Chat { message } => FrameWriter::new(tag).payload(clamp_string(message)),
            ClientCommand::SetPlayerData {
                name,
                ranking_id,
                session_key,
            } => FrameWriter::new(tag).payload(&(clamp_string(name), ranking_id, session_key)),
            ClientCommand::Custom { kind, payload } => {
                FrameWriter::new(tag).payload(&(kind, payload))
            }
        }
    }

    /// Parses a client frame. Server-bound tags only; anything else is `Ok(None)`.
    pub fn decode(data: &[u8]) -> Result<Option<Self>, CodecError> {
        let frame = Frame::split(data)?;
        let Some(tag) = frame.packet_tag() else {
            return Ok(None);
        };

        let command = match tag {
            PacketTag::VersionInfo => ClientCommand::VersionInfo(frame.read()?),
            PacketTag::Disconnect => ClientCommand::Disconnect,
            PacketTag::Ready => ClientCommand::Ready,
            PacketTag::PlayerInput => {
                let timestamp = frame.require_timestamp(tag)?;
                let (sequence, input) = frame.read()?;
                ClientCommand::PlayerInput {
                    timestamp,
                    sequence,
                    input,
                }
            }
            PacketTag::RconCommand => ClientCommand::Rcon {
                command: check_string(frame.read()?)?,
            },
            PacketTag::Chat => ClientCommand::Chat {
                message: check_string(frame.read()?)?,
            },
            PacketTag::SetPlayerData => {
                let (name, ranking_id, session_key) = frame.read()?;
                ClientCommand::SetPlayerData {
                    name: check_string(name)?,
                    ranking_id,
                    session_key,
                }
            }
            PacketTag::CustomClient => {
                let (kind, payload) = frame.read()?;
                ClientCommand::Custom { kind, payload }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

/// Commands sent from the server to clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
    VersionInfo(VersionInfo),
    ConnectionDenied {
        reason: String,
    },
    LoadLevel {
        level_name: String,
        logic_type: String,
    },
    CreatePlayer {
        player: SocketAddr,
    },
    DeletePlayer {
        player: SocketAddr,
    },
    SetControllable {
        player: SocketAddr,
        object: Option<GameObjectId>,
    },
    /// Authoritative state of the controlled object, valid before the
    /// step with the given sequence number is simulated.
    SetControllableState {
        sequence: SequenceNumber,
        state: Vec<u8>,
    },
    CreateGameObject {
        timestamp: u32,
        id: GameObjectId,
        type_name: String,
        init_values: Vec<u8>,
        state: Vec<u8>,
    },
    DeleteGameObject {
        id: GameObjectId,
    },
    SetGameObjectState {
        timestamp: u32,
        kind: StateKind,
        id: GameObjectId,
        state: Vec<u8>,
    },
    StringMessage {
        kind: StringMessageKind,
        message: String,
        player: Option<SocketAddr>,
    },
    ResetGame,
    RequestReady,
    Kick,
    Custom {
        kind: u8,
        payload: Vec<u8>,
    },
}

impl ServerCommand {
    pub fn tag(&self) -> PacketTag {
        match self {
            ServerCommand::VersionInfo(_) => PacketTag::VersionInfo,
            ServerCommand::ConnectionDenied { .. } => PacketTag::ConnectionDenied,
            ServerCommand::LoadLevel { .. } => PacketTag::LoadLevel,
            ServerCommand::CreatePlayer { .. } => PacketTag::CreatePlayer,
            ServerCommand::DeletePlayer { .. } => PacketTag::DeletePlayer,
            ServerCommand::SetControllable { .. } => PacketTag::SetControllable,
            ServerCommand::SetControllableState { .. } => PacketTag::SetControllableState,
            ServerCommand::CreateGameObject { .. } => PacketTag::CreateGameObject,
            ServerCommand::DeleteGameObject { .. } => PacketTag::DeleteGameObject,
            ServerCommand::SetGameObjectState { kind, .. } => kind.tag(),
            ServerCommand::StringMessage { .. } => PacketTag::StringMessage,
            ServerCommand::ResetGame => PacketTag::ResetGame,
            ServerCommand::RequestReady => PacketTag::RequestReady,
            ServerCommand::Kick => PacketTag::Kick,
            ServerCommand::Custom { .. } => PacketTag::CustomServer,
        }
    }

    pub fn network_options(&self) -> NetworkOptions {
        match self {
            ServerCommand::VersionInfo(_) | ServerCommand::ConnectionDenied { .. } => {
                NetworkOptions::new(
                    Reliability::ReliableOrdered,
                    Priority::High,
                    Channel::GameState,
                )
            }
            ServerCommand::SetControllableState { .. } => {
                NetworkOptions::new(Reliability::Reliable, Priority::High, Channel::DontCare)
            }
            ServerCommand::SetGameObjectState {
                kind: StateKind::Core,
                ..
            } => UNRELIABLE_LOW,
            ServerCommand::StringMessage {
                kind: StringMessageKind::RconResponse,
                ..
            } => RELIABLE_LOW,
            ServerCommand::StringMessage { .. } => {
                NetworkOptions::new(Reliability::ReliableOrdered, Priority::Low, Channel::Chat)
            }
            _ => ORDERED_GAMESTATE,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let tag = self.tag();
        match self {
            ServerCommand::VersionInfo(version) => FrameWriter::new(tag).payload(version),
            ServerCommand::ConnectionDenied { reason } => {
                FrameWriter::new(tag).payload(clamp_string(reason))
            }
            ServerCommand::LoadLevel {
                level_name,
                logic_type,
            } => FrameWriter::new(tag).payload(&(clamp_string(level_name), clamp_string(logic_type))),
            ServerCommand::CreatePlayer { player } | ServerCommand::DeletePlayer { player } => {
                FrameWriter::new(tag).payload(player)
            }
            ServerCommand::SetControllable { player, object } => {
                FrameWriter::new(tag).payload(&(player, object))
            }
            ServerCommand::SetControllableState { sequence, state } => {
                FrameWriter::new(tag).payload(&(sequence, state))
            }
            ServerCommand::CreateGameObject {
                timestamp,
                id,
                type_name,
                init_values,
                state,
            } => FrameWriter::with_timestamp(*timestamp, tag).payload(&(
                id,
                clamp_string(type_name),
                init_values,
                state,
            )),
            ServerCommand::DeleteGameObject { id } => FrameWriter::new(tag).payload(id),
            ServerCommand::SetGameObjectState {
                timestamp,
                id,
                state,
                ..
            } => FrameWriter::with_timestamp(*timestamp, tag).payload(&(id, state)),
            ServerCommand::StringMessage {
                kind,
                message,
                player,
            } => FrameWriter::new(tag).payload(&(kind, clamp_string(message), player)),
            ServerCommand::ResetGame | ServerCommand::RequestReady | ServerCommand::Kick => {
                Ok(FrameWriter::new(tag).finish())
            }
            ServerCommand::Custom { kind, payload } => {
                FrameWriter::new(tag).payload(&(kind, payload))
            }
        }
    }

    /// Parses a server frame. Client-bound tags only; anything else is `Ok(None)`.
    pub fn decode(data: &[u8]) -> Result<Option<Self>, CodecError> {
        let frame = Frame::split(data)?;
        let Some(tag) = frame.packet_tag() else {
            return Ok(None);
        };

        let command = match tag {
            PacketTag::VersionInfo => ServerCommand::VersionInfo(frame.read()?),
            PacketTag::ConnectionDenied => ServerCommand::ConnectionDenied {
                reason: check_string(frame.read()?)?,
            },
            PacketTag::LoadLevel => {
                let (level_name, logic_type) = frame.read()?;
                ServerCommand::LoadLevel {
                    level_name: check_string(level_name)?,
                    logic_type: check_string(logic_type)?,
                }
            }
            PacketTag::CreatePlayer => ServerCommand::CreatePlayer {
                player: frame.read()?,
            },
            PacketTag::DeletePlayer => ServerCommand::DeletePlayer {
                player: frame.read()?,
            },
            PacketTag::SetControllable => {
                let (player, object) = frame.read()?;
                ServerCommand::SetControllable { player, object }
            }
            PacketTag::SetControllableState => {
                let (sequence, state) = frame.read()?;
                ServerCommand::SetControllableState { sequence, state }
            }
            PacketTag::CreateGameObject => {
                let timestamp = frame.require_timestamp(tag)?;
                let (id, type_name, init_values, state) = frame.read()?;
                ServerCommand::CreateGameObject {
                    timestamp,
                    id,
                    type_name: check_string(type_name)?,
                    init_values,
                    state,
                }
            }
            PacketTag::DeleteGameObject => ServerCommand::DeleteGameObject { id: frame.read()? },
            PacketTag::SetGameObjectStateCore
            | PacketTag::SetGameObjectStateExtra
            | PacketTag::SetGameObjectStateBoth => {
                let kind = match tag {
                    PacketTag::SetGameObjectStateCore => StateKind::Core,
                    PacketTag::SetGameObjectStateExtra => StateKind::Extra,
                    _ => StateKind::Both,
                };
                let timestamp = frame.require_timestamp(tag)?;
                let (id, state) = frame.read()?;
                ServerCommand::SetGameObjectState {
                    timestamp,
                    kind,
                    id,
                    state,
                }
            }
            PacketTag::StringMessage => {
                let (kind, message, player) = frame.read()?;
                ServerCommand::StringMessage {
                    kind,
                    message: check_string(message)?,
                    player,
                }
            }
            PacketTag::ResetGame => ServerCommand::ResetGame,
            PacketTag::RequestReady => ServerCommand::RequestReady,
            PacketTag::Kick => ServerCommand::Kick,
            PacketTag::CustomServer => {
                let (kind, payload) = frame.read()?;
                ServerCommand::Custom { kind, payload }
            }
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}
