//! # Shared Protocol Library
//!
//! Types and wire formats used by both ends of a replication session:
//!
//! - `sequence`: wrapping input sequence numbers and their signed distance
//! - `input`: the controller snapshot a client samples every physics step
//! - `commands`: typed client and server commands with delivery options
//! - `codec`: framing, string limits and per-tag traffic accounting
//!
//! Frames are plain byte vectors so that any datagram transport can carry
//! them. The server crate uses UDP via tokio.

pub mod codec;
pub mod commands;
pub mod input;
pub mod sequence;

pub use codec::{CodecError, Direction, TrafficStats, MAX_FRAME_SIZE, MAX_STRING_LEN};
pub use commands::{
    Channel, ClientCommand, NetworkOptions, PacketTag, Priority, Reliability, ServerCommand,
    StateKind, StringMessageKind, VersionInfo,
};
pub use input::{KeyState, PlayerInput};
pub use sequence::{seq_difference, seq_newer, SequenceNumber};

/// Identifier of a replicated game object, unique within a level.
pub type GameObjectId = u16;

pub const GAME_NAME: &str = "replicast";
pub const PROTOCOL_MAJOR: u16 = 1;
pub const PROTOCOL_MINOR: u16 = 0;

/// Name given to players who never sent a valid one.
pub const DEFAULT_PLAYER_NAME: &str = "Player";
