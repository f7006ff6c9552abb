//! # Replication Server Library
//!
//! This library provides the authoritative server of a networked multiplayer
//! game. It owns the canonical world, replays each player's delayed input
//! at the pace the client produced it, and fans the resulting state back out
//! to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the world. Clients predict
//! locally and receive corrections whenever the server consumes their input.
//!
//! ### Input Reconciliation
//! Clients send input samples stamped with a wrapping sequence number. The
//! gap between two consecutive numbers tells the server how many physics
//! steps a sample was held for, so each session's queue replays samples at
//! exactly that pace. Backed up queues are sped up or collapsed; duplicates,
//! stale samples and implausible jumps are dropped.
//!
//! ### State Broadcasting
//! Object state is split in two parts:
//! - Core state (position, velocity) streams unreliably to every session that
//!   finished loading, except to the owner of a controllable object
//! - Extra state goes out reliably, once, whenever an object marks it dirty
//!
//! Objects that fall asleep send one final full update and then stop
//! streaming until they wake up again.
//!
//! ## Module Organization
//!
//! ### Input Queue (`input_queue`) and Session (`session`)
//! Per connection state: the input queue, network delay estimate, pending
//! level load acknowledgments, rcon authorization and chat flood budget.
//!
//! ### Registry (`registry`)
//! Ordered roster of sessions with admission control, recipient expansion,
//! name disambiguation and timeout detection.
//!
//! ### Game (`game`), Physics (`physics`) and Logic (`logic`)
//! The replicated object registry, a reference rigid body, and the pluggable
//! game rules created by name from a [`logic::LogicFactory`].
//!
//! ### Driver (`driver`)
//! The [`driver::ReplicationDriver`] ties everything together: admission,
//! controllable binding, level loading, the physics step, state broadcast,
//! chat, player names and remote administration.
//!
//! ### Network (`network`) and Console (`console`)
//! The tokio UDP loop that feeds the driver at fixed rates, and the
//! administrative commands available on stdin and through rcon.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::logic::LogicFactory;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         listen_addr: "127.0.0.1:8080".to_string(),
//!         ..Default::default()
//!     };
//!     let mut server = Server::new(config, LogicFactory::default()).await?;
//!     server.driver_mut().load_level("arena", "Sandbox")?;
//!
//!     // Runs until shutdown:
//!     // - drains datagrams at the network rate
//!     // - replays queued input and steps the world at the physics rate
//!     // - broadcasts object state at the game state rate
//!     // - sweeps timed out sessions once per second
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod driver;
pub mod error;
pub mod game;
pub mod input_queue;
pub mod logic;
pub mod network;
pub mod physics;
pub mod registry;
pub mod session;
pub mod utils;
