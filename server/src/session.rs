//! Server-side state of one connected player.

use crate::input_queue::{InputQueue, QueuePolicy, TickOutcome};
use log::warn;
use shared::{GameObjectId, PlayerInput, SequenceNumber};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Requests a session may have in flight before further ones are refused.
pub const MAX_ANNOYING_REQUESTS: u8 = 4;

/// Represents a connected player.
///
/// A session tracks:
/// - Identity, display name and authentication data
/// - The game object it steers, if any, and the input queue feeding it
/// - Level load handshakes that still await an acknowledgment
/// - Flood and remote administration state
#[derive(Debug)]
pub struct Session {
    /// Network address doubling as the player's identity
    pub id: SocketAddr,
    /// Last time any packet arrived from this peer
    pub last_seen: Instant,
    name: String,
    controlled_object: Option<GameObjectId>,
    input_queue: InputQueue,
    network_delay: f32,
    rcon_authorized: bool,
    pending_readies: u8,
    annoying_requests: u8,
    ranking_id: u32,
    session_key: u32,
}

impl Session {
    pub fn new(id: SocketAddr, policy: QueuePolicy) -> Self {
        Self {
            id,
            last_seen: Instant::now(),
            name: String::new(),
            controlled_object: None,
            input_queue: InputQueue::new(policy),
            network_delay: 0.0,
            rcon_authorized: false,
            pending_readies: 0,
            annoying_requests: 0,
            ranking_id: 0,
            session_key: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn controlled_object(&self) -> Option<GameObjectId> {
        self.controlled_object
    }

    /// Rebinds the session to another object. Queued input belonged to
    /// the old object and is discarded.
    pub fn bind_controllable(&mut self, object: Option<GameObjectId>) {
        self.controlled_object = object;
        self.input_queue.clear();
    }

    pub fn input_queue(&self) -> &InputQueue {
        &self.input_queue
    }

    pub fn enqueue_input(&mut self, sequence: SequenceNumber, input: PlayerInput) -> bool {
        self.input_queue.enqueue(sequence, input)
    }

    /// Pops the next input for this server step.
    pub fn advance_input(&mut self) -> TickOutcome {
        self.input_queue.advance_one_tick(self.network_delay)
    }

    /// Latest one way delay measurement in seconds.
    pub fn network_delay(&self) -> f32 {
        self.network_delay
    }

    pub fn set_network_delay(&mut self, delay: f32) {
        self.network_delay = delay.max(0.0);
    }

    /// Network delay plus the time input spends queued on the server.
    pub fn total_input_delay(&self) -> f32 {
        self.input_queue.smoothed_delay()
    }

    pub fn is_rcon_authorized(&self) -> bool {
        self.rcon_authorized
    }

    pub fn set_rcon_authorized(&mut self, authorized: bool) {
        self.rcon_authorized = authorized;
    }

    pub fn pending_readies(&self) -> u8 {
        self.pending_readies
    }

    /// A session is synchronized once every level load it was asked to
    /// perform has been acknowledged.
    pub fn is_synchronized(&self) -> bool {
        self.pending_readies == 0
    }

    pub fn request_ready(&mut self) {
        self.pending_readies = self.pending_readies.saturating_add(1);
    }

    /// Acknowledges one handshake. Returns true when none remain.
    pub fn acknowledge_ready(&mut self) -> bool {
        if self.pending_readies == 0 {
            warn!("{} acknowledged a level load that was never requested", self.id);
            return true;
        }
        self.pending_readies -= 1;
        self.pending_readies == 0
    }

    pub fn allow_annoying_request(&self) -> bool {
        self.annoying_requests < MAX_ANNOYING_REQUESTS
    }

    pub fn inc_annoying_requests(&mut self) {
        self.annoying_requests = self.annoying_requests.saturating_add(1);
    }

    pub fn dec_annoying_requests(&mut self) {
        self.annoying_requests = self.annoying_requests.saturating_sub(1);
    }

    pub fn set_auth_data(&mut self, ranking_id: u32, session_key: u32) {
        self.ranking_id = ranking_id;
        self.session_key = session_key;
    }

    pub fn ranking_id(&self) -> u32 {
        self.ranking_id
    }

    pub fn session_key(&self) -> u32 {
        self.session_key
    }

    pub fn refresh_last_seen(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the session has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}
