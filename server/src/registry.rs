//! Registry of admitted sessions
//!
//! Owns every connected player's session and answers questions about
//! the roster:
//! - Capacity and level-readiness gating for new connections
//! - Lookup by network identity
//! - Fan-out target lists for unicast and broadcast commands
//! - Unique display names and silent peer detection
//!
//! Sessions are kept in admission order so that broadcasts reach peers
//! in a stable order.

use crate::error::AdmissionError;
use crate::session::Session;
use log::{debug, info};
use std::net::SocketAddr;
use std::time::Duration;

/// Target set of an outgoing command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// One peer, whether or not it has been admitted yet.
    Single(SocketAddr),
    /// Every session, optionally skipping one.
    All { except: Option<SocketAddr> },
    /// Every synchronized session, optionally skipping one.
    Ready { except: Option<SocketAddr> },
}

pub struct SessionRegistry {
    /// Admitted sessions in admission order
    sessions: Vec<Session>,
    /// Maximum number of concurrent sessions
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(max_sessions),
            max_sessions,
        }
    }

    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Checks whether `id` could be admitted right now.
    ///
    /// Capacity is checked against the full roster, including a stale
    /// session registered under `id`.
    pub fn check_admission(&self, id: SocketAddr, level_loaded: bool) -> Result<(), AdmissionError> {
        if self.sessions.len() >= self.max_sessions {
            debug!("No room for {}", id);
            return Err(AdmissionError::ServerFull);
        }
        if !level_loaded {
            return Err(AdmissionError::NoLevelLoaded);
        }
        Ok(())
    }

    /// Registers a new session at the end of the roster.
    pub fn insert(&mut self, session: Session) -> Result<(), AdmissionError> {
        if self.contains(session.id) {
            return Err(AdmissionError::DuplicateSession);
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(AdmissionError::ServerFull);
        }

        info!("Session {} admitted", session.id);
        self.sessions.push(session);
        Ok(())
    }

    /// Removes a session, returning it if it was registered.
    pub fn remove(&mut self, id: SocketAddr) -> Option<Session> {
        match self.sessions.iter().position(|session| session.id == id) {
            Some(index) => {
                info!("Session {} removed", id);
                Some(self.sessions.remove(index))
            }
            None => {
                debug!("Session {} was not registered", id);
                None
            }
        }
    }

    pub fn contains(&self, id: SocketAddr) -> bool {
        self.sessions.iter().any(|session| session.id == id)
    }

    pub fn get(&self, id: SocketAddr) -> Option<&Session> {
        self.sessions.iter().find(|session| session.id == id)
    }

    pub fn get_mut(&mut self, id: SocketAddr) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.iter_mut()
    }

    pub fn ids(&self) -> Vec<SocketAddr> {
        self.sessions.iter().map(|session| session.id).collect()
    }

    /// Finds the session steering the given object.
    pub fn find_by_controllable(&self, object: shared::GameObjectId) -> Option<SocketAddr> {
        self.sessions
            .iter()
            .find(|session| session.controlled_object() == Some(object))
            .map(|session| session.id)
    }

    /// Expands a recipient set into concrete addresses.
    pub fn recipients(&self, recipients: Recipients) -> Vec<SocketAddr> {
        match recipients {
            Recipients::Single(addr) => vec![addr],
            Recipients::All { except } => self
                .sessions
                .iter()
                .filter(|session| Some(session.id) != except)
                .map(|session| session.id)
                .collect(),
            Recipients::Ready { except } => self
                .sessions
                .iter()
                .filter(|session| session.is_synchronized() && Some(session.id) != except)
                .map(|session| session.id)
                .collect(),
        }
    }

    /// Returns `desired`, or `desired (N)` if another session already uses it.
    ///
    /// N is one more than the highest suffix currently in use for that
    /// base name; a bare `desired` counts as suffix 0.
    pub fn unique_name(&self, desired: &str, for_id: SocketAddr) -> String {
        let suffix_prefix = format!("{} (", desired);
        let highest = self
            .sessions
            .iter()
            .filter(|session| session.id != for_id)
            .filter_map(|session| {
                let name = session.name();
                if name == desired {
                    return Some(0);
                }
                name.strip_prefix(&suffix_prefix)?
                    .strip_suffix(')')?
                    .parse::<u32>()
                    .ok()
            })
            .max();

        match highest {
            Some(index) => format!("{} ({})", desired, index + 1),
            None => desired.to_string(),
        }
    }

    /// Lists sessions that have been silent for longer than `timeout`.
    ///
    /// The sessions stay registered; removal goes through the driver so
    /// that the other players are told.
    pub fn check_timeouts(&self, timeout: Duration) -> Vec<SocketAddr> {
        self.sessions
            .iter()
            .filter(|session| session.is_timed_out(timeout))
            .map(|session| session.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
