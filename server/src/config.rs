//! Runtime tunables of the replication server.

use crate::error::ConfigError;
use crate::input_queue::QueuePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub server_name: String,
    pub max_connections: usize,
    /// Input samples a session may buffer before the queue is collapsed.
    pub max_input_deque_size: usize,
    pub physics_fps: f32,
    pub send_gamestate_fps: f32,
    pub network_fps: f32,
    /// Empty disables remote administration.
    pub rcon_password: String,
    pub client_timeout_secs: u64,
    /// Send corrections only on every second advancing tick.
    pub network_optimizations: bool,
    /// Consecutive backed-up ticks before a session's input is sped up.
    pub overfull_threshold: u32,
    pub delay_tracking_speed: f32,
    /// Largest forward sequence jump accepted as a plausible new sample.
    pub max_input_seq_jump: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            server_name: "Replication Server".to_string(),
            max_connections: 8,
            max_input_deque_size: 10,
            physics_fps: 60.0,
            send_gamestate_fps: 20.0,
            network_fps: 100.0,
            rcon_password: String::new(),
            client_timeout_secs: 10,
            network_optimizations: true,
            overfull_threshold: 10,
            delay_tracking_speed: 0.01,
            max_input_seq_jump: 50,
        }
    }
}

impl ServerConfig {
    /// Rejects settings that would break the timers or the input queues.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("physics_fps", self.physics_fps),
            ("send_gamestate_fps", self.send_gamestate_fps),
            ("network_fps", self.network_fps),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidRate { name, value });
            }
        }
        if self.max_input_deque_size == 0 {
            return Err(ConfigError::EmptyInputQueue);
        }
        Ok(())
    }

    /// Fixed simulation timestep in seconds.
    pub fn physics_dt(&self) -> f32 {
        1.0 / self.physics_fps
    }

    pub fn physics_interval(&self) -> Duration {
        Duration::from_secs_f32(self.physics_dt())
    }

    pub fn gamestate_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.send_gamestate_fps)
    }

    pub fn network_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.network_fps)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }

    pub fn rcon_enabled(&self) -> bool {
        !self.rcon_password.is_empty()
    }

    pub fn queue_policy(&self) -> QueuePolicy {
        QueuePolicy {
            max_size: self.max_input_deque_size,
            overfull_threshold: self.overfull_threshold,
            max_seq_jump: self.max_input_seq_jump,
            delay_tracking_speed: self.delay_tracking_speed,
            step_dt: self.physics_dt(),
            network_optimizations: self.network_optimizations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.max_input_deque_size, 10);
        assert!(config.network_optimizations);
        assert!(!config.rcon_enabled());
    }

    #[test]
    fn test_validate_rejects_non_positive_rates() {
        assert!(ServerConfig::default().validate().is_ok());

        let stopped = ServerConfig {
            physics_fps: 0.0,
            ..Default::default()
        };
        assert_eq!(
            stopped.validate(),
            Err(ConfigError::InvalidRate {
                name: "physics_fps",
                value: 0.0
            })
        );

        let negative = ServerConfig {
            network_fps: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            negative.validate(),
            Err(ConfigError::InvalidRate { name: "network_fps", .. })
        ));

        let no_queue = ServerConfig {
            max_input_deque_size: 0,
            ..Default::default()
        };
        assert_eq!(no_queue.validate(), Err(ConfigError::EmptyInputQueue));
    }

    #[test]
    fn test_intervals() {
        let config = ServerConfig {
            physics_fps: 50.0,
            send_gamestate_fps: 10.0,
            ..Default::default()
        };
        assert_approx_eq!(config.physics_dt(), 0.02);
        assert_eq!(config.physics_interval(), Duration::from_millis(20));
        assert_eq!(config.gamestate_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_queue_policy_follows_config() {
        let config = ServerConfig {
            max_input_deque_size: 4,
            network_optimizations: false,
            ..Default::default()
        };
        let policy = config.queue_policy();
        assert_eq!(policy.max_size, 4);
        assert!(!policy.network_optimizations);
        assert_approx_eq!(policy.step_dt, config.physics_dt());
    }
}
