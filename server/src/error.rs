use thiserror::Error;

/// Reasons a connecting peer is not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("server is full")]
    ServerFull,
    #[error("no level is loaded")]
    NoLevelLoaded,
    #[error("protocol version mismatch")]
    VersionMismatch,
    #[error("session already registered")]
    DuplicateSession,
}

/// Settings the server cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive rate, got {value}")]
    InvalidRate { name: &'static str, value: f32 },
    #[error("max_input_deque_size must be at least 1")]
    EmptyInputQueue,
}

/// Failure raised by game logic or level management.
///
/// Each layer that propagates the error can append a line of context
/// with [`LogicError::add_history`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}{}", render_history(.history))]
pub struct LogicError {
    pub message: String,
    pub history: Vec<String>,
}

impl LogicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
        }
    }

    pub fn add_history(&mut self, context: impl Into<String>) {
        self.history.push(context.into());
    }

    pub fn with_history(mut self, context: impl Into<String>) -> Self {
        self.add_history(context);
        self
    }
}

fn render_history(history: &[String]) -> String {
    history
        .iter()
        .map(|entry| format!("\n  in {}", entry))
        .collect()
}
