use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{DEFAULT_COMMAND_BUFFER, DEFAULT_EVENT_BUFFER};

/// Session task channel sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Commands queued before callers wait for the session task.
    pub command_buffer: usize,
    /// Events a slow subscriber can fall behind before it loses the oldest.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            command_buffer: DEFAULT_COMMAND_BUFFER,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}
