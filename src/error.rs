//! Error types shared by the scan and connection sessions.

use thiserror::Error;
use uuid::Uuid;

use crate::core::bluetooth::types::ConnectionState;

/// Errors reported by the session core.
///
/// Local precondition failures are reported before any radio request is
/// issued. Asynchronous radio failures arrive on the session event channel
/// and never cross the async boundary as a return value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("bluetooth radio is unavailable or disabled")]
    RadioUnavailable,

    #[error("discovery failed with code {0}")]
    DiscoveryFailed(i32),

    #[error("connection failed with code {0}")]
    ConnectionFailed(i32),

    #[error("connection lost with code {0}")]
    ConnectionLost(i32),

    #[error("attribute discovery failed with code {0}")]
    AttributeDiscoveryFailed(i32),

    #[error("attribute {0} not found in the current session")]
    AttributeNotFound(Uuid),

    #[error("attribute {0} is not readable")]
    AttributeNotReadable(Uuid),

    #[error("attribute {0} is not writable")]
    AttributeNotWritable(Uuid),

    #[error("operation on attribute {id} rejected with code {code}")]
    OperationRejected { id: Uuid, code: i32 },

    #[error("no connected session")]
    NotConnected,

    #[error("session busy: already {0}")]
    SessionBusy(ConnectionState),

    #[error("bluetooth session has shut down")]
    SessionClosed,
}

/// Synchronous rejection of a request by a radio implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("radio request failed with code {code}: {message}")]
pub struct RadioError {
    pub code: i32,
    pub message: String,
}

impl RadioError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ble_error_display() {
        let err = BleError::DiscoveryFailed(2);
        assert_eq!(err.to_string(), "discovery failed with code 2");

        let id = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
        let err = BleError::OperationRejected { id, code: 3 };
        assert_eq!(
            err.to_string(),
            "operation on attribute 00002a19-0000-1000-8000-00805f9b34fb rejected with code 3"
        );

        let err = BleError::SessionBusy(ConnectionState::Connecting);
        assert_eq!(err.to_string(), "session busy: already connecting");
    }

    #[test]
    fn test_radio_error_display() {
        let err = RadioError::new(257, "adapter off");
        assert_eq!(err.to_string(), "radio request failed with code 257: adapter off");
    }
}
