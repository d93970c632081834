// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Common error types for the runtime

use crate::common::config::DataMode;
use std::time::Duration;

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Error type shared by both planes and the lifecycle coordinator.
///
/// Configuration and startup errors are returned synchronously from
/// `start`/`connect`. Faults inside a running worker loop are logged where
/// they occur and surface through `is_running()`/`is_connected()` flipping
/// to false; they are never thrown at the caller.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Malformed address or out-of-range tunable; raised before any
    /// resource is allocated
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Client-role connection was not established within the bounded wait
    #[error("connection not established within {timeout:?}")]
    ConnectTimeout { timeout: Duration },

    /// A worker failed to bind/listen/connect; the whole session was
    /// rolled back
    #[error("startup failed: {0}")]
    StartupFailure(String),

    /// Operation attempted while the session is inactive
    #[error("runtime is not active")]
    NotRunning,

    /// Outbound buffer rejected due to backpressure
    #[error("outbound queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Steady-state failure in a worker after activation
    #[error("transport fault: {0}")]
    TransportFault(String),

    /// Empty payloads are never accepted for send
    #[error("payload must not be empty")]
    EmptyPayload,

    /// Payload exceeds the configured size limit
    #[error("message too large: {size} bytes (max {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    /// Operation not legal for the configured data-plane mode
    #[error("{operation} is not supported in {mode:?} mode")]
    ModeNotSupported {
        mode: DataMode,
        operation: &'static str,
    },

    /// A bounded wait on the control plane elapsed
    #[error("operation timed out")]
    Timeout,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// ZMQ error
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zmq::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_full_display() {
        let err = RuntimeError::QueueFull { capacity: 8 };
        assert_eq!(err.to_string(), "outbound queue is full (capacity 8)");
    }

    #[test]
    fn test_mode_not_supported_display() {
        let err = RuntimeError::ModeNotSupported {
            mode: DataMode::Subscribe,
            operation: "send",
        };
        assert!(err.to_string().contains("send"));
        assert!(err.to_string().contains("Subscribe"));
    }
}
