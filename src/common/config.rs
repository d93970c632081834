// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration for both planes
//!
//! A [`RuntimeConfig`] is handed to the coordinator by value at
//! `start`/`connect` time, which makes it an immutable snapshot for the
//! lifetime of the session: later changes to the caller's own copy have no
//! effect on a running session.

use crate::common::error::{RuntimeError, RuntimeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked with each inbound data-plane payload.
///
/// Invocations are strictly sequential, on the data-plane worker's own
/// thread. A handler that blocks stalls subsequent receives and sends.
pub type ReceiveHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Data-plane socket pattern.
///
/// The mode decides which operations are legal on a session (send vs
/// receive vs both) and which ZMQ socket type backs the plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataMode {
    Publish,
    Subscribe,
    Push,
    Pull,
    Request,
    Reply,
}

impl DataMode {
    /// Whether outbound payloads may be offered in this mode
    pub fn can_send(&self) -> bool {
        matches!(
            self,
            Self::Publish | Self::Push | Self::Request | Self::Reply
        )
    }

    /// Whether the worker loop attempts receives in this mode
    pub fn can_receive(&self) -> bool {
        matches!(self, Self::Subscribe | Self::Pull | Self::Reply)
    }
}

/// Configuration for a dual-plane session.
///
/// Addresses are required; every tunable has a default. Use the `with_*`
/// builders or the `set_*` address helpers, then pass the config to
/// [`Server::start`](crate::Server::start) or
/// [`Client::connect`](crate::Client::connect).
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Control-plane endpoint, `host:port` form (a `tcp://` scheme is
    /// added when binding/connecting if none is present)
    pub sync_address: String,

    /// Data-plane endpoint, e.g. `tcp://127.0.0.1:5555` or
    /// `ipc:///tmp/name.sock`
    pub async_address: String,

    /// Data-plane socket pattern
    pub async_mode: DataMode,

    /// High-water mark for the outbound queue (and the data-plane socket)
    pub queue_capacity: usize,

    /// Linger time applied to sockets on close
    pub linger: Duration,

    /// Bounded wait for control-plane receives (replies and the serve poll)
    pub receive_timeout: Duration,

    /// Bounded wait for the client-role control-plane connection
    pub connect_timeout: Duration,

    /// Maximum accepted payload size, both planes
    pub max_message_size: usize,

    /// ZMQ context I/O threads
    pub io_threads: i32,

    /// Inbound payload callback; absent means inbound payloads are
    /// dropped after the delivery attempt
    pub on_receive: Option<ReceiveHandler>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            sync_address: String::new(),
            async_address: String::new(),
            async_mode: DataMode::Publish,
            queue_capacity: 1000,
            linger: Duration::ZERO,
            receive_timeout: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(30),
            max_message_size: 4 * 1024 * 1024,
            io_threads: 1,
            on_receive: None,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("sync_address", &self.sync_address)
            .field("async_address", &self.async_address)
            .field("async_mode", &self.async_mode)
            .field("queue_capacity", &self.queue_capacity)
            .field("linger", &self.linger)
            .field("receive_timeout", &self.receive_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("max_message_size", &self.max_message_size)
            .field("io_threads", &self.io_threads)
            .field("on_receive", &self.on_receive.as_ref().map(|_| "..."))
            .finish()
    }
}

impl RuntimeConfig {
    /// Create a config with both endpoints and defaults for everything else
    pub fn new(sync_address: impl Into<String>, async_address: impl Into<String>) -> Self {
        Self {
            sync_address: sync_address.into(),
            async_address: async_address.into(),
            ..Default::default()
        }
    }

    /// Set the control-plane TCP endpoint from host and port
    pub fn set_sync_addr(&mut self, ip: &str, port: u16) -> RuntimeResult<()> {
        if ip.is_empty() || port == 0 {
            return Err(RuntimeError::InvalidConfig(
                "control-plane ip must be non-empty and port non-zero".into(),
            ));
        }
        self.sync_address = format!("{}:{}", ip, port);
        Ok(())
    }

    /// Set the data-plane TCP endpoint from host and port
    pub fn set_async_tcp_addr(&mut self, ip: &str, port: u16) -> RuntimeResult<()> {
        if ip.is_empty() || port == 0 {
            return Err(RuntimeError::InvalidConfig(
                "data-plane ip must be non-empty and port non-zero".into(),
            ));
        }
        self.async_address = format!("tcp://{}:{}", ip, port);
        Ok(())
    }

    /// Set the data-plane IPC endpoint from a socket name
    pub fn set_async_ipc_addr(&mut self, name: &str) -> RuntimeResult<()> {
        if name.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "IPC name must not be empty".into(),
            ));
        }
        self.async_address = format!("ipc:///tmp/{}.sock", name);
        Ok(())
    }

    /// Set the data-plane mode
    pub fn with_mode(mut self, mode: DataMode) -> Self {
        self.async_mode = mode;
        self
    }

    /// Set the outbound queue capacity (high-water mark)
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set linger time on close
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Set the control-plane receive timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the client-role connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the maximum accepted payload size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the ZMQ context I/O thread count
    pub fn with_io_threads(mut self, io_threads: i32) -> Self {
        self.io_threads = io_threads;
        self
    }

    /// Install the inbound payload callback
    pub fn with_receive_handler(mut self, handler: ReceiveHandler) -> Self {
        self.on_receive = Some(handler);
        self
    }

    /// Validate addresses and numeric ranges.
    ///
    /// Called by the coordinator before any resource is allocated.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.sync_address.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "control-plane address must not be empty".into(),
            ));
        }
        if self.async_address.is_empty() {
            return Err(RuntimeError::InvalidConfig(
                "data-plane address must not be empty".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RuntimeError::InvalidConfig(
                "queue capacity must be greater than 0".into(),
            ));
        }
        if self.max_message_size == 0 {
            return Err(RuntimeError::InvalidConfig(
                "maximum message size must be greater than 0".into(),
            ));
        }
        if self.io_threads <= 0 {
            return Err(RuntimeError::InvalidConfig(
                "I/O thread count must be greater than 0".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(RuntimeError::InvalidConfig(
                "connect timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.max_message_size, 4 * 1024 * 1024);
        assert_eq!(config.async_mode, DataMode::Publish);
        assert!(config.on_receive.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_addresses() {
        let config = RuntimeConfig::new("", "tcp://127.0.0.1:5555");
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfig(_))
        ));

        let config = RuntimeConfig::new("127.0.0.1:50051", "");
        assert!(matches!(
            config.validate(),
            Err(RuntimeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_tunables() {
        let config =
            RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:5555").with_queue_capacity(0);
        assert!(config.validate().is_err());

        let config =
            RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:5555").with_max_message_size(0);
        assert!(config.validate().is_err());

        let config =
            RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:5555").with_io_threads(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_address_setters() {
        let mut config = RuntimeConfig::default();
        config.set_sync_addr("0.0.0.0", 50051).unwrap();
        assert_eq!(config.sync_address, "0.0.0.0:50051");

        config.set_async_tcp_addr("*", 5555).unwrap();
        assert_eq!(config.async_address, "tcp://*:5555");

        config.set_async_ipc_addr("mydata").unwrap();
        assert_eq!(config.async_address, "ipc:///tmp/mydata.sock");

        assert!(config.set_sync_addr("", 50051).is_err());
        assert!(config.set_async_tcp_addr("127.0.0.1", 0).is_err());
        assert!(config.set_async_ipc_addr("").is_err());
    }

    #[test]
    fn test_mode_capabilities() {
        assert!(DataMode::Publish.can_send());
        assert!(!DataMode::Publish.can_receive());
        assert!(DataMode::Subscribe.can_receive());
        assert!(!DataMode::Subscribe.can_send());
        assert!(DataMode::Push.can_send());
        assert!(DataMode::Pull.can_receive());
        assert!(DataMode::Reply.can_send());
        assert!(DataMode::Reply.can_receive());
        assert!(DataMode::Request.can_send());
    }
}
