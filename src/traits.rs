// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Capability traits at the transport seams
//!
//! The coordinator and the worker loops depend only on these traits; the
//! ZMQ implementations live in [`crate::zmq`] and test fakes implement the
//! same interfaces, so transports can be substituted without touching the
//! orchestration layer.

use crate::common::config::RuntimeConfig;
use crate::common::error::RuntimeResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a non-blocking data-plane send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Transport buffer full; the buffer stays at the head and is
    /// re-attempted on the next loop iteration
    WouldBlock,
}

/// Whether a data-plane socket binds (server role) or connects (client role)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    Bind,
    Connect,
}

/// Data-plane socket capability.
///
/// Implementations serialize access to the underlying handle internally;
/// the worker loop is the main user, while the coordinator reaches in only
/// for `subscribe`/`unsubscribe` and the final `close`.
pub trait DataSocket: Send + Sync {
    /// Bind or connect per the configured role. Failure here aborts the
    /// whole startup rather than entering a degraded loop.
    fn open(&self) -> RuntimeResult<()>;

    /// Non-blocking send attempt
    fn try_send(&self, data: &[u8]) -> RuntimeResult<SendOutcome>;

    /// Non-blocking receive attempt; `None` when no payload is pending
    fn try_receive(&self) -> RuntimeResult<Option<Vec<u8>>>;

    /// Add a topic filter (Subscribe mode only)
    fn subscribe(&self, topic: &[u8]) -> RuntimeResult<()>;

    /// Remove a topic filter (Subscribe mode only)
    fn unsubscribe(&self, topic: &[u8]) -> RuntimeResult<()>;

    /// Release the handle; idempotent
    fn close(&self);
}

/// A registered control-plane request handler.
///
/// Handlers are offered each inbound request in registration order until
/// one returns `Some(response)`. How requests are encoded and routed to a
/// particular handler is the transport collaborator's business, not the
/// runtime's.
pub trait ServiceHandler: Send + Sync {
    fn handle(&self, request: &[u8]) -> Option<Vec<u8>>;
}

/// Cloneable signal that unblocks a [`ControlServer::serve`] call from
/// another thread. This is the only path by which the coordinator touches
/// a handle owned by a running worker.
#[derive(Clone, Default)]
pub struct ControlShutdown {
    signalled: Arc<AtomicBool>,
}

impl ControlShutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.signalled.store(true, Ordering::SeqCst);
    }

    pub fn is_signalled(&self) -> bool {
        self.signalled.load(Ordering::SeqCst)
    }
}

/// Control-plane server capability (server role).
///
/// The instance is owned by the sync-channel worker thread for the whole
/// session; the coordinator keeps only the [`ControlShutdown`] handle.
pub trait ControlServer: Send {
    /// Bind and start listening
    fn bind(&mut self) -> RuntimeResult<()>;

    /// Block serving requests until the shutdown handle is signalled
    fn serve(&mut self) -> RuntimeResult<()>;

    /// The signal that unblocks `serve`
    fn shutdown_handle(&self) -> ControlShutdown;
}

/// Control-plane channel capability (client role).
///
/// Produced already connected: the factory confirms connectivity within
/// the configured bounded wait or fails with `ConnectTimeout`.
pub trait ControlChannel: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Issue one request and wait up to `timeout` for the reply
    fn request(&self, data: &[u8], timeout: Duration) -> RuntimeResult<Vec<u8>>;

    /// Release the channel; idempotent
    fn close(&self);
}

/// Builds the transport objects for a session.
///
/// [`crate::zmq::ZmqTransportFactory`] is the default; tests substitute
/// fakes.
pub trait TransportFactory: Send + Sync {
    fn control_server(
        &self,
        config: &RuntimeConfig,
        services: Vec<Arc<dyn ServiceHandler>>,
    ) -> RuntimeResult<Box<dyn ControlServer>>;

    fn control_channel(&self, config: &RuntimeConfig) -> RuntimeResult<Arc<dyn ControlChannel>>;

    fn data_socket(
        &self,
        config: &RuntimeConfig,
        role: SocketRole,
    ) -> RuntimeResult<Arc<dyn DataSocket>>;
}

impl<F> ServiceHandler for F
where
    F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync,
{
    fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        self(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_signal_is_shared_across_clones() {
        let shutdown = ControlShutdown::new();
        let clone = shutdown.clone();
        assert!(!clone.is_signalled());
        shutdown.signal();
        assert!(clone.is_signalled());
    }

    #[test]
    fn test_closure_service_handler() {
        let echo = |request: &[u8]| Some(request.to_vec());
        assert_eq!(echo.handle(b"ping"), Some(b"ping".to_vec()));
    }
}
