// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Server-role lifecycle coordinator
//!
//! A [`Server`] owns one session at a time: the control-plane server
//! thread, the data-plane worker thread, the outbound queue, and the
//! session's `active` flag. Start and stop are serialized by the session
//! lock and idempotent; stop is also run on drop, so no thread or socket
//! outlives the coordinator on any exit path.

use crate::common::config::RuntimeConfig;
use crate::common::error::{RuntimeError, RuntimeResult};
use crate::queue::OutboundQueue;
use crate::traits::{ControlShutdown, DataSocket, ServiceHandler, SocketRole, TransportFactory};
use crate::workers::{control_plane, data_plane, join_worker, recv_ready};
use crate::zmq::ZmqTransportFactory;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info, warn};

struct ServerSession {
    config: RuntimeConfig,
    active: Arc<AtomicBool>,
    queue: Arc<OutboundQueue>,
    data_socket: Arc<dyn DataSocket>,
    shutdown: ControlShutdown,
    control_thread: JoinHandle<()>,
    data_thread: JoinHandle<()>,
}

/// Dual-plane server: binds both planes, serves RPC requests on the
/// control plane and moves outbound payloads through the data plane.
///
/// ```no_run
/// use dualplane::{RuntimeConfig, Server, ServiceHandler};
/// use std::sync::Arc;
///
/// struct Echo;
/// impl ServiceHandler for Echo {
///     fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
///         Some(request.to_vec())
///     }
/// }
///
/// let server = Server::new();
/// let config = RuntimeConfig::new("0.0.0.0:50051", "tcp://*:5555");
/// server.start(config, vec![Arc::new(Echo)])?;
/// server.send(b"hello")?;
/// server.stop();
/// # Ok::<(), dualplane::RuntimeError>(())
/// ```
pub struct Server {
    factory: Arc<dyn TransportFactory>,
    session: Mutex<Option<ServerSession>>,
}

impl Server {
    /// Create a server backed by the ZMQ transports
    pub fn new() -> Self {
        Self::with_factory(Arc::new(ZmqTransportFactory))
    }

    /// Create a server with a substitute transport factory
    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            session: Mutex::new(None),
        }
    }

    /// Start both planes.
    ///
    /// Validates the config before allocating anything, then brings up
    /// the control-plane and data-plane workers concurrently. If either
    /// fails its bind, the whole session is rolled back and the error
    /// returned; partial success is never left running. Calling `start`
    /// on a running server is a warning-level no-op.
    pub fn start(
        &self,
        config: RuntimeConfig,
        services: Vec<Arc<dyn ServiceHandler>>,
    ) -> RuntimeResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("server already running; start ignored");
            return Ok(());
        }
        config.validate()?;

        let control = self.factory.control_server(&config, services)?;
        let shutdown = control.shutdown_handle();
        let data_socket = self.factory.data_socket(&config, SocketRole::Bind)?;
        let queue = Arc::new(OutboundQueue::new(config.queue_capacity));
        let active = Arc::new(AtomicBool::new(false));

        let control_startup = control_plane::spawn(control, Arc::clone(&active))?;
        let data_startup = match data_plane::spawn(
            Arc::clone(&data_socket),
            Arc::clone(&queue),
            Arc::clone(&active),
            config.async_mode,
            config.on_receive.clone(),
        ) {
            Ok(startup) => startup,
            Err(e) => {
                drop(control_startup.go);
                let _ = recv_ready(&control_startup.ready, "control-plane");
                join_worker(control_startup.handle, "control-plane");
                return Err(e);
            }
        };

        let readiness = recv_ready(&control_startup.ready, "control-plane")
            .and(recv_ready(&data_startup.ready, "data-plane"));
        if let Err(failure) = readiness {
            // roll back whichever worker did come up
            drop(control_startup.go);
            drop(data_startup.go);
            shutdown.signal();
            join_worker(control_startup.handle, "control-plane");
            join_worker(data_startup.handle, "data-plane");
            data_socket.close();
            queue.clear();
            error!("startup failed, session rolled back: {}", failure);
            return Err(failure);
        }

        // active must be visible before the workers pass their go gates,
        // or a loop could observe an inactive session and exit at once
        active.store(true, Ordering::SeqCst);
        let _ = control_startup.go.send(());
        let _ = data_startup.go.send(());

        info!(
            "server started - control: {}, data: {} ({:?})",
            config.sync_address, config.async_address, config.async_mode
        );

        *session = Some(ServerSession {
            config,
            active,
            queue,
            data_socket,
            shutdown,
            control_thread: control_startup.handle,
            data_thread: data_startup.handle,
        });
        Ok(())
    }

    /// Tear the session down in strict order: deactivate, unblock the
    /// control-plane serve call, join both workers, release the transport
    /// handles, discard queued buffers. Idempotent; a stop while idle is
    /// a no-op.
    pub fn stop(&self) {
        // Take the session and release the lock before joining: the
        // data-plane worker may be inside the receive handler, and the
        // handler is allowed to call back into the coordinator. Holding
        // the lock across the join would deadlock against that call;
        // callers arriving after the take observe `NotRunning`.
        let Some(s) = self.session.lock().take() else {
            return;
        };

        info!("stopping server");
        s.active.store(false, Ordering::SeqCst);
        s.shutdown.signal();
        join_worker(s.control_thread, "control-plane");
        join_worker(s.data_thread, "data-plane");
        s.data_socket.close();
        s.queue.clear();
        info!("server stopped");
    }

    /// Whether a session is active. Flips to false on its own if a worker
    /// hits a steady-state transport fault.
    pub fn is_running(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Offer a payload to the data plane.
    ///
    /// Non-blocking: the payload is queued and sent by the worker loop.
    /// A full queue is reported as [`RuntimeError::QueueFull`] rather
    /// than stalling the caller.
    pub fn send(&self, payload: &[u8]) -> RuntimeResult<()> {
        let session = self.session.lock();
        let s = session.as_ref().ok_or(RuntimeError::NotRunning)?;
        if !s.active.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        if !s.config.async_mode.can_send() {
            return Err(RuntimeError::ModeNotSupported {
                mode: s.config.async_mode,
                operation: "send",
            });
        }
        if payload.is_empty() {
            return Err(RuntimeError::EmptyPayload);
        }
        if payload.len() > s.config.max_message_size {
            return Err(RuntimeError::MessageTooLarge {
                size: payload.len(),
                max_size: s.config.max_message_size,
            });
        }
        s.queue.enqueue(payload.to_vec())
    }

    /// Send a UTF-8 string payload
    pub fn send_str(&self, message: &str) -> RuntimeResult<()> {
        self.send(message.as_bytes())
    }

    /// Serialize a value as JSON and send it
    pub fn send_json<T: Serialize>(&self, value: &T) -> RuntimeResult<()> {
        let payload = serde_json::to_vec(value)?;
        self.send(&payload)
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
    }
}
