// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Client-role lifecycle coordinator
//!
//! A [`Client`] establishes the control-plane channel with a bounded wait
//! on the caller's thread, then runs the data plane on a worker thread.
//! Disconnect mirrors the server's ordered teardown and also runs on
//! drop.

use crate::common::config::{DataMode, RuntimeConfig};
use crate::common::error::{RuntimeError, RuntimeResult};
use crate::queue::OutboundQueue;
use crate::traits::{ControlChannel, DataSocket, SocketRole, TransportFactory};
use crate::workers::{data_plane, join_worker, recv_ready};
use crate::zmq::ZmqTransportFactory;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

struct ClientSession {
    config: RuntimeConfig,
    active: Arc<AtomicBool>,
    queue: Arc<OutboundQueue>,
    data_socket: Arc<dyn DataSocket>,
    channel: Arc<dyn ControlChannel>,
    data_thread: JoinHandle<()>,
}

/// Dual-plane client: a connected RPC channel for synchronous calls plus
/// a data-plane socket for asynchronous traffic.
///
/// ```no_run
/// use dualplane::{Client, DataMode, RuntimeConfig};
/// use std::sync::Arc;
///
/// let client = Client::new();
/// let config = RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:5555")
///     .with_mode(DataMode::Subscribe)
///     .with_receive_handler(Arc::new(|payload| {
///         println!("received {} bytes", payload.len());
///     }));
/// client.connect(config)?;
/// client.subscribe(b"")?;
/// let reply = client.request(b"status")?;
/// client.disconnect();
/// # Ok::<(), dualplane::RuntimeError>(())
/// ```
pub struct Client {
    factory: Arc<dyn TransportFactory>,
    session: Mutex<Option<ClientSession>>,
}

impl Client {
    /// Create a client backed by the ZMQ transports
    pub fn new() -> Self {
        Self::with_factory(Arc::new(ZmqTransportFactory))
    }

    /// Create a client with a substitute transport factory
    pub fn with_factory(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            session: Mutex::new(None),
        }
    }

    /// Connect both planes.
    ///
    /// The control channel is established first, blocking the caller up
    /// to `connect_timeout` ([`RuntimeError::ConnectTimeout`] on expiry).
    /// A data-plane failure after that rolls the channel back too;
    /// partial success is never left running. Calling `connect` while
    /// connected is a warning-level no-op.
    pub fn connect(&self, config: RuntimeConfig) -> RuntimeResult<()> {
        let mut session = self.session.lock();
        if session.is_some() {
            warn!("client already connected; connect ignored");
            return Ok(());
        }
        config.validate()?;

        let channel = self.factory.control_channel(&config)?;

        let data_socket = match self.factory.data_socket(&config, SocketRole::Connect) {
            Ok(socket) => socket,
            Err(e) => {
                channel.close();
                return Err(e);
            }
        };
        let queue = Arc::new(OutboundQueue::new(config.queue_capacity));
        let active = Arc::new(AtomicBool::new(false));

        let data_startup = match data_plane::spawn(
            Arc::clone(&data_socket),
            Arc::clone(&queue),
            Arc::clone(&active),
            config.async_mode,
            config.on_receive.clone(),
        ) {
            Ok(startup) => startup,
            Err(e) => {
                data_socket.close();
                channel.close();
                return Err(e);
            }
        };

        if let Err(failure) = recv_ready(&data_startup.ready, "data-plane") {
            drop(data_startup.go);
            join_worker(data_startup.handle, "data-plane");
            data_socket.close();
            channel.close();
            queue.clear();
            error!("connect failed, session rolled back: {}", failure);
            return Err(failure);
        }

        active.store(true, Ordering::SeqCst);
        let _ = data_startup.go.send(());

        info!(
            "client connected - control: {}, data: {} ({:?})",
            config.sync_address, config.async_address, config.async_mode
        );

        *session = Some(ClientSession {
            config,
            active,
            queue,
            data_socket,
            channel,
            data_thread: data_startup.handle,
        });
        Ok(())
    }

    /// Tear the session down: deactivate, join the data-plane worker,
    /// release both transport handles, discard queued buffers.
    /// Idempotent; also run on drop.
    pub fn disconnect(&self) {
        // Take the session and release the lock before joining, so a
        // receive handler calling back into the coordinator cannot
        // deadlock the teardown; late callers observe `NotRunning`.
        let Some(s) = self.session.lock().take() else {
            return;
        };

        info!("disconnecting client");
        s.active.store(false, Ordering::SeqCst);
        join_worker(s.data_thread, "data-plane");
        s.data_socket.close();
        s.channel.close();
        s.queue.clear();
        info!("client disconnected");
    }

    /// Whether the session is active. Flips to false on its own if the
    /// data-plane worker hits a steady-state transport fault.
    pub fn is_connected(&self) -> bool {
        self.session
            .lock()
            .as_ref()
            .map(|s| s.active.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Offer a payload to the data plane (queued, sent by the worker)
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

    /// Add a topic filter; Subscribe mode only
    pub fn subscribe(&self, topic: &[u8]) -> RuntimeResult<()> {
        let session = self.session.lock();
        let s = session.as_ref().ok_or(RuntimeError::NotRunning)?;
        if !s.active.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        if s.config.async_mode != DataMode::Subscribe {
            return Err(RuntimeError::ModeNotSupported {
                mode: s.config.async_mode,
                operation: "subscribe",
            });
        }
        s.data_socket.subscribe(topic)?;
        info!(
            "subscribed to topic {:?}",
            String::from_utf8_lossy(topic)
        );
        Ok(())
    }

    /// Remove a topic filter; Subscribe mode only
    pub fn unsubscribe(&self, topic: &[u8]) -> RuntimeResult<()> {
        let session = self.session.lock();
        let s = session.as_ref().ok_or(RuntimeError::NotRunning)?;
        if !s.active.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        if s.config.async_mode != DataMode::Subscribe {
            return Err(RuntimeError::ModeNotSupported {
                mode: s.config.async_mode,
                operation: "unsubscribe",
            });
        }
        s.data_socket.unsubscribe(topic)
    }

    /// The live control channel, for issuing calls directly
    pub fn channel(&self) -> RuntimeResult<Arc<dyn ControlChannel>> {
        let session = self.session.lock();
        let s = session.as_ref().ok_or(RuntimeError::NotRunning)?;
        if !s.active.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotRunning);
        }
        Ok(Arc::clone(&s.channel))
    }

    /// Issue one control-plane request, waiting up to the configured
    /// receive timeout for the reply
    pub fn request(&self, data: &[u8]) -> RuntimeResult<Vec<u8>> {
        let (channel, timeout) = {
            let session = self.session.lock();
            let s = session.as_ref().ok_or(RuntimeError::NotRunning)?;
            if !s.active.load(Ordering::SeqCst) {
                return Err(RuntimeError::NotRunning);
            }
            (Arc::clone(&s.channel), s.config.receive_timeout)
        };
        // the session lock is released before the blocking call
        channel.request(data, timeout)
    }

    /// Issue one control-plane request with an explicit reply timeout
    pub fn request_timeout(&self, data: &[u8], timeout: Duration) -> RuntimeResult<Vec<u8>> {
        let channel = self.channel()?;
        channel.request(data, timeout)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}
