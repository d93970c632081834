// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! ZMQ control plane: ROUTER server and DEALER channel
//!
//! The server polls with a short timeout so the shutdown signal is
//! observed between requests; `serve()` therefore unblocks within one
//! poll interval of `ControlShutdown::signal()`. The channel confirms
//! connectivity through a socket monitor before `connect` returns, giving
//! the client role its bounded wait.

use crate::common::config::RuntimeConfig;
use crate::common::error::{RuntimeError, RuntimeResult};
use crate::traits::{ControlChannel, ControlServer, ControlShutdown, ServiceHandler};
use crate::zmq::control_endpoint;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Poll interval inside `serve`; bounds shutdown latency.
const SERVE_POLL_MS: i64 = 100;

/// ZMQ ROUTER implementation of [`ControlServer`]
pub struct ZmqControlServer {
    context: zmq::Context,
    config: RuntimeConfig,
    services: Vec<Arc<dyn ServiceHandler>>,
    socket: Option<zmq::Socket>,
    shutdown: ControlShutdown,
}

impl ZmqControlServer {
    pub fn new(
        config: RuntimeConfig,
        services: Vec<Arc<dyn ServiceHandler>>,
    ) -> RuntimeResult<Self> {
        let context = zmq::Context::new();
        context.set_io_threads(config.io_threads)?;

        Ok(Self {
            context,
            config,
            services,
            socket: None,
            shutdown: ControlShutdown::new(),
        })
    }

    fn dispatch(&self, request: &[u8]) -> Vec<u8> {
        for service in &self.services {
            if let Some(response) = service.handle(request) {
                return response;
            }
        }
        warn!("unhandled control request ({} bytes)", request.len());
        Vec::new()
    }
}

impl ControlServer for ZmqControlServer {
    fn bind(&mut self) -> RuntimeResult<()> {
        let socket = self.context.socket(zmq::ROUTER)?;

        socket.set_linger(self.config.linger.as_millis() as i32)?;
        socket.set_router_mandatory(false)?;
        socket.set_rcvhwm(self.config.queue_capacity as i32)?;
        socket.set_sndhwm(self.config.queue_capacity as i32)?;
        socket.set_maxmsgsize(self.config.max_message_size as i64)?;

        let endpoint = control_endpoint(&self.config.sync_address);
        socket.bind(&endpoint)?;

        self.socket = Some(socket);
        info!("control plane listening on {}", endpoint);
        Ok(())
    }

    fn serve(&mut self) -> RuntimeResult<()> {
        let socket = self.socket.as_ref().ok_or(RuntimeError::NotRunning)?;

        while !self.shutdown.is_signalled() {
            let mut items = [socket.as_poll_item(zmq::POLLIN)];
            zmq::poll(&mut items, SERVE_POLL_MS)?;
            if !items[0].is_readable() {
                continue;
            }

            // ROUTER framing: [identity, empty, request]
            let frames = socket.recv_multipart(0)?;
            if frames.len() < 3 {
                warn!("malformed control request ({} frames)", frames.len());
                continue;
            }

            let response = self.dispatch(&frames[2]);

            socket.send(&frames[0][..], zmq::SNDMORE)?;
            socket.send(zmq::Message::new(), zmq::SNDMORE)?;
            socket.send(&response[..], 0)?;
        }

        info!("control plane stopped serving");
        Ok(())
    }

    fn shutdown_handle(&self) -> ControlShutdown {
        self.shutdown.clone()
    }
}

static MONITOR_SEQ: AtomicUsize = AtomicUsize::new(0);

/// ZMQ DEALER implementation of [`ControlChannel`]
pub struct ZmqControlChannel {
    // context kept alive for the lifetime of the socket
    _context: zmq::Context,
    max_message_size: usize,
    socket: Mutex<Option<zmq::Socket>>,
    connected: AtomicBool,
}

impl ZmqControlChannel {
    /// Create the channel and block, up to `connect_timeout`, until the
    /// transport reports the connection established.
    pub fn connect(config: &RuntimeConfig) -> RuntimeResult<Self> {
        let context = zmq::Context::new();
        context.set_io_threads(config.io_threads)?;

        let socket = context.socket(zmq::DEALER)?;
        socket.set_linger(config.linger.as_millis() as i32)?;
        socket.set_rcvtimeo(config.receive_timeout.as_millis() as i32)?;
        socket.set_maxmsgsize(config.max_message_size as i64)?;

        // Socket monitor gives the bounded connected-or-timeout wait;
        // the endpoint must be unique per channel within the process.
        let monitor_endpoint = format!(
            "inproc://dualplane-monitor-{}",
            MONITOR_SEQ.fetch_add(1, Ordering::Relaxed)
        );
        socket.monitor(
            &monitor_endpoint,
            zmq::SocketEvent::CONNECTED as i32 | zmq::SocketEvent::MONITOR_STOPPED as i32,
        )?;
        let monitor = context.socket(zmq::PAIR)?;
        monitor.connect(&monitor_endpoint)?;

        let endpoint = control_endpoint(&config.sync_address);
        socket.connect(&endpoint)?;

        wait_for_connected(&monitor, config.connect_timeout)?;
        info!("control channel connected to {}", endpoint);

        Ok(Self {
            _context: context,
            max_message_size: config.max_message_size,
            socket: Mutex::new(Some(socket)),
            connected: AtomicBool::new(true),
        })
    }
}

fn wait_for_connected(monitor: &zmq::Socket, timeout: Duration) -> RuntimeResult<()> {
    let deadline = Instant::now() + timeout;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(RuntimeError::ConnectTimeout { timeout });
        }

        let mut items = [monitor.as_poll_item(zmq::POLLIN)];
        zmq::poll(&mut items, remaining.as_millis() as i64)?;
        if !items[0].is_readable() {
            continue;
        }

        // monitor frames: [event id (u16) + value, endpoint]
        let frames = monitor.recv_multipart(0)?;
        let event = frames
            .first()
            .filter(|frame| frame.len() >= 2)
            .map(|frame| u16::from_le_bytes([frame[0], frame[1]]));
        if event == Some(zmq::SocketEvent::CONNECTED as u16) {
            return Ok(());
        }
    }
}

impl ControlChannel for ZmqControlChannel {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request(&self, data: &[u8], timeout: Duration) -> RuntimeResult<Vec<u8>> {
        if data.len() > self.max_message_size {
            return Err(RuntimeError::MessageTooLarge {
                size: data.len(),
                max_size: self.max_message_size,
            });
        }

        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(RuntimeError::NotRunning)?;

        // A reply that arrived after an earlier wait expired is still
        // sitting on the socket; it belongs to no caller anymore and must
        // not be read as the answer to this request.
        loop {
            match socket.recv_multipart(zmq::DONTWAIT) {
                Ok(frames) => warn!("discarding stale control reply ({} frames)", frames.len()),
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => return Err(e.into()),
            }
        }

        // DEALER framing: [empty, request]
        socket.send(zmq::Message::new(), zmq::SNDMORE)?;
        socket.send(data, 0)?;

        let mut items = [socket.as_poll_item(zmq::POLLIN)];
        zmq::poll(&mut items, timeout.as_millis() as i64)?;
        if !items[0].is_readable() {
            return Err(RuntimeError::Timeout);
        }

        let frames = socket.recv_multipart(0)?;
        match frames.len() {
            0 => Err(RuntimeError::TransportFault("empty reply".into())),
            1 => Ok(frames.into_iter().next().unwrap_or_default()),
            _ => Ok(frames.into_iter().nth(1).unwrap_or_default()),
        }
    }

    fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        *self.socket.lock() = None;
    }
}
