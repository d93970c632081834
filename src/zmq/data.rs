// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! ZMQ data-plane socket
//!
//! One socket per session, owned for its lifetime by the data-plane
//! worker; the coordinator reaches in only for subscription changes and
//! the final close, both serialized by the internal lock.

use crate::common::config::{DataMode, RuntimeConfig};
use crate::common::error::{RuntimeError, RuntimeResult};
use crate::traits::{DataSocket, SendOutcome, SocketRole};
use parking_lot::Mutex;
use tracing::info;

/// ZMQ implementation of [`DataSocket`]
pub struct ZmqDataSocket {
    context: zmq::Context,
    config: RuntimeConfig,
    role: SocketRole,
    socket: Mutex<Option<zmq::Socket>>,
}

fn socket_type(mode: DataMode) -> zmq::SocketType {
    match mode {
        DataMode::Publish => zmq::PUB,
        DataMode::Subscribe => zmq::SUB,
        DataMode::Push => zmq::PUSH,
        DataMode::Pull => zmq::PULL,
        DataMode::Request => zmq::REQ,
        DataMode::Reply => zmq::REP,
    }
}

impl ZmqDataSocket {
    pub fn new(config: RuntimeConfig, role: SocketRole) -> RuntimeResult<Self> {
        let context = zmq::Context::new();
        context.set_io_threads(config.io_threads)?;

        Ok(Self {
            context,
            config,
            role,
            socket: Mutex::new(None),
        })
    }
}

impl DataSocket for ZmqDataSocket {
    fn open(&self) -> RuntimeResult<()> {
        let socket = self.context.socket(socket_type(self.config.async_mode))?;

        socket.set_linger(self.config.linger.as_millis() as i32)?;
        socket.set_sndhwm(self.config.queue_capacity as i32)?;
        socket.set_rcvhwm(self.config.queue_capacity as i32)?;
        socket.set_maxmsgsize(self.config.max_message_size as i64)?;

        match self.role {
            SocketRole::Bind => {
                socket.bind(&self.config.async_address)?;
                info!("data plane bound on {}", self.config.async_address);
            }
            SocketRole::Connect => {
                socket.connect(&self.config.async_address)?;
                info!("data plane connected to {}", self.config.async_address);
            }
        }

        *self.socket.lock() = Some(socket);
        Ok(())
    }

    fn try_send(&self, data: &[u8]) -> RuntimeResult<SendOutcome> {
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(RuntimeError::NotRunning)?;

        match socket.send(data, zmq::DONTWAIT) {
            Ok(()) => Ok(SendOutcome::Sent),
            Err(zmq::Error::EAGAIN) => Ok(SendOutcome::WouldBlock),
            Err(e) => Err(RuntimeError::TransportFault(format!("send failed: {}", e))),
        }
    }

    fn try_receive(&self) -> RuntimeResult<Option<Vec<u8>>> {
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(RuntimeError::NotRunning)?;

        match socket.recv_bytes(zmq::DONTWAIT) {
            Ok(payload) => Ok(Some(payload)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(e) => Err(RuntimeError::TransportFault(format!(
                "receive failed: {}",
                e
            ))),
        }
    }

    fn subscribe(&self, topic: &[u8]) -> RuntimeResult<()> {
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(RuntimeError::NotRunning)?;
        socket.set_subscribe(topic)?;
        Ok(())
    }

    fn unsubscribe(&self, topic: &[u8]) -> RuntimeResult<()> {
        let guard = self.socket.lock();
        let socket = guard.as_ref().ok_or(RuntimeError::NotRunning)?;
        socket.set_unsubscribe(topic)?;
        Ok(())
    }

    fn close(&self) {
        // dropping the socket closes it; linger was set at open
        *self.socket.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_type_mapping() {
        assert_eq!(socket_type(DataMode::Publish), zmq::PUB);
        assert_eq!(socket_type(DataMode::Subscribe), zmq::SUB);
        assert_eq!(socket_type(DataMode::Push), zmq::PUSH);
        assert_eq!(socket_type(DataMode::Pull), zmq::PULL);
        assert_eq!(socket_type(DataMode::Request), zmq::REQ);
        assert_eq!(socket_type(DataMode::Reply), zmq::REP);
    }

    #[test]
    fn test_operations_fail_before_open() {
        let config = RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:30100");
        let socket = ZmqDataSocket::new(config, SocketRole::Bind).unwrap();
        assert!(matches!(
            socket.try_send(b"data"),
            Err(RuntimeError::NotRunning)
        ));
        assert!(matches!(
            socket.try_receive(),
            Err(RuntimeError::NotRunning)
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let config = RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:30101");
        let socket = ZmqDataSocket::new(config, SocketRole::Bind).unwrap();
        socket.open().unwrap();
        socket.close();
        socket.close();
    }
}
