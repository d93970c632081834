// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! # dualplane
//!
//! Dual-plane communication runtime: one process exposes (server role) or
//! consumes (client role) two logically distinct channels under a single
//! lifecycle.
//!
//! - **Control plane**: a synchronous request/reply RPC channel
//!   (ZMQ ROUTER/DEALER by default)
//! - **Data plane**: an asynchronous publish/subscribe or push/pull
//!   channel (ZMQ PUB/SUB/PUSH/PULL/REQ/REP)
//!
//! The crate is an orchestration layer, not a protocol: both wire
//! transports sit behind capability traits ([`traits`]) and the runtime's
//! job is starting two independently blocking service loops on their own
//! threads, moving outbound payloads through a bounded thread-safe queue
//! under observable backpressure, and tearing everything down in a
//! strict, deadlock-free order with no leaked thread or socket - on every
//! exit path, including drop.
//!
//! ## Example: server
//!
//! ```no_run
//! use dualplane::{RuntimeConfig, Server, ServiceHandler};
//! use std::sync::Arc;
//!
//! struct Status;
//! impl ServiceHandler for Status {
//!     fn handle(&self, _request: &[u8]) -> Option<Vec<u8>> {
//!         Some(b"ok".to_vec())
//!     }
//! }
//!
//! let server = Server::new();
//! server.start(
//!     RuntimeConfig::new("0.0.0.0:50051", "tcp://*:5555"),
//!     vec![Arc::new(Status)],
//! )?;
//!
//! server.send(b"hello")?; // published on the data plane
//! server.stop();
//! # Ok::<(), dualplane::RuntimeError>(())
//! ```
//!
//! ## Example: client
//!
//! ```no_run
//! use dualplane::{Client, DataMode, RuntimeConfig};
//! use std::sync::Arc;
//!
//! let client = Client::new();
//! client.connect(
//!     RuntimeConfig::new("127.0.0.1:50051", "tcp://127.0.0.1:5555")
//!         .with_mode(DataMode::Subscribe)
//!         .with_receive_handler(Arc::new(|payload| {
//!             println!("data: {:?}", payload);
//!         })),
//! )?;
//! client.subscribe(b"")?;
//!
//! let reply = client.request(b"status")?;
//! client.disconnect();
//! # Ok::<(), dualplane::RuntimeError>(())
//! ```
//!
//! ## Guarantees
//!
//! - One session per coordinator; restarting allocates entirely fresh
//!   handles and queue.
//! - `start`/`connect` either brings both planes up or rolls everything
//!   back and returns the error - partial success never stays running.
//! - `send` never blocks on the data-plane loop; a full queue is an
//!   observable [`RuntimeError::QueueFull`].
//! - FIFO order of one producer's payloads is preserved end to end.
//! - A steady-state transport fault is logged, flips
//!   `is_running()`/`is_connected()` to false, and is never retried by
//!   the runtime; retry policy belongs to the caller.

pub mod client;
pub mod common;
pub mod queue;
pub mod server;
pub mod traits;
pub mod zmq;

mod workers;

// Re-export commonly used types
pub use client::Client;
pub use common::{DataMode, ReceiveHandler, RuntimeConfig, RuntimeError, RuntimeResult};
pub use queue::OutboundQueue;
pub use server::Server;
pub use traits::{
    ControlChannel, ControlServer, ControlShutdown, DataSocket, SendOutcome, ServiceHandler,
    SocketRole, TransportFactory,
};
pub use zmq::ZmqTransportFactory;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::*;
    pub use crate::traits::*;
    pub use crate::{Client, OutboundQueue, Server, ZmqTransportFactory};
}
