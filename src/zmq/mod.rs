// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! ZMQ implementations of the transport capability traits
//!
//! - Data plane: one socket per session, type chosen by [`DataMode`]
//!   (PUB/SUB/PUSH/PULL/REQ/REP), non-blocking I/O with `DONTWAIT`.
//! - Control plane: ROUTER (server) / DEALER (client) request-reply, with
//!   `[identity, empty, payload]` framing on the server side and
//!   `[empty, payload]` on the client side.
//!
//! [`DataMode`]: crate::common::DataMode

mod control;
mod data;

pub use control::{ZmqControlChannel, ZmqControlServer};
pub use data::ZmqDataSocket;

use crate::common::config::RuntimeConfig;
use crate::common::error::RuntimeResult;
use crate::traits::{
    ControlChannel, ControlServer, DataSocket, ServiceHandler, SocketRole, TransportFactory,
};
use std::sync::Arc;

/// Default transport factory used by [`crate::Server::new`] and
/// [`crate::Client::new`].
#[derive(Debug, Default)]
pub struct ZmqTransportFactory;

impl TransportFactory for ZmqTransportFactory {
    fn control_server(
        &self,
        config: &RuntimeConfig,
        services: Vec<Arc<dyn ServiceHandler>>,
    ) -> RuntimeResult<Box<dyn ControlServer>> {
        Ok(Box::new(ZmqControlServer::new(config.clone(), services)?))
    }

    fn control_channel(&self, config: &RuntimeConfig) -> RuntimeResult<Arc<dyn ControlChannel>> {
        Ok(Arc::new(ZmqControlChannel::connect(config)?))
    }

    fn data_socket(
        &self,
        config: &RuntimeConfig,
        role: SocketRole,
    ) -> RuntimeResult<Arc<dyn DataSocket>> {
        Ok(Arc::new(ZmqDataSocket::new(config.clone(), role)?))
    }
}

/// Control-plane addresses are given as `host:port`; add the TCP scheme
/// unless the caller already supplied one.
pub(crate) fn control_endpoint(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("tcp://{}", address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_endpoint_scheme() {
        assert_eq!(control_endpoint("0.0.0.0:50051"), "tcp://0.0.0.0:50051");
        assert_eq!(
            control_endpoint("ipc:///tmp/ctl.sock"),
            "ipc:///tmp/ctl.sock"
        );
    }
}
