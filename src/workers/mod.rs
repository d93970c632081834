// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Worker loops, one per plane.
//!
//! Each worker runs on its own thread for the duration of a session. The
//! coordinator talks to a worker through three things only: the startup
//! handshake channel, the `go` gate that admits it into its loop, and the
//! shared `active` flag (plus the control plane's shutdown signal).

pub(crate) mod control_plane;
pub(crate) mod data_plane;

use crate::common::error::{RuntimeError, RuntimeResult};
use crossbeam::channel::Receiver;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::error;

/// Upper bound on how long a worker may take to report its bind/connect
/// outcome before startup is considered failed.
pub(crate) const STARTUP_GRACE: Duration = Duration::from_secs(5);

/// Join a worker thread, logging instead of propagating a panic payload.
pub(crate) fn join_worker(handle: JoinHandle<()>, name: &str) {
    if handle.join().is_err() {
        error!("{} worker panicked", name);
    }
}

/// Collect one startup handshake, converting both a reported error and a
/// missing report into `StartupFailure`.
pub(crate) fn recv_ready(ready: &Receiver<RuntimeResult<()>>, plane: &str) -> RuntimeResult<()> {
    match ready.recv_timeout(STARTUP_GRACE) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RuntimeError::StartupFailure(format!("{}: {}", plane, e))),
        Err(_) => Err(RuntimeError::StartupFailure(format!(
            "{} worker did not report readiness",
            plane
        ))),
    }
}
