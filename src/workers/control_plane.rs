// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Control-plane worker: the synchronous channel's serve thread
//!
//! Server role only. The worker binds the RPC server, reports readiness,
//! waits for the `go` gate, and then blocks inside `serve()` until the
//! coordinator signals the shutdown handle. The client role needs no
//! worker: the channel is established on the caller's thread during
//! `connect` (the one permitted bounded block) and is passive afterwards.

use crate::common::error::RuntimeResult;
use crate::traits::ControlServer;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error};

pub(crate) struct ControlPlaneStartup {
    pub handle: thread::JoinHandle<()>,
    /// Reports the bind() outcome exactly once
    pub ready: Receiver<RuntimeResult<()>>,
    /// Admits the worker into serve(); dropping it aborts before serving
    pub go: Sender<()>,
}

/// Spawn the control-plane server thread.
///
/// The server object moves into the thread and is dropped (releasing its
/// handle) when the thread returns; the coordinator keeps only the
/// shutdown handle, taken before the move.
pub(crate) fn spawn(
    mut server: Box<dyn ControlServer>,
    active: Arc<AtomicBool>,
) -> RuntimeResult<ControlPlaneStartup> {
    let (ready_tx, ready_rx) = bounded(1);
    let (go_tx, go_rx) = bounded::<()>(1);

    let handle = thread::Builder::new()
        .name("dualplane-control".into())
        .spawn(move || {
            let bound = server.bind();
            let failed = bound.is_err();
            let _ = ready_tx.send(bound);
            if failed {
                return;
            }

            if go_rx.recv().is_err() {
                debug!("control-plane worker aborted before serving");
                return;
            }

            if let Err(e) = server.serve() {
                error!("control-plane fault: {}", e);
                active.store(false, Ordering::SeqCst);
            }
            debug!("control-plane worker exited");
        })?;

    Ok(ControlPlaneStartup {
        handle,
        ready: ready_rx,
        go: go_tx,
    })
}
