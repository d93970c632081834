// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Data-plane worker: the asynchronous channel's polling loop
//!
//! The loop owns all steady-state traffic on the data plane: it forwards
//! inbound payloads to the configured handler and drains the outbound
//! queue with non-blocking sends. A transport fault is fatal to the whole
//! session - the worker logs it, flips `active` off, and exits; the
//! coordinator surfaces the state through `is_running()`.

use crate::common::config::{DataMode, ReceiveHandler};
use crate::common::error::RuntimeResult;
use crate::queue::OutboundQueue;
use crate::traits::{DataSocket, SendOutcome};
use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// Idle wait between loop iterations; the queue condvar cuts it short on
/// enqueue. Must stay in the low single-digit milliseconds.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Back-off while the transport reports a full send buffer.
const BLOCKED_WAIT: Duration = Duration::from_millis(2);

pub(crate) struct DataPlaneStartup {
    pub handle: thread::JoinHandle<()>,
    /// Reports the socket open() outcome exactly once
    pub ready: Receiver<RuntimeResult<()>>,
    /// Admits the worker into its loop; dropping it instead aborts the
    /// worker before the loop begins (rollback path)
    pub go: Sender<()>,
}

/// Spawn the data-plane worker thread.
///
/// The thread opens the socket first and reports the outcome on the
/// `ready` channel, then parks on the `go` gate. The gate resolves the
/// startup ordering: the coordinator flips `active` on and only then sends
/// `go`, so the loop never observes a not-yet-active session and exits
/// early.
pub(crate) fn spawn(
    socket: Arc<dyn DataSocket>,
    queue: Arc<OutboundQueue>,
    active: Arc<AtomicBool>,
    mode: DataMode,
    on_receive: Option<ReceiveHandler>,
) -> RuntimeResult<DataPlaneStartup> {
    let (ready_tx, ready_rx) = bounded(1);
    let (go_tx, go_rx) = bounded::<()>(1);

    let handle = thread::Builder::new()
        .name("dualplane-data".into())
        .spawn(move || {
            let opened = socket.open();
            let failed = opened.is_err();
            let _ = ready_tx.send(opened);
            if failed {
                return;
            }

            if go_rx.recv().is_err() {
                debug!("data-plane worker aborted before entering its loop");
                return;
            }

            run_loop(&*socket, &queue, &active, mode, on_receive.as_ref());
            debug!("data-plane worker exited");
        })?;

    Ok(DataPlaneStartup {
        handle,
        ready: ready_rx,
        go: go_tx,
    })
}

fn run_loop(
    socket: &dyn DataSocket,
    queue: &OutboundQueue,
    active: &AtomicBool,
    mode: DataMode,
    on_receive: Option<&ReceiveHandler>,
) {
    // A buffer the transport refused stays here, never re-queued: it keeps
    // its place at the head and the queue keeps FIFO order.
    let mut pending: Option<Vec<u8>> = None;

    while active.load(Ordering::SeqCst) {
        let mut did_work = false;

        if mode.can_receive() {
            match socket.try_receive() {
                Ok(Some(payload)) => {
                    did_work = true;
                    match on_receive {
                        Some(handler) => handler(&payload),
                        None => debug!("inbound payload dropped ({} bytes, no handler)", payload.len()),
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("data-plane receive fault: {}", e);
                    active.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }

        let mut blocked = false;
        loop {
            let buffer = match pending.take().or_else(|| queue.drain_one()) {
                Some(buffer) => buffer,
                None => break,
            };
            match socket.try_send(&buffer) {
                Ok(SendOutcome::Sent) => did_work = true,
                Ok(SendOutcome::WouldBlock) => {
                    pending = Some(buffer);
                    blocked = true;
                    break;
                }
                Err(e) => {
                    error!("data-plane send fault: {}", e);
                    active.store(false, Ordering::SeqCst);
                    return;
                }
            }
        }

        if !active.load(Ordering::SeqCst) {
            break;
        }
        if blocked {
            thread::sleep(BLOCKED_WAIT);
        } else if !did_work {
            queue.wait_for_message(IDLE_WAIT);
        }
    }
}
