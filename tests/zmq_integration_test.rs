// Copyright 2025 Dualplane Contributors
// SPDX-License-Identifier: Apache-2.0

//! Integration tests over real ZMQ sockets
//!
//! Each test binds its own port pair in the 315xx range so the tests can
//! run in parallel within one binary.

use dualplane::prelude::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = tracing_subscriber::fmt::try_init();
}

struct Echo;
impl ServiceHandler for Echo {
    fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        Some(request.to_vec())
    }
}

/// Echo that holds the reply back long enough to outlast a short wait
struct SlowEcho(Duration);
impl ServiceHandler for SlowEcho {
    fn handle(&self, request: &[u8]) -> Option<Vec<u8>> {
        thread::sleep(self.0);
        Some(request.to_vec())
    }
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Server publishes on the data plane, client subscribes and receives
#[test]
fn test_publish_subscribe_delivery() {
    init_logging();
    let server = Server::new();
    server
        .start(
            RuntimeConfig::new("127.0.0.1:31510", "tcp://127.0.0.1:31511"),
            vec![Arc::new(Echo)],
        )
        .unwrap();

    let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let client = Client::new();
    client
        .connect(
            RuntimeConfig::new("127.0.0.1:31510", "tcp://127.0.0.1:31511")
                .with_mode(DataMode::Subscribe)
                .with_receive_handler(Arc::new(move |payload| {
                    sink.lock().push(payload.to_vec());
                })),
        )
        .unwrap();
    client.subscribe(b"").unwrap();

    // publish until the subscription has propagated and a frame lands
    let deadline = Instant::now() + Duration::from_secs(5);
    while received.lock().is_empty() && Instant::now() < deadline {
        server.send(b"hello").unwrap();
        thread::sleep(Duration::from_millis(20));
    }

    let received = received.lock();
    assert!(!received.is_empty(), "no payload delivered within deadline");
    assert_eq!(received[0], b"hello");
    drop(received);

    client.disconnect();
    server.stop();
}

/// Round-trip a request through the ROUTER/DEALER control plane
#[test]
fn test_control_plane_echo() {
    init_logging();
    let server = Server::new();
    server
        .start(
            RuntimeConfig::new("127.0.0.1:31520", "tcp://127.0.0.1:31521"),
            vec![Arc::new(Echo)],
        )
        .unwrap();

    let client = Client::new();
    client
        .connect(
            RuntimeConfig::new("127.0.0.1:31520", "tcp://127.0.0.1:31521")
                .with_mode(DataMode::Subscribe),
        )
        .unwrap();

    let reply = client
        .request_timeout(b"ping", Duration::from_secs(5))
        .unwrap();
    assert_eq!(reply, b"ping");

    client.disconnect();
    server.stop();
}

/// Client pushes, server pulls and hands payloads to its receive handler
#[test]
fn test_push_pull_delivery() {
    init_logging();
    let collected: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);

    let server = Server::new();
    server
        .start(
            RuntimeConfig::new("127.0.0.1:31530", "tcp://127.0.0.1:31531")
                .with_mode(DataMode::Pull)
                .with_receive_handler(Arc::new(move |payload| {
                    sink.lock().push(payload.to_vec());
                })),
            vec![Arc::new(Echo)],
        )
        .unwrap();

    let client = Client::new();
    client
        .connect(
            RuntimeConfig::new("127.0.0.1:31530", "tcp://127.0.0.1:31531")
                .with_mode(DataMode::Push),
        )
        .unwrap();

    for i in 0..3 {
        client.send(format!("data_{}", i).as_bytes()).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        collected.lock().len() == 3
    }));
    let collected = collected.lock();
    assert_eq!(collected[0], b"data_0");
    assert_eq!(collected[1], b"data_1");
    assert_eq!(collected[2], b"data_2");
    drop(collected);

    client.disconnect();
    server.stop();
}

/// Connecting to a dead control endpoint fails within the bounded wait
#[test]
fn test_client_connect_timeout() {
    init_logging();
    let client = Client::new();
    let started = Instant::now();
    let result = client.connect(
        RuntimeConfig::new("127.0.0.1:31599", "tcp://127.0.0.1:31598")
            .with_connect_timeout(Duration::from_millis(300)),
    );
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(RuntimeError::ConnectTimeout { .. })));
    assert!(!client.is_connected());
    assert!(
        elapsed < Duration::from_secs(5),
        "connect wait unbounded: {:?}",
        elapsed
    );
}

/// A reply landing after its wait expired must not be read as the
/// answer to the next request
#[test]
fn test_late_reply_is_not_misdelivered() {
    init_logging();
    let server = Server::new();
    server
        .start(
            RuntimeConfig::new("127.0.0.1:31550", "tcp://127.0.0.1:31551"),
            vec![Arc::new(SlowEcho(Duration::from_millis(300)))],
        )
        .unwrap();

    let client = Client::new();
    client
        .connect(
            RuntimeConfig::new("127.0.0.1:31550", "tcp://127.0.0.1:31551")
                .with_mode(DataMode::Subscribe),
        )
        .unwrap();

    // the handler outlasts this wait; its reply arrives afterwards and
    // sits on the channel socket
    let first = client.request_timeout(b"first", Duration::from_millis(50));
    assert!(matches!(first, Err(RuntimeError::Timeout)));
    thread::sleep(Duration::from_millis(500));

    let second = client
        .request_timeout(b"second", Duration::from_secs(5))
        .unwrap();
    assert_eq!(second, b"second");

    client.disconnect();
    server.stop();
}

/// Full restart on the same ports: stop must release both binds
#[test]
fn test_server_restart_rebinds() {
    init_logging();
    let server = Server::new();
    let config = RuntimeConfig::new("127.0.0.1:31540", "tcp://127.0.0.1:31541");

    server.start(config.clone(), vec![Arc::new(Echo)]).unwrap();
    assert!(server.is_running());
    server.stop();
    assert!(!server.is_running());

    server.start(config, vec![Arc::new(Echo)]).unwrap();
    assert!(server.is_running());
    server.stop();
}
