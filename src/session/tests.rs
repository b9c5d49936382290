//! Session state machine tests over an in-memory link.
//!
//! These drive the full connect / read / poll / send / teardown cycle with
//! a channel-backed mock link, asserting the state transitions and events
//! the session contract guarantees.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use super::*;
use crate::error::LinkError;
use crate::store::StoreEvent;
use crate::types::WireValue;

/// Link half handed to the session.
struct MockLink {
    incoming: mpsc::UnboundedReceiver<Result<String>>,
    written: mpsc::UnboundedSender<String>,
    fail_writes: Arc<AtomicBool>,
}

/// Test-side handle: feed chunks in, observe writes out.
struct MockHandle {
    incoming: mpsc::UnboundedSender<Result<String>>,
    written: mpsc::UnboundedReceiver<String>,
    fail_writes: Arc<AtomicBool>,
}

fn mock_link() -> (MockLink, MockHandle) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let fail_writes = Arc::new(AtomicBool::new(false));
    (
        MockLink {
            incoming: incoming_rx,
            written: written_tx,
            fail_writes: Arc::clone(&fail_writes),
        },
        MockHandle { incoming: incoming_tx, written: written_rx, fail_writes },
    )
}

#[async_trait]
impl Link for MockLink {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        match self.incoming.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            // Sender dropped: the device went away.
            None => Ok(None),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::Write {
                source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "mock write failure"),
            });
        }
        let _ = self.written.send(line.to_string());
        Ok(())
    }

    async fn shutdown(&mut self) {}
}

/// Quiet config: the first poll still fires immediately on connect, but no
/// further ticks land within a test's lifetime.
fn quiet_config() -> LinkConfig {
    LinkConfig { poll_interval: Duration::from_secs(3600), ..Default::default() }
}

async fn wait_for(
    rx: &mut broadcast::Receiver<StoreEvent>,
    pred: impl Fn(&StoreEvent) -> bool,
) -> StoreEvent {
    timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event channel closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn is_connection(event: &StoreEvent, state: ConnectionState) -> bool {
    matches!(event, StoreEvent::Connection(s) if *s == state)
}

#[tokio::test]
async fn connect_reaches_connected_and_stamps_session_start() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, _handle) = mock_link();
    session.connect_with(link).await.unwrap();

    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connecting)).await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connected)).await;
    assert_eq!(store.connection(), ConnectionState::Connected);
    assert!(store.session_start().is_some());
}

#[tokio::test]
async fn frames_flow_from_link_into_snapshot() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();

    // A frame split across chunk boundaries, with leading noise.
    handle.incoming.send(Ok("noise{\"FluidTemperature_ST".to_string())).unwrap();
    handle.incoming.send(Ok("ATE\":41.5}{\"Flow_STATE\":".to_string())).unwrap();
    handle.incoming.send(Ok("30}".to_string())).unwrap();

    let event = wait_for(&mut rx, |e| {
        matches!(e, StoreEvent::Data(s) if s.contains_key("Flow_STATE"))
    })
    .await;
    match event {
        StoreEvent::Data(snapshot) => {
            assert_eq!(
                snapshot.get("FluidTemperature_STATE"),
                Some(&WireValue::Number(41.5))
            );
            assert_eq!(snapshot.get("Flow_STATE"), Some(&WireValue::Number(30.0)));
        }
        other => panic!("expected data event, got {other:?}"),
    }
}

#[tokio::test]
async fn alarm_transitions_surface_through_the_session() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();

    handle.incoming.send(Ok(r#"{"AlarmStatus":"RUN-HEATER_ERROR"}"#.to_string())).unwrap();

    let event = wait_for(&mut rx, |e| matches!(e, StoreEvent::Alarm(_))).await;
    match event {
        StoreEvent::Alarm(change) => {
            assert_eq!(change.raw, "RUN-HEATER_ERROR");
            assert!(change.status.error.is_active());
        }
        other => panic!("expected alarm event, got {other:?}"),
    }
}

#[tokio::test]
async fn framing_faults_surface_as_warning_logs() {
    let session = Session::new(LinkConfig {
        framing: crate::config::FramingConfig { max_buffer: 32, max_frames_per_feed: 50 },
        ..quiet_config()
    });
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();

    handle.incoming.send(Ok(format!("{{\"stuck\":{}", "9".repeat(64)))).unwrap();

    wait_for(&mut rx, |e| {
        matches!(e, StoreEvent::Log(entry)
            if entry.severity == LogSeverity::Warning && entry.message.contains("overflow"))
    })
    .await;
    // A framing fault is non-fatal; the session stays connected.
    assert_eq!(store.connection(), ConnectionState::Connected);
}

#[tokio::test]
async fn stream_end_warns_and_tears_down() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connected)).await;

    // Simulate the device dropping the link.
    drop(handle.incoming);

    wait_for(&mut rx, |e| {
        matches!(e, StoreEvent::Log(entry)
            if entry.severity == LogSeverity::Warning && entry.message.contains("stream ended"))
    })
    .await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Disconnected)).await;
    assert_eq!(store.connection(), ConnectionState::Disconnected);
    assert!(store.session_start().is_none());
}

#[tokio::test]
async fn read_error_faults_then_disconnects() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();

    handle
        .incoming
        .send(Err(LinkError::Read { source: std::io::Error::other("mock read failure") }))
        .unwrap();

    // Emission order: the fault is logged, then Error, then teardown lands
    // on Disconnected.
    wait_for(&mut rx, |e| {
        matches!(e, StoreEvent::Log(entry)
            if entry.severity == LogSeverity::Error && entry.message.contains("read error"))
    })
    .await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Error)).await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Disconnected)).await;
}

#[tokio::test]
async fn send_while_disconnected_is_rejected_without_a_write() {
    let session = Session::new(quiet_config());
    assert_eq!(session.store().connection(), ConnectionState::Disconnected);
    assert!(!session.send(r#"{"Run_MODE":"1"}"#).await);
}

#[tokio::test]
async fn send_writes_the_line_and_emits_command_sent() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, mut handle) = mock_link();
    session.connect_with(link).await.unwrap();

    // The immediate first poll is the first write.
    let first = timeout(Duration::from_secs(2), handle.written.recv()).await.unwrap().unwrap();
    assert_eq!(first, r#"{"GET":"ALL"}"#);

    assert!(session.send_command(&Command::set_mode("Run", true)).await);
    let written = timeout(Duration::from_secs(2), handle.written.recv()).await.unwrap().unwrap();
    assert_eq!(written, r#"{"Run_MODE":"1"}"#);

    wait_for(&mut rx, |e| {
        matches!(e, StoreEvent::CommandSent(raw) if raw == r#"{"Run_MODE":"1"}"#)
    })
    .await;
}

#[tokio::test]
async fn polling_repeats_the_status_request() {
    let session = Session::new(LinkConfig {
        poll_interval: Duration::from_millis(20),
        ..Default::default()
    });
    let (link, mut handle) = mock_link();
    session.connect_with(link).await.unwrap();

    for _ in 0..3 {
        let written =
            timeout(Duration::from_secs(2), handle.written.recv()).await.unwrap().unwrap();
        assert_eq!(written, r#"{"GET":"ALL"}"#);
    }

    // Polling stops with the session.
    session.disconnect().await;
    while handle.written.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(handle.written.try_recv().is_err());
}

#[tokio::test]
async fn write_failure_faults_the_session() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connected)).await;

    handle.fail_writes.store(true, Ordering::SeqCst);
    assert!(!session.send(r#"{"Purge_MODE":"1"}"#).await);

    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Error)).await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Disconnected)).await;
}

#[tokio::test]
async fn connect_while_active_is_a_noop() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (first, _first_handle) = mock_link();
    let (second, _second_handle) = mock_link();
    session.connect_with(first).await.unwrap();
    session.connect_with(second).await.unwrap();

    // Transitions happen synchronously inside connect_with, so the event
    // backlog is complete: exactly one Connecting, the second was ignored.
    assert_eq!(store.connection(), ConnectionState::Connected);
    let mut connecting = 0;
    while let Ok(event) = rx.try_recv() {
        if is_connection(&event, ConnectionState::Connecting) {
            connecting += 1;
        }
    }
    assert_eq!(connecting, 1);
}

#[tokio::test]
async fn disconnect_is_idempotent_and_logs_once() {
    let session = Session::new(quiet_config());
    let store = session.store();

    let (link, _handle) = mock_link();
    session.connect_with(link).await.unwrap();

    let mut rx = store.subscribe();
    session.disconnect().await;
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Disconnected)).await;

    // Drain, then disconnect again: nothing new may be emitted.
    while rx.try_recv().is_ok() {}
    session.disconnect().await;
    assert!(rx.try_recv().is_err());
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn reconnect_after_stream_end_works() {
    let session = Session::new(quiet_config());
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connected)).await;

    drop(handle.incoming);
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Disconnected)).await;

    let (link, handle) = mock_link();
    session.connect_with(link).await.unwrap();
    wait_for(&mut rx, |e| is_connection(e, ConnectionState::Connected)).await;
    assert_eq!(store.connection(), ConnectionState::Connected);

    // The new session is live end to end.
    handle.incoming.send(Ok(r#"{"a":1}"#.to_string())).unwrap();
    wait_for(&mut rx, |e| matches!(e, StoreEvent::Data(s) if s.contains_key("a"))).await;
}

#[tokio::test]
async fn invalid_config_is_rejected_before_any_transition() {
    let mut config = quiet_config();
    config.baud_rate = 0;
    let session = Session::new(config);
    let store = session.store();
    let mut rx = store.subscribe();

    let (link, _handle) = mock_link();
    assert!(session.connect_with(link).await.is_err());
    assert!(rx.try_recv().is_err());
    assert_eq!(store.connection(), ConnectionState::Disconnected);
}
