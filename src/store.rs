//! Shared state store and event hub.
//!
//! The store is the single process-wide aggregation point: decoded frames
//! merge into a cumulative snapshot, alarm transitions are edge-detected,
//! and typed events fan out to subscribers. There is no global instance;
//! construct one [`StateStore`], wrap it in an `Arc`, and hand it to the
//! session and every consumer.
//!
//! Subscribers each own an independent broadcast receiver, so a slow or
//! failing consumer cannot block delivery to the others. Event payloads are
//! owned copies (snapshots behind `Arc`), never live references into the
//! store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::alarm::{AlarmStatus, decode_alarm_status};
use crate::types::{ConnectionState, Frame, LogEntry, LogSeverity, WireValue};

/// Snapshot keys checked for the compound alarm/status value, in order.
const ALARM_KEYS: [&str; 2] = ["AlarmStatus", "ErrorCode_STATE"];

/// Cumulative merged mapping of every firmware key seen this session.
pub type Snapshot = BTreeMap<String, WireValue>;

/// An alarm transition: the raw status string changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmChange {
    /// Raw compound status string as reported.
    pub raw: String,
    /// Decoded operating mode and error entry.
    pub status: AlarmStatus,
}

/// The closed set of events the store emits.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A frame was merged; carries the full updated snapshot, not a delta.
    Data(Arc<Snapshot>),
    /// The connection state changed.
    Connection(ConnectionState),
    /// The alarm/status value changed (edge, de-duplicated on the raw string).
    Alarm(AlarmChange),
    /// A timestamped operator log entry.
    Log(LogEntry),
    /// A command was written to the link; carries the raw command text.
    CommandSent(String),
}

#[derive(Default)]
struct StoreInner {
    snapshot: Snapshot,
    connection: ConnectionState,
    alarm_raw: Option<String>,
    session_start: Option<DateTime<Utc>>,
}

/// Shared state store and typed event hub.
pub struct StateStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Channel capacity: enough to absorb a burst of frames while a
    /// subscriber catches up; laggards drop oldest, never block.
    const EVENT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        let (events, _) = broadcast::channel(Self::EVENT_CAPACITY);
        Self { inner: Mutex::new(StoreInner::default()), events }
    }

    /// Subscribe to all store events. Each receiver is independent.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Subscribe as a `Stream` of events.
    pub fn events(&self) -> BroadcastStream<StoreEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Merge a decoded frame into the snapshot and emit a `Data` event
    /// carrying the full updated snapshot. If the frame carries the alarm
    /// key and its value differs from the last recorded raw string, an
    /// `Alarm` event follows; equal values never re-emit.
    pub fn apply_frame(&self, frame: Frame) {
        let (snapshot, alarm) = {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            for (key, value) in frame.iter() {
                inner.snapshot.insert(key.clone(), value.clone());
            }
            let snapshot = Arc::new(inner.snapshot.clone());

            let mut alarm = None;
            if let Some(value) = ALARM_KEYS.iter().find_map(|key| frame.get(key)) {
                let raw = value.to_string();
                if inner.alarm_raw.as_deref() != Some(raw.as_str()) {
                    inner.alarm_raw = Some(raw.clone());
                    alarm = Some(raw);
                }
            }

            (snapshot, alarm)
        };

        trace!(keys = snapshot.len(), "frame merged");
        self.emit(StoreEvent::Data(snapshot));
        if let Some(raw) = alarm {
            let status = decode_alarm_status(&raw);
            self.emit(StoreEvent::Alarm(AlarmChange { raw, status }));
        }
    }

    /// Record a new connection state and emit a `Connection` event. The
    /// session-start timestamp is set on the first transition into
    /// `Connected` and cleared on `Disconnected`.
    pub fn set_connection(&self, state: ConnectionState) {
        {
            let mut inner = self.inner.lock().expect("store lock poisoned");
            inner.connection = state;
            match state {
                ConnectionState::Connected if inner.session_start.is_none() => {
                    inner.session_start = Some(Utc::now());
                }
                ConnectionState::Disconnected => inner.session_start = None,
                _ => {}
            }
        }
        self.emit(StoreEvent::Connection(state));
    }

    /// Timestamp and emit a `Log` event. Entries are not retained; delivery
    /// to current subscribers is the whole contract.
    pub fn log(&self, severity: LogSeverity, message: impl Into<String>) {
        self.emit(StoreEvent::Log(LogEntry::new(severity, message)));
    }

    /// Emit a `CommandSent` event for a successfully written command.
    pub fn command_sent(&self, raw: impl Into<String>) {
        self.emit(StoreEvent::CommandSent(raw.into()));
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().expect("store lock poisoned").snapshot.clone()
    }

    /// Current connection state.
    pub fn connection(&self) -> ConnectionState {
        self.inner.lock().expect("store lock poisoned").connection
    }

    /// Last recorded raw alarm string, if any frame carried one yet.
    pub fn alarm_raw(&self) -> Option<String> {
        self.inner.lock().expect("store lock poisoned").alarm_raw.clone()
    }

    /// When the current session first reached `Connected`, if connected.
    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().expect("store lock poisoned").session_start
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine; events are fire-and-forget.
        let _ = self.events.send(event);
    }
}
