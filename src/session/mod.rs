//! Transport session state machine.
//!
//! The session owns the physical link lifecycle and is the single writer
//! of [`ConnectionState`]. All link I/O runs on one spawned task that
//! multiplexes the read loop, the status poll interval, and the outbound
//! command mailbox with `select!`, so the decoder, the snapshot, and the
//! connection state are only ever touched from one logical timeline.
//!
//! State transitions:
//!
//! - `Disconnected -> Connecting` on [`Session::connect`]; a request while
//!   already `Connecting` or `Connected` is a no-op
//! - `Connecting -> Connected` when the port opens; the decoder starts
//!   empty and polling begins
//! - `Connecting -> Disconnected` when the open fails (fault logged)
//! - `Connected -> Error` on a read or write fault
//! - `Connected`/`Error` -> `Disconnected` on explicit disconnect or
//!   stream end; teardown is unconditional and best-effort
//!
//! Disconnect is the only cancellation primitive: it stops polling, stops
//! the read loop, releases the link, and lands on `Disconnected` exactly
//! once, logging nothing if the session was already down.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::framing::FrameDecoder;
use crate::link::{FirstMatchPicker, Link, PortPicker, SerialLink, enumerate_ports};
use crate::store::StateStore;
use crate::types::{ConnectionState, LogSeverity};

/// Mailbox message for the session task.
enum SessionCommand {
    Write { line: String, reply: oneshot::Sender<bool> },
}

/// Handles for a running session task.
struct Active {
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Why the session task's loop ended.
#[derive(Debug)]
enum Exit {
    /// Explicit disconnect or handle drop.
    Cancelled,
    /// The device dropped the link (zero-length read).
    StreamEnded,
    /// A read or write fault; state already moved to `Error`.
    Fault,
}

/// A serial session to the controller.
///
/// Construct one per link, share its [`StateStore`] with consumers, and
/// drive it with [`connect`](Session::connect) /
/// [`disconnect`](Session::disconnect) / [`send`](Session::send).
pub struct Session {
    config: LinkConfig,
    store: Arc<StateStore>,
    picker: Box<dyn PortPicker>,
    inner: Mutex<Option<Active>>,
}

impl Session {
    /// Create a session with its own state store and the default picker.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_store(config, Arc::new(StateStore::new()))
    }

    /// Create a session sharing an existing state store.
    pub fn with_store(config: LinkConfig, store: Arc<StateStore>) -> Self {
        Self { config, store, picker: Box::new(FirstMatchPicker), inner: Mutex::new(None) }
    }

    /// Replace the port picker (e.g. with a shell-provided device dialog).
    pub fn with_picker(mut self, picker: impl PortPicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    /// The shared state store consumers subscribe to.
    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }

    /// Session configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Open the serial port and start the session.
    ///
    /// Ports are enumerated by the configured vendor id unless
    /// `config.port` pins a path; the picker chooses among candidates.
    /// A connect while already `Connecting` or `Connected` is a no-op.
    pub async fn connect(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if self.guard_connect(&mut inner).await {
            return Ok(());
        }
        self.config.validate()?;

        self.store.set_connection(ConnectionState::Connecting);
        self.store.log(LogSeverity::Info, "Requesting serial port...");

        let path = match self.resolve_port().await {
            Ok(path) => path,
            Err(LinkError::SelectionCancelled) => {
                // Operator backed out; not a fault.
                self.store.log(LogSeverity::Info, "Port selection cancelled");
                self.store.set_connection(ConnectionState::Disconnected);
                return Err(LinkError::SelectionCancelled);
            }
            Err(e) => {
                self.fail_connect(&e);
                return Err(e);
            }
        };

        match SerialLink::open(&path, self.config.baud_rate).await {
            Ok(link) => {
                self.start(&mut inner, link);
                Ok(())
            }
            Err(e) => {
                self.fail_connect(&e);
                Err(e)
            }
        }
    }

    /// Start a session over an already-open link. This is the seam tests
    /// and custom transports use; state machine behavior is identical to
    /// [`connect`](Session::connect) after the open.
    pub async fn connect_with<L: Link>(&self, link: L) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if self.guard_connect(&mut inner).await {
            return Ok(());
        }
        self.config.validate()?;
        self.store.set_connection(ConnectionState::Connecting);
        self.start(&mut inner, link);
        Ok(())
    }

    /// Tear the session down. Idempotent: a disconnect while already
    /// `Disconnected` has no side effects and logs nothing.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(active) = inner.take() {
            shutdown_task(active).await;
        }
    }

    /// Write a command to the firmware, appending the line terminator.
    ///
    /// Rejects with `false` (no write attempt) unless the state is
    /// `Connected`. On success a `CommandSent` event carries the raw text.
    pub async fn send(&self, command: &str) -> bool {
        if !self.store.connection().can_send() {
            warn!(command, "send rejected: not connected");
            return false;
        }
        let commands = self.inner.lock().await.as_ref().map(|active| active.commands.clone());
        let Some(commands) = commands else {
            return false;
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let message = SessionCommand::Write { line: command.to_string(), reply: reply_tx };
        if commands.send(message).await.is_err() {
            // Task already tearing down.
            return false;
        }
        reply_rx.await.unwrap_or(false)
    }

    /// Encode and send a typed command.
    pub async fn send_command(&self, command: &Command) -> bool {
        self.send(&command.encode()).await
    }

    /// Returns true when connect should be a no-op. Also reaps a task that
    /// ended on its own (stream end) and finishes teardown of a faulted one
    /// so a reconnect starts clean.
    async fn guard_connect(&self, inner: &mut Option<Active>) -> bool {
        if inner.as_ref().is_some_and(|active| active.task.is_finished()) {
            *inner = None;
        }
        match self.store.connection() {
            state @ (ConnectionState::Connecting | ConnectionState::Connected) => {
                debug!(%state, "connect ignored: already active");
                true
            }
            _ => {
                if let Some(active) = inner.take() {
                    shutdown_task(active).await;
                }
                false
            }
        }
    }

    async fn resolve_port(&self) -> Result<String> {
        if let Some(path) = &self.config.port {
            return Ok(path.clone());
        }
        let ports = enumerate_ports(self.config.vendor_id)?;
        if ports.is_empty() {
            return Err(LinkError::NoDevice { vendor_id: self.config.vendor_id });
        }
        self.picker.pick(&ports).await.ok_or(LinkError::SelectionCancelled)
    }

    fn fail_connect(&self, error: &LinkError) {
        error!(%error, "connect failed");
        self.store.log(LogSeverity::Error, format!("Connection failed: {error}"));
        self.store.set_connection(ConnectionState::Disconnected);
    }

    fn start<L: Link>(&self, inner: &mut Option<Active>, link: L) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        self.store.set_connection(ConnectionState::Connected);
        self.store
            .log(LogSeverity::Info, format!("Connected at {} baud", self.config.baud_rate));

        let task = tokio::spawn(run_loop(
            link,
            Arc::clone(&self.store),
            self.config.clone(),
            command_rx,
            cancel.clone(),
        ));
        *inner = Some(Active { commands: command_tx, cancel, task });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Cannot await in drop; cancel and let the task finish teardown.
        if let Ok(inner) = self.inner.try_lock()
            && let Some(active) = inner.as_ref()
        {
            debug!("dropping session, cancelling task");
            active.cancel.cancel();
        }
    }
}

async fn shutdown_task(active: Active) {
    active.cancel.cancel();
    if let Err(e) = active.task.await {
        debug!(error = %e, "session task join failed");
    }
}

/// The session task: one cooperative loop owning the link and decoder.
///
/// The poll interval fires immediately on entry, so the first status
/// request goes out as soon as the session is up.
async fn run_loop<L: Link>(
    mut link: L,
    store: Arc<StateStore>,
    config: LinkConfig,
    mut commands: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
) {
    // A fresh decoder per session; a stale partial frame from a prior
    // connection can never prefix this one.
    let mut decoder = FrameDecoder::new(config.framing.clone());
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("session task started");

    let exit = loop {
        tokio::select! {
            _ = cancel.cancelled() => break Exit::Cancelled,

            chunk = link.read_chunk() => match chunk {
                Ok(Some(text)) => {
                    let outcome = decoder.feed(&text);
                    for fault in &outcome.faults {
                        warn!(%fault, "framing fault");
                        store.log(LogSeverity::Warning, fault.to_string());
                    }
                    for frame in outcome.frames {
                        store.apply_frame(frame);
                    }
                }
                Ok(None) => {
                    warn!("serial stream ended unexpectedly");
                    store.log(
                        LogSeverity::Warning,
                        "Serial stream ended; device may have disconnected",
                    );
                    break Exit::StreamEnded;
                }
                Err(e) => {
                    error!(error = %e, "read failed");
                    store.log(LogSeverity::Error, format!("Serial read error: {e}"));
                    store.set_connection(ConnectionState::Error);
                    break Exit::Fault;
                }
            },

            _ = poll.tick() => {
                if !write_command(&mut link, &store, &config.poll_command).await {
                    store.set_connection(ConnectionState::Error);
                    break Exit::Fault;
                }
            }

            cmd = commands.recv() => match cmd {
                Some(SessionCommand::Write { line, reply }) => {
                    let ok = write_command(&mut link, &store, &line).await;
                    let _ = reply.send(ok);
                    if !ok {
                        store.set_connection(ConnectionState::Error);
                        break Exit::Fault;
                    }
                }
                // All senders gone: the session handle was dropped.
                None => break Exit::Cancelled,
            }
        }
    };

    // Unconditional teardown. Every step is best-effort; a failing flush
    // never prevents the handle release or the final state transition.
    link.shutdown().await;
    drop(link);
    commands.close();

    if store.connection() != ConnectionState::Disconnected {
        store.set_connection(ConnectionState::Disconnected);
        store.log(LogSeverity::Info, "Disconnected");
    }
    debug!(?exit, "session task ended");
}

/// Write one command line; returns whether the write succeeded. Success
/// emits the command-sent event for audit consumers.
async fn write_command<L: Link>(link: &mut L, store: &StateStore, line: &str) -> bool {
    match link.write_line(line).await {
        Ok(()) => {
            store.command_sent(line);
            true
        }
        Err(e) => {
            error!(error = %e, "write failed");
            store.log(LogSeverity::Error, format!("Send error: {e}"));
            false
        }
    }
}
