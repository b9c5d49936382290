//! Async serial telemetry and command link for industrial fluid-handling
//! controllers.
//!
//! Fluidlink is the core of a controller dashboard: it opens a USB serial
//! link, reconstructs JSON telemetry frames from the raw byte stream,
//! polls the firmware for status, and aggregates everything into a shared
//! state store that re-broadcasts typed events. Rendering, dialogs, and
//! the desktop shell live elsewhere and consume the store's events.
//!
//! # Architecture
//!
//! - [`FrameDecoder`]: brace-counting extraction of JSON objects from an
//!   unframed, possibly corrupted text stream
//! - [`Session`]: the link lifecycle state machine; read loop, status
//!   polling, and command writes multiplexed on one task
//! - [`StateStore`]: snapshot merging, alarm edge detection, and the
//!   typed event hub consumers subscribe to
//! - [`Link`]: the transport seam; [`SerialLink`] in production,
//!   in-memory implementations in tests
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fluidlink::{Command, LinkConfig, Session, StoreEvent};
//!
//! #[tokio::main]
//! async fn main() -> fluidlink::Result<()> {
//!     let session = Session::new(LinkConfig::default());
//!     let store = session.store();
//!     let mut events = store.subscribe();
//!
//!     session.connect().await?;
//!     session.send_command(&Command::set_mode("Run", true)).await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let StoreEvent::Data(snapshot) = event {
//!             println!("{} keys", snapshot.len());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod alarm;
pub mod command;
pub mod config;
mod error;
pub mod framing;
pub mod keys;
pub mod link;
pub mod session;
pub mod store;
pub mod types;

pub use alarm::{AlarmError, AlarmStatus, OpMode, Severity, decode_alarm_status, is_active_error};
pub use command::Command;
pub use config::{FramingConfig, LinkConfig};
pub use error::{LinkError, Result};
pub use framing::{FeedOutcome, FrameDecoder, FramingFault};
pub use keys::{KeyKind, humanize_key, unit_for_key};
pub use link::{FirstMatchPicker, Link, PortInfo, PortPicker, SerialLink, enumerate_ports};
pub use session::Session;
pub use store::{AlarmChange, Snapshot, StateStore, StoreEvent};
pub use types::{ConnectionState, Frame, LogEntry, LogSeverity, WireValue};
