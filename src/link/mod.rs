//! Physical link abstraction.
//!
//! [`Link`] is the seam between the session state machine and the actual
//! transport. The production implementation is [`SerialLink`] over a USB
//! serial port; tests drive the session with in-memory links implementing
//! the same trait.
//!
//! Port selection is a callback boundary: the core enumerates candidate
//! ports filtered by vendor id and asks a [`PortPicker`] to choose. The
//! desktop shell supplies a picker that shows its device dialog; the
//! default picker accepts a sole match and declines ambiguity.

pub mod serial;

use async_trait::async_trait;
use tokio_serial::SerialPortType;

use crate::error::Result;

pub use serial::SerialLink;

/// A bidirectional byte link carrying the firmware's text protocol.
///
/// Implementations own their handle exclusively; the session task is the
/// only caller, so no method needs to be cancel-safe against concurrent
/// use from elsewhere.
#[async_trait]
pub trait Link: Send + 'static {
    /// Await the next chunk of decoded text.
    ///
    /// Returns:
    /// - `Ok(Some(text))` - a chunk arrived, of arbitrary length and split
    /// - `Ok(None)` - the stream ended (device dropped the link)
    /// - `Err(e)` - an I/O fault
    async fn read_chunk(&mut self) -> Result<Option<String>>;

    /// Write one command, appending the `\n` terminator.
    async fn write_line(&mut self, line: &str) -> Result<()>;

    /// Best-effort release of the underlying handle. Must not fail loudly;
    /// teardown never short-circuits on a failing step.
    async fn shutdown(&mut self);
}

/// A candidate serial port surfaced to the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS path, e.g. `/dev/ttyACM0` or `COM3`.
    pub name: String,
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Product string, when the descriptor carries one.
    pub product: Option<String>,
}

/// Enumerate USB serial ports matching a vendor id.
pub fn enumerate_ports(vendor_id: u16) -> Result<Vec<PortInfo>> {
    let ports = tokio_serial::available_ports()?;
    let matches = ports
        .into_iter()
        .filter_map(|port| match port.port_type {
            SerialPortType::UsbPort(usb) if usb.vid == vendor_id => Some(PortInfo {
                name: port.port_name,
                vendor_id: usb.vid,
                product_id: usb.pid,
                product: usb.product,
            }),
            _ => None,
        })
        .collect();
    Ok(matches)
}

/// Callback boundary for choosing among candidate ports.
///
/// Returning `None` cancels the connect attempt; cancellation is not a
/// fault.
#[async_trait]
pub trait PortPicker: Send + Sync {
    /// Choose a port path from the candidates, or decline.
    async fn pick(&self, ports: &[PortInfo]) -> Option<String>;
}

/// Default picker: a single candidate is taken, anything else declines.
/// Shells that can prompt the operator replace this.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstMatchPicker;

#[async_trait]
impl PortPicker for FirstMatchPicker {
    async fn pick(&self, ports: &[PortInfo]) -> Option<String> {
        match ports {
            [only] => Some(only.name.clone()),
            _ => None,
        }
    }
}
