//! Serial port link over tokio-serial.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, trace};

use crate::error::{LinkError, Result};
use crate::link::Link;

/// Read chunk size. The firmware's frames are small (well under 1 KiB);
/// the decoder handles any split, so the size only bounds syscall batching.
const READ_BUF: usize = 1024;

/// A USB serial link to the controller.
pub struct SerialLink {
    stream: SerialStream,
    path: String,
}

impl SerialLink {
    /// Open a serial port at the given baud rate.
    pub async fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let stream = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| LinkError::open_failed_with_source(path, Box::new(e)))?;
        debug!(port = path, baud_rate, "serial port opened");
        Ok(Self { stream, path: path.to_string() })
    }

    /// OS path of the open port.
    pub fn path(&self) -> &str {
        &self.path
    }
}

#[async_trait]
impl Link for SerialLink {
    async fn read_chunk(&mut self) -> Result<Option<String>> {
        let mut buf = [0u8; READ_BUF];
        match self.stream.read(&mut buf).await {
            // Zero-length read: the device dropped the link.
            Ok(0) => Ok(None),
            // The protocol is ASCII JSON; lossy decoding only matters for
            // corrupted bytes, which the frame parser discards anyway.
            Ok(n) => {
                trace!(bytes = n, "serial chunk");
                Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned()))
            }
            Err(e) => Err(LinkError::Read { source: e }),
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LinkError::Write { source: e })?;
        self.stream.write_all(b"\n").await.map_err(|e| LinkError::Write { source: e })?;
        self.stream.flush().await.map_err(|e| LinkError::Write { source: e })?;
        Ok(())
    }

    async fn shutdown(&mut self) {
        // Flush what we can; the handle closes on drop.
        if let Err(e) = self.stream.flush().await {
            debug!(port = %self.path, error = %e, "flush during shutdown failed");
        }
    }
}
