//! Error types for the serial link.
//!
//! All faults in the core are terminal at the component boundary where they
//! occur: the session converts them into log events and state transitions
//! rather than propagating them across components. Public constructors that
//! can fail still return [`Result`] in the ordinary way so callers may react,
//! but nothing in this crate panics on a link fault.

use thiserror::Error;

/// Result type alias for link operations.
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

/// Main error type for serial link operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LinkError {
    #[error("failed to open serial port {port}: {reason}")]
    Open {
        port: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("serial read failed")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("serial write failed")]
    Write {
        #[source]
        source: std::io::Error,
    },

    #[error("port enumeration failed")]
    Enumerate {
        #[source]
        source: tokio_serial::Error,
    },

    #[error("no serial device matching vendor {vendor_id:#06x} found")]
    NoDevice { vendor_id: u16 },

    #[error("port selection cancelled")]
    SelectionCancelled,

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl LinkError {
    /// Returns whether the fault is plausibly transient. The state machine
    /// recovers from every fault by tearing down to `Disconnected`; this
    /// only advises callers whether an automatic reconnect is worth trying.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Open { .. } => true,
            LinkError::Read { .. } => true,
            LinkError::Write { .. } => true,
            LinkError::Enumerate { .. } => true,
            LinkError::NoDevice { .. } => true,
            LinkError::SelectionCancelled => false,
            LinkError::Config { .. } => false,
        }
    }

    /// Helper constructor for open failures.
    pub fn open_failed(port: impl Into<String>, reason: impl Into<String>) -> Self {
        LinkError::Open { port: port.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for open failures with an underlying cause.
    pub fn open_failed_with_source(
        port: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LinkError::Open {
            port: port.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        LinkError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        LinkError::Read { source: err }
    }
}

impl From<tokio_serial::Error> for LinkError {
    fn from(err: tokio_serial::Error) -> Self {
        LinkError::Enumerate { source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<LinkError>();
    }

    #[test]
    fn messages_carry_context() {
        let err = LinkError::open_failed("/dev/ttyACM0", "device busy");
        let msg = err.to_string();
        assert!(msg.contains("/dev/ttyACM0"));
        assert!(msg.contains("device busy"));

        let err = LinkError::NoDevice { vendor_id: 0x2341 };
        assert!(err.to_string().contains("0x2341"));
    }

    #[test]
    fn retryable_classification() {
        assert!(LinkError::open_failed("COM3", "busy").is_retryable());
        assert!(!LinkError::SelectionCancelled.is_retryable());
        assert!(!LinkError::config("bad baud").is_retryable());
    }

    #[test]
    fn source_chain_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
        let err = LinkError::Write { source: io };
        let source = std::error::Error::source(&err).expect("source should be set");
        assert!(source.to_string().contains("pipe gone"));
    }
}
