//! The byte-stream port: what a BridgeSession needs from a transport.
//!
//! A USB-serial port and a BLE notification channel look very different at
//! the OS level, but both carry an ordered, lossless stream of bytes that may
//! arrive fragmented.  [`ByteStream`] is that common shape.  Implementations
//! live in the infrastructure layer (`SerialStream`, `MockStream`).

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port or device could not be opened.  Fatal to the connect attempt.
    #[error("failed to open {port}: {source}")]
    OpenFailed {
        port: String,
        #[source]
        source: std::io::Error,
    },
    /// A read or write failed on an open link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The underlying transport reports the link is gone.
    #[error("transport is not connected")]
    NotConnected,
}

/// An open, bidirectional byte channel to the device.
///
/// Dropping the stream closes it.
pub trait ByteStream: Send {
    /// Name of the endpoint this stream is connected to (e.g. `COM6`).
    fn name(&self) -> &str;

    /// Reads whatever bytes are available into `buf`, waiting no longer than
    /// the stream's read timeout.
    ///
    /// Returns `Ok(0)` when the timeout elapsed with nothing received; that
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on an I/O failure.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Writes all of `bytes`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on an I/O failure.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Discards inbound bytes that arrived before this call.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on an I/O failure.
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Whether the transport still considers the link up.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<T: ByteStream + ?Sized> ByteStream for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        (**self).read(buf)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_all(bytes)
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        (**self).clear_input()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
