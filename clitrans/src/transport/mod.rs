//! Transport layer: a duplex byte channel to a device.
//!
//! [`Transport`] is the seam between the session engine and the wire.
//! [`SshTransport`] speaks SSH through russh; [`ScriptedTransport`] is an
//! in-memory device used by tests and by vendor handler tests.

mod script;
mod ssh;

pub use script::{ScriptedTransport, TranscriptLog};
pub use ssh::SshTransport;

use async_trait::async_trait;

use crate::error::TransportError;

/// A duplex, chunk-oriented channel to a device shell.
///
/// Implementations must make [`read`](Transport::read) cancel-safe: the
/// session abandons a pending read when its deadline passes, and no data
/// may be lost when that happens.
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the device.
    async fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next chunk of output. `Ok(None)` means the channel closed.
    async fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError>;

    /// Close the channel and the underlying connection.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether the connection is still usable.
    fn is_alive(&self) -> bool {
        true
    }
}
