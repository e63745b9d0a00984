//! Pinger Port
//!
//! Defines the round trip probe used to measure one leg of a connection.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Error raised by an underlying transport.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by a [`Pinger`].
#[derive(Debug, thiserror::Error)]
pub enum PingError {
    #[error("ping cancelled")]
    Cancelled,
    #[error("sending request {request}")]
    Request {
        request: String,
        #[source]
        source: TransportError,
    },
    #[error("sending ping message")]
    Send(#[source] TransportError),
    #[error("connection closed before pong was received")]
    Closed,
}

impl PingError {
    /// Whether this error is the result of cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PingError::Cancelled)
    }
}

/// Mechanism used to measure the round trip time of a connection.
///
/// Implementations send exactly one probe and return once the matching
/// response has been received or the probe failed. They must not retry,
/// and must return [`PingError::Cancelled`] promptly once `cancel` fires.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, cancel: &CancellationToken) -> Result<(), PingError>;
}
