//! Transport Ports
//!
//! The narrow slices of session and socket clients that the pinger
//! strategies need. Concrete connections implement these in the adapter
//! layer; the monitor never owns or closes them.

use super::pinger::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Session client able to send named out-of-band requests
/// (e.g. an SSH connection's global requests).
#[async_trait]
pub trait RequestSender: Send + Sync {
    /// Send a request and, if `want_reply` is set, wait for the peer's answer.
    ///
    /// Returns whether the peer accepted the request and the reply payload.
    async fn send_request(
        &self,
        name: &str,
        want_reply: bool,
        payload: &[u8],
    ) -> Result<(bool, Vec<u8>), TransportError>;
}

/// Control frame that can be written to a full-duplex socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlFrame {
    Ping(Vec<u8>),
    Pong(Vec<u8>),
}

/// Callback invoked with the payload of every inbound pong frame.
pub type PongHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Full-duplex socket with ping/pong control frames (e.g. a WebSocket).
#[async_trait]
pub trait ControlFrameSocket: Send + Sync {
    /// Write a control frame, failing if it cannot be written before `deadline`.
    async fn write_control(&self, frame: ControlFrame, deadline: Instant) -> Result<(), TransportError>;

    /// Currently installed pong handler, if any.
    fn pong_handler(&self) -> Option<PongHandler>;

    /// Replace the pong handler.
    fn set_pong_handler(&self, handler: PongHandler);
}
