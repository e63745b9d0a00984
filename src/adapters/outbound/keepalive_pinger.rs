//! Keepalive Pinger
//!
//! Measures a session connection by sending an out-of-band keepalive
//! request and waiting for the peer's reply.

use crate::domain::ports::{PingError, Pinger, RequestSender};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Request name understood by OpenSSH-compatible peers.
pub const KEEPALIVE_REQUEST: &str = "keepalive@openssh.com";

/// [`Pinger`] for session transports that support named requests.
pub struct KeepAlivePinger {
    client: Arc<dyn RequestSender>,
}

impl KeepAlivePinger {
    pub fn new(client: Arc<dyn RequestSender>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Pinger for KeepAlivePinger {
    /// Send a keepalive request with want-reply set. A rejected request
    /// still completes a round trip and counts as success.
    async fn ping(&self, cancel: &CancellationToken) -> Result<(), PingError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PingError::Cancelled),
            result = self.client.send_request(KEEPALIVE_REQUEST, true, &[]) => {
                result.map(|_| ()).map_err(|source| PingError::Request {
                    request: KEEPALIVE_REQUEST.to_string(),
                    source,
                })
            }
        }
    }
}
