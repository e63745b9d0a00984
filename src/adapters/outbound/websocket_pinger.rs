//! WebSocket Pinger
//!
//! Measures a full-duplex socket by writing a ping control frame with a
//! random payload and waiting for the pong that echoes it.

use crate::domain::ports::{Clock, ControlFrame, ControlFrameSocket, PingError, Pinger, PongHandler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

/// Deadline for writing the ping frame.
pub const PING_WRITE_DEADLINE: Duration = Duration::from_secs(2);

/// [`Pinger`] for sockets with ping/pong control frames.
///
/// Installing the pinger chains a pong handler in front of any handler
/// already on the socket, so existing consumers keep receiving pongs.
pub struct WebSocketPinger {
    socket: Arc<dyn ControlFrameSocket>,
    clock: Arc<dyn Clock>,
    /// Single-slot buffer fed by the pong handler
    pongs: Mutex<mpsc::Receiver<Vec<u8>>>,
    span: Span,
}

impl WebSocketPinger {
    pub fn new(clock: Arc<dyn Clock>, socket: Arc<dyn ControlFrameSocket>) -> Self {
        let (tx, rx) = mpsc::channel(1);

        let previous = socket.pong_handler();
        let handler: PongHandler = Arc::new(move |payload: &[u8]| {
            let _ = tx.try_send(payload.to_vec());
            if let Some(previous) = &previous {
                previous(payload);
            }
        });
        socket.set_pong_handler(handler);

        Self {
            socket,
            clock,
            pongs: Mutex::new(rx),
            span: Span::current(),
        }
    }

    /// Record events under `span` instead of the caller's current span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    async fn round_trip(&self) -> Result<(), PingError> {
        let token = Uuid::new_v4().to_string();
        let mut pongs = self.pongs.lock().await;

        // Pongs left over from an abandoned ping would otherwise occupy the slot.
        while pongs.try_recv().is_ok() {}

        let deadline = self.clock.now() + PING_WRITE_DEADLINE;
        self.socket
            .write_control(ControlFrame::Ping(token.clone().into_bytes()), deadline)
            .await
            .map_err(PingError::Send)?;

        loop {
            match pongs.recv().await {
                Some(payload) if payload == token.as_bytes() => return Ok(()),
                Some(payload) => {
                    tracing::debug!(
                        parent: &self.span,
                        payload = %String::from_utf8_lossy(&payload),
                        "discarding pong for another ping"
                    );
                }
                None => return Err(PingError::Closed),
            }
        }
    }
}

#[async_trait]
impl Pinger for WebSocketPinger {
    async fn ping(&self, cancel: &CancellationToken) -> Result<(), PingError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PingError::Cancelled),
            result = self.round_trip() => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::TransportError;
    use crate::infrastructure::clock::ManualClock;
    use parking_lot::{Mutex as SyncMutex, RwLock};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;
    use tokio_test::{assert_pending, assert_ready_err, assert_ready_ok, task};

    #[derive(Default)]
    struct FakeSocket {
        written: SyncMutex<Vec<(ControlFrame, Instant)>>,
        handler: RwLock<Option<PongHandler>>,
        fail_writes: bool,
    }

    impl FakeSocket {
        fn deliver_pong(&self, payload: &[u8]) {
            let handler = self.handler.read().clone();
            if let Some(handler) = handler {
                handler(payload);
            }
        }

        fn last_ping(&self) -> Vec<u8> {
            match self.written.lock().last() {
                Some((ControlFrame::Ping(payload), _)) => payload.clone(),
                other => panic!("expected ping, got {:?}", other),
            }
        }
    }

    #[async_trait]
    impl ControlFrameSocket for FakeSocket {
        async fn write_control(&self, frame: ControlFrame, deadline: Instant) -> Result<(), TransportError> {
            if self.fail_writes {
                return Err("broken pipe".into());
            }
            self.written.lock().push((frame, deadline));
            Ok(())
        }

        fn pong_handler(&self) -> Option<PongHandler> {
            self.handler.read().clone()
        }

        fn set_pong_handler(&self, handler: PongHandler) {
            *self.handler.write() = Some(handler);
        }
    }

    fn pinger(socket: &Arc<FakeSocket>) -> WebSocketPinger {
        WebSocketPinger::new(Arc::new(ManualClock::new()), socket.clone())
    }

    #[tokio::test]
    async fn test_matching_pong_completes_ping() {
        let socket = Arc::new(FakeSocket::default());
        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());

        socket.deliver_pong(&socket.last_ping());
        assert!(ping.is_woken());
        assert_ready_ok!(ping.poll());
    }

    #[tokio::test]
    async fn test_foreign_pong_is_ignored() {
        let socket = Arc::new(FakeSocket::default());
        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());

        socket.deliver_pong(b"someone-else");
        assert_pending!(ping.poll());

        socket.deliver_pong(&socket.last_ping());
        assert_ready_ok!(ping.poll());
    }

    #[tokio::test]
    async fn test_ping_payload_is_unique_and_deadline_set() {
        let socket = Arc::new(FakeSocket::default());
        let clock = Arc::new(ManualClock::new());
        let pinger = WebSocketPinger::new(clock.clone(), socket.clone());
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let mut ping = task::spawn(pinger.ping(&cancel));
            assert_pending!(ping.poll());
            socket.deliver_pong(&socket.last_ping());
            assert_ready_ok!(ping.poll());
        }

        let written = socket.written.lock();
        assert_eq!(written.len(), 2);
        assert_ne!(written[0].0, written[1].0);
        assert_eq!(written[0].1, clock.now() + PING_WRITE_DEADLINE);
    }

    #[tokio::test]
    async fn test_stale_pong_is_drained_before_ping() {
        let socket = Arc::new(FakeSocket::default());
        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        // Fills the single slot before the ping is issued.
        socket.deliver_pong(b"stale");

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());

        socket.deliver_pong(&socket.last_ping());
        assert_ready_ok!(ping.poll());
    }

    #[tokio::test]
    async fn test_previous_handler_still_called() {
        let socket = Arc::new(FakeSocket::default());
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            socket.set_pong_handler(Arc::new(move |_payload: &[u8]| {
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());
        socket.deliver_pong(&socket.last_ping());
        assert_ready_ok!(ping.poll());

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_failure() {
        let socket = Arc::new(FakeSocket {
            fail_writes: true,
            ..Default::default()
        });
        let pinger = pinger(&socket);

        let err = pinger.ping(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PingError::Send(_)));
        assert_eq!(err.to_string(), "sending ping message");
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_pong() {
        let socket = Arc::new(FakeSocket::default());
        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());

        cancel.cancel();
        let err = assert_ready_err!(ping.poll());
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_handler_replaced_closes_ping() {
        let socket = Arc::new(FakeSocket::default());
        let pinger = pinger(&socket);
        let cancel = CancellationToken::new();

        let mut ping = task::spawn(pinger.ping(&cancel));
        assert_pending!(ping.poll());

        // Dropping the pinger's handler drops the slot's sender.
        socket.set_pong_handler(Arc::new(|_: &[u8]| {}));
        assert!(matches!(assert_ready_err!(ping.poll()), PingError::Closed));
    }
}
