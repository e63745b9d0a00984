//! Tungstenite Socket
//!
//! Implements ControlFrameSocket on top of a tokio-tungstenite WebSocket
//! stream.

use crate::domain::ports::{ControlFrame, ControlFrameSocket, PongHandler, TransportError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::Span;

/// Capacity of the inbound data message buffer.
const INBOUND_BUFFER: usize = 64;

/// WebSocket connection shared between a pinger and its owner.
///
/// A reader task owns the receiving half: pong frames go to the installed
/// pong handler, data frames to the channel returned by [`new`](Self::new).
/// Incoming pings are answered by tungstenite itself. Once the reader stops
/// the pong handler is dropped.
pub struct TungsteniteSocket<S> {
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    pong_handler: Arc<RwLock<Option<PongHandler>>>,
    reader: JoinHandle<()>,
}

impl<S> TungsteniteSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an established stream, logging under the caller's current span.
    /// Must be called from within a tokio runtime.
    pub fn new(stream: WebSocketStream<S>) -> (Self, mpsc::Receiver<Message>) {
        Self::with_span(stream, Span::current())
    }

    /// Wrap an established stream, logging reader events under `span`.
    pub fn with_span(stream: WebSocketStream<S>, span: Span) -> (Self, mpsc::Receiver<Message>) {
        let (sink, mut source) = stream.split();
        let pong_handler: Arc<RwLock<Option<PongHandler>>> = Arc::new(RwLock::new(None));
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);

        let handler = pong_handler.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = source.next().await {
                match msg {
                    Ok(Message::Pong(payload)) => {
                        let current = handler.read().clone();
                        if let Some(callback) = current {
                            callback(&payload);
                        }
                    }
                    Ok(Message::Ping(_)) => {}
                    Ok(Message::Close(frame)) => {
                        tracing::debug!(parent: &span, ?frame, "websocket closed by peer");
                        break;
                    }
                    Ok(other) => {
                        if let Err(mpsc::error::TrySendError::Full(_)) = inbound_tx.try_send(other) {
                            tracing::warn!(parent: &span, "inbound websocket buffer full, dropping message");
                        }
                    }
                    Err(e) => {
                        tracing::debug!(parent: &span, error = %e, "websocket read failed");
                        break;
                    }
                }
            }
            // No more pongs will arrive; release anyone waiting on one.
            handler.write().take();
        });

        (
            Self {
                sink: Mutex::new(sink),
                pong_handler,
                reader,
            },
            inbound_rx,
        )
    }

    /// Send an application message.
    pub async fn send(&self, message: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(message).await?;
        Ok(())
    }

    /// Send a close frame and stop reading.
    pub async fn close(&self) -> Result<(), TransportError> {
        let result = self.sink.lock().await.close().await;
        self.reader.abort();
        result.map_err(Into::into)
    }

    /// Whether the peer has gone away or the reader failed.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }
}

impl<S> Drop for TungsteniteSocket<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl<S> ControlFrameSocket for TungsteniteSocket<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn write_control(&self, frame: ControlFrame, deadline: Instant) -> Result<(), TransportError> {
        let message = match frame {
            ControlFrame::Ping(payload) => Message::Ping(payload),
            ControlFrame::Pong(payload) => Message::Pong(payload),
        };

        let write = async { self.sink.lock().await.send(message).await };
        match tokio::time::timeout_at(tokio::time::Instant::from_std(deadline), write).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err("control frame write deadline exceeded".into()),
        }
    }

    fn pong_handler(&self) -> Option<PongHandler> {
        self.pong_handler.read().clone()
    }

    fn set_pong_handler(&self, handler: PongHandler) {
        *self.pong_handler.write() = Some(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tracing_test::traced_test;

    async fn pair() -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (a, b) = tokio::io::duplex(4096);
        let client = WebSocketStream::from_raw_socket(a, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(b, Role::Server, None).await;
        (client, server)
    }

    #[tokio::test]
    async fn test_pong_dispatched_to_handler() {
        let (client, mut server) = pair().await;
        let (socket, _inbound) = TungsteniteSocket::new(client);

        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = seen.clone();
            socket.set_pong_handler(Arc::new(move |payload: &[u8]| {
                assert_eq!(payload, b"abc");
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }

        server.send(Message::Pong(b"abc".to_vec())).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while seen.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_write_control_reaches_peer() {
        let (client, mut server) = pair().await;
        let (socket, _inbound) = TungsteniteSocket::new(client);

        socket
            .write_control(
                ControlFrame::Ping(b"probe".to_vec()),
                Instant::now() + Duration::from_secs(2),
            )
            .await
            .unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), server.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::Ping(b"probe".to_vec()));
    }

    #[tokio::test]
    async fn test_data_messages_forwarded() {
        let (client, mut server) = pair().await;
        let (_socket, mut inbound) = TungsteniteSocket::new(client);

        server.send(Message::Text("hello".into())).await.unwrap();

        let msg = tokio::time::timeout(Duration::from_secs(2), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg, Message::Text("hello".into()));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_reader_logs_under_injected_span() {
        let (client, mut server) = pair().await;
        let (socket, _inbound) =
            TungsteniteSocket::with_span(client, tracing::info_span!("leg_socket", leg = "client"));

        server.close(None).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while !socket.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(logs_contain("websocket closed by peer"));
        assert!(logs_contain("leg_socket"));
    }

    #[tokio::test]
    async fn test_reader_stops_on_close() {
        let (client, mut server) = pair().await;
        let (socket, _inbound) = TungsteniteSocket::new(client);

        server.close(None).await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while !socket.is_closed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(socket.pong_handler().is_none());
    }
}
