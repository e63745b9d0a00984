mod json_reporter;
mod keepalive_pinger;
mod tracing_reporter;
mod tungstenite_socket;
mod watch_reporter;
mod websocket_pinger;

pub use json_reporter::JsonLinesReporter;
pub use keepalive_pinger::{KeepAlivePinger, KEEPALIVE_REQUEST};
pub use tracing_reporter::TracingReporter;
pub use tungstenite_socket::TungsteniteSocket;
pub use watch_reporter::WatchReporter;
pub use websocket_pinger::{WebSocketPinger, PING_WRITE_DEADLINE};
