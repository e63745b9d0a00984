mod clock;
mod pinger;
mod reporter;
mod transport;

pub use clock::Clock;
pub use pinger::{PingError, Pinger, TransportError};
pub use reporter::{ReportError, Reporter, ReporterFn};
pub use transport::{ControlFrame, ControlFrameSocket, PongHandler, RequestSender};
