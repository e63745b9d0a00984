//! Watch Reporter
//!
//! Publishes the latest snapshot on a watch channel so UI or control
//! plane consumers can observe it without polling the monitor.

use crate::domain::entities::Statistics;
use crate::domain::ports::{ReportError, Reporter};
use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// [`Reporter`] backed by a `tokio::sync::watch` channel.
pub struct WatchReporter {
    tx: watch::Sender<Statistics>,
}

impl WatchReporter {
    /// Create the reporter and the first receiver.
    pub fn new() -> (Self, watch::Receiver<Statistics>) {
        let (tx, rx) = watch::channel(Statistics::default());
        (Self { tx }, rx)
    }

    /// Create an additional receiver.
    pub fn subscribe(&self) -> watch::Receiver<Statistics> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Reporter for WatchReporter {
    async fn report(&self, _cancel: &CancellationToken, stats: Statistics) -> Result<(), ReportError> {
        self.tx.send(stats).map_err(|_| ReportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_receivers_see_latest() {
        let (reporter, mut rx) = WatchReporter::new();
        assert_eq!(*rx.borrow(), Statistics::default());

        let cancel = CancellationToken::new();
        reporter.report(&cancel, Statistics::new(1, 2)).await.unwrap();
        reporter.report(&cancel, Statistics::new(3, 4)).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Statistics::new(3, 4));

        let late = reporter.subscribe();
        assert_eq!(*late.borrow(), Statistics::new(3, 4));
    }

    #[tokio::test]
    async fn test_no_receivers_is_closed() {
        let (reporter, rx) = WatchReporter::new();
        drop(rx);

        let result = reporter.report(&CancellationToken::new(), Statistics::new(1, 1)).await;
        assert!(matches!(result, Err(ReportError::Closed)));
    }
}
