//! Reporter Port
//!
//! Defines the sink that receives periodic latency snapshots.

use crate::domain::entities::Statistics;
use async_trait::async_trait;
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Errors returned by a [`Reporter`].
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report sink closed")]
    Closed,
    #[error("writing report: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding report: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Consumer of latency statistics.
///
/// Called by the monitor on every report tick with a copy of the latest
/// measurements. Failures are logged by the caller and retried on the
/// next tick.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, cancel: &CancellationToken, stats: Statistics) -> Result<(), ReportError>;
}

/// Adapter that allows an ordinary closure to be used as a [`Reporter`].
///
/// # Examples
/// ```
/// use edge_latency::domain::ports::ReporterFn;
///
/// let reporter = ReporterFn::new(|_cancel, stats| async move {
///     println!("client={} server={}", stats.client, stats.server);
///     Ok(())
/// });
/// # let _ = reporter;
/// ```
pub struct ReporterFn<F>(F);

impl<F, Fut> ReporterFn<F>
where
    F: Fn(CancellationToken, Statistics) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ReportError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F, Fut> Reporter for ReporterFn<F>
where
    F: Fn(CancellationToken, Statistics) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ReportError>> + Send + 'static,
{
    async fn report(&self, cancel: &CancellationToken, stats: Statistics) -> Result<(), ReportError> {
        (self.0)(cancel.clone(), stats).await
    }
}
