//! Tracing Reporter
//!
//! Emits latency statistics as structured log events.

use crate::domain::entities::Statistics;
use crate::domain::ports::{ReportError, Reporter};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// [`Reporter`] that logs every snapshot at info level.
pub struct TracingReporter {
    span: Span,
}

impl TracingReporter {
    /// Log under the caller's current span.
    pub fn new() -> Self {
        Self {
            span: Span::current(),
        }
    }

    /// Log under `span`.
    pub fn with_span(span: Span) -> Self {
        Self { span }
    }
}

impl Default for TracingReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reporter for TracingReporter {
    async fn report(&self, _cancel: &CancellationToken, stats: Statistics) -> Result<(), ReportError> {
        let levels = stats.classify();
        tracing::info!(
            parent: &self.span,
            client_ms = stats.client,
            server_ms = stats.server,
            client = %levels.client,
            server = %levels.server,
            total = %levels.total,
            "latency statistics"
        );
        Ok(())
    }
}
