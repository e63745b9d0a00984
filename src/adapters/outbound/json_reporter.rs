//! JSON Lines Reporter
//!
//! Writes each snapshot as one JSON object per line, suitable for piping
//! into a telemetry collector.

use crate::domain::entities::Statistics;
use crate::domain::ports::{ReportError, Reporter};
use crate::domain::value_objects::LatencyLevel;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Serialize)]
struct ReportLine {
    client_ms: u64,
    server_ms: u64,
    client: LatencyLevel,
    server: LatencyLevel,
    total: LatencyLevel,
}

impl From<Statistics> for ReportLine {
    fn from(stats: Statistics) -> Self {
        let levels = stats.classify();
        Self {
            client_ms: stats.client,
            server_ms: stats.server,
            client: levels.client,
            server: levels.server,
            total: levels.total,
        }
    }
}

/// [`Reporter`] that writes JSON lines to any async writer.
pub struct JsonLinesReporter<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesReporter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> Reporter for JsonLinesReporter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn report(&self, _cancel: &CancellationToken, stats: Statistics) -> Result<(), ReportError> {
        let mut line = serde_json::to_vec(&ReportLine::from(stats))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
