//! edge-latency - Connection latency monitor
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use edge_latency::adapters::outbound::{
    JsonLinesReporter, TracingReporter, TungsteniteSocket, WebSocketPinger,
};
use edge_latency::config::{load_config, ReportFormat};
use edge_latency::domain::ports::{Clock, Pinger, Reporter};
use edge_latency::infrastructure::{shutdown_signal, ShutdownController, SystemClock};
use edge_latency::{LatencyMonitor, Leg, MonitorConfig};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::MaybeTlsStream;
use tracing_subscriber::fmt::format::FmtSpan;

type Socket = TungsteniteSocket<MaybeTlsStream<TcpStream>>;

/// Dial one leg and build its pinger.
async fn dial(url: &str, leg: Leg, clock: Arc<dyn Clock>) -> anyhow::Result<(Arc<dyn Pinger>, Arc<Socket>)> {
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("connecting {} leg to {}", leg, url))?;

    let (socket, mut inbound) = TungsteniteSocket::with_span(stream, tracing::info_span!("socket", %leg));
    let socket = Arc::new(socket);

    // Data frames carry nothing for the monitor
    tokio::spawn(async move {
        while let Some(msg) = inbound.recv().await {
            tracing::debug!(%leg, ?msg, "ignoring data message");
        }
    });

    let pinger: Arc<dyn Pinger> = Arc::new(
        WebSocketPinger::new(clock, socket.clone()).with_span(tracing::info_span!("pinger", %leg)),
    );

    tracing::info!("{} leg connected to {}", leg, url);
    Ok((pinger, socket))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!(
        "starting edge-latency client={} server={} ping={:?} report={:?}",
        cfg.client_url,
        cfg.server_url,
        cfg.ping_interval(),
        cfg.report_interval()
    );

    // ===== COMPOSITION ROOT =====

    // 1. Outbound adapters
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let (client_pinger, client_socket) = dial(&cfg.client_url, Leg::Client, clock.clone()).await?;
    let (server_pinger, server_socket) = dial(&cfg.server_url, Leg::Server, clock.clone()).await?;

    let reporter: Arc<dyn Reporter> = match cfg.report_format {
        ReportFormat::Log => Arc::new(TracingReporter::new()),
        ReportFormat::Json => Arc::new(JsonLinesReporter::new(tokio::io::stdout())),
    };

    // 2. Application service
    let monitor = Arc::new(LatencyMonitor::new(
        MonitorConfig::new(client_pinger, server_pinger, reporter)
            .clock(clock)
            .ping_interval(cfg.ping_interval())
            .report_interval(cfg.report_interval())
            .span(tracing::info_span!("latency")),
    )?);

    // 3. Lifecycle
    let controller = ShutdownController::new();
    tokio::spawn(shutdown_signal(controller.clone()));

    let shutdown = controller.token();
    let guard = controller.monitor_guard();
    let mut runner = {
        let monitor = monitor.clone();
        let token = controller.token();
        tokio::spawn(async move {
            let _guard = guard;
            monitor.run(token).await
        })
    };

    tokio::select! {
        result = &mut runner => {
            result??;
        }
        _ = shutdown.cancelled() => {
            if !controller.wait_for_drain(cfg.drain_timeout()).await {
                runner.abort();
            }
        }
    }

    let stats = monitor.get_stats();
    let levels = stats.classify();
    tracing::info!(
        client_ms = stats.client,
        server_ms = stats.server,
        total = %levels.total,
        "final latency statistics"
    );

    for socket in [client_socket, server_socket] {
        if let Err(e) = socket.close().await {
            tracing::debug!(error = %e, "closing websocket");
        }
    }

    Ok(())
}
