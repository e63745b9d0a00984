//! Latency Monitor - Main application use case
//!
//! Periodically pings both legs of a proxied connection, records the
//! round trip times and hands them to a reporter.

use crate::domain::entities::Statistics;
use crate::domain::ports::{Clock, Pinger, Reporter};
use crate::domain::value_objects::Leg;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::interval::{IntervalError, MultiInterval, SubInterval};
use crate::infrastructure::jitter::{full_jitter, half_jitter, seventh_jitter};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Default interval between pings of both legs.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(8);

/// Default interval between reports.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Upper bound of the (fully jittered) delay before the first ping.
const FIRST_PING_DELAY: Duration = Duration::from_millis(500);

/// Upper bound of the (half jittered) delay before the first report.
const FIRST_REPORT_DELAY: Duration = Duration::from_millis(1500);

/// Schedules driven by the monitor's interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleKey {
    /// Ping both legs
    Ping,
    /// Emit the latest statistics
    Report,
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleKey::Ping => write!(f, "ping"),
            ScheduleKey::Report => write!(f, "report"),
        }
    }
}

/// Errors returned by the [`LatencyMonitor`].
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("client pinger not provided to monitor config")]
    MissingClientPinger,
    #[error("server pinger not provided to monitor config")]
    MissingServerPinger,
    #[error("reporter not provided to monitor config")]
    MissingReporter,
    #[error("invalid schedule: {0}")]
    Schedule(#[from] IntervalError),
    #[error("latency monitor is already running")]
    AlreadyRunning,
}

/// Dependencies and settings for a [`LatencyMonitor`].
#[derive(Clone, Default)]
pub struct MonitorConfig {
    /// Measures the client half of the connection
    pub client_pinger: Option<Arc<dyn Pinger>>,
    /// Measures the server half of the connection
    pub server_pinger: Option<Arc<dyn Pinger>>,
    /// Receives periodic statistics
    pub reporter: Option<Arc<dyn Reporter>>,
    /// Time source (default: system clock)
    pub clock: Option<Arc<dyn Clock>>,
    /// How often both legs are pinged (zero: 8s)
    pub ping_interval: Duration,
    /// How often statistics are reported (zero: 10s)
    pub report_interval: Duration,
    /// Span all monitor events are recorded under (default: `latency`)
    pub span: Option<Span>,
}

impl MonitorConfig {
    /// Create a configuration with the required dependencies.
    pub fn new(
        client_pinger: Arc<dyn Pinger>,
        server_pinger: Arc<dyn Pinger>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            client_pinger: Some(client_pinger),
            server_pinger: Some(server_pinger),
            reporter: Some(reporter),
            ..Default::default()
        }
    }

    /// Set the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the ping interval.
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the report interval.
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    /// Set the span monitor events are recorded under.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Ensure required dependencies are present and fill in defaults.
    pub fn check_and_set_defaults(&mut self) -> Result<(), MonitorError> {
        if self.client_pinger.is_none() {
            return Err(MonitorError::MissingClientPinger);
        }
        if self.server_pinger.is_none() {
            return Err(MonitorError::MissingServerPinger);
        }
        if self.reporter.is_none() {
            return Err(MonitorError::MissingReporter);
        }
        if self.ping_interval.is_zero() {
            self.ping_interval = DEFAULT_PING_INTERVAL;
        }
        if self.report_interval.is_zero() {
            self.report_interval = DEFAULT_REPORT_INTERVAL;
        }
        if self.clock.is_none() {
            self.clock = Some(Arc::new(SystemClock::new()));
        }
        if self.span.is_none() {
            self.span = Some(tracing::info_span!("latency"));
        }
        Ok(())
    }
}

impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("client_pinger", &self.client_pinger.is_some())
            .field("server_pinger", &self.server_pinger.is_some())
            .field("reporter", &self.reporter.is_some())
            .field("clock", &self.clock.is_some())
            .field("ping_interval", &self.ping_interval)
            .field("report_interval", &self.report_interval)
            .finish()
    }
}

/// Latest measurement and skipped-ping count for one leg.
#[derive(Debug, Default)]
struct LegState {
    latency_ms: AtomicU64,
    skipped: AtomicU64,
    /// Set when a ping is handed to the leg, cleared once it completes
    busy: AtomicBool,
}

/// Periodically pings both legs of a proxied connection and records the
/// round trip times so they can be emitted to consumers.
///
/// The monitor does not own the pingers' transports and never closes them.
pub struct LatencyMonitor {
    client_pinger: Arc<dyn Pinger>,
    server_pinger: Arc<dyn Pinger>,
    reporter: Arc<dyn Reporter>,
    clock: Arc<dyn Clock>,
    ticker: MultiInterval<ScheduleKey>,
    client: LegState,
    server: LegState,
    running: AtomicBool,
    span: Span,
}

impl LatencyMonitor {
    /// Create an unstarted monitor. Timers are armed and sampling begins
    /// once [`run`](Self::run) is called, so time spent before that never
    /// shows up in a measurement.
    pub fn new(mut config: MonitorConfig) -> Result<Self, MonitorError> {
        config.check_and_set_defaults()?;

        let client_pinger = config.client_pinger.ok_or(MonitorError::MissingClientPinger)?;
        let server_pinger = config.server_pinger.ok_or(MonitorError::MissingServerPinger)?;
        let reporter = config.reporter.ok_or(MonitorError::MissingReporter)?;
        let clock = config.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let span = config.span.unwrap_or_else(|| tracing::info_span!("latency"));

        let ticker = MultiInterval::new(
            clock.clone(),
            vec![
                SubInterval::new(ScheduleKey::Ping, config.ping_interval)
                    .first_duration(full_jitter()(FIRST_PING_DELAY))
                    .jitter(seventh_jitter()),
                SubInterval::new(ScheduleKey::Report, config.report_interval)
                    .first_duration(half_jitter()(FIRST_REPORT_DELAY))
                    .jitter(seventh_jitter()),
            ],
        )?
        .with_span(span.clone());

        Ok(Self {
            client_pinger,
            server_pinger,
            reporter,
            clock,
            ticker,
            client: LegState::default(),
            server: LegState::default(),
            running: AtomicBool::new(false),
            span,
        })
    }

    /// Get a copy of the last known latency measurements.
    pub fn get_stats(&self) -> Statistics {
        Statistics {
            client: self.client.latency_ms.load(Ordering::Acquire),
            server: self.server.latency_ms.load(Ordering::Acquire),
        }
    }

    /// Number of ping ticks dropped for `leg` because a previous ping was
    /// still in flight.
    pub fn skipped_pings(&self, leg: Leg) -> u64 {
        self.leg_state(leg).skipped.load(Ordering::Relaxed)
    }

    /// Whether [`run`](Self::run) has been called.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The interval driving pings and reports.
    pub fn ticker(&self) -> &MultiInterval<ScheduleKey> {
        &self.ticker
    }

    /// Record round trip times until `cancel` fires.
    ///
    /// May only be called once; later calls return
    /// [`MonitorError::AlreadyRunning`]. No pinger or reporter is invoked
    /// after this returns.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), MonitorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }

        self.ticker.start();
        tracing::debug!(parent: &self.span, "latency monitor started");

        let (client_tx, client_rx) = mpsc::channel(1);
        let (server_tx, server_rx) = mpsc::channel(1);

        tokio::join!(
            self.measure(Leg::Client, client_rx, &cancel),
            self.measure(Leg::Server, server_rx, &cancel),
            self.schedule(client_tx, server_tx, &cancel),
        );

        self.ticker.stop();
        tracing::debug!(parent: &self.span, "latency monitor stopped");
        Ok(())
    }

    fn leg_state(&self, leg: Leg) -> &LegState {
        match leg {
            Leg::Client => &self.client,
            Leg::Server => &self.server,
        }
    }

    fn pinger(&self, leg: Leg) -> &dyn Pinger {
        match leg {
            Leg::Client => self.client_pinger.as_ref(),
            Leg::Server => self.server_pinger.as_ref(),
        }
    }

    /// Dispatch ticks until cancelled. Dropping the senders on return
    /// ends both measurement loops.
    async fn schedule(
        &self,
        client_tx: mpsc::Sender<Instant>,
        server_tx: mpsc::Sender<Instant>,
        cancel: &CancellationToken,
    ) {
        loop {
            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                tick = self.ticker.next() => match tick {
                    Some(tick) => tick,
                    None => return,
                },
            };

            match tick.key {
                ScheduleKey::Ping => {
                    self.signal(Leg::Client, &client_tx, tick.time);
                    self.signal(Leg::Server, &server_tx, tick.time);
                }
                ScheduleKey::Report => {
                    let stats = self.get_stats();
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        result = self.reporter.report(cancel, stats) => {
                            if let Err(e) = result {
                                tracing::warn!(parent: &self.span, error = %e, "failed to report latency stats");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Hand a ping request to a leg without waiting. A leg with a ping
    /// pending or in flight drops the tick, so every measurement starts
    /// from a fresh tick.
    fn signal(&self, leg: Leg, tx: &mpsc::Sender<Instant>, then: Instant) {
        let state = self.leg_state(leg);
        if state.busy.swap(true, Ordering::AcqRel) {
            let skipped = state.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(parent: &self.span, %leg, skipped, "ping still in flight, skipping");
            return;
        }
        if tx.try_send(then).is_err() {
            // The leg has stopped.
            state.busy.store(false, Ordering::Release);
        }
    }

    async fn measure(&self, leg: Leg, mut rx: mpsc::Receiver<Instant>, cancel: &CancellationToken) {
        let pinger = self.pinger(leg);
        let state = self.leg_state(leg);

        loop {
            let then = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                then = rx.recv() => match then {
                    Some(then) => then,
                    None => return,
                },
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = pinger.ping(cancel) => result,
            };
            state.busy.store(false, Ordering::Release);

            match result {
                Ok(()) => {
                    let elapsed = self.clock.now().saturating_duration_since(then);
                    let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                    state.latency_ms.store(ms, Ordering::Release);
                    tracing::trace!(parent: &self.span, %leg, latency_ms = ms, "recorded round trip");
                }
                Err(e) if e.is_cancelled() => return,
                Err(e) => {
                    tracing::warn!(parent: &self.span, %leg, error = %e, "unexpected failure sending ping");
                }
            }
        }
    }
}
