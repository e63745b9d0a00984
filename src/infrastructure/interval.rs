//! Jittered Multi-Interval
//!
//! Merges several independently configured recurring timers into a single
//! stream of keyed ticks, so callers do not have to juggle one timer per
//! schedule.

use crate::domain::entities::Tick;
use crate::domain::ports::Clock;
use crate::infrastructure::jitter::Jitter;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Floor applied to jittered recurring periods.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Configuration of one recurring timer.
#[derive(Clone)]
pub struct SubInterval<K> {
    /// Identifies this timer in emitted ticks
    pub key: K,
    /// Period between firings
    pub duration: Duration,
    /// Delay before the first firing (zero means `duration`)
    pub first_duration: Duration,
    /// Optional perturbation applied to every delay
    pub jitter: Option<Jitter>,
}

impl<K> SubInterval<K> {
    /// Create a sub-interval firing every `duration`.
    pub fn new(key: K, duration: Duration) -> Self {
        Self {
            key,
            duration,
            first_duration: Duration::ZERO,
            jitter: None,
        }
    }

    /// Set the delay before the first firing.
    pub fn first_duration(mut self, first: Duration) -> Self {
        self.first_duration = first;
        self
    }

    /// Set the jitter function.
    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    fn jittered(&self, base: Duration) -> Duration {
        match &self.jitter {
            Some(jitter) => jitter(base).min(base.saturating_mul(2)),
            None => base,
        }
    }

    fn first_delay(&self) -> Duration {
        if self.first_duration.is_zero() {
            self.period()
        } else {
            self.jittered(self.first_duration)
        }
    }

    fn period(&self) -> Duration {
        self.jittered(self.duration).max(MIN_PERIOD)
    }
}

impl<K: Debug> Debug for SubInterval<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubInterval")
            .field("key", &self.key)
            .field("duration", &self.duration)
            .field("first_duration", &self.first_duration)
            .field("jitter", &self.jitter.is_some())
            .finish()
    }
}

/// Errors detected when building a [`MultiInterval`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntervalError {
    #[error("duplicate sub-interval key: {0}")]
    DuplicateKey(String),
    #[error("sub-interval {0} has a zero duration")]
    ZeroDuration(String),
}

/// Keys usable in a [`MultiInterval`].
pub trait IntervalKey: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> IntervalKey for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// Several keyed timers delivered through one channel.
///
/// Timers are armed by [`start`](Self::start), which hands them to a
/// background task; dropping the interval stops it. Ticks that cannot be
/// handed to a slow consumer are parked, keeping only the newest tick per
/// key, so the producer never blocks.
pub struct MultiInterval<K> {
    ticks: Mutex<mpsc::Receiver<Tick<K>>>,
    fire_tx: mpsc::UnboundedSender<K>,
    stop: CancellationToken,
    /// Everything the producer needs, until it is started
    idle: parking_lot::Mutex<Option<Idle<K>>>,
    started: AtomicBool,
    span: Span,
}

struct Idle<K> {
    clock: Arc<dyn Clock>,
    intervals: Vec<SubInterval<K>>,
    tick_tx: mpsc::Sender<Tick<K>>,
    fire_rx: mpsc::UnboundedReceiver<K>,
}

impl<K: IntervalKey> MultiInterval<K> {
    /// Validate the sub-intervals. No timer runs until [`start`](Self::start).
    pub fn new(
        clock: Arc<dyn Clock>,
        intervals: Vec<SubInterval<K>>,
    ) -> Result<Self, IntervalError> {
        for (i, sub) in intervals.iter().enumerate() {
            if sub.duration.is_zero() {
                return Err(IntervalError::ZeroDuration(format!("{:?}", sub.key)));
            }
            if intervals[..i].iter().any(|other| other.key == sub.key) {
                return Err(IntervalError::DuplicateKey(format!("{:?}", sub.key)));
            }
        }

        let (tick_tx, tick_rx) = mpsc::channel(1);
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();

        Ok(Self {
            ticks: Mutex::new(tick_rx),
            fire_tx,
            stop: CancellationToken::new(),
            idle: parking_lot::Mutex::new(Some(Idle {
                clock,
                intervals,
                tick_tx,
                fire_rx,
            })),
            started: AtomicBool::new(false),
            span: Span::current(),
        })
    }

    /// Record events under `span` instead of the caller's current span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Arm every timer relative to now and start delivering ticks.
    ///
    /// Later calls do nothing. Must be called from within a tokio runtime.
    pub fn start(&self) {
        let Some(idle) = self.idle.lock().take() else {
            return;
        };
        self.started.store(true, Ordering::SeqCst);

        let now = idle.clock.now();
        let timers = idle
            .intervals
            .into_iter()
            .map(|sub| Timer {
                deadline: now + sub.first_delay(),
                sub,
            })
            .collect();

        let producer = Producer {
            clock: idle.clock,
            timers,
            pending: VecDeque::new(),
            span: self.span.clone(),
        };
        tokio::spawn(producer.run(idle.tick_tx, idle.fire_rx, self.stop.clone()));
    }

    /// Whether [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Wait for the next tick. Returns `None` once the interval is stopped.
    pub async fn next(&self) -> Option<Tick<K>> {
        self.ticks.lock().await.recv().await
    }

    /// Fire the sub-interval identified by `key` immediately and restart
    /// its period from now. Requests made before [`start`](Self::start)
    /// fire once it is called.
    pub fn fire_now(&self, key: K) {
        let _ = self.fire_tx.send(key);
    }

    /// Stop all timers.
    pub fn stop(&self) {
        self.stop.cancel();
        // An unstarted interval still holds the tick sender.
        self.idle.lock().take();
    }

    /// Whether [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl<K> Drop for MultiInterval<K> {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

struct Timer<K> {
    sub: SubInterval<K>,
    deadline: Instant,
}

struct Producer<K> {
    clock: Arc<dyn Clock>,
    timers: Vec<Timer<K>>,
    /// Ticks awaiting delivery, at most one per key
    pending: VecDeque<Tick<K>>,
    span: Span,
}

impl<K: IntervalKey> Producer<K> {
    async fn run(
        mut self,
        tx: mpsc::Sender<Tick<K>>,
        mut fire_rx: mpsc::UnboundedReceiver<K>,
        stop: CancellationToken,
    ) {
        loop {
            let next_deadline = self.timers.iter().map(|t| t.deadline).min();
            let clock = self.clock.clone();
            let sleep = async move {
                match next_deadline {
                    Some(deadline) => clock.sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                permit = tx.reserve(), if !self.pending.is_empty() => match permit {
                    Ok(permit) => {
                        if let Some(tick) = self.pending.pop_front() {
                            permit.send(tick);
                        }
                    }
                    // Consumer is gone.
                    Err(_) => return,
                },
                key = fire_rx.recv() => match key {
                    Some(key) => self.fire(key),
                    None => return,
                },
                _ = sleep => self.expire(),
            }
        }
    }

    /// Emit ticks for every timer whose deadline has passed.
    fn expire(&mut self) {
        let now = self.clock.now();
        let mut due = Vec::new();
        for timer in self.timers.iter_mut().filter(|t| t.deadline <= now) {
            timer.deadline = now + timer.sub.period();
            due.push(timer.sub.key.clone());
        }
        for key in due {
            self.enqueue(Tick { key, time: now });
        }
    }

    fn fire(&mut self, key: K) {
        let now = self.clock.now();
        match self.timers.iter_mut().find(|t| t.sub.key == key) {
            Some(timer) => {
                timer.deadline = now + timer.sub.period();
                self.enqueue(Tick { key, time: now });
            }
            None => tracing::debug!(parent: &self.span, ?key, "fire requested for unknown sub-interval"),
        }
    }

    /// Park a tick, replacing any undelivered tick with the same key.
    fn enqueue(&mut self, tick: Tick<K>) {
        match self.pending.iter_mut().find(|t| t.key == tick.key) {
            Some(slot) => *slot = tick,
            None => self.pending.push_back(tick),
        }
    }
}
