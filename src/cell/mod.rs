//! Polling cell: the refresh cadence, enabled/disabled lifecycle and current
//! `RefreshState` of one display panel.

mod latency;
mod state;

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::GatewayError;

pub use latency::LatencyStats;
pub use state::{Phase, RefreshState};

pub type FetchFuture<T> = BoxFuture<'static, Result<T, GatewayError>>;

/// One gateway call, re-issued on every poll.
pub type Fetcher<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, GatewayError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Which settlement wins when polls overlap and resolve out of order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SettlePolicy {
    /// A settlement older than the currently shown one is discarded.
    #[default]
    LastIssued,
    /// Whatever resolves last is shown, regardless of issue order.
    LastResolved,
}

impl FromStr for SettlePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "last_issued" => Ok(SettlePolicy::LastIssued),
            "last_resolved" => Ok(SettlePolicy::LastResolved),
            other => Err(format!(
                "unknown SETTLE_POLICY {other:?} (expected last_issued or last_resolved)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CellConfig {
    pub name: String,
    /// `None` makes a manual-only cell: enabling polls once and arms no timer.
    pub interval: Option<Duration>,
    pub start_enabled: bool,
    pub settle_policy: SettlePolicy,
    pub latency: Option<Arc<LatencyStats>>,
}

impl CellConfig {
    pub fn new(name: impl Into<String>, interval: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            interval,
            start_enabled: false,
            settle_policy: SettlePolicy::default(),
            latency: None,
        }
    }

    pub fn start_enabled(mut self, enabled: bool) -> Self {
        self.start_enabled = enabled;
        self
    }

    pub fn settle_policy(mut self, policy: SettlePolicy) -> Self {
        self.settle_policy = policy;
        self
    }

    pub fn latency(mut self, stats: Arc<LatencyStats>) -> Self {
        self.latency = Some(stats);
        self
    }
}

/// State reachable from the timer task and from in-flight polls.
struct Shared<T> {
    name: String,
    policy: SettlePolicy,
    fetch: Fetcher<T>,
    state: watch::Sender<RefreshState<T>>,
    next_seq: AtomicU64,
    torn_down: AtomicBool,
    latency: Option<Arc<LatencyStats>>,
}

impl<T> Shared<T> {
    /// Final state after teardown: nothing enabled, nothing in flight.
    fn release(&self) {
        self.state.send_modify(|s| {
            s.enabled = false;
            s.is_loading = false;
            s.in_flight = 0;
        });
    }
}

impl<T: Clone + Send + Sync + 'static> Shared<T> {
    /// One poll: start, call the gateway, commit, stop loading. Overlapping
    /// polls are not coalesced.
    async fn poll(self: Arc<Self>) {
        let fetch = (self.fetch)();
        self.run(fetch).await;
    }

    async fn run(self: Arc<Self>, fetch: FetchFuture<T>) {
        // Checked under the state lock so teardown cannot slip in between.
        let started = self.state.send_if_modified(|s| {
            if self.torn_down.load(Ordering::Acquire) {
                return false;
            }
            s.in_flight += 1;
            s.is_loading = true;
            s.polls_started += 1;
            true
        });
        if !started {
            return;
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(panel = %self.name, seq, "Poll started");

        let issued_at = Instant::now();
        let result = fetch.await;
        let elapsed = issued_at.elapsed();
        if let Some(stats) = &self.latency {
            stats.record(elapsed);
        }

        if self.torn_down.load(Ordering::Acquire) {
            debug!(panel = %self.name, seq, "Poll settled after teardown; dropped");
            return;
        }

        let failure = result.as_ref().err().cloned();
        let mut committed = false;
        self.state.send_modify(|s| {
            // Teardown may have landed since the check above.
            if self.torn_down.load(Ordering::Acquire) {
                return;
            }
            s.in_flight = s.in_flight.saturating_sub(1);
            s.is_loading = s.in_flight > 0;
            s.polls_settled += 1;

            if self.policy == SettlePolicy::LastIssued && seq < s.committed_seq {
                return;
            }
            s.committed_seq = seq;
            committed = true;
            match result {
                Ok(data) => {
                    s.data = Some(data);
                    s.error = None;
                    s.updated_at_ns = Some(now_ns());
                }
                Err(e) => s.error = Some(e.kind()),
            }
        });

        let elapsed_ms = elapsed.as_millis() as u64;
        match (committed, failure) {
            (false, _) => debug!(
                panel = %self.name,
                seq,
                elapsed_ms,
                "Poll settled behind a newer one; discarded",
            ),
            (true, None) => debug!(panel = %self.name, seq, elapsed_ms, "Poll succeeded"),
            (true, Some(e)) => warn!(
                panel = %self.name,
                seq,
                elapsed_ms,
                kind = %e.kind(),
                "Poll failed: {e}",
            ),
        }
    }
}

/// Owns one panel's refresh timer and state.
///
/// The timer is a tokio task armed by [`enable`](Self::enable) and aborted by
/// [`disable`](Self::disable), [`teardown`](Self::teardown) or drop, so at
/// most one timer exists per cell. Must be created and driven inside a tokio
/// runtime.
pub struct PollingCell<T> {
    shared: Arc<Shared<T>>,
    interval: Option<Duration>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Clone + Send + Sync + 'static> PollingCell<T> {
    pub fn new(config: CellConfig, fetch: Fetcher<T>) -> Self {
        let (state, _) = watch::channel(RefreshState::default());
        let cell = Self {
            shared: Arc::new(Shared {
                name: config.name,
                policy: config.settle_policy,
                fetch,
                state,
                next_seq: AtomicU64::new(0),
                torn_down: AtomicBool::new(false),
                latency: config.latency,
            }),
            interval: config.interval.map(|d| d.max(Duration::from_millis(1))),
            timer: Mutex::new(None),
        };
        if config.start_enabled {
            cell.enable();
        }
        cell
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Poll now, then every `interval`. No-op if already enabled.
    pub fn enable(&self) {
        let mut timer = self.lock_timer();
        if self.shared.torn_down.load(Ordering::Acquire) {
            warn!(panel = %self.shared.name, "enable called on a torn-down cell");
            return;
        }
        let newly_enabled = self.shared.state.send_if_modified(|s| {
            if s.enabled {
                return false;
            }
            s.enabled = true;
            true
        });
        if !newly_enabled {
            return;
        }

        match self.interval {
            Some(period) => {
                let shared = Arc::clone(&self.shared);
                // The first tick completes immediately.
                *timer = Some(tokio::spawn(async move {
                    let mut ticker = interval(period);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        tokio::spawn(Arc::clone(&shared).poll());
                    }
                }));
                info!(
                    panel = %self.shared.name,
                    interval_ms = period.as_millis() as u64,
                    "Panel enabled",
                );
            }
            None => {
                tokio::spawn(Arc::clone(&self.shared).poll());
                info!(panel = %self.shared.name, "Panel enabled (manual refresh only)");
            }
        }
    }

    /// Stop the timer. Data is kept for instant redisplay. Idempotent.
    pub fn disable(&self) {
        let mut timer = self.lock_timer();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        let was_enabled = self.shared.state.send_if_modified(|s| {
            if !s.enabled {
                return false;
            }
            s.enabled = false;
            true
        });
        if was_enabled {
            info!(panel = %self.shared.name, "Panel disabled");
        }
    }

    /// Issue one poll and wait for it to settle. The poll runs as its own
    /// task, so dropping this future does not abandon it.
    pub async fn refresh(&self) {
        let _ = self.trigger().await;
    }

    /// Like [`refresh`](Self::refresh), but with a one-off request in place
    /// of the cell's fetcher.
    pub async fn refresh_with(&self, fetch: FetchFuture<T>) {
        let _ = tokio::spawn(Arc::clone(&self.shared).run(fetch)).await;
    }

    /// Issue one poll in the background.
    pub fn trigger(&self) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.shared).poll())
    }

    /// Release the timer. Polls still in flight finish but their results are
    /// dropped. Also runs on drop.
    pub fn teardown(&self) {
        let mut timer = self.lock_timer();
        if self.shared.torn_down.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        self.shared.release();
        debug!(panel = %self.shared.name, "Panel torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.shared.torn_down.load(Ordering::Acquire)
    }

    pub fn timer_armed(&self) -> bool {
        self.lock_timer().as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn snapshot(&self) -> RefreshState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RefreshState<T>> {
        self.shared.state.subscribe()
    }

    fn lock_timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for PollingCell<T> {
    fn drop(&mut self) {
        self.shared.torn_down.store(true, Ordering::Release);
        let timer = self.timer.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        self.shared.release();
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
