// ── Effect timing model ──
//
// The device reports how long the running effect has left at the moment
// of each fetch. Progress is derived locally from an absolute deadline,
// so wall-clock drift between fetches never accumulates. Once the
// deadline passes the snapshot is stale and a refetch is requested.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::model::{EffectList, SiteOptions};
use crate::store::ResourceStore;

/// Progress tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

/// Progress reported for a slot that is not running.
pub const IDLE_PROGRESS: f64 = 0.0;

const NEAR_EXPIRY_MS: u64 = 100;
const NEAR_EXPIRY_DELAY: Duration = Duration::from_millis(300);
const IDLE_DELAY: Duration = Duration::from_millis(3000);

/// Delay before the next `/effects` fetch given the last reported
/// remaining time.
///
/// Polls fast near expiry, slowly when the device is not counting down,
/// and otherwise shortly after the expected switch.
pub fn next_refresh_delay(remaining_ms: Option<u64>) -> Duration {
    match remaining_ms.unwrap_or(0) {
        0 => IDLE_DELAY,
        ms if ms < NEAR_EXPIRY_MS => NEAR_EXPIRY_DELAY,
        ms => Duration::from_millis(ms.saturating_add(500).saturating_mul(3) / 4),
    }
}

/// `(1 - remaining / interval) * 100`, clamped to `0..=100`.
pub fn progress_percent(remaining: Duration, interval: Duration) -> f64 {
    if interval.is_zero() {
        return 100.0;
    }
    let ratio = remaining.as_secs_f64() / interval.as_secs_f64();
    ((1.0 - ratio) * 100.0).clamp(0.0, 100.0)
}

/// Countdown anchored at the fetch that reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline: Instant,
    interval: Duration,
}

impl Countdown {
    pub fn start(now: Instant, remaining_ms: u64, interval_ms: u64) -> Self {
        Self {
            deadline: now + Duration::from_millis(remaining_ms),
            interval: Duration::from_millis(interval_ms),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left, or `None` once the deadline has passed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.checked_duration_since(now)
    }

    /// Progress at `now`, or `None` once the countdown is stale.
    pub fn progress(&self, now: Instant) -> Option<f64> {
        self.remaining(now)
            .map(|left| progress_percent(left, self.interval))
    }
}

/// What restarts a countdown: a new remaining time or a selection change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CountdownKey {
    remaining: Option<u64>,
    interval: u64,
    selected: bool,
}

impl CountdownKey {
    fn of(list: Option<&EffectList>, slot: Option<usize>) -> Self {
        let Some(list) = list else {
            return Self {
                remaining: None,
                interval: 0,
                selected: false,
            };
        };
        let selected = match slot {
            Some(index) => list.is_selected(index),
            None => !list.is_empty(),
        };
        Self {
            remaining: list.remaining(),
            interval: list.effect_interval,
            selected,
        }
    }
}

/// Publish progress for one effect slot (or the whole list when `slot` is
/// `None`) into `progress` until cancelled.
///
/// The countdown restarts whenever the remaining time, interval, or
/// selection changes. A stale countdown stops ticking and refreshes
/// `effects`.
pub async fn track_progress(
    effects: Arc<ResourceStore<EffectList>>,
    slot: Option<usize>,
    progress: watch::Sender<f64>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let mut rx = effects.receiver();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut key: Option<CountdownKey> = None;
    let mut countdown: Option<Countdown> = None;
    let mut snapshot = rx.borrow_and_update().clone();

    loop {
        let next = CountdownKey::of(snapshot.as_deref(), slot);
        if key != Some(next) {
            key = Some(next);
            countdown = match next {
                CountdownKey {
                    remaining: Some(ms),
                    interval,
                    selected: true,
                } => {
                    ticker.reset_immediately();
                    Some(Countdown::start(Instant::now(), ms, interval))
                }
                CountdownKey { selected, .. } => {
                    if !selected {
                        progress.send_replace(IDLE_PROGRESS);
                    }
                    None
                }
            };
        }

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                snapshot = rx.borrow_and_update().clone();
            }
            _ = ticker.tick(), if countdown.is_some() => {
                let Some(active) = countdown else { continue };
                if let Some(pct) = active.progress(Instant::now()) {
                    trace!(?slot, pct, "tick");
                    progress.send_replace(pct);
                } else {
                    debug!(?slot, "countdown expired, requesting refresh");
                    countdown = None;
                    effects.refresh();
                }
            }
        }
    }
}

/// Re-fetch the effect list on the adaptive cadence of
/// [`next_refresh_delay`]. Each new snapshot reschedules the timer.
pub async fn poll_effects(effects: Arc<ResourceStore<EffectList>>, cancel: CancellationToken) {
    let mut rx = effects.receiver();
    loop {
        let remaining = rx.borrow_and_update().as_ref().and_then(|list| list.remaining());
        let delay = next_refresh_delay(remaining);
        trace!(?delay, "next effects refresh");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(delay) => effects.refresh(),
        }
    }
}

/// Re-fetch statistics every `statsRefreshRate` seconds from site options.
pub async fn poll_statistics<T>(
    statistics: Arc<ResourceStore<T>>,
    site: Arc<ResourceStore<SiteOptions>>,
    cancel: CancellationToken,
) where
    T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync + 'static,
{
    let mut site_rx = site.receiver();
    loop {
        let seconds = site_rx
            .borrow_and_update()
            .as_ref()
            .map_or(3, |options| options.stats_refresh_rate());

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = site_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(Duration::from_secs(seconds)) => statistics.refresh(),
        }
    }
}
