//! Activity tracker.
//!
//! Time on page is measured against a baseline set by [`ActivityTracker::start`].
//! While the page is hidden the clock is frozen; when it becomes visible again
//! the baseline moves forward by the hidden duration.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, trace};

use crate::protocol::ActivityMetrics;

use super::options::TrackerOptions;
use super::signal::{PageSignal, Visibility, scroll_percentage};
use super::ActivitySink;

// ============================================================================
// Types
// ============================================================================

/// Counters and timers of one tracking session.
#[derive(Default)]
struct Session {
    running: bool,
    /// Bumped on every `start()` so timers of an old session stay silent.
    id: u64,
    click_count: u64,
    scroll_percentage: f64,
    baseline: Option<Instant>,
    hidden_since: Option<Instant>,
    stopped_at: Option<Instant>,
    last_scroll_at: Option<Instant>,
    flush_timer: Option<JoinHandle<()>>,
    inactivity_timer: Option<JoinHandle<()>>,
}

impl Session {
    fn metrics(&self, now: Instant) -> ActivityMetrics {
        let end = self.stopped_at.or(self.hidden_since).unwrap_or(now);
        let time_on_page_seconds = self
            .baseline
            .map_or(0, |baseline| end.saturating_duration_since(baseline).as_secs());

        ActivityMetrics {
            click_count: self.click_count,
            scroll_percentage: self.scroll_percentage,
            time_on_page_seconds,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.flush_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.inactivity_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    sink: Arc<dyn ActivitySink>,
    options: TrackerOptions,
    session: Mutex<Session>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.session.get_mut().cancel_timers();
    }
}

// ============================================================================
// ActivityTracker
// ============================================================================

/// Turns page signals into periodic [`ActivityMetrics`] snapshots.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct ActivityTracker {
    inner: Arc<Inner>,
}

impl fmt::Debug for ActivityTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityTracker")
            .field("running", &self.is_running())
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

impl ActivityTracker {
    /// Creates a stopped tracker reporting to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn ActivitySink>, options: TrackerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                options,
                session: Mutex::new(Session::default()),
            }),
        }
    }

    /// Starts a new tracking session.
    ///
    /// Resets every counter, starts accepting signals and arms the flush and
    /// inactivity timers. No-op if already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        let mut session = self.inner.session.lock();
        if session.running {
            debug!("Activity tracker already running");
            return;
        }

        session.cancel_timers();
        let id = session.id.wrapping_add(1);
        *session = Session {
            running: true,
            id,
            baseline: Some(Instant::now()),
            ..Session::default()
        };

        self.inner.arm_flush_timer(&mut session);
        self.inner.arm_inactivity_timer(&mut session);
        debug!(session = id, "Activity tracking started");
    }

    /// Stops the session and performs one final flush.
    ///
    /// Signals are ignored afterwards and [`metrics`](Self::metrics) keeps
    /// reporting the final values. Idempotent.
    pub fn stop(&self) {
        {
            let mut session = self.inner.session.lock();
            if !session.running {
                return;
            }
            session.running = false;
            session.cancel_timers();
            session.stopped_at = Some(session.hidden_since.unwrap_or_else(Instant::now));
            debug!(session = session.id, "Activity tracking stopped");
        }
        self.inner.flush();
    }

    /// Feeds one page signal. Ignored unless running.
    pub fn record(&self, signal: PageSignal) {
        let flush_now = {
            let mut session = self.inner.session.lock();
            if !session.running {
                trace!(?signal, "Ignoring signal while stopped");
                return;
            }
            self.inner.apply_signal(&mut session, signal)
        };

        if flush_now {
            self.inner.flush();
        }
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn metrics(&self) -> ActivityMetrics {
        self.inner.session.lock().metrics(Instant::now())
    }

    /// Hands the current snapshot to the sink if it is open.
    ///
    /// Returns `true` if the snapshot was sent; the sent clicks are then
    /// subtracted from the running count.
    pub fn flush(&self) -> bool {
        self.inner.flush()
    }

    /// Returns `true` between `start()` and `stop()`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.session.lock().running
    }

    /// Returns the tracker options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &TrackerOptions {
        &self.inner.options
    }
}

// ============================================================================
// Inner
// ============================================================================

impl Inner {
    /// Folds a signal into the session. Returns `true` if a flush is due.
    fn apply_signal(self: &Arc<Self>, session: &mut Session, signal: PageSignal) -> bool {
        let now = Instant::now();

        match signal {
            PageSignal::Click => {
                session.click_count += 1;
                self.arm_inactivity_timer(session);
                false
            }

            PageSignal::Scroll {
                offset,
                max_scrollable,
            } => {
                if let Some(percentage) = scroll_percentage(offset, max_scrollable)
                    && percentage > session.scroll_percentage
                {
                    session.scroll_percentage = percentage;
                }

                // Only the timer re-arm is throttled; every sample counts.
                if let Some(last) = session.last_scroll_at
                    && now.duration_since(last) < self.options.scroll_throttle
                {
                    return false;
                }
                session.last_scroll_at = Some(now);
                self.arm_inactivity_timer(session);
                false
            }

            PageSignal::Visibility(Visibility::Hidden) => {
                if session.hidden_since.is_some() {
                    return false;
                }
                session.hidden_since = Some(now);
                trace!("Page hidden");
                true
            }

            PageSignal::Visibility(Visibility::Visible) => {
                if let Some(since) = session.hidden_since.take()
                    && let Some(baseline) = session.baseline.as_mut()
                {
                    *baseline += now.duration_since(since);
                    trace!(hidden_ms = now.duration_since(since).as_millis() as u64, "Page visible");
                }
                false
            }
        }
    }

    fn flush(&self) -> bool {
        let metrics = {
            let session = self.session.lock();
            if session.baseline.is_none() {
                return false;
            }
            session.metrics(Instant::now())
        };

        if !self.sink.is_open() {
            trace!("Sink closed, activity snapshot skipped");
            return false;
        }

        match self.sink.send_activity(metrics) {
            Ok(()) => {
                let mut session = self.session.lock();
                session.click_count = session.click_count.saturating_sub(metrics.click_count);
                debug!(
                    clicks = metrics.click_count,
                    scroll = metrics.scroll_percentage,
                    seconds = metrics.time_on_page_seconds,
                    "Activity flushed"
                );
                true
            }
            Err(e) => {
                debug!(error = %e, "Activity snapshot not sent");
                false
            }
        }
    }

    fn arm_flush_timer(self: &Arc<Self>, session: &mut Session) {
        if let Some(timer) = session.flush_timer.take() {
            timer.abort();
        }

        let period = self.options.flush_interval;
        let id = session.id;
        let weak = Arc::downgrade(self);

        session.flush_timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if !inner.is_current(id) {
                    break;
                }
                trace!("Periodic activity flush");
                inner.flush();
            }
        }));
    }

    fn arm_inactivity_timer(self: &Arc<Self>, session: &mut Session) {
        if let Some(timer) = session.inactivity_timer.take() {
            timer.abort();
        }

        let timeout = self.options.inactivity_timeout;
        let id = session.id;
        let weak = Arc::downgrade(self);

        session.inactivity_timer = Some(tokio::spawn(async move {
            sleep(timeout).await;
            if let Some(inner) = weak.upgrade()
                && inner.is_current(id)
            {
                debug!(timeout_ms = timeout.as_millis() as u64, "Visitor inactive");
                inner.flush();
            }
        }));
    }

    fn is_current(&self, id: u64) -> bool {
        let session = self.session.lock();
        session.running && session.id == id
    }
}

// ============================================================================
// Tests
// ============================================================================
