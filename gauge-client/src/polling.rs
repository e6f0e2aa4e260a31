//! Interval-driven connectivity polling with interaction-aware pause.
//!
//! The controller probes a liveness endpoint on a fixed interval and
//! publishes a [`PollStatus`] on a watch channel. Any user interaction
//! pauses probing until a quiet period passes with no further interaction.

use crate::probe::LivenessProbe;
use gauge_core::{GaugeResult, PollState, PollStatus, SharedClock};
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// Time without interaction before polling resumes.
    pub quiet_period_ms: u64,
    pub pause_on_interaction: bool,
    /// Path probed with `HEAD`, relative to the API base URL.
    pub health_path: String,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            quiet_period_ms: 2_000,
            pause_on_interaction: true,
            health_path: "/api/analytics/overview".to_string(),
        }
    }
}

impl PollingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_quiet_period_ms(mut self, quiet_period_ms: u64) -> Self {
        self.quiet_period_ms = quiet_period_ms;
        self
    }

    pub fn with_pause_on_interaction(mut self, enabled: bool) -> Self {
        self.pause_on_interaction = enabled;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }
}

/// Invoked after every successful probe and on manual refresh.
pub type UpdateCallback = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    probe: Arc<dyn LivenessProbe>,
    clock: SharedClock,
    config: PollingConfig,
    on_update: Mutex<Option<UpdateCallback>>,
    status: watch::Sender<PollStatus>,
    stop: Notify,
    /// Signalled when the quiet period ends so the poller checks at once.
    resume: Notify,
}

impl Shared {
    fn state(&self) -> PollState {
        self.status.borrow().state
    }

    fn is_active(&self) -> bool {
        self.status.borrow().is_active()
    }

    fn notify_update(&self) {
        // Clone out so the callback runs without the lock held.
        let callback = self
            .on_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn set_on_update(&self, callback: UpdateCallback) {
        *self.on_update.lock().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    fn record_probe(&self, result: GaugeResult<()>) {
        let connected = result.is_ok();
        let now = self.clock.now();
        let mut changed = false;
        self.status.send_modify(|status| {
            changed = status.connected != connected;
            status.connected = connected;
            if connected {
                status.last_update = Some(now);
            }
        });

        match result {
            Ok(()) => {
                if changed {
                    info!("connectivity restored");
                }
                self.notify_update();
            }
            Err(e) => {
                if changed {
                    warn!(error = %e, "connectivity lost");
                } else {
                    debug!(error = %e, "poll failed");
                }
            }
        }
    }

    async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.stop.notified() => break,
                _ = self.resume.notified() => {
                    debug!("polling at end of quiet period");
                    ticker.reset();
                }
                _ = ticker.tick() => {}
            }

            match self.state() {
                PollState::Paused => {
                    debug!("poll skipped while paused");
                    continue;
                }
                PollState::Stopped => break,
                PollState::Idle | PollState::Polling => {}
            }

            let result = self.probe.probe().await;
            if !self.is_active() {
                debug!("discarding probe result after stop");
                break;
            }
            self.record_probe(result);
        }
    }
}

#[derive(Default)]
struct Tasks {
    poller: Option<JoinHandle<()>>,
    quiet_timer: Option<JoinHandle<()>>,
}

/// Drives periodic liveness probes.
///
/// Lifecycle: `Idle → Polling ⇄ Paused → Stopped`. `Stopped` is terminal.
pub struct PollingController {
    shared: Arc<Shared>,
    tasks: Mutex<Tasks>,
}

impl std::fmt::Debug for PollingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingController")
            .field("config", &self.shared.config)
            .field("status", &*self.shared.status.borrow())
            .finish()
    }
}

impl PollingController {
    pub fn new(probe: Arc<dyn LivenessProbe>, config: PollingConfig, clock: SharedClock) -> Self {
        let (status, _) = watch::channel(PollStatus::default());
        Self {
            shared: Arc::new(Shared {
                probe,
                clock,
                config,
                on_update: Mutex::new(None),
                status,
                stop: Notify::new(),
                resume: Notify::new(),
            }),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    /// Set the callback run after each successful probe.
    pub fn with_on_update(self, callback: UpdateCallback) -> Self {
        self.set_on_update(callback);
        self
    }

    /// Replace the update callback. Takes effect from the next probe, even
    /// while polling is running.
    pub fn set_on_update(&self, callback: UpdateCallback) {
        self.shared.set_on_update(callback);
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin polling. The first probe is issued immediately.
    ///
    /// Only an idle controller can start; calling this again is a no-op.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        if self.shared.state() != PollState::Idle {
            return;
        }
        self.shared
            .status
            .send_modify(|status| status.state = PollState::Polling);
        info!(interval_ms = self.shared.config.interval_ms, "polling started");

        let poller = tokio::spawn(Arc::clone(&self.shared).run());
        self.tasks().poller = Some(poller);
    }

    /// Stop polling. An in-flight probe is allowed to finish but its
    /// result is discarded.
    pub fn stop(&self) {
        let mut stopped = false;
        self.shared.status.send_if_modified(|status| {
            if status.state == PollState::Stopped {
                return false;
            }
            status.state = PollState::Stopped;
            stopped = true;
            true
        });
        if !stopped {
            return;
        }

        self.shared.stop.notify_one();
        let mut tasks = self.tasks();
        if let Some(timer) = tasks.quiet_timer.take() {
            timer.abort();
        }
        // Dropping the handle detaches the poller; it exits on its own.
        tasks.poller = None;
        info!("polling stopped");
    }

    /// Record a user interaction: pause polling and restart the quiet
    /// period timer. When the quiet period ends a probe runs immediately
    /// and the interval restarts from there.
    pub fn interaction(&self) {
        if !self.shared.config.pause_on_interaction || !self.shared.is_active() {
            return;
        }

        let paused = self.shared.status.send_if_modified(|status| {
            if status.state == PollState::Polling {
                status.state = PollState::Paused;
                true
            } else {
                false
            }
        });
        if paused {
            debug!("polling paused for interaction");
        }

        let shared = Arc::clone(&self.shared);
        let quiet = self.shared.config.quiet_period();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            let resumed = shared.status.send_if_modified(|status| {
                if status.state == PollState::Paused {
                    status.state = PollState::Polling;
                    true
                } else {
                    false
                }
            });
            if resumed {
                debug!("polling resumed after quiet period");
                shared.resume.notify_one();
            }
        });

        let mut tasks = self.tasks();
        if let Some(previous) = tasks.quiet_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Mark data as refreshed now and run the update callback, without
    /// probing.
    pub fn refresh(&self) {
        let now = self.shared.clock.now();
        self.shared
            .status
            .send_modify(|status| status.last_update = Some(now));
        self.shared.notify_update();
    }

    pub fn status(&self) -> PollStatus {
        self.shared.status.borrow().clone()
    }

    /// Receive every status change.
    pub fn subscribe(&self) -> watch::Receiver<PollStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_paused(&self) -> bool {
        self.status().is_paused()
    }

    pub fn is_connected(&self) -> bool {
        self.status().connected
    }
}

impl Drop for PollingController {
    fn drop(&mut self) {
        self.stop();
    }
}
