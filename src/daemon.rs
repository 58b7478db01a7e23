/// Refresh scheduler for the propagation monitoring service
///
/// This module implements the refresh loop that:
/// 1. Fetches the feed body through the injected `FeedFetcher`
/// 2. Parses it into a `Snapshot`
/// 3. Stores the snapshot in the shared `StateStore`
/// 4. Compares it with the previous snapshot and posts at most one
///    notification through the injected `Notifier`
///
/// A cycle moves the state through `Idle → Fetching → {Success, Failure} →
/// Idle`. The timer thread only dispatches; cycles run on a small thread
/// pool so a slow fetch never delays the next tick.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use threadpool::ThreadPool;

use crate::analysis::diff::diff;
use crate::analysis::tracked::{TrackedSelection, tracked_changes};
use crate::config::SettingsProvider;
use crate::ingest::feed::FeedFetcher;
use crate::ingest::solar_xml::parse_solar_xml;
use crate::model::{FeedError, Snapshot};
use crate::monitor::StateStore;
use crate::notify::{Notification, Notifier};

/// Worker threads for refresh cycles.
const CYCLE_WORKERS: usize = 2;

// ---------------------------------------------------------------------------
// Notification policy
// ---------------------------------------------------------------------------

/// Decides which notification, if any, a successful cycle posts.
///
/// - no previous snapshot: none (the first fetch is a silent baseline)
/// - changed, with tracked changes: the list of tracked changes
/// - changed, nothing tracked moved: a generic "something changed" notice
/// - unchanged: a generic "refreshed" notice
pub fn plan_notification(
    previous: Option<&Snapshot>,
    new: &Snapshot,
    tracked: &TrackedSelection,
    at: DateTime<Utc>,
) -> Option<Notification> {
    let old = previous?;

    if !diff(old, new).overall_changed {
        return Some(Notification::Refreshed { at });
    }

    let changes = tracked_changes(old, new, tracked);
    if changes.is_empty() {
        Some(Notification::ChangedOverall { at })
    } else {
        Some(Notification::TrackedChanges(changes))
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// What one refresh cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Snapshot stored; `notification` is what was posted, if anything.
    Success { notification: Option<Notification> },
    /// Fetch or parse failed; `message` is now the state's `last_error`.
    Failure { message: String },
    /// The scheduler was stopped while this cycle was in flight; its result
    /// was thrown away.
    Cancelled,
}

/// Everything a cycle needs, shared by the timer thread, the pool workers
/// and the scheduler handle.
struct Shared {
    store: Arc<StateStore>,
    fetcher: Arc<dyn FeedFetcher>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<dyn SettingsProvider>,
    pool: Mutex<ThreadPool>,
    /// Bumped by `stop()`; a cycle whose generation is stale discards its
    /// result.
    generation: AtomicU64,
}

impl Shared {
    fn dispatch(self: &Arc<Self>) {
        let generation = self.generation.load(Ordering::SeqCst);
        let shared = Arc::clone(self);
        self.pool.lock().execute(move || {
            shared.cycle(generation);
        });
    }

    fn cycle(&self, generation: u64) -> CycleOutcome {
        self.store.begin_fetch();

        let url = self.settings.feed_url();
        let result = self
            .fetcher
            .fetch(&url)
            .and_then(|body| parse_solar_xml(&body).map_err(FeedError::from));

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Discarding result of cancelled refresh from {}", url);
            self.store.record_discarded();
            return CycleOutcome::Cancelled;
        }

        match result {
            Ok(snapshot) => {
                let at = Utc::now();
                log::debug!(
                    "Feed updated {} ({} bands, {} phenomena)",
                    snapshot.updated,
                    snapshot.band_conditions.len(),
                    snapshot.vhf_conditions.len()
                );

                let ctx = self.store.record_success(snapshot.clone(), at);
                let notification = plan_notification(ctx.previous.as_ref(), &snapshot, &ctx.tracked, at);

                match &notification {
                    Some(n) => {
                        log::info!("Refresh complete: {}", n.label());
                        self.notifier.notify(n.title(), &n.body());
                    }
                    None => log::info!("Refresh complete: baseline snapshot stored"),
                }

                CycleOutcome::Success { notification }
            }
            Err(e) => {
                let message = e.to_string();
                if e.is_transport() {
                    log::warn!("Refresh failed, retrying at the next tick: {}", message);
                } else {
                    log::warn!("Refresh failed: {}", message);
                }
                self.store.record_failure(message.clone());
                CycleOutcome::Failure { message }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

enum TimerCommand {
    Stop,
}

struct TimerHandle {
    commands: Sender<TimerCommand>,
    thread: JoinHandle<()>,
}

impl TimerHandle {
    fn shutdown(self) {
        // A send error means the thread already exited.
        let _ = self.commands.send(TimerCommand::Stop);
        if self.thread.join().is_err() {
            log::warn!("Refresh timer thread panicked");
        }
    }
}

/// Periodic refresh driver. At most one timer runs at a time.
pub struct RefreshScheduler {
    shared: Arc<Shared>,
    timer: Mutex<Option<TimerHandle>>,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<StateStore>,
        fetcher: Arc<dyn FeedFetcher>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<dyn SettingsProvider>,
    ) -> Self {
        let pool = threadpool::Builder::new()
            .num_threads(CYCLE_WORKERS)
            .thread_name("propmon-refresh".to_string())
            .build();

        Self {
            shared: Arc::new(Shared {
                store,
                fetcher,
                notifier,
                settings,
                pool: Mutex::new(pool),
                generation: AtomicU64::new(0),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.shared.store
    }

    /// Timer period currently configured by the settings provider.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.shared.settings.refresh_interval_minutes() * 60)
    }

    /// Starts the periodic timer, replacing any running one. The first tick
    /// fires after `interval`; call `trigger_immediate_fetch` for an
    /// initial load.
    pub fn start(&self, interval: Duration) -> std::io::Result<()> {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.shutdown();
        }

        let (tx, rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);

        let thread = thread::Builder::new()
            .name("propmon-timer".to_string())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => shared.dispatch(),
                        Ok(TimerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        log::info!("Refresh timer started: every {} minutes", interval.as_secs() / 60);
        *timer = Some(TimerHandle {
            commands: tx,
            thread,
        });
        Ok(())
    }

    /// Cancels the timer and marks in-flight cycles as cancelled. The HTTP
    /// request of such a cycle still completes; its result is dropped.
    pub fn stop(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.timer.lock().take() {
            handle.shutdown();
            log::info!("Refresh timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }

    /// Dispatches one cycle onto the worker pool without waiting for it.
    pub fn trigger_immediate_fetch(&self) {
        self.shared.dispatch();
    }

    /// Runs one cycle on the calling thread.
    pub fn run_cycle(&self) -> CycleOutcome {
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared.cycle(generation)
    }

    /// Blocks until every dispatched cycle has finished.
    pub fn wait_idle(&self) {
        let pool = self.shared.pool.lock().clone();
        pool.join();
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.get_mut().take() {
            handle.shutdown();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
