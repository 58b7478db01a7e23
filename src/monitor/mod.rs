/// Observable refresh state shared between the scheduler and the UI side.
///
/// ## Architecture: one lock, many readers
///
/// `StateStore` owns the `RefreshState` and the user's `TrackedSelection`
/// behind a single `parking_lot::Mutex`. Refresh cycles call the
/// `begin_fetch` / `record_success` / `record_failure` transitions; the
/// presentation side either polls `state()` or holds a receiver from
/// `subscribe()` that gets a copy of the state after every change.
///
/// Cycles may overlap. Every transition is applied atomically in arrival
/// order, so the last cycle to finish wins.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::analysis::tracked::TrackedSelection;
use crate::model::{BandKey, PhenomenonKey, Snapshot};

// ---------------------------------------------------------------------------
// Refresh state
// ---------------------------------------------------------------------------

/// What the UI needs to render the feed and its health.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RefreshState {
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub current_snapshot: Option<Snapshot>,
}

impl RefreshState {
    /// True when there is no successful fetch newer than `max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_success {
            Some(at) => now - at > max_age,
            None => true,
        }
    }
}

/// Handed back by `record_success` so the caller can decide on a
/// notification against the snapshot it just replaced.
#[derive(Debug, Clone)]
pub struct SuccessContext {
    pub previous: Option<Snapshot>,
    pub tracked: TrackedSelection,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Inner {
    state: RefreshState,
    tracked: TrackedSelection,
    in_flight: usize,
    subscribers: Vec<Sender<RefreshState>>,
}

impl Inner {
    /// Sends the current state to every live subscriber and forgets the
    /// ones whose receiver was dropped.
    fn publish(&mut self) {
        let state = &self.state;
        self.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
    }

    fn leave_fetching(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.state.is_loading = self.in_flight > 0;
    }
}

pub struct StateStore {
    inner: Mutex<Inner>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RefreshState::default(),
                tracked: TrackedSelection::new(),
                in_flight: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RefreshState {
        self.inner.lock().state.clone()
    }

    pub fn tracked(&self) -> TrackedSelection {
        self.inner.lock().tracked.clone()
    }

    /// Returns a receiver that gets the full state after every change.
    pub fn subscribe(&self) -> Receiver<RefreshState> {
        let (tx, rx) = mpsc::channel();
        self.inner.lock().subscribers.push(tx);
        rx
    }

    /// Entering Fetching: loading on, previous error cleared.
    pub fn begin_fetch(&self) {
        let mut inner = self.inner.lock();
        inner.in_flight += 1;
        inner.state.is_loading = true;
        inner.state.last_error = None;
        inner.publish();
    }

    /// Stores a freshly parsed snapshot and returns what it replaced along
    /// with the tracked selection at that instant.
    pub fn record_success(&self, snapshot: Snapshot, at: DateTime<Utc>) -> SuccessContext {
        let mut inner = self.inner.lock();
        let previous = inner.state.current_snapshot.replace(snapshot);
        inner.state.last_success = Some(at);
        inner.leave_fetching();
        let tracked = inner.tracked.clone();
        inner.publish();
        SuccessContext { previous, tracked }
    }

    /// Records a failed attempt. The current snapshot is left alone.
    pub fn record_failure(&self, message: impl Into<String>) {
        let mut inner = self.inner.lock();
        inner.state.last_error = Some(message.into());
        inner.leave_fetching();
        inner.publish();
    }

    /// Leaves Fetching without touching snapshot or error. Used for cycles
    /// whose result arrived after the scheduler was stopped.
    pub fn record_discarded(&self) {
        let mut inner = self.inner.lock();
        inner.leave_fetching();
        inner.publish();
    }

    /// Toggles tracking of a band slot; returns whether it is now tracked.
    pub fn toggle_band(&self, key: BandKey) -> bool {
        self.inner.lock().tracked.toggle_band(key)
    }

    /// Toggles tracking of a phenomenon slot; returns whether it is now tracked.
    pub fn toggle_phenomenon(&self, key: PhenomenonKey) -> bool {
        self.inner.lock().tracked.toggle_phenomenon(key)
    }
}
