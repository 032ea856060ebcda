//! The cancellable countdown in front of a manual SOS.
//!
//! State lives in a watch channel so front ends can follow it. Every
//! transition is made under the channel's lock, which is what keeps a
//! cancelled ticker from dispatching even if it wakes before it is aborted.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CountdownConfig;
use crate::dispatch::AlertDispatcher;
use crate::ui::Ui;

/// Warning shown when there is nobody to alert.
pub const NO_CONTACTS_WARNING: &str = "No emergency contacts configured! Please add contacts first.";

/// Status shown after a cancel.
pub const CANCELLED_STATUS: &str = "✅ SOS cancelled. Motion sensors still active.";

/// Where the countdown is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// Nothing pending.
    Idle,
    /// Ticks left before the alert goes out.
    Counting(u32),
    /// The alert is being sent.
    Dispatching,
}

/// Result of [`Countdown::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new countdown is running.
    Started,
    /// A countdown or dispatch was already in progress; nothing changed.
    AlreadyActive,
    /// The book is empty; nothing was started.
    NoContacts,
}

/// Counts down and then dispatches a manual alert.
#[derive(Debug)]
pub struct Countdown {
    dispatcher: Arc<AlertDispatcher>,
    ui: Arc<dyn Ui>,
    duration: u32,
    tick: Duration,
    state: Arc<watch::Sender<CountdownState>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    /// Create an idle countdown.
    #[must_use]
    pub fn new(dispatcher: Arc<AlertDispatcher>, ui: Arc<dyn Ui>, config: &CountdownConfig) -> Self {
        let (state, _) = watch::channel(CountdownState::Idle);
        Self {
            dispatcher,
            ui,
            duration: config.duration_secs,
            tick: Duration::from_millis(config.tick_ms),
            state: Arc::new(state),
            ticker: Mutex::new(None),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CountdownState {
        *self.state.borrow()
    }

    /// Follow state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CountdownState> {
        self.state.subscribe()
    }

    /// Wait until nothing is pending.
    pub async fn wait_idle(&self) {
        let mut state = self.subscribe();
        // The sender lives in self, so the channel cannot close here
        let _ = state.wait_for(|s| *s == CountdownState::Idle).await;
    }

    /// Begin counting down.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> StartOutcome {
        if self.dispatcher.contact_count() == 0 {
            self.ui.warn(NO_CONTACTS_WARNING);
            return StartOutcome::NoContacts;
        }

        let duration = self.duration;
        let started = self.state.send_if_modified(|state| {
            if *state == CountdownState::Idle {
                *state = CountdownState::Counting(duration);
                true
            } else {
                false
            }
        });
        if !started {
            debug!("Countdown already active");
            return StartOutcome::AlreadyActive;
        }

        info!(duration, "SOS countdown started");
        self.ui.countdown(duration);

        let handle = tokio::spawn(run_ticker(
            Arc::clone(&self.state),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.ui),
            self.tick,
        ));
        *self.ticker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        StartOutcome::Started
    }

    /// Stop a running countdown. Returns `false` if nothing was counting.
    pub fn cancel(&self) -> bool {
        let cancelled = self.state.send_if_modified(|state| {
            if matches!(state, CountdownState::Counting(_)) {
                *state = CountdownState::Idle;
                true
            } else {
                false
            }
        });
        if !cancelled {
            return false;
        }

        if let Some(handle) = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        info!("SOS cancelled by user");
        self.ui.status(CANCELLED_STATUS);
        true
    }
}

async fn run_ticker(
    state: Arc<watch::Sender<CountdownState>>,
    dispatcher: Arc<AlertDispatcher>,
    ui: Arc<dyn Ui>,
    tick: Duration,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);

    loop {
        interval.tick().await;

        let mut remaining = None;
        let advanced = state.send_if_modified(|s| match *s {
            CountdownState::Counting(n) if n > 1 => {
                *s = CountdownState::Counting(n - 1);
                remaining = Some(n - 1);
                true
            }
            CountdownState::Counting(_) => {
                *s = CountdownState::Dispatching;
                true
            }
            _ => false,
        });

        if !advanced {
            return;
        }
        match remaining {
            Some(n) => ui.countdown(n),
            None => break,
        }
    }

    dispatcher.dispatch(None).await;
    state.send_replace(CountdownState::Idle);
}
