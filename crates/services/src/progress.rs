//! Drives the pure progress estimator with real time.
//!
//! One background task watches session snapshots and, only while the
//! estimator is in its running phase, owns a recurring tick interval. The
//! interval is acquired on entry to the running phase and dropped on every
//! exit (flag flip, cap reached, completion), so exactly one timer is ever
//! alive and no stale timer can fire after teardown.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use sitequiz_core::model::Session;
use sitequiz_core::progress::{ProgressEstimator, TICK_INTERVAL_MS};
use sitequiz_core::time::Clock;

use crate::store::SessionStore;

pub struct ProgressDriver {
    value_rx: watch::Receiver<f64>,
    task: JoinHandle<()>,
}

impl ProgressDriver {
    /// Spawn the driver task against `store`.
    #[must_use]
    pub fn spawn(clock: Clock, store: &SessionStore) -> Self {
        let session_rx = store.subscribe();
        let (tx, value_rx) = watch::channel(0.0);
        let task = tokio::spawn(run(clock, session_rx, tx));
        Self { value_rx, task }
    }

    /// Subscribe to the displayed progress value (`0.0..=100.0`).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.value_rx.clone()
    }

    /// Current displayed value.
    #[must_use]
    pub fn value(&self) -> f64 {
        *self.value_rx.borrow()
    }
}

impl Drop for ProgressDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(clock: Clock, mut session_rx: watch::Receiver<Session>, tx: watch::Sender<f64>) {
    let mut estimator = ProgressEstimator::new();
    let mut current_url = String::new();

    let mut sync = move |estimator: &mut ProgressEstimator, session: &Session| {
        // A new submission restarts the estimate even when the previous
        // session never settled and the generating flag stayed up.
        if session.current_url() != current_url {
            current_url = session.current_url().to_string();
            *estimator = ProgressEstimator::new();
        }
        estimator.sync(
            session.is_generating(),
            !session.questions().is_empty(),
            session.error().is_some(),
            clock.now(),
        );
    };

    sync(&mut estimator, &session_rx.borrow_and_update().clone());
    let _ = tx.send_replace(estimator.value());

    loop {
        // Quiet phases: no timer alive, only session transitions matter.
        while !estimator.wants_ticks() {
            if session_rx.changed().await.is_err() {
                return;
            }
            let session = session_rx.borrow_and_update().clone();
            sync(&mut estimator, &session);
            let _ = tx.send_replace(estimator.value());
        }

        // Running: acquire the tick interval for exactly this phase.
        let mut ticker = time::interval(Duration::from_millis(TICK_INTERVAL_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        while estimator.wants_ticks() {
            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let session = session_rx.borrow_and_update().clone();
                    sync(&mut estimator, &session);
                }
                _ = ticker.tick() => {
                    estimator.tick(clock.now());
                }
            }
            let _ = tx.send_replace(estimator.value());
        }
        // Ticker dropped here: cap reached, completion, or flag flip.
    }
}
