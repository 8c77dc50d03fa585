//! Synthetic progress estimation for question generation.
//!
//! The backend reports no percent-complete telemetry, so the displayed
//! value is derived from elapsed wall-clock time: it climbs toward a cap
//! over a fixed window, holds at the cap until real evidence of completion
//! arrives, and snaps to 100 as soon as any questions are present.
//!
//! This module is the pure state machine; driving it with a recurring
//! timer is the services layer's job.

use chrono::{DateTime, Utc};

/// Ceiling for the time-derived value; only completion reaches 100.
pub const PROGRESS_CAP: f64 = 99.0;

/// Window over which the value climbs from 0 to the cap.
pub const DURATION_WINDOW_MS: i64 = 20_000;

/// Recommended recomputation interval for drivers.
pub const TICK_INTERVAL_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    Idle,
    Running,
    HeldAtCap,
    Complete,
}

/// Time-driven, non-authoritative progress signal.
///
/// `idle → running → held-at-cap → complete`, reset to `idle` whenever
/// generation stops without producing questions.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEstimator {
    phase: ProgressPhase,
    started_at: Option<DateTime<Utc>>,
    value: f64,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressEstimator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: ProgressPhase::Idle,
            started_at: None,
            value: 0.0,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ProgressPhase {
        self.phase
    }

    /// Last displayed value, in the range `0.0..=100.0`.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Returns true while a recurring tick is useful.
    ///
    /// Ticks recompute nothing once the cap is reached, so drivers cancel
    /// their timer outside of `Running`.
    #[must_use]
    pub fn wants_ticks(&self) -> bool {
        self.phase == ProgressPhase::Running
    }

    /// Reconcile the estimator with externally observed session state.
    ///
    /// Questions present means completion for display purposes, even
    /// before the stream's terminal signal; an error, or generation
    /// stopping with nothing produced, resets to idle. Generation active
    /// with no questions while `Complete` means a new submission started
    /// before the previous session settled, so the bar restarts from 0.
    pub fn sync(&mut self, generating: bool, has_questions: bool, has_error: bool, now: DateTime<Utc>) {
        if has_error || (!generating && !has_questions) {
            self.phase = ProgressPhase::Idle;
            self.started_at = None;
            self.value = 0.0;
        } else if has_questions {
            self.phase = ProgressPhase::Complete;
            self.started_at = None;
            self.value = 100.0;
        } else if matches!(self.phase, ProgressPhase::Idle | ProgressPhase::Complete) {
            self.phase = ProgressPhase::Running;
            self.started_at = Some(now);
            self.value = 0.0;
        }
    }

    /// Recompute the displayed value from elapsed time.
    ///
    /// No-op outside of `Running`. The value never decreases: a recomputed
    /// value is applied only when strictly greater than the last one.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.phase != ProgressPhase::Running {
            return;
        }
        let Some(started_at) = self.started_at else {
            return;
        };

        let elapsed_ms = (now - started_at).num_milliseconds().max(0);
        if elapsed_ms >= DURATION_WINDOW_MS {
            self.value = PROGRESS_CAP;
            self.phase = ProgressPhase::HeldAtCap;
            return;
        }

        let next = PROGRESS_CAP * elapsed_ms as f64 / DURATION_WINDOW_MS as f64;
        if next > self.value {
            self.value = next;
        }
    }
}
