// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Demand and backoff settings (§6). Every operator declares a
//! `DemandSettings`; the scheduler consults it to size pulls and to pace
//! retries when an upstream operator repeatedly yields empty.
//!
//! Validation rules and defaults are grounded on the `tune` operator's
//! argument parser (`tune.cpp`), which is the only place these knobs are
//! exposed to a pipeline author.

use std::time::Duration;

/// How aggressively the scheduler pulls from an operator, and how it
/// backs off when pulls repeatedly come back empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandSettings {
    /// Minimum number of elements to request per pull.
    pub min_elements: u64,
    /// Maximum number of elements to request per pull.
    pub max_elements: u64,
    /// Maximum number of batches to request per pull.
    pub max_batches: u64,
    /// Backoff floor after an empty pull.
    pub min_backoff: Duration,
    /// Backoff ceiling; reached via exponential growth at `backoff_rate`.
    pub max_backoff: Duration,
    /// Multiplicative growth factor applied to the backoff after each
    /// consecutive empty pull. `1.0` disables growth (flat backoff at
    /// `min_backoff`, `max_backoff` never takes effect).
    pub backoff_rate: f64,
}

impl Default for DemandSettings {
    fn default() -> Self {
        Self {
            min_elements: 1,
            max_elements: 65_536,
            max_batches: 1,
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            backoff_rate: 2.0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DemandSettingsError {
    #[error("`min_demand_elements` must be greater than zero")]
    MinElementsZero,
    #[error("`max_demand_elements` must be greater than zero")]
    MaxElementsZero,
    #[error("`max_demand_elements` must be greater or equal than `min_demand_elements`")]
    ElementsOutOfOrder,
    #[error("`max_demand_batches` must be greater than zero")]
    MaxBatchesZero,
    #[error("`min_backoff` must be greater than or equal to 10ms")]
    MinBackoffTooSmall,
    #[error("`max_backoff` must be greater than or equal to 10ms")]
    MaxBackoffTooSmall,
    #[error("`max_backoff` must be greater or equal than `min_backoff`")]
    BackoffOutOfOrder,
    #[error("`backoff_rate` must be greater than or equal to 1.0")]
    RateTooSmall,
}

impl DemandSettings {
    /// Validates the combination of fields, mirroring `tune`'s argument
    /// parser checks exactly (including ordering of checks, since tests
    /// rely on the first-violated rule being reported first).
    pub fn validate(&self) -> Result<(), DemandSettingsError> {
        if self.min_elements == 0 {
            return Err(DemandSettingsError::MinElementsZero);
        }
        if self.max_elements == 0 {
            return Err(DemandSettingsError::MaxElementsZero);
        }
        if self.min_elements > self.max_elements {
            return Err(DemandSettingsError::ElementsOutOfOrder);
        }
        if self.max_batches == 0 {
            return Err(DemandSettingsError::MaxBatchesZero);
        }
        if self.min_backoff < Duration::from_millis(10) {
            return Err(DemandSettingsError::MinBackoffTooSmall);
        }
        if self.max_backoff <= Duration::from_millis(10) {
            return Err(DemandSettingsError::MaxBackoffTooSmall);
        }
        if self.min_backoff > self.max_backoff {
            return Err(DemandSettingsError::BackoffOutOfOrder);
        }
        if self.backoff_rate < 1.0 {
            return Err(DemandSettingsError::RateTooSmall);
        }
        Ok(())
    }

    /// Whether `backoff_rate == 1.0`, in which case `max_backoff` never
    /// takes effect (a `tune` warning condition, not an error).
    #[must_use]
    pub fn rate_is_flat(&self) -> bool {
        self.backoff_rate == 1.0
    }
}

/// Tracks the backoff state across consecutive empty pulls from a single
/// operator. Reset to `min_backoff` as soon as a pull returns data.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    settings: DemandSettings,
    /// `max(min_backoff, min(idle_after, max_backoff))`: the operator's own
    /// `idle_after` caps how long the scheduler may let it sit idle, so the
    /// backoff must never grow past that even when `max_backoff` is larger.
    cap: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub fn new(settings: DemandSettings, idle_after: Duration) -> Self {
        let cap = settings.max_backoff.min(idle_after).max(settings.min_backoff);
        let current = settings.min_backoff;
        Self { settings, cap, current }
    }

    /// The delay to wait before the next pull, given the current state.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Advances the state after another empty pull, returning the delay
    /// that should be waited out before the next attempt.
    pub fn step(&mut self) -> Duration {
        let delay = self.current;
        if !self.settings.rate_is_flat() {
            let grown = self.current.mul_f64(self.settings.backoff_rate);
            self.current = grown.min(self.cap);
        }
        delay
    }

    /// Resets the backoff to its floor after a successful (non-empty) pull.
    pub fn reset(&mut self) {
        self.current = self.settings.min_backoff;
    }
}
