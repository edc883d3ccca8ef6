//! Simulation time model.
//!
//! # Design
//!
//! Time is a monotonically increasing `Step` counter.  The mapping to model
//! time (fractional years) is held in `SimClock`:
//!
//!   year = start + step * dt
//!
//! The step index is also folded into every random-stream seed, so it must be
//! exact: an integer counter never drifts the way accumulated `f64` time does.

use std::fmt;

use crate::{CoreError, CoreResult};

// ── Step ──────────────────────────────────────────────────────────────────────

/// An absolute simulation step counter.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step(pub u64);

impl Step {
    pub const ZERO: Step = Step(0);

    /// Return the step `n` after `self`.
    #[inline]
    pub fn offset(self, n: u64) -> Step {
        Step(self.0 + n)
    }

    /// `true` on every `interval`-th step (never for `interval == 0`).
    #[inline]
    pub fn is_every(self, interval: u64) -> bool {
        interval > 0 && self.0 > 0 && self.0.is_multiple_of(interval)
    }
}

impl std::ops::Add<u64> for Step {
    type Output = Step;
    #[inline]
    fn add(self, rhs: u64) -> Step {
        Step(self.0 + rhs)
    }
}

impl std::ops::Sub for Step {
    type Output = u64;
    #[inline]
    fn sub(self, rhs: Step) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Converts between step counts and model time in years.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Model year at step 0.
    pub start: f64,
    /// Years per step.
    pub dt: f64,
    /// The current step — advanced by `SimClock::advance()`.
    pub current: Step,
}

impl SimClock {
    pub fn new(start: f64, dt: f64) -> Self {
        Self { start, dt, current: Step::ZERO }
    }

    /// Advance the clock by one step.
    #[inline]
    pub fn advance(&mut self) {
        self.current = Step(self.current.0 + 1);
    }

    /// Model year of the current step.
    #[inline]
    pub fn year(&self) -> f64 {
        self.start + self.current.0 as f64 * self.dt
    }

    /// Number of whole steps covering `years` (rounds up).
    pub fn steps_for_years(&self, years: f64) -> u64 {
        (years / self.dt).ceil().max(0.0) as u64
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (year {:.2})", self.current, self.year())
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
///
/// Typically built by the application crate (or deserialised with the
/// `serde` feature) and passed to the simulation builder.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Root seed.  Every stream seed is derived from it; the same root and
    /// the same model always reproduce the same run.
    pub seed: u64,

    /// Initial population size.
    pub n_agents: usize,

    /// Total steps to simulate.
    pub n_steps: u64,

    /// Model year at step 0.
    pub start: f64,

    /// Years per step.  Must be finite and positive.
    pub dt: f64,

    /// Compact dead agents out of dense storage every N steps.
    /// `0` disables periodic compaction.
    pub compact_interval: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:             1,
            n_agents:         1_000,
            n_steps:          100,
            start:            2000.0,
            dt:               1.0,
            compact_interval: 10,
        }
    }
}

impl SimConfig {
    /// The step at which the simulation ends (exclusive upper bound).
    #[inline]
    pub fn end_step(&self) -> Step {
        Step(self.n_steps)
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.start, self.dt)
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> CoreResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(CoreError::Config(format!("dt must be positive and finite, got {}", self.dt)));
        }
        if !self.start.is_finite() {
            return Err(CoreError::Config(format!("start must be finite, got {}", self.start)));
        }
        if self.n_agents > u32::MAX as usize {
            return Err(CoreError::Config(format!(
                "n_agents {} exceeds the UID space",
                self.n_agents
            )));
        }
        Ok(())
    }
}
