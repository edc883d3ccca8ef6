//! `StepClock` — the step index shared by a registry and its distributions.

use std::cell::Cell;
use std::rc::Rc;

/// A shared, single-threaded view of the current step.
///
/// The simulation loop advances it once per step through
/// [`StreamRegistry::advance_to`][crate::StreamRegistry::advance_to]; every
/// bound distribution reads it to key its variates and to reset its counters
/// when the step changes.  Each simulation owns its own clock, so replicates
/// running on different threads never share one.
#[derive(Clone, Debug, Default)]
pub struct StepClock(Rc<Cell<u64>>);

impl StepClock {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    #[inline]
    pub fn set(&self, step: u64) {
        self.0.set(step);
    }
}
