//! Whole-simulation snapshots.
//!
//! A [`SimSnapshot`] records the next step, the population (allocator,
//! storage bookkeeping, and every column), and where every random stream
//! stands.  Restoring one into a `Sim` built from the same model resumes the
//! run exactly: the remaining steps draw the same values and apply the same
//! deaths and compactions as the original.
//!
//! State kept inside modules themselves (running totals, one-shot flags) is
//! the module's own business and is not captured.
//!
//! With the `serde` feature the snapshot serializes, except for the
//! registered state columns; see [`PopulationSnapshot`] for how those travel.

use cohort_agent::PopulationSnapshot;
use cohort_core::Step;
use cohort_dist::StreamState;
use tracing::debug;

use crate::{Sim, SimError, SimResult};

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimSnapshot {
    /// The next step to execute.
    pub step:    Step,
    pub people:  PopulationSnapshot,
    /// One entry per bound distribution, people attributes first, then
    /// modules in step order.
    pub streams: Vec<StreamState>,
}

impl SimSnapshot {
    /// The stored state for the stream with structural key `key`.
    pub fn stream(&self, key: u64) -> Option<&StreamState> {
        self.streams.iter().find(|s| s.key == key)
    }
}

impl Sim {
    /// Capture the step, the population, and every stream's counters.
    ///
    /// Take it between steps.
    pub fn snapshot(&mut self) -> SimResult<SimSnapshot> {
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        let mut streams = Vec::new();
        self.for_each_distribution(|d| {
            streams.push(d.state()?);
            Ok(())
        })?;
        Ok(SimSnapshot {
            step: self.clock.current,
            people: self.people.snapshot(),
            streams,
        })
    }

    /// Resume from `snapshot`: population, clock, and every stream.
    ///
    /// Every bound distribution must have an entry in the snapshot and the
    /// population must fit the registered state types.  Both are checked
    /// before anything changes.
    pub fn restore(&mut self, snapshot: SimSnapshot) -> SimResult<()> {
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        self.check_streams(&snapshot)?;
        let SimSnapshot { step, people, streams } = snapshot;
        self.people.restore(people)?;
        self.restore_counters(step, &streams)
    }

    /// Move the clock to `snapshot.step` and restore every stream's counters.
    ///
    /// The population is not touched.
    pub fn restore_streams(&mut self, snapshot: &SimSnapshot) -> SimResult<()> {
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        self.check_streams(snapshot)?;
        self.restore_counters(snapshot.step, &snapshot.streams)
    }

    fn check_streams(&mut self, snapshot: &SimSnapshot) -> SimResult<()> {
        self.for_each_distribution(|d| match snapshot.stream(d.state()?.key) {
            Some(_) => Ok(()),
            None => Err(SimError::Snapshot(format!("no stream state for `{}`", d.describe()))),
        })
    }

    fn restore_counters(&mut self, step: Step, streams: &[StreamState]) -> SimResult<()> {
        self.clock.current = step;
        self.registry.advance_to(step.0);
        self.for_each_distribution(|d| {
            let key = d.state()?.key;
            let state = streams.iter().find(|s| s.key == key).ok_or_else(|| {
                SimError::Snapshot(format!("no stream state for `{}`", d.describe()))
            })?;
            d.restore(*state)?;
            Ok(())
        })?;
        debug!(step = %step, streams = streams.len(), "restored streams");
        Ok(())
    }
}
