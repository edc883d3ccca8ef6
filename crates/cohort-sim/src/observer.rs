//! Simulation observer trait for progress reporting and data collection.

use cohort_agent::People;
use cohort_core::Step;

/// What happened during one step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepSummary {
    pub step:    Step,
    /// Model year at the start of the step.
    pub year:    f64,
    /// Alive agents after deaths were applied.
    pub n_alive: usize,
    /// Agents that died this step.
    pub deaths:  usize,
}

/// Callbacks invoked by [`Sim::run`][crate::Sim::run] at key points in the
/// step loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: prevalence printer
///
/// ```rust,ignore
/// struct Printer;
///
/// impl SimObserver for Printer {
///     fn on_step_end(&mut self, summary: &StepSummary, people: &People) {
///         println!("{}: {} alive", summary.step, people.n_alive());
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called at the very start of each step, before any module runs.
    fn on_step_start(&mut self, _step: Step) {}

    /// Called at the end of each step, after deaths and compaction.
    ///
    /// Agents that died this step are still readable in `people` unless the
    /// step also compacted.
    fn on_step_end(&mut self, _summary: &StepSummary, _people: &People) {}

    /// Called after a compaction pass removed `removed` agents.
    fn on_compact(&mut self, _step: Step, _removed: usize) {}

    /// Called once after the final step completes.
    fn on_sim_end(&mut self, _final_step: Step, _people: &People) {}
}

/// A [`SimObserver`] that does nothing.  Use when you need to call `run` but
/// don't want progress callbacks.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

/// Records every [`StepSummary`], for tests and small runs.
#[derive(Debug, Default)]
pub struct HistoryObserver {
    pub steps:     Vec<StepSummary>,
    pub compacted: Vec<(Step, usize)>,
}

impl SimObserver for HistoryObserver {
    fn on_step_end(&mut self, summary: &StepSummary, _people: &People) {
        self.steps.push(*summary);
    }

    fn on_compact(&mut self, step: Step, removed: usize) {
        self.compacted.push((step, removed));
    }
}
