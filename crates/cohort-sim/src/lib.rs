//! `cohort-sim` — step loop and model-tree walk for the cohort framework.
//!
//! # Step loop
//!
//! ```text
//! init():
//!   bind people.age, people.female
//!   for module in modules (kind order):
//!     bind each distribution at  <kind container>.<name>.<relative path>
//!   draw initial age / sex per UID; module.init()
//!
//! for step in 0..config.n_steps:
//!   ① Clock     — registry.advance_to(step); stream counters reset
//!   ② Modules   — demographics → networks → diseases → interventions → analyzers
//!   ③ Deaths    — queued death requests applied
//!   ④ Ageing    — age += dt
//!   ⑤ Compact   — every `compact_interval` steps
//! ```
//!
//! Because every stream is keyed by its path and the step index, adding or
//! changing one module leaves every other module's draws unchanged.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs [`run_replicates`] on Rayon's thread pool.        |
//! | `serde`    | Derives `Serialize`/`Deserialize` on [`SimSnapshot`].  |
//! | `fx-hash`  | FxHash for the stream registry table.                  |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use cohort_core::SimConfig;
//! use cohort_sim::{BackgroundDeaths, BirthRate, Births, DeathRate, NoopObserver, SimBuilder};
//!
//! let mut sim = SimBuilder::new(SimConfig::default())
//!     .module(Births::new(BirthRate::Constant(20.0))?)
//!     .module(BackgroundDeaths::new(DeathRate::Constant(0.01))?)
//!     .build()?;
//! sim.run(&mut NoopObserver)?;
//! ```

pub mod builder;
pub mod demographics;
pub mod error;
pub mod module;
pub mod observer;
pub mod replicates;
pub mod sim;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use demographics::{BackgroundDeaths, BirthRate, Births, DeathProbFn, DeathRate};
pub use error::{SimError, SimResult};
pub use module::{Module, ModuleKind, StepContext, module_path};
pub use observer::{HistoryObserver, NoopObserver, SimObserver, StepSummary};
pub use replicates::{replicate_seeds, run_replicates};
pub use sim::Sim;
pub use snapshot::SimSnapshot;
