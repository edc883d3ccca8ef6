//! The `Module` trait: one component of the model tree.
//!
//! A model is a flat list of modules, each with a [`ModuleKind`] and a name.
//! The pair forms the first two steps of every stream path the module owns:
//!
//! ```text
//! ModuleKind::Disease, "sir", relative ["dur_inf"]   →  diseases.sir.dur_inf
//! ModuleKind::Intervention, "vx", ["p_take"]          →  interventions.vx.p_take
//! ```
//!
//! Modules run once per step in kind order (demographics first, analyzers
//! last) and in declaration order within a kind.

use std::fmt;

use cohort_agent::People;
use cohort_core::Step;
use cohort_dist::{Distribution, StreamPath};

use crate::SimResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleKind {
    Demographics,
    Network,
    Disease,
    Intervention,
    Analyzer,
}

impl ModuleKind {
    /// Name of the container this kind lives in; the first step of every
    /// stream path owned by a module of this kind.
    pub fn container(self) -> &'static str {
        match self {
            ModuleKind::Demographics => "demographics",
            ModuleKind::Network => "networks",
            ModuleKind::Disease => "diseases",
            ModuleKind::Intervention => "interventions",
            ModuleKind::Analyzer => "analyzers",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.container())
    }
}

/// Everything a module sees during one step.
pub struct StepContext<'a> {
    pub step:   Step,
    /// Model year at the start of the step.
    pub year:   f64,
    /// Years per step.
    pub dt:     f64,
    pub people: &'a mut People,
}

/// A simulation component.
///
/// Implementors must list every [`Distribution`] they own in
/// [`distributions`](Module::distributions).  Undeclared distributions are
/// never bound and fail with `NotBound` on first draw.
pub trait Module {
    fn kind(&self) -> ModuleKind;

    /// Name, unique among modules of the same kind.
    fn name(&self) -> &str;

    /// The module's distributions, each with its path relative to the module.
    fn distributions(&mut self) -> Vec<(StreamPath, &mut Distribution)> {
        Vec::new()
    }

    /// Called once after every distribution has been bound and the initial
    /// population exists.
    fn init(&mut self, _people: &mut People) -> SimResult<()> {
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> SimResult<()>;

    /// Called once after the final step.
    fn finalize(&mut self, _people: &People) -> SimResult<()> {
        Ok(())
    }
}

/// The path prefix for streams owned by a module.
pub fn module_path(kind: ModuleKind, name: &str) -> StreamPath {
    StreamPath::of([kind.container(), name])
}
