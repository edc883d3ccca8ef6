//! The `Sim` struct and its step loop.

use cohort_agent::People;
use cohort_core::{SimClock, SimConfig, Step};
use cohort_dist::{Distribution, RegistryEntry, StreamIdentity, StreamPath, StreamRegistry};
use tracing::{debug, info, trace};

use crate::module::module_path;
use crate::{Module, ModuleKind, SimError, SimObserver, SimResult, StepContext, StepSummary};

/// The main simulation runner.
///
/// `Sim` owns the population, the modules, and the stream registry, and
/// drives the step loop:
///
/// 1. **Clock**: the shared step clock moves to the current step, so every
///    distribution starts the step with fresh counters.
/// 2. **Modules**: each module's `step` runs, demographics first and
///    analyzers last.
/// 3. **Deaths**: deaths requested during the step are applied.
/// 4. **Ageing**: every agent ages by `dt`.
/// 5. **Compaction** (every `config.compact_interval` steps): dense storage
///    for the dead is reclaimed.
///
/// Create via [`SimBuilder`][crate::SimBuilder], then call [`init`](Sim::init)
/// (or let [`run`](Sim::run) do it).
pub struct Sim {
    /// Global configuration (seed, population size, step count, `dt`, …).
    pub config: SimConfig,

    /// Simulation clock: tracks the current step and maps it to model years.
    pub clock: SimClock,

    /// The population.
    pub people: People,

    pub(crate) registry:    StreamRegistry,
    pub(crate) modules:     Vec<Box<dyn Module>>,
    pub(crate) age:         Distribution,
    pub(crate) female:      Distribution,
    pub(crate) initialized: bool,
}

impl Sim {
    // ── Initialization ────────────────────────────────────────────────────

    /// Bind every distribution in the model tree, draw the initial
    /// population's attributes, and initialize every module.
    ///
    /// Each distribution is bound at `[kind container, module name,
    /// relative path…]`.  The walk order has no effect on any stream.
    pub fn init(&mut self) -> SimResult<()> {
        if self.initialized {
            return Err(SimError::AlreadyInitialized);
        }

        let people_path = StreamPath::of(["people"]);
        self.registry
            .register(StreamIdentity::new(people_path.clone().child("age")), &mut self.age)?;
        self.registry
            .register(StreamIdentity::new(people_path.child("female")), &mut self.female)?;

        for module in &mut self.modules {
            let base = module_path(module.kind(), module.name());
            for (relative, dist) in module.distributions() {
                self.registry
                    .register(StreamIdentity::new(base.clone().join(&relative)), dist)?;
            }
        }

        self.draw_attributes()?;

        for module in &mut self.modules {
            module.init(&mut self.people)?;
        }

        self.initialized = true;
        info!(
            seed = self.config.seed,
            agents = self.people.n_alive(),
            modules = self.modules.len(),
            streams = self.registry.len(),
            "simulation initialized"
        );
        Ok(())
    }

    /// Initial age and sex for everyone alive at step 0.
    fn draw_attributes(&mut self) -> SimResult<()> {
        let uids = self.people.alive();
        let ages = self.age.draw_for(&uids)?;
        if let Some(bad) = ages.iter().find(|a| !a.is_finite() || **a < 0.0) {
            return Err(SimError::Config(format!("initial age distribution produced {bad}")));
        }
        self.people.age.set_many(&uids, &ages)?;
        let female: Vec<bool> = self.female.draw_for(&uids)?.into_iter().map(|v| v != 0.0).collect();
        self.people.female.set_many(&uids, &female)?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Run from the current step to `config.end_step()`, initializing first
    /// if needed, then finalize every module.
    ///
    /// Calls observer hooks at every step boundary.  Use
    /// [`NoopObserver`][crate::NoopObserver] if you don't need callbacks.
    pub fn run<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<()> {
        if !self.initialized {
            self.init()?;
        }
        while self.clock.current < self.config.end_step() {
            self.step(observer)?;
        }
        for module in &mut self.modules {
            module.finalize(&self.people)?;
        }
        observer.on_sim_end(self.clock.current, &self.people);
        info!(
            steps = self.clock.current.0,
            alive = self.people.n_alive(),
            "simulation finished"
        );
        Ok(())
    }

    /// Run exactly `n` steps from the current position (ignores `end_step`).
    ///
    /// Useful for tests and incremental stepping.
    pub fn run_steps<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.step(observer)?;
        }
        Ok(())
    }

    /// Execute one step.
    pub fn step<O: SimObserver>(&mut self, observer: &mut O) -> SimResult<StepSummary> {
        if !self.initialized {
            return Err(SimError::NotInitialized);
        }
        let now = self.clock.current;
        let year = self.clock.year();
        let dt = self.clock.dt;
        self.registry.advance_to(now.0);
        observer.on_step_start(now);

        for module in &mut self.modules {
            let mut ctx = StepContext { step: now, year, dt, people: &mut self.people };
            module.step(&mut ctx)?;
        }

        let died = self.people.apply_deaths()?;
        self.people.age_by(dt);

        if now.offset(1).is_every(self.config.compact_interval) {
            let removed = self.people.compact()?;
            if removed > 0 {
                observer.on_compact(now, removed);
            }
        }

        let summary = StepSummary {
            step: now,
            year,
            n_alive: self.people.n_alive(),
            deaths: died.len(),
        };
        observer.on_step_end(&summary, &self.people);
        trace!(step = %now, alive = summary.n_alive, deaths = summary.deaths, "step complete");
        self.clock.advance();
        Ok(summary)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn current_step(&self) -> Step {
        self.clock.current
    }

    /// Every registered stream, in registration order.
    pub fn streams(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.registry.all()
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// `(kind, name)` of every module, in step order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleKind, &str)> + '_ {
        self.modules.iter().map(|m| (m.kind(), m.name()))
    }

    /// Apply `f` to every distribution in the tree, people attributes first
    /// and then modules in step order.
    pub(crate) fn for_each_distribution(
        &mut self,
        mut f: impl FnMut(&mut Distribution) -> SimResult<()>,
    ) -> SimResult<()> {
        f(&mut self.age)?;
        f(&mut self.female)?;
        for module in &mut self.modules {
            for (_, dist) in module.distributions() {
                f(dist)?;
            }
        }
        Ok(())
    }

    /// Rewind every stream's counters and move the clock to `step`.
    ///
    /// Population state is not touched; this exists so a caller that restores
    /// its own state can replay draws from a known point.
    pub fn rewind_streams(&mut self, step: Step) -> SimResult<()> {
        self.clock.current = step;
        self.registry.advance_to(step.0);
        self.for_each_distribution(|d| {
            d.reset();
            Ok(())
        })?;
        debug!(step = %step, "rewound streams");
        Ok(())
    }
}
