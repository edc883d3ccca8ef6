//! Fluent builder for constructing a [`Sim`].

use std::collections::HashSet;

use cohort_agent::{PeopleBuilder, State};
use cohort_core::SimConfig;
use cohort_dist::{Distribution, StreamRegistry};

use crate::{Module, Sim, SimError, SimResult};

/// Upper bound of the default initial age distribution, in years.
const DEFAULT_MAX_AGE: f64 = 80.0;

/// Fluent builder for [`Sim`].
///
/// # Required inputs
///
/// - [`SimConfig`]: seed, population size, step count, `dt`, …
///
/// # Optional inputs (have defaults)
///
/// | Method             | Default                                   |
/// |--------------------|-------------------------------------------|
/// | `.module(m)`       | no modules                                |
/// | `.state::<T>()`    | only the built-in `age` / `female` columns |
/// | `.initial_age(d)`  | `uniform(0, 80)`                          |
/// | `.initial_sex(d)`  | `bernoulli(0.5)` (1 = female)             |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config)
///     .state::<SirState>()
///     .module(Births::new(20.0))
///     .module(Sir::new(pars)?)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:  SimConfig,
    people:  PeopleBuilder,
    modules: Vec<Box<dyn Module>>,
    age:     Option<Distribution>,
    female:  Option<Distribution>,
}

impl SimBuilder {
    pub fn new(config: SimConfig) -> Self {
        Self {
            people: PeopleBuilder::new(config.n_agents),
            config,
            modules: Vec::new(),
            age: None,
            female: None,
        }
    }

    /// Register a per-agent state column.
    pub fn state<T: State>(mut self) -> Self {
        self.people = self.people.register_state::<T>();
        self
    }

    /// Add a module.  Modules run in kind order, then in the order added.
    pub fn module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn boxed_module(mut self, module: Box<dyn Module>) -> Self {
        self.modules.push(module);
        self
    }

    /// Distribution of initial ages, drawn per UID at `people.age`.
    pub fn initial_age(mut self, dist: Distribution) -> Self {
        self.age = Some(dist);
        self
    }

    /// Distribution of initial sex, drawn per UID at `people.female`; a
    /// non-zero value means female.
    pub fn initial_sex(mut self, dist: Distribution) -> Self {
        self.female = Some(dist);
        self
    }

    /// Validate inputs, allocate the initial population, and return an
    /// uninitialized [`Sim`].
    pub fn build(mut self) -> SimResult<Sim> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert((module.kind(), module.name().to_owned())) {
                return Err(SimError::Config(format!(
                    "duplicate module {}.{}",
                    module.kind(),
                    module.name()
                )));
            }
        }
        // Stable: declaration order is kept within a kind.
        self.modules.sort_by_key(|m| m.kind());

        let age = match self.age {
            Some(d) => d,
            None => Distribution::uniform(0.0, DEFAULT_MAX_AGE)?.with_label("age"),
        };
        let female = match self.female {
            Some(d) => d,
            None => Distribution::bernoulli(0.5)?.with_label("female"),
        };

        Ok(Sim {
            registry:    StreamRegistry::new(self.config.seed),
            clock:       self.config.make_clock(),
            people:      self.people.build()?,
            config:      self.config,
            modules:     self.modules,
            age,
            female,
            initialized: false,
        })
    }
}
