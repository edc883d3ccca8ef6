//! Fluent builder for constructing a [`People`] in one step.
//!
//! # Usage
//!
//! ```rust
//! use cohort_agent::PeopleBuilder;
//!
//! #[derive(Default, Clone)]
//! struct Infected(bool);
//!
//! let people = PeopleBuilder::new(10_000)
//!     .register_state::<Infected>()
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(people.n_alive(), 10_000);
//! assert_eq!(people.state::<Infected>().unwrap().len(), 10_000);
//! ```

use crate::state::State;
use crate::{AgentResult, People, StateMap};

type Registration = fn(&mut StateMap) -> AgentResult<()>;

/// Fluent builder for [`People`].
///
/// State types are collected first and registered before the initial
/// population is allocated, so every column is filled in a single growth
/// pass.
pub struct PeopleBuilder {
    count:  usize,
    states: Vec<Registration>,
}

impl PeopleBuilder {
    /// Create a builder for an initial population of `count` agents.
    pub fn new(count: usize) -> Self {
        Self { count, states: Vec::new() }
    }

    /// Register an application-defined state type `T`.
    ///
    /// Every agent starts with `T::default()`.  Calling this twice for the
    /// same `T` is harmless.
    pub fn register_state<T: State>(mut self) -> Self {
        self.states.push(|map| map.register::<T>(&[]));
        self
    }

    /// Allocate the initial population and every registered column.
    pub fn build(self) -> AgentResult<People> {
        let mut map = StateMap::new();
        for register in &self.states {
            register(&mut map)?;
        }
        let mut people = People::new(map);
        people.grow(self.count)?;
        Ok(people)
    }
}
