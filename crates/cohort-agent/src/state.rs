//! Type-erased, heterogeneous per-agent state columns.
//!
//! # Design
//!
//! Each state type `T` is stored as a `UidArray<T>` behind a
//! `Box<dyn StateColumn>` in a `HashMap<TypeId, …>`.  Every column holds an
//! entry for exactly the UIDs `People` currently stores, so births and
//! compaction are applied to all of them in one pass without the owner
//! knowing the concrete types.
//!
//! # Usage
//!
//! ```rust
//! use cohort_agent::StateMap;
//!
//! #[derive(Default, Clone)]
//! struct Susceptible(bool);
//!
//! let mut map = StateMap::new();
//! map.register::<Susceptible>(&[]).unwrap();
//! assert!(map.contains::<Susceptible>());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use cohort_core::Uid;

use crate::{AgentError, AgentResult, UidArray};

/// Bound shared by every per-agent state type.
///
/// `Clone` lets a population snapshot copy columns without knowing their
/// types.
pub trait State: Default + Clone + Send + Sync + 'static {}

impl<T: Default + Clone + Send + Sync + 'static> State for T {}

// ── Trait object ──────────────────────────────────────────────────────────────

/// Type-erased interface for one state column.
///
/// Sealed so that external implementations cannot break the invariant that
/// all columns store the same UID set.
pub trait StateColumn: Send + Sync + 'static + sealed::Sealed {
    /// Append `T::default()` for newly allocated UIDs.
    fn grow_default(&mut self, uids: &[Uid]) -> AgentResult<()>;

    /// Remove the entries for `dead`, preserving survivor order.
    fn compact(&mut self, dead: &[Uid]) -> AgentResult<usize>;

    /// Stored entry count (always equals `People::stored().len()`).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn label(&self) -> &str;

    /// Stored UIDs, ascending.
    fn uids(&self) -> &[Uid];

    /// A boxed deep copy of the column.
    fn clone_column(&self) -> Box<dyn StateColumn>;

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

mod sealed {
    pub trait Sealed {}
}

impl<T: State> sealed::Sealed for UidArray<T> {}

impl<T: State> StateColumn for UidArray<T> {
    fn grow_default(&mut self, uids: &[Uid]) -> AgentResult<()> {
        UidArray::grow_default(self, uids)
    }

    fn compact(&mut self, dead: &[Uid]) -> AgentResult<usize> {
        UidArray::compact(self, dead)
    }

    fn len(&self) -> usize {
        UidArray::len(self)
    }

    fn label(&self) -> &str {
        UidArray::label(self)
    }

    fn uids(&self) -> &[Uid] {
        UidArray::uids(self)
    }

    fn clone_column(&self) -> Box<dyn StateColumn> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ── StateMap ──────────────────────────────────────────────────────────────────

/// Registry of application-defined state columns, one `UidArray<T>` per type.
#[derive(Default)]
pub struct StateMap {
    map: HashMap<TypeId, Box<dyn StateColumn>>,
}

impl Clone for StateMap {
    fn clone(&self) -> Self {
        Self {
            map: self.map.iter().map(|(k, c)| (*k, c.clone_column())).collect(),
        }
    }
}

impl fmt::Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.summary()).finish()
    }
}

impl StateMap {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Register state type `T`, pre-filling `T::default()` for `stored`.
    ///
    /// Calling this twice for the same `T` is a no-op — existing data is not
    /// disturbed.
    pub fn register<T: State>(&mut self, stored: &[Uid]) -> AgentResult<()> {
        let key = TypeId::of::<T>();
        if self.map.contains_key(&key) {
            return Ok(());
        }
        let mut column = UidArray::<T>::new(short_type_name::<T>());
        column.grow_default(stored)?;
        self.map.insert(key, Box::new(column));
        Ok(())
    }

    /// Insert or replace the column for `T`.
    pub(crate) fn insert<T: State>(&mut self, column: UidArray<T>) {
        self.map.insert(TypeId::of::<T>(), Box::new(column));
    }

    /// Check that `incoming` can replace this map: the same state types, each
    /// column holding exactly `stored`.
    pub(crate) fn check_replacement(&self, incoming: &StateMap, stored: &[Uid]) -> AgentResult<()> {
        for (key, column) in &self.map {
            let Some(other) = incoming.map.get(key) else {
                return Err(AgentError::SnapshotMismatch(format!(
                    "snapshot has no `{}` column",
                    column.label()
                )));
            };
            if other.uids() != stored {
                return Err(AgentError::SnapshotMismatch(format!(
                    "`{}` column does not cover the stored population",
                    other.label()
                )));
            }
        }
        if let Some(extra) = incoming.map.iter().find(|(k, _)| !self.map.contains_key(k)) {
            return Err(AgentError::SnapshotMismatch(format!(
                "`{}` is not registered here",
                extra.1.label()
            )));
        }
        Ok(())
    }

    /// Extend every registered column with defaults for `uids`.
    pub(crate) fn grow_all(&mut self, uids: &[Uid]) -> AgentResult<()> {
        for column in self.map.values_mut() {
            column.grow_default(uids)?;
        }
        Ok(())
    }

    /// Compact every registered column.
    pub(crate) fn compact_all(&mut self, dead: &[Uid]) -> AgentResult<()> {
        for column in self.map.values_mut() {
            column.compact(dead)?;
        }
        Ok(())
    }

    // ── Typed access ──────────────────────────────────────────────────────

    /// The column for `T`, or `None` if `T` was never registered.
    pub fn get<T: State>(&self) -> Option<&UidArray<T>> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|c| c.as_any().downcast_ref::<UidArray<T>>())
    }

    pub fn get_mut<T: State>(&mut self) -> Option<&mut UidArray<T>> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|c| c.as_any_mut().downcast_mut::<UidArray<T>>())
    }

    // ── Metadata ──────────────────────────────────────────────────────────

    /// Number of distinct state types currently registered.
    pub fn type_count(&self) -> usize {
        self.map.len()
    }

    /// `true` if state `T` has been registered.
    pub fn contains<T: State>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    /// Labels and lengths of every column, sorted by label.
    pub fn summary(&self) -> Vec<(String, usize)> {
        let mut out: Vec<_> = self.map.values().map(|c| (c.label().to_owned(), c.len())).collect();
        out.sort();
        out
    }
}

/// `my_crate::module::Infected` → `Infected`.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
