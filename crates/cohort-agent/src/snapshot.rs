//! `PopulationSnapshot` — everything `People` needs to resume.
//!
//! ```text
//! allocator        issued range + alive bitmap
//! stored, pending  dense-storage bookkeeping (dead-but-not-compacted UIDs)
//! age, female      built-in columns
//! states           registered columns, copied through `StateColumn`
//! ```
//!
//! With the `serde` feature everything except `states` serializes.  The
//! registered columns are type-erased, so persist the ones a model needs
//! through [`PopulationSnapshot::state`] (each `UidArray<T>` serializes on its
//! own) and put them back with [`PopulationSnapshot::insert_state`] before
//! restoring.

use cohort_core::Uid;

use crate::state::State;
use crate::{StateMap, UidAllocator, UidArray};

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationSnapshot {
    pub allocator: UidAllocator,
    /// UIDs with dense storage, ascending.
    pub stored:    Vec<Uid>,
    /// Died since the last compaction.
    pub pending:   Vec<Uid>,
    pub age:       UidArray<f64>,
    pub female:    UidArray<bool>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) states: StateMap,
}

impl PopulationSnapshot {
    /// The captured column for `T`.
    pub fn state<T: State>(&self) -> Option<&UidArray<T>> {
        self.states.get::<T>()
    }

    /// Put a column back, typically after deserializing it.
    pub fn insert_state<T: State>(&mut self, column: UidArray<T>) {
        self.states.insert(column);
    }

    /// Number of registered columns carried.
    pub fn state_count(&self) -> usize {
        self.states.type_count()
    }
}
