//! `People` — the population: UID allocator plus every per-agent column.
//!
//! # Lifecycle of a UID
//!
//! ```text
//! grow(n)             allocate UIDs, append defaults to every column
//! request_death(u)    queued by any module during a step
//! apply_deaths()      allocator clears the alive bit; values stay readable
//! compact()           dense storage for the dead is reclaimed (on cadence)
//! ```
//!
//! Between `apply_deaths` and `compact` a dead agent's state can still be
//! read, which lets end-of-step reporting see what killed it.

use cohort_core::{IntoCount, Uid};
use tracing::debug;

use crate::state::State;
use crate::{AgentError, AgentResult, PopulationSnapshot, StateMap, UidAllocator, UidArray};

/// Population storage.
///
/// The built-in `age` and `female` columns are plain `pub` fields, indexed by
/// UID like every other column.  Application-defined state lives in the
/// [`StateMap`] and is reached through [`People::state`] /
/// [`People::state_mut`].
pub struct People {
    /// Age in years.  Advanced by the simulation loop every step.
    pub age: UidArray<f64>,

    /// Sex, as used by demographic and network collaborators.
    pub female: UidArray<bool>,

    allocator:      UidAllocator,
    /// UIDs with live dense storage (alive plus dead-but-not-compacted).
    stored:         Vec<Uid>,
    /// Died since the last compaction.
    pending:        Vec<Uid>,
    /// Deaths requested during the current step, not yet applied.
    death_requests: Vec<Uid>,
    states:         StateMap,
}

impl People {
    pub(crate) fn new(states: StateMap) -> Self {
        Self {
            age:            UidArray::new("age"),
            female:         UidArray::new("female"),
            allocator:      UidAllocator::new(),
            stored:         Vec::new(),
            pending:        Vec::new(),
            death_requests: Vec::new(),
            states,
        }
    }

    // ── Population size ───────────────────────────────────────────────────

    /// Add `count` agents and return their UIDs.
    ///
    /// Every column gets its default value for the new UIDs.
    pub fn grow(&mut self, count: impl IntoCount) -> AgentResult<Vec<Uid>> {
        let uids = self.allocator.allocate(count)?;
        self.age.grow_default(&uids)?;
        self.female.grow_default(&uids)?;
        self.states.grow_all(&uids)?;
        self.stored.extend_from_slice(&uids);
        Ok(uids)
    }

    /// Queue `uids` to die at the end of the current step.
    pub fn request_death(&mut self, uids: &[Uid]) {
        self.death_requests.extend_from_slice(uids);
    }

    /// Mark every queued death and return the UIDs that were still alive.
    pub fn apply_deaths(&mut self) -> AgentResult<Vec<Uid>> {
        let mut requests = std::mem::take(&mut self.death_requests);
        requests.sort_unstable();
        requests.dedup();
        self.mark_dead(&requests)
    }

    /// Mark `uids` dead immediately.  Already-dead UIDs are ignored.
    pub fn mark_dead(&mut self, uids: &[Uid]) -> AgentResult<Vec<Uid>> {
        let newly_dead = self.allocator.mark_dead(uids)?;
        self.pending.extend_from_slice(&newly_dead);
        Ok(newly_dead)
    }

    /// Reclaim dense storage for every agent that died since the last
    /// compaction.  Returns how many agents were removed.
    ///
    /// Cost is proportional to the stored population, so the simulation loop
    /// calls this on a cadence rather than every step.
    pub fn compact(&mut self) -> AgentResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        let dead = std::mem::take(&mut self.pending);
        self.age.compact(&dead)?;
        self.female.compact(&dead)?;
        self.states.compact_all(&dead)?;
        let allocator = &self.allocator;
        self.stored.retain(|&uid| allocator.is_alive(uid));
        debug!(removed = dead.len(), stored = self.stored.len(), "compacted population");
        Ok(dead.len())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn is_alive(&self, uid: Uid) -> bool {
        self.allocator.is_alive(uid)
    }

    /// Alive UIDs, ascending.
    pub fn alive(&self) -> Vec<Uid> {
        self.allocator.alive()
    }

    #[inline]
    pub fn n_alive(&self) -> usize {
        self.allocator.n_alive()
    }

    /// UIDs with dense storage (alive plus dead-but-not-compacted), ascending.
    pub fn stored(&self) -> &[Uid] {
        &self.stored
    }

    /// Deaths applied since the last compaction.
    pub fn pending_compaction(&self) -> &[Uid] {
        &self.pending
    }

    pub fn allocator(&self) -> &UidAllocator {
        &self.allocator
    }

    /// Advance every stored agent's age by `years`.
    pub fn age_by(&mut self, years: f64) {
        for age in self.age.values_mut() {
            *age += years;
        }
    }

    // ── State access ──────────────────────────────────────────────────────

    /// Register a new state type after construction.  Existing agents get
    /// `T::default()`.  A no-op if `T` is already registered.
    pub fn register_state<T: State>(&mut self) -> AgentResult<()> {
        self.states.register::<T>(&self.stored)
    }

    /// The column for state `T`, or `None` if `T` was never registered.
    pub fn state<T: State>(&self) -> Option<&UidArray<T>> {
        self.states.get::<T>()
    }

    pub fn state_mut<T: State>(&mut self) -> Option<&mut UidArray<T>> {
        self.states.get_mut::<T>()
    }

    pub fn states(&self) -> &StateMap {
        &self.states
    }

    // ── Snapshots ─────────────────────────────────────────────────────────

    /// Copy the allocator, the storage bookkeeping, and every column.
    ///
    /// Deaths requested but not yet applied are not captured; take snapshots
    /// between steps.
    pub fn snapshot(&self) -> PopulationSnapshot {
        PopulationSnapshot {
            allocator: self.allocator.clone(),
            stored:    self.stored.clone(),
            pending:   self.pending.clone(),
            age:       self.age.clone(),
            female:    self.female.clone(),
            states:    self.states.clone(),
        }
    }

    /// Replace the whole population with `snapshot`.
    ///
    /// The snapshot is checked first and nothing changes if it does not fit:
    /// every column must hold exactly the stored UIDs, `pending` must be the
    /// stored UIDs the allocator has marked dead, and the snapshot must carry
    /// a column for each registered state type and no others.
    pub fn restore(&mut self, snapshot: PopulationSnapshot) -> AgentResult<()> {
        check_bookkeeping(&snapshot)?;
        self.states.check_replacement(&snapshot.states, &snapshot.stored)?;

        self.allocator = snapshot.allocator;
        self.stored = snapshot.stored;
        self.pending = snapshot.pending;
        self.age = snapshot.age;
        self.female = snapshot.female;
        self.states = snapshot.states;
        self.death_requests.clear();
        debug!(
            alive = self.allocator.n_alive(),
            stored = self.stored.len(),
            pending = self.pending.len(),
            "restored population"
        );
        Ok(())
    }
}

fn check_bookkeeping(snap: &PopulationSnapshot) -> AgentResult<()> {
    let mismatch = |msg: String| -> AgentResult<()> { Err(AgentError::SnapshotMismatch(msg)) };

    if snap.stored.windows(2).any(|w| w[0] >= w[1]) {
        return mismatch("stored UIDs are not strictly ascending".into());
    }
    if let Some(uid) = snap.stored.iter().find(|u| !snap.allocator.is_issued(**u)) {
        return mismatch(format!("{uid} is stored but was never issued"));
    }
    for column in [snap.age.uids(), snap.female.uids()] {
        if column != snap.stored.as_slice() {
            return mismatch("built-in columns do not cover the stored population".into());
        }
    }
    let alive_stored = snap.stored.iter().filter(|u| snap.allocator.is_alive(**u)).count();
    if alive_stored != snap.allocator.n_alive() {
        return mismatch(format!(
            "{} alive agents but {alive_stored} of them stored",
            snap.allocator.n_alive()
        ));
    }
    if let Some(uid) = snap
        .pending
        .iter()
        .find(|u| snap.allocator.is_alive(**u) || snap.stored.binary_search(u).is_err())
    {
        return mismatch(format!("{uid} is pending compaction but not a stored dead agent"));
    }
    if snap.stored.len() != alive_stored + snap.pending.len() {
        return mismatch(format!(
            "{} stored UIDs but {alive_stored} alive and {} pending",
            snap.stored.len(),
            snap.pending.len()
        ));
    }
    Ok(())
}
