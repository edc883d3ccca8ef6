//! `UidArray<T>` — dense storage addressed by sparse, permanent UIDs.
//!
//! # Layout
//!
//! ```text
//! values: [v0,  v1,  v2,  v3 ]      dense, positional
//! uids:   [U0,  U2,  U5,  U6 ]      position → UID, always ascending
//! slots:  [0, R, 1, A, A, 2, 3]     UID → position, indexed by uid.index()
//!            (R = reclaimed, A = absent)
//! ```
//!
//! Vectorised work runs over `values` directly.  Point access goes through
//! `slots`, which costs 4 bytes per UID ever seen by the array; compaction
//! reclaims `values`/`uids` storage but never shrinks `slots`, so a reclaimed
//! UID stays distinguishable from one this array never saw.
//!
//! Positions are only stable within one compaction epoch.  Never cache a
//! position across a call to [`UidArray::compact`].

use cohort_core::Uid;

use crate::{AgentError, AgentResult, UidAllocator};

/// Slot value: this array has never stored the UID.
const ABSENT: u32 = u32::MAX;
/// Slot value: the UID was stored and then removed by compaction.
const RECLAIMED: u32 = u32::MAX - 1;

/// A mapping from UID to `T`, backed by a dense array.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UidArray<T> {
    label:  String,
    values: Vec<T>,
    uids:   Vec<Uid>,
    slots:  Vec<u32>,
    epoch:  u64,
}

impl<T> UidArray<T> {
    /// An empty array.  `label` identifies the array in error messages.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label:  label.into(),
            values: Vec::new(),
            uids:   Vec::new(),
            slots:  Vec::new(),
            epoch:  0,
        }
    }

    /// Build an array holding `values` for `uids` (same rules as [`grow`](Self::grow)).
    pub fn from_values(label: impl Into<String>, uids: &[Uid], values: Vec<T>) -> AgentResult<Self> {
        let mut array = Self::new(label);
        array.grow(uids, values)?;
        Ok(array)
    }

    // ── Metadata ──────────────────────────────────────────────────────────

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of stored entries (dead-but-not-compacted UIDs included).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compaction epoch.  Incremented by every compaction that removed at
    /// least one entry.
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Stored UIDs in ascending order (dense position order).
    #[inline]
    pub fn uids(&self) -> &[Uid] {
        &self.uids
    }

    /// Dense values, aligned with [`uids`](Self::uids).
    #[inline]
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Mutable dense values for bulk updates.  The UID ↔ position mapping is
    /// unaffected.
    #[inline]
    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// `(uid, &value)` pairs in ascending UID order.
    pub fn iter(&self) -> impl Iterator<Item = (Uid, &T)> + '_ {
        self.uids.iter().copied().zip(self.values.iter())
    }

    /// `true` if `uid` currently has a stored value.
    pub fn contains(&self, uid: Uid) -> bool {
        self.position(uid).is_ok()
    }

    /// Dense position of `uid`, valid until the next compaction.
    pub fn position(&self, uid: Uid) -> AgentResult<usize> {
        match self.slots.get(uid.index()).copied().unwrap_or(ABSENT) {
            ABSENT => Err(AgentError::UnknownUid { array: self.label.clone(), uid }),
            RECLAIMED => Err(AgentError::Reclaimed {
                array: self.label.clone(),
                uid,
                epoch: self.epoch,
            }),
            pos => Ok(pos as usize),
        }
    }

    // ── Point access ──────────────────────────────────────────────────────

    /// The value stored for `uid`.  Dead UIDs keep their last value until
    /// they are compacted away.
    pub fn get(&self, uid: Uid) -> AgentResult<&T> {
        let pos = self.position(uid)?;
        Ok(&self.values[pos])
    }

    pub fn get_mut(&mut self, uid: Uid) -> AgentResult<&mut T> {
        let pos = self.position(uid)?;
        Ok(&mut self.values[pos])
    }

    pub fn set(&mut self, uid: Uid, value: T) -> AgentResult<()> {
        *self.get_mut(uid)? = value;
        Ok(())
    }

    // ── Vectorised access ─────────────────────────────────────────────────

    /// Positions for every UID in `uids`, or the first lookup error.
    fn positions(&self, uids: &[Uid]) -> AgentResult<Vec<usize>> {
        uids.iter().map(|&u| self.position(u)).collect()
    }

    /// Values for `uids`, in the order given.
    pub fn get_many(&self, uids: &[Uid]) -> AgentResult<Vec<T>>
    where
        T: Clone,
    {
        Ok(self.positions(uids)?.into_iter().map(|p| self.values[p].clone()).collect())
    }

    /// Write `values[i]` to `uids[i]`.
    ///
    /// All UIDs are resolved before anything is written, so a failing call
    /// leaves the array untouched.  When a UID repeats, the last value wins.
    pub fn set_many(&mut self, uids: &[Uid], values: &[T]) -> AgentResult<()>
    where
        T: Clone,
    {
        if uids.len() != values.len() {
            return Err(self.shape_mismatch(uids.len(), values.len()));
        }
        let positions = self.positions(uids)?;
        for (pos, value) in positions.into_iter().zip(values) {
            self.values[pos] = value.clone();
        }
        Ok(())
    }

    /// Write the same `value` to every UID in `uids`.
    pub fn fill(&mut self, uids: &[Uid], value: T) -> AgentResult<()>
    where
        T: Clone,
    {
        let positions = self.positions(uids)?;
        for pos in positions {
            self.values[pos] = value.clone();
        }
        Ok(())
    }

    /// Stored UIDs whose value satisfies `pred`, ascending.
    pub fn uids_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<Uid> {
        self.iter().filter(|(_, v)| pred(*v)).map(|(u, _)| u).collect()
    }

    // ── Views ─────────────────────────────────────────────────────────────

    /// Read-only view of the entries satisfying `pred`.  No values are copied.
    pub fn filter(&self, mut pred: impl FnMut(Uid, &T) -> bool) -> UidView<'_, T> {
        let positions = self
            .iter()
            .enumerate()
            .filter(|(_, (uid, value))| pred(*uid, *value))
            .map(|(pos, _)| pos as u32)
            .collect();
        UidView { array: self, positions }
    }

    /// Read-only view restricted to UIDs `allocator` reports alive.
    pub fn filter_alive(&self, allocator: &UidAllocator) -> UidView<'_, T> {
        self.filter(|uid, _| allocator.is_alive(uid))
    }

    // ── Growth and compaction ─────────────────────────────────────────────

    /// Append entries for newly allocated UIDs.
    ///
    /// `new_uids` must be strictly increasing and newer than every UID this
    /// array has seen; anything else fails with [`AgentError::NotFresh`].
    pub fn grow(&mut self, new_uids: &[Uid], initial_values: Vec<T>) -> AgentResult<()> {
        if new_uids.len() != initial_values.len() {
            return Err(self.shape_mismatch(new_uids.len(), initial_values.len()));
        }
        let mut floor = self.slots.len();
        for &uid in new_uids {
            if uid.index() < floor {
                return Err(AgentError::NotFresh { array: self.label.clone(), uid });
            }
            floor = uid.index() + 1;
        }
        if floor > self.slots.len() {
            self.slots.resize(floor, ABSENT);
        }

        let base = self.values.len();
        for (offset, &uid) in new_uids.iter().enumerate() {
            self.slots[uid.index()] = (base + offset) as u32;
        }
        self.uids.extend_from_slice(new_uids);
        self.values.extend(initial_values);
        Ok(())
    }

    /// [`grow`](Self::grow) with `T::default()` for every new UID.
    pub fn grow_default(&mut self, new_uids: &[Uid]) -> AgentResult<()>
    where
        T: Default,
    {
        self.grow(new_uids, new_uids.iter().map(|_| T::default()).collect())
    }

    /// Remove the entries for `dead_uids`, preserving the order of survivors.
    ///
    /// Returns how many entries were removed.  UIDs that were already
    /// reclaimed are ignored, so repeating a compaction is a no-op that leaves
    /// storage and epoch unchanged.  A UID this array never stored fails with
    /// [`AgentError::UnknownUid`] before anything is removed.
    pub fn compact(&mut self, dead_uids: &[Uid]) -> AgentResult<usize> {
        let mut keep = vec![true; self.values.len()];
        let mut removed = 0;
        for &uid in dead_uids {
            match self.slots.get(uid.index()).copied().unwrap_or(ABSENT) {
                ABSENT => return Err(AgentError::UnknownUid { array: self.label.clone(), uid }),
                RECLAIMED => {}
                pos => {
                    let pos = pos as usize;
                    if keep[pos] {
                        keep[pos] = false;
                        removed += 1;
                    }
                }
            }
        }
        if removed == 0 {
            return Ok(0);
        }

        for (pos, &uid) in self.uids.iter().enumerate() {
            if !keep[pos] {
                self.slots[uid.index()] = RECLAIMED;
            }
        }
        let mut i = 0;
        self.values.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        let mut i = 0;
        self.uids.retain(|_| {
            let k = keep[i];
            i += 1;
            k
        });
        for (pos, &uid) in self.uids.iter().enumerate() {
            self.slots[uid.index()] = pos as u32;
        }
        self.epoch += 1;
        Ok(removed)
    }

    fn shape_mismatch(&self, uids: usize, values: usize) -> AgentError {
        AgentError::ShapeMismatch { array: self.label.clone(), uids, values }
    }
}

// ── UidView ───────────────────────────────────────────────────────────────────

/// A read-only subset of a [`UidArray`].
///
/// Holds the matching positions, not the values.  Because it borrows the
/// array, the borrow checker rules out compaction while a view is alive.
#[derive(Clone, Debug)]
pub struct UidView<'a, T> {
    array:     &'a UidArray<T>,
    positions: Vec<u32>,
}

impl<'a, T> UidView<'a, T> {
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// UIDs in the view, ascending.
    pub fn uids(&self) -> Vec<Uid> {
        self.positions.iter().map(|&p| self.array.uids[p as usize]).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &'a T> + '_ {
        let array = self.array;
        self.positions.iter().map(move |&p| &array.values[p as usize])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Uid, &'a T)> + '_ {
        let array = self.array;
        self.positions
            .iter()
            .map(move |&p| (array.uids[p as usize], &array.values[p as usize]))
    }

    /// The value for `uid` if it is part of this view.
    pub fn get(&self, uid: Uid) -> Option<&'a T> {
        let pos = self.array.position(uid).ok()? as u32;
        self.positions
            .binary_search(&pos)
            .ok()
            .map(|_| &self.array.values[pos as usize])
    }

    /// Narrow the view further.
    pub fn filter(self, mut pred: impl FnMut(Uid, &T) -> bool) -> UidView<'a, T> {
        let array = self.array;
        let positions = self
            .positions
            .into_iter()
            .filter(|&p| pred(array.uids[p as usize], &array.values[p as usize]))
            .collect();
        UidView { array, positions }
    }

    /// Copy the view's values out.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.values().cloned().collect()
    }
}
