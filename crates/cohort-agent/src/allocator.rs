//! Monotonic UID issuance and the alive bitmap.

use cohort_core::{IntoCount, Uid};
use tracing::debug;

use crate::{AgentError, AgentResult};

/// Label used when the allocator reports a UID error.
const ALLOCATOR: &str = "allocator";

/// Issues UIDs and tracks which of them are still alive.
///
/// UIDs are handed out in strictly increasing order starting at `Uid(0)` and
/// are never reissued.  Death clears a bit in the alive bitmap; it does not
/// free the identifier.
///
/// The bitmap covers the whole issued range `0..next`, so `is_alive` is O(1)
/// and `alive()` is a single ordered scan.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UidAllocator {
    next:    u32,
    alive:   Vec<bool>,
    n_alive: usize,
}

impl UidAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue `count` fresh UIDs, all alive, each greater than every UID
    /// issued before.
    ///
    /// A negative or fractional `count` fails with
    /// [`AgentError::InvalidCount`]; nothing is allocated in that case.
    pub fn allocate(&mut self, count: impl IntoCount) -> AgentResult<Vec<Uid>> {
        let count = count
            .into_count()
            .map_err(|e| AgentError::InvalidCount(e.to_string()))?;
        let remaining = (u32::MAX - self.next) as usize;
        if count > remaining {
            return Err(AgentError::UidSpaceExhausted { requested: count, remaining });
        }

        let first = self.next;
        self.next += count as u32;
        self.alive.resize(self.next as usize, true);
        self.n_alive += count;
        debug!(first, count, "allocated UIDs");
        Ok((first..self.next).map(Uid).collect())
    }

    /// Remove `uids` from the alive set and return the ones that were alive.
    ///
    /// Already-dead UIDs are skipped, so repeating a call is a no-op.  A UID
    /// that was never issued fails with [`AgentError::UnknownUid`] before
    /// any state changes.
    pub fn mark_dead(&mut self, uids: &[Uid]) -> AgentResult<Vec<Uid>> {
        if let Some(&uid) = uids.iter().find(|u| !self.is_issued(**u)) {
            return Err(AgentError::UnknownUid { array: ALLOCATOR.to_owned(), uid });
        }
        let mut newly_dead = Vec::new();
        for &uid in uids {
            let bit = &mut self.alive[uid.index()];
            if *bit {
                *bit = false;
                self.n_alive -= 1;
                newly_dead.push(uid);
            }
        }
        Ok(newly_dead)
    }

    /// `true` if `uid` has been issued and has not died.
    #[inline]
    pub fn is_alive(&self, uid: Uid) -> bool {
        self.alive.get(uid.index()).copied().unwrap_or(false)
    }

    /// `true` if `uid` has ever been issued, dead or alive.
    #[inline]
    pub fn is_issued(&self, uid: Uid) -> bool {
        uid.0 < self.next
    }

    /// Alive UIDs in ascending order.
    pub fn alive(&self) -> Vec<Uid> {
        self.alive_iter().collect()
    }

    /// Iterator over alive UIDs in ascending order.
    pub fn alive_iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| Uid(i as u32))
    }

    #[inline]
    pub fn n_alive(&self) -> usize {
        self.n_alive
    }

    /// Number of UIDs issued so far (alive or dead).
    #[inline]
    pub fn issued(&self) -> usize {
        self.next as usize
    }

    /// The UID the next `allocate` call will start from.
    #[inline]
    pub fn next_uid(&self) -> Uid {
        Uid(self.next)
    }
}
