//! The permanent agent identifier.
//!
//! A `Uid` is issued once by `UidAllocator` and never handed out again, even
//! after the agent dies.  The inner integer is `pub` so storage code can index
//! dense per-UID tables via `uid.index()`.

use std::fmt;

/// Unique, never-reused agent identifier.  Max ~4.3 billion agents per run.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Uid(pub u32);

impl Uid {
    /// Largest representable UID.  The allocator refuses to issue it so that
    /// `Uid::MAX.0 + 1` never overflows when computing the next counter.
    pub const MAX: Uid = Uid(u32::MAX);

    /// Cast to `usize` for direct use as an index into per-UID tables.
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// The UID value widened to `u64`, as folded into stream seeds.
    #[inline(always)]
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.0)
    }
}

impl From<Uid> for usize {
    #[inline(always)]
    fn from(uid: Uid) -> usize {
        uid.0 as usize
    }
}

impl From<u32> for Uid {
    #[inline(always)]
    fn from(n: u32) -> Uid {
        Uid(n)
    }
}

impl TryFrom<usize> for Uid {
    type Error = std::num::TryFromIntError;
    fn try_from(n: usize) -> Result<Uid, Self::Error> {
        u32::try_from(n).map(Uid)
    }
}
