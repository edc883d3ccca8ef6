//! Checked conversion of caller-supplied counts.
//!
//! Draw sizes and allocation sizes frequently come out of floating-point
//! model arithmetic (`n_alive * birth_rate`).  Rather than letting `as usize`
//! silently truncate or wrap, every count crosses this trait, and a negative,
//! fractional, or non-finite value is reported as an error by the caller.

use crate::{CoreError, CoreResult};

/// A value that can be interpreted as a non-negative item count.
pub trait IntoCount: Copy {
    /// Convert to `usize`, or describe why the value is not a valid count.
    fn into_count(self) -> CoreResult<usize>;
}

impl IntoCount for usize {
    #[inline]
    fn into_count(self) -> CoreResult<usize> {
        Ok(self)
    }
}

impl IntoCount for u32 {
    #[inline]
    fn into_count(self) -> CoreResult<usize> {
        Ok(self as usize)
    }
}

impl IntoCount for u64 {
    fn into_count(self) -> CoreResult<usize> {
        usize::try_from(self).map_err(|_| CoreError::InvalidCount(format!("{self} exceeds usize")))
    }
}

impl IntoCount for i32 {
    fn into_count(self) -> CoreResult<usize> {
        (self as i64).into_count()
    }
}

impl IntoCount for i64 {
    fn into_count(self) -> CoreResult<usize> {
        if self < 0 {
            return Err(CoreError::InvalidCount(format!("{self} is negative")));
        }
        usize::try_from(self).map_err(|_| CoreError::InvalidCount(format!("{self} exceeds usize")))
    }
}

impl IntoCount for f64 {
    fn into_count(self) -> CoreResult<usize> {
        if !self.is_finite() {
            return Err(CoreError::InvalidCount(format!("{self} is not finite")));
        }
        if self < 0.0 {
            return Err(CoreError::InvalidCount(format!("{self} is negative")));
        }
        if self.fract() != 0.0 {
            return Err(CoreError::InvalidCount(format!("{self} is not an integer")));
        }
        if self > usize::MAX as f64 {
            return Err(CoreError::InvalidCount(format!("{self} exceeds usize")));
        }
        Ok(self as usize)
    }
}
