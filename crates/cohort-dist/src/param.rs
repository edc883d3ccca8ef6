//! Distribution parameters: static, positional, per-UID, or computed.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use cohort_agent::{AgentError, UidArray};
use cohort_core::Uid;

/// What a callable parameter sees when it is evaluated.
#[derive(Clone, Copy, Debug)]
pub struct DrawContext<'a> {
    /// Current step of the owning registry's clock.
    pub step: u64,
    /// Number of variates being drawn.
    pub n:    usize,
    /// The UIDs being drawn for, on UID-addressed draws.
    pub uids: Option<&'a [Uid]>,
}

pub type ParamFn = Arc<dyn Fn(&DrawContext<'_>) -> Vec<f64> + Send + Sync>;

/// One parameter value.
///
/// Arrays and callables may yield either one value (broadcast to every
/// variate) or exactly one value per variate.
#[derive(Clone)]
pub enum Param {
    Scalar(f64),
    /// Positional values, one per variate of the draw.
    Array(Vec<f64>),
    /// Looked up by UID; only valid for UID-addressed draws.
    ByUid(UidArray<f64>),
    /// Evaluated at draw time.
    Callable(ParamFn),
}

impl Param {
    pub fn callable(f: impl Fn(&DrawContext<'_>) -> Vec<f64> + Send + Sync + 'static) -> Self {
        Param::Callable(Arc::new(f))
    }

    /// The value if this is a static scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Param::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub(crate) fn resolve(&self, ctx: &DrawContext<'_>) -> Result<Resolved<'_>, ResolveError> {
        match self {
            Param::Scalar(v) => Ok(Resolved::Scalar(*v)),
            Param::Array(values) => Resolved::from_values(Cow::Borrowed(values), ctx.n),
            Param::ByUid(array) => {
                let uids = ctx.uids.ok_or_else(|| {
                    ResolveError::Invalid("per-UID values need a UID-addressed draw".into())
                })?;
                Ok(Resolved::Values(Cow::Owned(array.get_many(uids)?)))
            }
            Param::Callable(f) => Resolved::from_values(Cow::Owned(f(ctx)), ctx.n),
        }
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Scalar(v)
    }
}

impl From<Vec<f64>> for Param {
    fn from(v: Vec<f64>) -> Self {
        Param::Array(v)
    }
}

impl From<UidArray<f64>> for Param {
    fn from(v: UidArray<f64>) -> Self {
        Param::ByUid(v)
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Scalar(v) => write!(f, "Scalar({v})"),
            Param::Array(v) => write!(f, "Array(len={})", v.len()),
            Param::ByUid(a) => write!(f, "ByUid({}, len={})", a.label(), a.len()),
            Param::Callable(_) => f.write_str("Callable"),
        }
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// A parameter evaluated for one draw.
pub(crate) enum Resolved<'a> {
    Scalar(f64),
    Values(Cow<'a, [f64]>),
}

impl<'a> Resolved<'a> {
    fn from_values(values: Cow<'a, [f64]>, n: usize) -> Result<Self, ResolveError> {
        match values.len() {
            1 => Ok(Resolved::Scalar(values[0])),
            len if len == n => Ok(Resolved::Values(values)),
            len => Err(ResolveError::Invalid(format!(
                "{len} values supplied for a draw of {n}"
            ))),
        }
    }

    #[inline]
    pub(crate) fn get(&self, i: usize) -> f64 {
        match self {
            Resolved::Scalar(v) => *v,
            Resolved::Values(v) => v[i],
        }
    }
}

pub(crate) enum ResolveError {
    Invalid(String),
    Agent(AgentError),
}

impl From<AgentError> for ResolveError {
    fn from(e: AgentError) -> Self {
        ResolveError::Agent(e)
    }
}
