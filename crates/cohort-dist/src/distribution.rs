//! `Distribution` — a parametric family bound to one structural stream.
//!
//! # Keying
//!
//! ```text
//! stream_seed           = mix(root_seed, identity.key)
//! sequential variate i  = StreamRng(mix(stream_seed, [step, SEQ, c + i]))
//! UID variate for u     = StreamRng(mix(stream_seed, [step, UID, k, u]))
//! ```
//!
//! `c` counts sequential variates drawn so far this step and `k` counts
//! UID-addressed calls made so far this step.  Both reset to zero whenever the
//! shared [`StepClock`] reports a new step, so the values drawn at step `t`
//! depend only on the root seed, the path, `t`, and the draws this same site
//! made earlier in step `t`.
//!
//! A draw that fails leaves both counters untouched.

use std::fmt;

use cohort_agent::UidAllocator;
use cohort_core::{IntoCount, StreamRng, Uid};
use tracing::{debug, trace};

use crate::param::{DrawContext, Resolved, ResolveError};
use crate::{ChoiceTable, DistError, DistResult, ExternalSampler, Family, Param, StepClock, StreamIdentity};

/// Key domain for sequential draws.
const SEQ_DOMAIN: u64 = 0x5345_51;
/// Key domain for UID-addressed draws.
const UID_DOMAIN: u64 = 0x5549_44;
/// Largest sequential draw whose output buffer can be allocated.
pub const MAX_DRAW: usize = isize::MAX as usize / std::mem::size_of::<f64>();

/// Counter state of a bound distribution, as stored in snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamState {
    /// Structural key of the owning stream.
    pub key:       u64,
    pub step:      u64,
    /// Sequential variates drawn so far in `step`.
    pub seq:       u64,
    /// UID-addressed calls made so far in `step`.
    pub uid_calls: u64,
}

#[derive(Debug)]
struct Binding {
    identity:  StreamIdentity,
    root_seed: u64,
    seed:      u64,
    clock:     StepClock,
    step:      u64,
    seq:       u64,
    uid_calls: u64,
}

impl Binding {
    /// Reset the counters if the clock has moved since the last draw.
    fn sync(&mut self) -> u64 {
        let now = self.clock.get();
        if now != self.step {
            self.step = now;
            self.seq = 0;
            self.uid_calls = 0;
        }
        now
    }
}

/// A random-variate generator for one family, owned by a model component.
///
/// Construct it unbound, set parameters, and bind it through the registry
/// before the first draw.
#[derive(Debug)]
pub struct Distribution {
    label:   String,
    family:  Family,
    params:  Vec<Param>,
    binding: Option<Binding>,
}

impl Distribution {
    /// An unbound distribution with the family's default parameters.
    pub fn new(family: Family) -> Self {
        let params = family.defaults().iter().map(|&v| Param::Scalar(v)).collect();
        Self {
            label: family.name().to_owned(),
            family,
            params,
            binding: None,
        }
    }

    // ── Constructors ──────────────────────────────────────────────────────

    pub fn uniform(low: impl Into<Param>, high: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Uniform, [("low", low.into()), ("high", high.into())])
    }

    pub fn normal(loc: impl Into<Param>, scale: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Normal, [("loc", loc.into()), ("scale", scale.into())])
    }

    /// Lognormal parameterised by the mean and sigma of the underlying normal.
    pub fn lognormal_implicit(mean: impl Into<Param>, sigma: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(
            Family::LogNormalImplicit,
            [("mean", mean.into()), ("sigma", sigma.into())],
        )
    }

    /// Lognormal parameterised by its own mean and standard deviation.
    pub fn lognormal_explicit(mean: impl Into<Param>, std: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(
            Family::LogNormalExplicit,
            [("mean", mean.into()), ("std", std.into())],
        )
    }

    pub fn weibull(shape: impl Into<Param>, scale: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Weibull, [("shape", shape.into()), ("scale", scale.into())])
    }

    /// Exponential with mean `scale`.
    pub fn exponential(scale: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Exponential, [("scale", scale.into())])
    }

    pub fn poisson(lam: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Poisson, [("lam", lam.into())])
    }

    /// Integers in `[low, high)`; both bounds must be whole numbers.
    pub fn randint(low: impl Into<Param>, high: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::RandInt, [("low", low.into()), ("high", high.into())])
    }

    pub fn bernoulli(p: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Bernoulli, [("p", p.into())])
    }

    pub fn delta(value: impl Into<Param>) -> DistResult<Self> {
        Self::with_params(Family::Delta, [("value", value.into())])
    }

    pub fn choice(values: Vec<f64>, weights: Vec<f64>) -> DistResult<Self> {
        let table = ChoiceTable::new(values, weights).map_err(|reason| DistError::InvalidParameter {
            dist: "choice".into(),
            param: "weights".into(),
            reason,
        })?;
        Ok(Self::new(Family::Choice(table)))
    }

    pub fn external(sampler: impl ExternalSampler + 'static) -> Self {
        Self::new(Family::External(std::sync::Arc::new(sampler)))
    }

    fn with_params<const N: usize>(family: Family, params: [(&str, Param); N]) -> DistResult<Self> {
        let mut dist = Self::new(family);
        dist.set_parameters(params)?;
        Ok(dist)
    }

    /// Rename the distribution.  The label appears in errors and the
    /// registry's audit listing; it plays no part in seeding.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    // ── Metadata ──────────────────────────────────────────────────────────

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn family(&self) -> &Family {
        &self.family
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn identity(&self) -> Option<&StreamIdentity> {
        self.binding.as_ref().map(|b| &b.identity)
    }

    pub fn stream_seed(&self) -> Option<u64> {
        self.binding.as_ref().map(|b| b.seed)
    }

    /// The current value of parameter `name`.
    pub fn param(&self, name: &str) -> Option<&Param> {
        let i = self.family.param_names().iter().position(|&p| p == name)?;
        self.params.get(i)
    }

    /// Label plus structural path, for messages.
    pub fn describe(&self) -> String {
        match &self.binding {
            Some(b) => format!("{} @ {}", self.label, b.identity),
            None => self.label.clone(),
        }
    }

    // ── Binding ───────────────────────────────────────────────────────────

    /// Attach the distribution to its stream.
    ///
    /// Binding again to the same identity and root seed is a no-op; anything
    /// else fails with [`DistError::AlreadyBound`].
    pub fn bind(&mut self, identity: StreamIdentity, root_seed: u64, clock: StepClock) -> DistResult<()> {
        if let Some(b) = &self.binding {
            if b.identity == identity && b.root_seed == root_seed {
                return Ok(());
            }
            return Err(DistError::AlreadyBound {
                dist:      self.describe(),
                bound:     b.identity.to_string(),
                requested: identity.to_string(),
            });
        }
        let seed = identity.stream_seed(root_seed);
        debug!(dist = %self.label, path = %identity, seed, "bound distribution");
        self.binding = Some(Binding {
            step: clock.get(),
            identity,
            root_seed,
            seed,
            clock,
            seq: 0,
            uid_calls: 0,
        });
        Ok(())
    }

    /// Clear the counters.  The binding is kept.
    pub fn reset(&mut self) {
        if let Some(b) = &mut self.binding {
            b.step = b.clock.get();
            b.seq = 0;
            b.uid_calls = 0;
        }
    }

    pub fn state(&self) -> DistResult<StreamState> {
        let b = self.binding.as_ref().ok_or_else(|| self.not_bound())?;
        Ok(StreamState {
            key:       b.identity.key(),
            step:      b.step,
            seq:       b.seq,
            uid_calls: b.uid_calls,
        })
    }

    /// Reinstate counters captured by [`state`](Self::state).  The state must
    /// come from a stream with the same identity.
    pub fn restore(&mut self, state: StreamState) -> DistResult<()> {
        let dist = self.describe();
        let b = self.binding.as_mut().ok_or(DistError::NotBound { dist: dist.clone() })?;
        if b.identity.key() != state.key {
            return Err(DistError::StateMismatch {
                dist,
                expected: b.identity.key(),
                found: state.key,
            });
        }
        b.step = state.step;
        b.seq = state.seq;
        b.uid_calls = state.uid_calls;
        Ok(())
    }

    // ── Parameters ────────────────────────────────────────────────────────

    /// Replace parameters by name.
    ///
    /// Every entry is validated before any is applied, so a failing call
    /// leaves the distribution unchanged.  Static values are domain-checked
    /// here; arrays, per-UID values, and callables are checked per variate
    /// when drawn.
    pub fn set_parameters<'a, I>(&mut self, params: I) -> DistResult<()>
    where
        I: IntoIterator<Item = (&'a str, Param)>,
    {
        let names = self.family.param_names();
        let mut staged = Vec::new();
        for (name, param) in params {
            let Some(i) = names.iter().position(|&p| p == name) else {
                let reason = if names.is_empty() {
                    format!("{} takes no parameters", self.family.name())
                } else {
                    format!("{} expects one of: {}", self.family.name(), names.join(", "))
                };
                return Err(self.invalid(name, reason));
            };
            match &param {
                Param::Scalar(v) => self.family.check_value(name, *v).map_err(|r| self.invalid(name, r))?,
                Param::Array(values) => {
                    if values.is_empty() {
                        return Err(self.invalid(name, "array is empty".into()));
                    }
                    for &v in values {
                        self.family.check_value(name, v).map_err(|r| self.invalid(name, r))?;
                    }
                }
                Param::ByUid(_) | Param::Callable(_) => {}
            }
            staged.push((i, param));
        }
        for (i, param) in staged {
            self.params[i] = param;
        }
        Ok(())
    }

    /// Shorthand for a single [`set_parameters`](Self::set_parameters) entry.
    pub fn set(&mut self, name: &str, value: impl Into<Param>) -> DistResult<()> {
        self.set_parameters([(name, value.into())])
    }

    // ── Drawing ───────────────────────────────────────────────────────────

    /// `n` variates from the sequential substream.
    ///
    /// Drawing `a` then `b` variates in one step yields the same values as a
    /// single draw of `a + b`.  Counts above [`MAX_DRAW`] fail with
    /// [`DistError::InvalidDrawCount`].
    pub fn draw(&mut self, n: impl IntoCount) -> DistResult<Vec<f64>> {
        let n = n.into_count().map_err(|e| DistError::InvalidDrawCount {
            dist:   self.describe(),
            reason: e.to_string(),
        })?;
        if n > MAX_DRAW {
            return Err(DistError::InvalidDrawCount {
                dist:   self.describe(),
                reason: format!("{n} exceeds the largest drawable count {MAX_DRAW}"),
            });
        }
        let (seed, step, start) = {
            let b = self.bound()?;
            let step = b.sync();
            (b.seed, step, b.seq)
        };
        if n == 0 {
            return Ok(Vec::new());
        }
        let ctx = DrawContext { step, n, uids: None };
        let values = self.sample_all(&ctx, |i| {
            StreamRng::from_key(seed, &[step, SEQ_DOMAIN, start + i as u64])
        })?;
        if let Some(b) = &mut self.binding {
            b.seq += n as u64;
        }
        trace!(dist = %self.label, step, n, "sequential draw");
        Ok(values)
    }

    /// One variate per UID, from each UID's own substream.
    ///
    /// The value for a UID does not depend on which other UIDs are in the
    /// batch or on their order, so filtering the batch never changes the
    /// values of the UIDs that remain.  A UID repeated within one call gets
    /// the same value at every occurrence.
    pub fn draw_for(&mut self, uids: &[Uid]) -> DistResult<Vec<f64>> {
        let (seed, step, call) = {
            let b = self.bound()?;
            let step = b.sync();
            (b.seed, step, b.uid_calls)
        };
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let ctx = DrawContext { step, n: uids.len(), uids: Some(uids) };
        let values = self.sample_all(&ctx, |i| {
            StreamRng::from_key(seed, &[step, UID_DOMAIN, call, uids[i].as_u64()])
        })?;
        if let Some(b) = &mut self.binding {
            b.uid_calls += 1;
        }
        trace!(dist = %self.label, step, n = uids.len(), call, "uid draw");
        Ok(values)
    }

    /// The subset of `uids` whose Bernoulli trial succeeded, in input order.
    pub fn filter(&mut self, uids: &[Uid]) -> DistResult<Vec<Uid>> {
        if !self.family.is_bernoulli() {
            return Err(self.invalid(
                "p",
                format!("filter needs a bernoulli distribution, not {}", self.family.name()),
            ));
        }
        let draws = self.draw_for(uids)?;
        Ok(uids
            .iter()
            .zip(draws)
            .filter(|(_, v)| *v != 0.0)
            .map(|(&uid, _)| uid)
            .collect())
    }

    /// [`filter`](Self::filter) over every agent `allocator` reports alive.
    pub fn filter_alive(&mut self, allocator: &UidAllocator) -> DistResult<Vec<Uid>> {
        self.filter(&allocator.alive())
    }

    /// The distribution as a plain sampling function: calling it with `n` is
    /// `self.draw(n)`.
    pub fn as_fn<N: IntoCount>(&mut self) -> impl FnMut(N) -> DistResult<Vec<f64>> + '_ {
        move |n| self.draw(n)
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn sample_all(
        &self,
        ctx: &DrawContext<'_>,
        mut rng_for: impl FnMut(usize) -> StreamRng,
    ) -> DistResult<Vec<f64>> {
        let names = self.family.param_names();
        let resolved = self
            .params
            .iter()
            .zip(names)
            .map(|(param, &name)| {
                param.resolve(ctx).map_err(|e| match e {
                    ResolveError::Invalid(reason) => self.invalid(name, reason),
                    ResolveError::Agent(e) => DistError::Agent(e),
                })
            })
            .collect::<DistResult<Vec<Resolved<'_>>>>()?;

        let mut p = [0.0_f64; 2];
        let mut out = Vec::with_capacity(ctx.n);
        for i in 0..ctx.n {
            for (slot, r) in p.iter_mut().zip(&resolved) {
                *slot = r.get(i);
            }
            let mut rng = rng_for(i);
            let v = self
                .family
                .sample(&p[..resolved.len()], &mut rng)
                .map_err(|(name, reason)| self.invalid(name, reason))?;
            out.push(v);
        }
        Ok(out)
    }

    fn bound(&mut self) -> DistResult<&mut Binding> {
        let label = &self.label;
        self.binding
            .as_mut()
            .ok_or_else(|| DistError::NotBound { dist: label.clone() })
    }

    fn not_bound(&self) -> DistError {
        DistError::NotBound { dist: self.label.clone() }
    }

    fn invalid(&self, param: &str, reason: String) -> DistError {
        DistError::InvalidParameter {
            dist: self.describe(),
            param: param.to_owned(),
            reason,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.family.name())?;
        for (i, (name, param)) in self.family.param_names().iter().zip(&self.params).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match param.as_scalar() {
                Some(v) => write!(f, "{name}={v}")?,
                None => write!(f, "{name}={param:?}")?,
            }
        }
        write!(f, ")")
    }
}
